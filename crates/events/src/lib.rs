//! Migration job event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: progress and status notifications for one migration job.

pub mod bus;

pub use bus::{EventBus, JobEvent, JobEventKind};
