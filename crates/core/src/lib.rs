//! Domain logic for the bizsuite data-migration subsystem.
//!
//! Everything in this crate is pure: no database access, no async, no
//! filesystem writes. The `db`, `migration`, and `api` crates build on it.

pub mod error;
pub mod hashing;
pub mod hierarchy;
pub mod migration;
pub mod pagination;
pub mod types;
