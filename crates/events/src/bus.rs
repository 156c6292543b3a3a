//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Publishing is fire-and-forget: a job never fails because nobody listens
//! or because a slow subscriber lagged.

use bizsuite_core::migration::{EntityType, JobStatus};
use bizsuite_core::types::DbId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    /// A batch was committed during execute.
    Progress,
    /// The job moved to a new status.
    StatusChanged,
    /// Rollback finished, fully or partially.
    RolledBack,
}

impl JobEventKind {
    /// Dot-separated event name, e.g. `"migration.progress"`.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Progress => "migration.progress",
            Self::StatusChanged => "migration.status_changed",
            Self::RolledBack => "migration.rolled_back",
        }
    }
}

/// Something that happened to one migration job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub job_id: DbId,
    pub entity_type: EntityType,
    pub status: JobStatus,
    /// Event-specific data such as counters or an error message.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(kind: JobEventKind, job_id: DbId, entity_type: EntityType, status: JobStatus) -> Self {
        Self {
            kind,
            job_id,
            entity_type,
            status,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Pub/sub channel name for this job's events.
    pub fn channel(&self) -> String {
        format!("migration:{}", self.job_id)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus, shared as `Arc<EventBus>`.
///
/// ```rust
/// use bizsuite_core::migration::{EntityType, JobStatus};
/// use bizsuite_events::{EventBus, JobEvent, JobEventKind};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::new(JobEventKind::Progress, 1, EntityType::Contacts, JobStatus::Running));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: JobEvent) {
        let channel = event.channel();
        let kind = event.kind.event_name();
        // A send error only means there are zero receivers.
        if self.sender.send(event).is_err() {
            tracing::trace!(%channel, kind, "No subscribers for job event");
        }
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = JobEvent::new(JobEventKind::Progress, 42, EntityType::Contacts, JobStatus::Running)
            .with_payload(serde_json::json!({"processed_rows": 500}));
        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.kind, JobEventKind::Progress);
        assert_eq!(received.job_id, 42);
        assert_eq!(received.channel(), "migration:42");
        assert_eq!(received.payload["processed_rows"], 500);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(JobEvent::new(
            JobEventKind::StatusChanged,
            3,
            EntityType::Invoices,
            JobStatus::Completed,
        ));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.status, JobStatus::Completed);
        assert_eq!(e2.status, JobStatus::Completed);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(JobEvent::new(
            JobEventKind::RolledBack,
            1,
            EntityType::Contacts,
            JobStatus::RolledBack,
        ));
    }

    #[test]
    fn event_names_are_namespaced() {
        assert_eq!(JobEventKind::Progress.event_name(), "migration.progress");
        assert_eq!(
            serde_json::to_value(JobEventKind::StatusChanged).unwrap(),
            "status_changed"
        );
    }
}
