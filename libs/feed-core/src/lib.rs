use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{error::Error as StdError, fmt::Debug};
use uuid::Uuid;

// Declare modules
pub mod adapters;
pub mod domain;

mod sourcing;
mod store;

pub use sourcing::EventSourcingHandler;
pub use store::EventStore;

// Common error type for the core library. Domain errors are converted into
// this at the command boundary; infrastructure adapters produce it directly.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("Aggregate not found: {0}")]
    NotFound(String),
    #[error("Command validation failed: {0}")]
    Validation(String),
    #[error("Concurrency conflict: expected version {expected}, found {actual}")]
    Concurrency { expected: i64, actual: i64 },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] Box<dyn StdError + Send + Sync>),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// An immutable fact raised by an aggregate. Implemented by the per-aggregate
/// event enum; the type tag discriminates the concrete kind in storage and on
/// the bus.
pub trait DomainEvent:
    Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// A name specifying the event kind, stored alongside the payload.
    fn event_type(&self) -> &'static str;
}

/// Storage representation of a committed event. Created by the event store at
/// save time; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub version: i64,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// An event-sourced state machine. State is derived exclusively from the
/// ordered event stream: command methods validate and raise events, and only
/// `apply` mutates fields.
///
/// `version` is the version of the last event applied from storage, or -1 for
/// an aggregate with no history. Raising an event does not advance it; the
/// event store assigns versions at commit time and the sourcing handler sets
/// it after a replay.
pub trait AggregateRoot: Default + Send + Sync {
    type Event: DomainEvent;

    /// Aggregate type tag stamped onto every persisted record.
    const TYPE: &'static str;

    fn aggregate_id(&self) -> Uuid;
    fn version(&self) -> i64;
    fn set_version(&mut self, version: i64);

    /// Domain liveness flag. Streams of inactive aggregates are skipped by
    /// the republish path.
    fn is_active(&self) -> bool;

    /// Mutate state for one event. Dispatch must be exhaustive over the event
    /// enum; an unhandled kind would make the history unreplayable.
    fn apply(&mut self, event: &Self::Event);

    /// Events raised since the last successful save, in raise order.
    fn uncommitted_changes(&self) -> &[Self::Event];

    /// Mutable access to the change buffer. Only the provided methods below
    /// should touch it.
    fn changes_mut(&mut self) -> &mut Vec<Self::Event>;

    /// Record a new event and immediately apply it. Called by command methods
    /// after their precondition checks pass.
    fn raise_event(&mut self, event: Self::Event) {
        self.apply(&event);
        self.changes_mut().push(event);
    }

    /// Apply previously persisted events in order without buffering them.
    /// Used only during reconstruction from storage.
    fn replay_events<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        for event in events {
            self.apply(event);
        }
    }

    /// Clear the change buffer. Called only after the event store confirms
    /// the events were durably persisted.
    fn mark_changes_committed(&mut self) {
        self.changes_mut().clear();
    }
}

// Port for the append-only event collection backing the event store.
// `find_by_aggregate_id` returns records in insertion order; the store sorts
// by version before replaying.
#[async_trait]
pub trait EventStoreRepository: Send + Sync {
    async fn save(&self, record: EventRecord) -> Result<(), CoreError>;

    async fn find_by_aggregate_id(&self, aggregate_id: Uuid)
    -> Result<Vec<EventRecord>, CoreError>;

    async fn find_all(&self) -> Result<Vec<EventRecord>, CoreError>;
}

// Port for publishing committed events to the notification channel.
// Fire-and-forget, at-least-once; consumers must be idempotent.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        event_type: &str,
        payload: &[u8],
    ) -> Result<(), CoreError>;
}
