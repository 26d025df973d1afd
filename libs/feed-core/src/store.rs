use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    AggregateRoot, CoreError, DomainEvent, EventPublisher, EventRecord, EventStoreRepository,
};

/// Append-only event store for one aggregate kind. Enforces optimistic
/// concurrency, assigns stream versions, and publishes each committed record
/// to the notification topic.
///
/// The topic name is injected at construction; the store never reads process
/// environment itself.
pub struct EventStore<A: AggregateRoot> {
    repository: Arc<dyn EventStoreRepository>,
    producer: Arc<dyn EventPublisher>,
    topic: String,
    _marker: PhantomData<A>,
}

impl<A: AggregateRoot> EventStore<A> {
    pub fn new(
        repository: Arc<dyn EventStoreRepository>,
        producer: Arc<dyn EventPublisher>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            producer,
            topic: topic.into(),
            _marker: PhantomData,
        }
    }

    /// Append `events` to the stream of `aggregate_id`.
    ///
    /// The caller supplies the stream version its state was loaded at (-1 for
    /// "no events exist yet"). The check is a genuine compare-and-set against
    /// the persisted tail: any mismatch means another writer committed first,
    /// and the whole call fails with `CoreError::Concurrency` before anything
    /// is written. On success each event gets the next sequential version and
    /// is appended and published in order.
    pub async fn save_events(
        &self,
        aggregate_id: Uuid,
        events: &[A::Event],
        expected_version: i64,
    ) -> Result<(), CoreError> {
        let stream = self.repository.find_by_aggregate_id(aggregate_id).await?;
        let current_version = stream.iter().map(|r| r.version).max().unwrap_or(-1);
        if current_version != expected_version {
            return Err(CoreError::Concurrency {
                expected: expected_version,
                actual: current_version,
            });
        }

        let mut version = expected_version;
        for event in events {
            version += 1;
            let payload = serde_json::to_value(event)
                .map_err(|e| CoreError::Serialization(e.to_string()))?;
            let record = EventRecord {
                aggregate_id,
                aggregate_type: A::TYPE.to_string(),
                version,
                event_type: event.event_type().to_string(),
                timestamp: Utc::now(),
                payload,
            };
            self.repository.save(record.clone()).await?;
            self.publish_record(&record).await;
        }
        Ok(())
    }

    /// The persisted stream for `aggregate_id`, ordered by version ascending.
    /// An identity with no events is reported as `CoreError::NotFound`, which
    /// is distinct from an aggregate in its zero state.
    pub async fn get_events(&self, aggregate_id: Uuid) -> Result<Vec<EventRecord>, CoreError> {
        let mut stream = self.repository.find_by_aggregate_id(aggregate_id).await?;
        if stream.is_empty() {
            return Err(CoreError::NotFound(aggregate_id.to_string()));
        }
        stream.sort_by_key(|record| record.version);
        Ok(stream)
    }

    /// Distinct identities with at least one persisted event. Used by the
    /// republish path only.
    pub async fn get_aggregate_ids(&self) -> Result<Vec<Uuid>, CoreError> {
        let records = self.repository.find_all().await?;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for record in records {
            if seen.insert(record.aggregate_id) {
                ids.push(record.aggregate_id);
            }
        }
        Ok(ids)
    }

    /// Decode a stored record back into the aggregate's event enum.
    pub fn decode_event(record: &EventRecord) -> Result<A::Event, CoreError> {
        serde_json::from_value(record.payload.clone())
            .map_err(|e| CoreError::Deserialization(e.to_string()))
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn producer(&self) -> Arc<dyn EventPublisher> {
        Arc::clone(&self.producer)
    }

    // The append is the source of truth; a publish failure is logged and left
    // for the republish path to repair. Failing the save here would make the
    // caller re-append events that are already durable.
    async fn publish_record(&self, record: &EventRecord) {
        let bytes = match serde_json::to_vec(record) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    aggregate_id = %record.aggregate_id,
                    version = record.version,
                    "could not encode committed event for publishing: {err}"
                );
                return;
            }
        };
        if let Err(err) = self
            .producer
            .publish(&self.topic, &record.event_type, &bytes)
            .await
        {
            warn!(
                aggregate_id = %record.aggregate_id,
                version = record.version,
                "failed to publish committed event: {err}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        in_memory_event_bus::InMemoryEventBus, in_memory_repository::InMemoryEventRepository,
    };
    use crate::domain::post::{PostAggregate, PostEvent};

    fn store_with(
        repo: Arc<InMemoryEventRepository>,
        bus: Arc<InMemoryEventBus>,
    ) -> EventStore<PostAggregate> {
        EventStore::new(repo, bus, "post-events")
    }

    fn created_event(id: Uuid) -> PostEvent {
        PostEvent::PostCreated {
            id,
            author: "alice".to_string(),
            message: "hello".to_string(),
            date_posted: Utc::now(),
        }
    }

    #[tokio::test]
    async fn assigns_versions_from_zero() {
        let repo = Arc::new(InMemoryEventRepository::default());
        let store = store_with(repo.clone(), Arc::new(InMemoryEventBus::default()));
        let id = Uuid::new_v4();

        let events = vec![created_event(id), PostEvent::PostLiked { id }];
        store.save_events(id, &events, -1).await.unwrap();

        let stream = store.get_events(id).await.unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[0].version, 0);
        assert_eq!(stream[0].event_type, "PostCreated");
        assert_eq!(stream[0].aggregate_type, "PostAggregate");
        assert_eq!(stream[1].version, 1);
        assert_eq!(stream[1].event_type, "PostLiked");
    }

    #[tokio::test]
    async fn rejects_stale_expected_version() {
        let store = store_with(
            Arc::new(InMemoryEventRepository::default()),
            Arc::new(InMemoryEventBus::default()),
        );
        let id = Uuid::new_v4();

        store
            .save_events(id, &[created_event(id)], -1)
            .await
            .unwrap();

        // Second writer still believes the stream is empty.
        let result = store
            .save_events(id, &[PostEvent::PostLiked { id }], -1)
            .await;
        match result.err().unwrap() {
            CoreError::Concurrency { expected, actual } => {
                assert_eq!(expected, -1);
                assert_eq!(actual, 0);
            }
            e => panic!("expected Concurrency error, got {e:?}"),
        }

        // The conflicting call wrote nothing.
        let stream = store.get_events(id).await.unwrap();
        assert_eq!(stream.len(), 1);
    }

    #[tokio::test]
    async fn empty_sentinel_only_valid_for_empty_stream() {
        let store = store_with(
            Arc::new(InMemoryEventRepository::default()),
            Arc::new(InMemoryEventBus::default()),
        );
        let id = Uuid::new_v4();

        store
            .save_events(id, &[created_event(id)], -1)
            .await
            .unwrap();
        store
            .save_events(id, &[PostEvent::PostLiked { id }], 0)
            .await
            .unwrap();

        let stream = store.get_events(id).await.unwrap();
        assert_eq!(
            stream.iter().map(|r| r.version).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[tokio::test]
    async fn get_events_reports_unknown_identity() {
        let store = store_with(
            Arc::new(InMemoryEventRepository::default()),
            Arc::new(InMemoryEventBus::default()),
        );

        let result = store.get_events(Uuid::new_v4()).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn publishes_each_committed_record_in_order() {
        let bus = Arc::new(InMemoryEventBus::default());
        let store = store_with(Arc::new(InMemoryEventRepository::default()), bus.clone());
        let id = Uuid::new_v4();
        let mut receiver = bus.subscribe("post-events");

        let events = vec![created_event(id), PostEvent::PostLiked { id }];
        store.save_events(id, &events, -1).await.unwrap();

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.event_type, "PostCreated");
        assert_eq!(second.event_type, "PostLiked");

        let record: EventRecord = serde_json::from_slice(&first.payload).unwrap();
        assert_eq!(record.aggregate_id, id);
        assert_eq!(record.version, 0);
    }

    #[tokio::test]
    async fn lists_distinct_aggregate_ids() {
        let store = store_with(
            Arc::new(InMemoryEventRepository::default()),
            Arc::new(InMemoryEventBus::default()),
        );
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        store
            .save_events(first, &[created_event(first)], -1)
            .await
            .unwrap();
        store
            .save_events(first, &[PostEvent::PostLiked { id: first }], 0)
            .await
            .unwrap();
        store
            .save_events(second, &[created_event(second)], -1)
            .await
            .unwrap();

        let mut ids = store.get_aggregate_ids().await.unwrap();
        ids.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
