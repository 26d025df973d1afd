use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::{AggregateRoot, CoreError, EventPublisher, EventStore};

/// Bridges aggregates to their persisted event streams: load (fetch +
/// replay), save (persist uncommitted changes), and full-history republish
/// for read-model rebuilds.
pub struct EventSourcingHandler<A: AggregateRoot> {
    event_store: EventStore<A>,
    producer: Arc<dyn EventPublisher>,
    topic: String,
}

impl<A: AggregateRoot> EventSourcingHandler<A> {
    pub fn new(event_store: EventStore<A>) -> Self {
        let producer = event_store.producer();
        let topic = event_store.topic().to_string();
        Self {
            event_store,
            producer,
            topic,
        }
    }

    /// Persist the aggregate's uncommitted changes, using its loaded version
    /// as the concurrency baseline. The change buffer is cleared only after
    /// the store confirms the append; a failed save leaves it intact so the
    /// caller can reload and retry.
    pub async fn save(&self, aggregate: &mut A) -> Result<(), CoreError> {
        self.event_store
            .save_events(
                aggregate.aggregate_id(),
                aggregate.uncommitted_changes(),
                aggregate.version(),
            )
            .await?;
        aggregate.mark_changes_committed();
        Ok(())
    }

    /// Reconstruct an aggregate by replaying its stream. An identity with no
    /// history yields the empty aggregate (version -1) rather than an error:
    /// "not yet created" is a valid state on the load-before-mutate path.
    pub async fn get_by_id(&self, aggregate_id: Uuid) -> Result<A, CoreError> {
        let mut aggregate = A::default();
        let records = match self.event_store.get_events(aggregate_id).await {
            Ok(records) => records,
            Err(CoreError::NotFound(_)) => return Ok(aggregate),
            Err(err) => return Err(err),
        };

        let mut events = Vec::with_capacity(records.len());
        let mut max_version = -1;
        for record in &records {
            max_version = max_version.max(record.version);
            events.push(EventStore::<A>::decode_event(record)?);
        }
        aggregate.replay_events(&events);
        aggregate.set_version(max_version);
        Ok(aggregate)
    }

    /// Re-publish the full persisted history of every active aggregate, in
    /// per-stream version order. A disaster-recovery operation: it lets the
    /// read model be rebuilt from scratch without touching write-side data.
    /// Inactive aggregates are skipped and an empty store is a no-op.
    pub async fn republish_all(&self) -> Result<(), CoreError> {
        let aggregate_ids = self.event_store.get_aggregate_ids().await?;
        if aggregate_ids.is_empty() {
            return Ok(());
        }

        for aggregate_id in aggregate_ids {
            let aggregate = self.get_by_id(aggregate_id).await?;
            if !aggregate.is_active() {
                continue;
            }

            let records = self.event_store.get_events(aggregate_id).await?;
            info!(
                %aggregate_id,
                count = records.len(),
                "republishing event stream"
            );
            for record in records {
                let bytes = serde_json::to_vec(&record)
                    .map_err(|e| CoreError::Serialization(e.to_string()))?;
                self.producer
                    .publish(&self.topic, &record.event_type, &bytes)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventRecord, EventStoreRepository};
    use crate::adapters::{
        in_memory_event_bus::InMemoryEventBus, in_memory_repository::InMemoryEventRepository,
    };
    use crate::domain::post::{PostAggregate, PostError};

    fn handler_with(
        repo: Arc<InMemoryEventRepository>,
        bus: Arc<InMemoryEventBus>,
    ) -> EventSourcingHandler<PostAggregate> {
        EventSourcingHandler::new(EventStore::new(repo, bus, "post-events"))
    }

    fn in_memory_handler() -> EventSourcingHandler<PostAggregate> {
        handler_with(
            Arc::new(InMemoryEventRepository::default()),
            Arc::new(InMemoryEventBus::default()),
        )
    }

    #[tokio::test]
    async fn unknown_id_loads_as_empty_aggregate() {
        let handler = in_memory_handler();

        let aggregate = handler.get_by_id(Uuid::new_v4()).await.unwrap();
        assert_eq!(aggregate.version(), -1);
        assert!(!aggregate.is_active());
        assert!(aggregate.uncommitted_changes().is_empty());
    }

    #[tokio::test]
    async fn first_save_starts_stream_at_version_zero() {
        let handler = in_memory_handler();
        let id = Uuid::new_v4();

        let mut post = PostAggregate::create(id, "alice", "hello").unwrap();
        assert_eq!(post.version(), -1);
        handler.save(&mut post).await.unwrap();

        assert!(post.uncommitted_changes().is_empty());
        let loaded = handler.get_by_id(id).await.unwrap();
        assert_eq!(loaded.version(), 0);
        assert!(loaded.is_active());
    }

    #[tokio::test]
    async fn reconstruction_matches_in_memory_state() {
        let handler = in_memory_handler();
        let id = Uuid::new_v4();

        let mut post = PostAggregate::create(id, "alice", "hello").unwrap();
        handler.save(&mut post).await.unwrap();

        let mut post = handler.get_by_id(id).await.unwrap();
        post.like_post().unwrap();
        let comment_id = post.add_comment("hi", "bob").unwrap();
        post.edit_message("hello world").unwrap();
        handler.save(&mut post).await.unwrap();

        let reloaded = handler.get_by_id(id).await.unwrap();
        assert_eq!(reloaded.version(), 3);
        assert_eq!(reloaded.author(), post.author());
        assert_eq!(reloaded.message(), "hello world");
        assert_eq!(reloaded.likes(), 1);
        assert_eq!(reloaded.comment_count(), 1);
        assert_eq!(reloaded.comment(comment_id), Some(("hi", "bob")));
        assert!(reloaded.is_active());
    }

    #[tokio::test]
    async fn stale_writer_gets_conflict_and_keeps_changes() {
        let handler = in_memory_handler();
        let id = Uuid::new_v4();

        let mut post = PostAggregate::create(id, "alice", "hello").unwrap();
        handler.save(&mut post).await.unwrap();

        // Two callers load the same baseline.
        let mut first = handler.get_by_id(id).await.unwrap();
        let mut second = handler.get_by_id(id).await.unwrap();

        first.like_post().unwrap();
        handler.save(&mut first).await.unwrap();

        second.edit_message("changed").unwrap();
        let result = handler.save(&mut second).await;
        assert!(matches!(result, Err(CoreError::Concurrency { .. })));
        // Retryable: the uncommitted change survives the failed save.
        assert_eq!(second.uncommitted_changes().len(), 1);

        // A fresh cycle succeeds.
        let mut retried = handler.get_by_id(id).await.unwrap();
        retried.edit_message("changed").unwrap();
        handler.save(&mut retried).await.unwrap();
        assert_eq!(handler.get_by_id(id).await.unwrap().version(), 2);
    }

    #[tokio::test]
    async fn post_lifecycle_scenario() {
        let repo = Arc::new(InMemoryEventRepository::default());
        let handler = handler_with(repo.clone(), Arc::new(InMemoryEventBus::default()));
        let id = Uuid::new_v4();

        // Create: stream = [PostCreated v0].
        let mut post = PostAggregate::create(id, "alice", "hello").unwrap();
        handler.save(&mut post).await.unwrap();
        let stream = repo.find_by_aggregate_id(id).await.unwrap();
        assert_eq!(stream.len(), 1);
        assert_eq!(stream[0].event_type, "PostCreated");
        assert_eq!(stream[0].version, 0);

        // Comment from bob: stream = [.., CommentAdded v1].
        let mut post = handler.get_by_id(id).await.unwrap();
        let comment_id = post.add_comment("hi", "bob").unwrap();
        assert_ne!(comment_id, id);
        handler.save(&mut post).await.unwrap();
        let stream = repo.find_by_aggregate_id(id).await.unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream[1].event_type, "CommentAdded");
        assert_eq!(stream[1].version, 1);
        let post = handler.get_by_id(id).await.unwrap();
        assert_eq!(post.comment(comment_id).unwrap().1, "bob");

        // Carol may not edit bob's comment; the stream is untouched.
        let mut post = handler.get_by_id(id).await.unwrap();
        let result = post.edit_comment(comment_id, "hijacked", "carol");
        assert!(matches!(result, Err(PostError::Unauthorized { .. })));
        assert!(post.uncommitted_changes().is_empty());
        assert_eq!(repo.find_by_aggregate_id(id).await.unwrap().len(), 2);

        // Alice edits her post, then deletes it.
        let mut post = handler.get_by_id(id).await.unwrap();
        post.edit_message("hello again").unwrap();
        handler.save(&mut post).await.unwrap();
        let mut post = handler.get_by_id(id).await.unwrap();
        post.delete_post("alice").unwrap();
        handler.save(&mut post).await.unwrap();

        let stream = repo.find_by_aggregate_id(id).await.unwrap();
        assert_eq!(stream.len(), 4);
        assert_eq!(stream[3].event_type, "PostRemoved");
        assert_eq!(stream[3].version, 3);
        let post = handler.get_by_id(id).await.unwrap();
        assert!(!post.is_active());

        // The removed post rejects further commands; nothing is appended.
        let mut post = handler.get_by_id(id).await.unwrap();
        assert!(matches!(post.like_post(), Err(PostError::InactivePost)));
        assert_eq!(repo.find_by_aggregate_id(id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn republish_skips_inactive_aggregates() {
        let bus = Arc::new(InMemoryEventBus::default());
        let handler = handler_with(Arc::new(InMemoryEventRepository::default()), bus.clone());

        let live_id = Uuid::new_v4();
        let mut live = PostAggregate::create(live_id, "alice", "still here").unwrap();
        handler.save(&mut live).await.unwrap();

        let dead_id = Uuid::new_v4();
        let mut dead = PostAggregate::create(dead_id, "bob", "gone soon").unwrap();
        handler.save(&mut dead).await.unwrap();
        let mut dead = handler.get_by_id(dead_id).await.unwrap();
        dead.delete_post("bob").unwrap();
        handler.save(&mut dead).await.unwrap();

        // Subscribe after the saves so only republished messages arrive.
        let mut receiver = bus.subscribe("post-events");
        handler.republish_all().await.unwrap();

        let message = receiver.recv().await.unwrap();
        let record: EventRecord = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(record.aggregate_id, live_id);
        assert_eq!(record.version, 0);
        // Nothing further: the deleted post's stream was not republished.
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn republish_on_empty_store_is_a_noop() {
        let handler = in_memory_handler();
        handler.republish_all().await.unwrap();
    }
}
