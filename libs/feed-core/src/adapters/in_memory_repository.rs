use crate::{CoreError, EventRecord, EventStoreRepository};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory implementation of the event-store repository port for testing
/// and single-executable mode. Streams are kept per aggregate id in insertion
/// order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventRepository {
    streams: Arc<DashMap<Uuid, Vec<EventRecord>>>,
}

#[async_trait]
impl EventStoreRepository for InMemoryEventRepository {
    async fn save(&self, record: EventRecord) -> Result<(), CoreError> {
        let mut stream = self.streams.entry(record.aggregate_id).or_default();
        // Same guard the durable adapter gets from UNIQUE(aggregate_id, version):
        // a duplicate version means a racing writer won, so surface the
        // retryable conflict rather than a generic failure.
        if stream.iter().any(|existing| existing.version == record.version) {
            return Err(CoreError::Concurrency {
                expected: record.version - 1,
                actual: record.version,
            });
        }
        stream.push(record);
        Ok(())
    }

    async fn find_by_aggregate_id(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Vec<EventRecord>, CoreError> {
        match self.streams.get(&aggregate_id) {
            Some(stream) => Ok(stream.value().clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn find_all(&self) -> Result<Vec<EventRecord>, CoreError> {
        let mut records = Vec::new();
        for stream in self.streams.iter() {
            records.extend(stream.value().iter().cloned());
        }
        Ok(records)
    }
}
