use super::{EventStore, InsertOutcome, RuleStore, StoreError};
use crate::entities::events::{
    ClaimEvent, CountEventsByStatus, EventRecord, EventStats, FinishAttempt, GetDueEvents,
    GetEventByDedupKey, GetEventById, InsertEvent, ListFailedEvents, ReclaimStaleEvents,
    ResetEventForRetry, ResetOutcome,
};
use crate::entities::field_mappings::{FieldMapping, GetActiveFieldMappings};
use crate::entities::workflows::{GetActiveWorkflows, Workflow, parse_workflows};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgEventStore {
    processor: DatabaseProcessor,
}

impl PgEventStore {
    pub fn new(processor: DatabaseProcessor) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert_if_absent(&self, event: InsertEvent) -> Result<InsertOutcome, StoreError> {
        let event_id = event.event_id.clone();
        let event_type = event.event_type.clone();
        if let Some(inserted) = self.processor.process(event).await? {
            return Ok(InsertOutcome::Inserted(inserted));
        }
        let existing = self
            .processor
            .process(GetEventByDedupKey {
                event_id: event_id.clone(),
                event_type: event_type.clone(),
            })
            .await?;
        existing
            .map(InsertOutcome::Duplicate)
            .ok_or(StoreError::MissingAfterConflict {
                event_id,
                event_type,
            })
    }

    async fn get(&self, id: Uuid) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.processor.process(GetEventById { id }).await?)
    }

    async fn claim(&self, id: Uuid, attempt_id: Uuid) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.processor.process(ClaimEvent { id, attempt_id }).await?)
    }

    async fn finish_attempt(&self, update: FinishAttempt) -> Result<bool, StoreError> {
        Ok(self.processor.process(update).await?)
    }

    async fn reset_for_retry(&self, id: Uuid) -> Result<ResetOutcome, StoreError> {
        Ok(self.processor.process(ResetEventForRetry { id }).await?)
    }

    async fn due_events(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<EventRecord>, StoreError> {
        Ok(self.processor.process(GetDueEvents { now, limit }).await?)
    }

    async fn reclaim_stale(&self, older_than: OffsetDateTime) -> Result<u64, StoreError> {
        Ok(self
            .processor
            .process(ReclaimStaleEvents { older_than })
            .await?)
    }

    async fn stats(&self, tenant_id: Option<String>) -> Result<EventStats, StoreError> {
        Ok(self
            .processor
            .process(CountEventsByStatus { tenant_id })
            .await?)
    }

    async fn list_failed(
        &self,
        tenant_id: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventRecord>, StoreError> {
        Ok(self
            .processor
            .process(ListFailedEvents {
                tenant_id,
                limit,
                offset,
            })
            .await?)
    }
}

#[derive(Debug, Clone)]
pub struct PgRuleStore {
    processor: DatabaseProcessor,
}

impl PgRuleStore {
    pub fn new(processor: DatabaseProcessor) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn active_workflows(
        &self,
        tenant_id: &str,
        event_type: &str,
    ) -> Result<Vec<Workflow>, StoreError> {
        let rows = self
            .processor
            .process(GetActiveWorkflows {
                tenant_id: tenant_id.to_owned(),
                event_type: event_type.to_owned(),
            })
            .await?;
        Ok(parse_workflows(rows))
    }

    async fn active_field_mappings(&self, tenant_id: &str) -> Result<Vec<FieldMapping>, StoreError> {
        Ok(self
            .processor
            .process(GetActiveFieldMappings {
                tenant_id: tenant_id.to_owned(),
            })
            .await?)
    }
}
