//! In-memory stores with the same transition rules as the SQL commands.

use super::{EventStore, InsertOutcome, RuleStore, StoreError};
use crate::entities::EventStatus;
use crate::entities::events::{EventRecord, EventStats, FinishAttempt, InsertEvent, ResetOutcome};
use crate::entities::field_mappings::FieldMapping;
use crate::entities::workflows::Workflow;
use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<HashMap<Uuid, EventRecord>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record as-is.
    pub async fn put(&self, record: EventRecord) {
        self.events.lock().await.insert(record.id, record);
    }

    pub async fn snapshot(&self) -> Vec<EventRecord> {
        let mut all: Vec<_> = self.events.lock().await.values().cloned().collect();
        all.sort_by_key(|e| e.received_at);
        all
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert_if_absent(&self, event: InsertEvent) -> Result<InsertOutcome, StoreError> {
        let mut events = self.events.lock().await;
        if let Some(existing) = events
            .values()
            .find(|e| e.event_id == event.event_id && e.event_type == event.event_type)
        {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        let now = OffsetDateTime::now_utc();
        let record = EventRecord {
            id: event.id,
            event_id: event.event_id,
            event_type: event.event_type,
            tenant_id: event.tenant_id,
            payload: event.payload,
            status: EventStatus::Pending,
            attempt_id: None,
            retry_count: 0,
            max_retries: event.max_retries,
            next_retry_at: None,
            error_message: None,
            processing_time_ms: None,
            actions_triggered: 0,
            response: None,
            received_at: now,
            processed_at: None,
            updated_at: now,
        };
        events.insert(record.id, record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn get(&self, id: Uuid) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.events.lock().await.get(&id).cloned())
    }

    async fn claim(&self, id: Uuid, attempt_id: Uuid) -> Result<Option<EventRecord>, StoreError> {
        let mut events = self.events.lock().await;
        match events.get_mut(&id) {
            Some(event) if event.status.is_claimable() => {
                event.status = EventStatus::Processing;
                event.attempt_id = Some(attempt_id);
                event.updated_at = OffsetDateTime::now_utc();
                Ok(Some(event.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn finish_attempt(&self, update: FinishAttempt) -> Result<bool, StoreError> {
        let mut events = self.events.lock().await;
        let Some(event) = events.get_mut(&update.id) else {
            return Ok(false);
        };
        if event.status != EventStatus::Processing || event.attempt_id != Some(update.attempt_id) {
            return Ok(false);
        }
        event.status = update.status;
        event.attempt_id = None;
        event.retry_count = update.retry_count;
        event.next_retry_at = update.next_retry_at;
        event.error_message = update.error_message;
        event.processing_time_ms = Some(update.processing_time_ms);
        event.actions_triggered = update.actions_triggered;
        event.response = Some(update.response);
        if update.processed_at.is_some() {
            event.processed_at = update.processed_at;
        }
        event.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn reset_for_retry(&self, id: Uuid) -> Result<ResetOutcome, StoreError> {
        let mut events = self.events.lock().await;
        let Some(event) = events.get_mut(&id) else {
            return Ok(ResetOutcome::NotFound);
        };
        if !event.status.is_resettable() {
            return Ok(ResetOutcome::InvalidState(event.status));
        }
        event.status = EventStatus::Pending;
        event.attempt_id = None;
        event.retry_count = 0;
        event.next_retry_at = None;
        event.error_message = None;
        event.updated_at = OffsetDateTime::now_utc();
        Ok(ResetOutcome::Reset(event.clone()))
    }

    async fn due_events(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let mut due: Vec<_> = self
            .events
            .lock()
            .await
            .values()
            .filter(|e| e.status.is_claimable())
            .filter(|e| e.next_retry_at.is_none_or(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|e| e.received_at);
        due.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(due)
    }

    async fn reclaim_stale(&self, older_than: OffsetDateTime) -> Result<u64, StoreError> {
        let mut reclaimed = 0;
        let now = OffsetDateTime::now_utc();
        for event in self.events.lock().await.values_mut() {
            if event.status == EventStatus::Processing && event.updated_at < older_than {
                event.status = EventStatus::Pending;
                event.attempt_id = None;
                event.next_retry_at = None;
                event.updated_at = now;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    async fn stats(&self, tenant_id: Option<String>) -> Result<EventStats, StoreError> {
        let mut stats = EventStats::default();
        for event in self.events.lock().await.values() {
            if tenant_id.as_deref().is_none_or(|t| t == event.tenant_id) {
                stats.count(event.status);
            }
        }
        Ok(stats)
    }

    async fn list_failed(
        &self,
        tenant_id: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let mut failed: Vec<_> = self
            .events
            .lock()
            .await
            .values()
            .filter(|e| {
                matches!(
                    e.status,
                    EventStatus::Failed | EventStatus::PermanentlyFailed
                )
            })
            .filter(|e| tenant_id.as_deref().is_none_or(|t| t == e.tenant_id))
            .cloned()
            .collect();
        failed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(failed
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    workflows: RwLock<Vec<Workflow>>,
    mappings: RwLock<Vec<FieldMapping>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_workflow(&self, workflow: Workflow) {
        self.workflows.write().await.push(workflow);
    }

    pub async fn add_mapping(&self, mapping: FieldMapping) {
        self.mappings.write().await.push(mapping);
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn active_workflows(
        &self,
        tenant_id: &str,
        event_type: &str,
    ) -> Result<Vec<Workflow>, StoreError> {
        Ok(self
            .workflows
            .read()
            .await
            .iter()
            .filter(|w| w.active && w.tenant_id == tenant_id && w.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn active_field_mappings(&self, tenant_id: &str) -> Result<Vec<FieldMapping>, StoreError> {
        Ok(self
            .mappings
            .read()
            .await
            .iter()
            .filter(|m| m.active && m.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}
