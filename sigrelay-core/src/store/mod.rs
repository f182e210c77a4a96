//! Storage seams used by the processors.
//!
//! [`EventStore`] and [`RuleStore`] have a Postgres implementation backed by
//! the SQL commands in [`crate::entities`] and an in-memory one used in
//! tests and local runs.

pub mod memory;
pub mod postgres;

use crate::entities::events::{EventRecord, EventStats, FinishAttempt, InsertEvent, ResetOutcome};
use crate::entities::field_mappings::FieldMapping;
use crate::entities::workflows::Workflow;
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub use memory::{MemoryEventStore, MemoryRuleStore};
pub use postgres::{PgEventStore, PgRuleStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("event ({event_id}, {event_type}) conflicted on insert but could not be loaded")]
    MissingAfterConflict {
        event_id: String,
        event_type: String,
    },
}

/// Result of a deduplicating insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(EventRecord),
    /// The dedup key was already taken; carries the stored event.
    Duplicate(EventRecord),
}

impl InsertOutcome {
    pub fn event(&self) -> &EventRecord {
        match self {
            InsertOutcome::Inserted(e) | InsertOutcome::Duplicate(e) => e,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOutcome::Duplicate(_))
    }
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_if_absent(&self, event: InsertEvent) -> Result<InsertOutcome, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<EventRecord>, StoreError>;

    /// Conditional `pending|failed -> processing` under `attempt_id`.
    /// `None` means the claim was lost.
    async fn claim(&self, id: Uuid, attempt_id: Uuid) -> Result<Option<EventRecord>, StoreError>;

    /// Write an attempt outcome. `false` means the claim no longer belongs to
    /// `update.attempt_id`.
    async fn finish_attempt(&self, update: FinishAttempt) -> Result<bool, StoreError>;

    async fn reset_for_retry(&self, id: Uuid) -> Result<ResetOutcome, StoreError>;

    async fn due_events(
        &self,
        now: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<EventRecord>, StoreError>;

    async fn reclaim_stale(&self, older_than: OffsetDateTime) -> Result<u64, StoreError>;

    async fn stats(&self, tenant_id: Option<String>) -> Result<EventStats, StoreError>;

    async fn list_failed(
        &self,
        tenant_id: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventRecord>, StoreError>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn active_workflows(
        &self,
        tenant_id: &str,
        event_type: &str,
    ) -> Result<Vec<Workflow>, StoreError>;

    async fn active_field_mappings(&self, tenant_id: &str) -> Result<Vec<FieldMapping>, StoreError>;
}
