//! The `webhook_events` table: one row per (event id, event type) pair.

use crate::entities::EventStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EventRecord {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub tenant_id: String,
    pub payload: Value,
    pub status: EventStatus,
    /// Token of the attempt holding the current `processing` claim.
    pub attempt_id: Option<Uuid>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<OffsetDateTime>,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub actions_triggered: i32,
    pub response: Option<Value>,
    pub received_at: OffsetDateTime,
    pub processed_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

impl EventRecord {
    /// Idempotency keys of actions that already succeeded in an earlier attempt.
    pub fn completed_actions(&self) -> Vec<String> {
        self.response
            .as_ref()
            .and_then(|r| r.get("completedActions"))
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Audit entries written by earlier attempts.
    pub fn action_history(&self) -> Vec<Value> {
        self.response
            .as_ref()
            .and_then(|r| r.get("actionsDetails"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

/// Counts of events per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct EventStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub success: i64,
    pub failed: i64,
    pub permanently_failed: i64,
}

impl EventStats {
    pub fn count(&mut self, status: EventStatus) {
        self.total += 1;
        match status {
            EventStatus::Pending => self.pending += 1,
            EventStatus::Processing => self.processing += 1,
            EventStatus::Success => self.success += 1,
            EventStatus::Failed => self.failed += 1,
            EventStatus::PermanentlyFailed => self.permanently_failed += 1,
        }
    }
}

/// Result of an operator reset.
#[derive(Debug, Clone, PartialEq)]
pub enum ResetOutcome {
    Reset(EventRecord),
    NotFound,
    InvalidState(EventStatus),
}

const EVENT_COLUMNS: &str = r#"
    id, event_id, event_type, tenant_id, payload, status, attempt_id,
    retry_count, max_retries, next_retry_at, error_message,
    processing_time_ms, actions_triggered, response,
    received_at, processed_at, updated_at
"#;

#[derive(Debug, Clone)]
/// Insert a new `pending` event unless its dedup key already exists.
///
/// Returns `None` when the (event_id, event_type) pair is already stored.
pub struct InsertEvent {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub tenant_id: String,
    pub payload: Value,
    pub max_retries: i32,
}

impl Processor<InsertEvent> for DatabaseProcessor {
    type Output = Option<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertEvent")]
    async fn process(&self, insert: InsertEvent) -> Result<Option<EventRecord>, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO webhook_events
                (id, event_id, event_type, tenant_id, payload, status, retry_count, max_retries)
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, $6)
            ON CONFLICT (event_id, event_type) DO NOTHING
            RETURNING {EVENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, EventRecord>(&sql)
            .bind(insert.id)
            .bind(insert.event_id)
            .bind(insert.event_type)
            .bind(insert.tenant_id)
            .bind(insert.payload)
            .bind(insert.max_retries)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetEventById {
    pub id: Uuid,
}

impl Processor<GetEventById> for DatabaseProcessor {
    type Output = Option<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEventById")]
    async fn process(&self, query: GetEventById) -> Result<Option<EventRecord>, sqlx::Error> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM webhook_events WHERE id = $1");
        sqlx::query_as::<_, EventRecord>(&sql)
            .bind(query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetEventByDedupKey {
    pub event_id: String,
    pub event_type: String,
}

impl Processor<GetEventByDedupKey> for DatabaseProcessor {
    type Output = Option<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEventByDedupKey")]
    async fn process(&self, query: GetEventByDedupKey) -> Result<Option<EventRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM webhook_events WHERE event_id = $1 AND event_type = $2"
        );
        sqlx::query_as::<_, EventRecord>(&sql)
            .bind(query.event_id)
            .bind(query.event_type)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Atomically move an event from `pending`/`failed` into `processing`.
///
/// Returns `None` when another attempt already owns the event or it is in a
/// status no attempt may leave. `attempt_id` must be presented again by
/// [`FinishAttempt`].
pub struct ClaimEvent {
    pub id: Uuid,
    pub attempt_id: Uuid,
}

impl Processor<ClaimEvent> for DatabaseProcessor {
    type Output = Option<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimEvent")]
    async fn process(&self, cmd: ClaimEvent) -> Result<Option<EventRecord>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE webhook_events
            SET status = 'processing', attempt_id = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'failed')
            RETURNING {EVENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, EventRecord>(&sql)
            .bind(cmd.id)
            .bind(cmd.attempt_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Record the outcome of an attempt on a `processing` event.
///
/// Returns `false` when the row is no longer held by `attempt_id`: it was
/// reclaimed as stale while the attempt ran, possibly re-claimed since.
pub struct FinishAttempt {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub status: EventStatus,
    pub retry_count: i32,
    pub next_retry_at: Option<OffsetDateTime>,
    pub error_message: Option<String>,
    pub processing_time_ms: i64,
    pub actions_triggered: i32,
    pub response: Value,
    pub processed_at: Option<OffsetDateTime>,
}

impl Processor<FinishAttempt> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FinishAttempt")]
    async fn process(&self, cmd: FinishAttempt) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = $2,
                attempt_id = NULL,
                retry_count = $3,
                next_retry_at = $4,
                error_message = $5,
                processing_time_ms = $6,
                actions_triggered = $7,
                response = $8,
                processed_at = COALESCE($9, processed_at),
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing' AND attempt_id = $10
            "#,
        )
        .bind(cmd.id)
        .bind(cmd.status)
        .bind(cmd.retry_count)
        .bind(cmd.next_retry_at)
        .bind(cmd.error_message)
        .bind(cmd.processing_time_ms)
        .bind(cmd.actions_triggered)
        .bind(cmd.response)
        .bind(cmd.processed_at)
        .bind(cmd.attempt_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
/// Operator reset: back to `pending` with a zero retry count.
pub struct ResetEventForRetry {
    pub id: Uuid,
}

impl Processor<ResetEventForRetry> for DatabaseProcessor {
    type Output = ResetOutcome;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ResetEventForRetry")]
    async fn process(&self, cmd: ResetEventForRetry) -> Result<ResetOutcome, sqlx::Error> {
        let mut tx = self.begin().await?;

        let current: Option<EventStatus> =
            sqlx::query_scalar("SELECT status FROM webhook_events WHERE id = $1 FOR UPDATE")
                .bind(cmd.id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(status) = current else {
            return Ok(ResetOutcome::NotFound);
        };
        if !status.is_resettable() {
            return Ok(ResetOutcome::InvalidState(status));
        }

        let sql = format!(
            r#"
            UPDATE webhook_events
            SET status = 'pending',
                attempt_id = NULL,
                retry_count = 0,
                next_retry_at = NULL,
                error_message = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        );
        let event = sqlx::query_as::<_, EventRecord>(&sql)
            .bind(cmd.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ResetOutcome::Reset(event))
    }
}

#[derive(Debug, Clone)]
/// Events whose next attempt is due: `pending`/`failed` with no retry time
/// or a retry time in the past.
pub struct GetDueEvents {
    pub now: OffsetDateTime,
    pub limit: i64,
}

impl Processor<GetDueEvents> for DatabaseProcessor {
    type Output = Vec<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDueEvents")]
    async fn process(&self, query: GetDueEvents) -> Result<Vec<EventRecord>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM webhook_events
            WHERE status IN ('pending', 'failed')
              AND (next_retry_at IS NULL OR next_retry_at <= $1)
            ORDER BY received_at ASC
            LIMIT $2
            "#
        );
        sqlx::query_as::<_, EventRecord>(&sql)
            .bind(query.now)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Return `processing` rows untouched since `older_than` to `pending`.
///
/// Returns the number of rows reclaimed.
pub struct ReclaimStaleEvents {
    pub older_than: OffsetDateTime,
}

impl Processor<ReclaimStaleEvents> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ReclaimStaleEvents")]
    async fn process(&self, cmd: ReclaimStaleEvents) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'pending', attempt_id = NULL, next_retry_at = NULL, updated_at = NOW()
            WHERE status = 'processing' AND updated_at < $1
            "#,
        )
        .bind(cmd.older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
pub struct CountEventsByStatus {
    pub tenant_id: Option<String>,
}

impl Processor<CountEventsByStatus> for DatabaseProcessor {
    type Output = EventStats;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountEventsByStatus")]
    async fn process(&self, query: CountEventsByStatus) -> Result<EventStats, sqlx::Error> {
        sqlx::query_as::<_, EventStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                COUNT(*) FILTER (WHERE status = 'success') AS success,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'permanently_failed') AS permanently_failed
            FROM webhook_events
            WHERE ($1::text IS NULL OR tenant_id = $1)
            "#,
        )
        .bind(query.tenant_id)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// `failed` and `permanently_failed` events, most recently updated first.
pub struct ListFailedEvents {
    pub tenant_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListFailedEvents> for DatabaseProcessor {
    type Output = Vec<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListFailedEvents")]
    async fn process(&self, query: ListFailedEvents) -> Result<Vec<EventRecord>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM webhook_events
            WHERE status IN ('failed', 'permanently_failed')
              AND ($1::text IS NULL OR tenant_id = $1)
            ORDER BY updated_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        sqlx::query_as::<_, EventRecord>(&sql)
            .bind(query.tenant_id)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await
    }
}
