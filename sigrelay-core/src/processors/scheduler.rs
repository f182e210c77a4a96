//! RetryScheduler: owns every transition out of `processing`.
//!
//! The scheduler is responsible for:
//! - Claiming an event (`pending|failed -> processing`) before an attempt
//! - Handing the claimed event to an [`AttemptHandler`]
//! - Writing the outcome: `success`, `failed` with a backoff delay, or
//!   `permanently_failed` once `max_retries` is reached
//! - Keeping one armed timer per event; a newer request supersedes it
//! - Sweeping the store for due rows and stale `processing` rows
//!
//! Timers are an optimization. The store is the source of truth: the sweep
//! re-derives due work from `next_retry_at` after a restart.

use crate::config::ProcessingConfig;
use crate::entities::EventStatus;
use crate::entities::events::{EventRecord, FinishAttempt, ResetOutcome};
use crate::events::{AttemptReceiver, AttemptRequest, AttemptSender};
use crate::store::{EventStore, StoreError};
use crate::utils::backoff::retry_delay;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Due rows fetched per sweep.
const SWEEP_BATCH: i64 = 100;

/// How long shutdown waits for in-flight attempts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of running the handler on a claimed event.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub success: bool,
    pub error_message: Option<String>,
    pub actions_triggered: i32,
    /// Audit object stored in the event's `response` column.
    pub response: Value,
}

/// Does the actual work of one attempt.
#[async_trait]
pub trait AttemptHandler: Send + Sync {
    async fn handle(&self, event: &EventRecord) -> AttemptOutcome;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptReport {
    /// The event was not claimable (already claimed, succeeded, or exhausted).
    Skipped,
    Succeeded { actions_triggered: i32 },
    RetryScheduled { retry_count: i32, delay: Duration },
    PermanentlyFailed { retry_count: i32 },
    /// The row left `processing` while the attempt ran; the outcome was dropped.
    Abandoned,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub reclaimed: u64,
    pub attempted: usize,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("event not found: {0}")]
    NotFound(Uuid),
    #[error("event {id} is {status} and cannot be retried")]
    InvalidTransition { id: Uuid, status: EventStatus },
}

/// Cloneable handle; clones share the store, handler and permits.
#[derive(Clone)]
pub struct RetryScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    store: Arc<dyn EventStore>,
    handler: Arc<dyn AttemptHandler>,
    config: ProcessingConfig,
    attempt_tx: AttemptSender,
    permits: Arc<Semaphore>,
}

impl RetryScheduler {
    pub fn new(
        store: Arc<dyn EventStore>,
        handler: Arc<dyn AttemptHandler>,
        config: ProcessingConfig,
        attempt_tx: AttemptSender,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_attempts.max(1)));
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                handler,
                config,
                attempt_tx,
                permits,
            }),
        }
    }

    /// Run one attempt on `id` and record its outcome.
    #[tracing::instrument(skip(self), fields(event_id = %id))]
    pub async fn attempt(&self, id: Uuid) -> Result<AttemptReport, SchedulerError> {
        let inner = &self.inner;
        let attempt_id = Uuid::new_v4();
        let Some(event) = inner.store.claim(id, attempt_id).await? else {
            debug!("Event not claimable, skipping attempt");
            return Ok(AttemptReport::Skipped);
        };

        let started = Instant::now();
        let outcome = inner.handler.handle(&event).await;
        let processing_time_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let now = OffsetDateTime::now_utc();

        let (update, report) = if outcome.success {
            (
                FinishAttempt {
                    id,
                    attempt_id,
                    status: EventStatus::Success,
                    retry_count: event.retry_count,
                    next_retry_at: None,
                    error_message: None,
                    processing_time_ms,
                    actions_triggered: outcome.actions_triggered,
                    response: outcome.response,
                    processed_at: Some(now),
                },
                AttemptReport::Succeeded {
                    actions_triggered: outcome.actions_triggered,
                },
            )
        } else {
            let max_retries = event.max_retries.max(0);
            let retry_count = (event.retry_count + 1).min(max_retries);
            let exhausted = retry_count >= max_retries;
            let (status, next_retry_at, report) = if exhausted {
                (
                    EventStatus::PermanentlyFailed,
                    None,
                    AttemptReport::PermanentlyFailed { retry_count },
                )
            } else {
                let delay = retry_delay(&inner.config.retry, retry_count);
                (
                    EventStatus::Failed,
                    Some(now + delay),
                    AttemptReport::RetryScheduled { retry_count, delay },
                )
            };
            (
                FinishAttempt {
                    id,
                    attempt_id,
                    status,
                    retry_count,
                    next_retry_at,
                    error_message: outcome.error_message,
                    processing_time_ms,
                    actions_triggered: outcome.actions_triggered,
                    response: outcome.response,
                    processed_at: None,
                },
                report,
            )
        };

        if !inner.store.finish_attempt(update).await? {
            warn!("Claim was reclaimed during the attempt, outcome dropped");
            return Ok(AttemptReport::Abandoned);
        }

        match &report {
            AttemptReport::Succeeded { actions_triggered } => {
                info!(actions_triggered, processing_time_ms, "Event processed");
            }
            AttemptReport::RetryScheduled { retry_count, delay } => {
                warn!(retry_count, delay_ms = delay.as_millis() as u64, "Attempt failed, retry scheduled");
                self.request(AttemptRequest::after(id, *delay)).await;
            }
            AttemptReport::PermanentlyFailed { retry_count } => {
                error!(retry_count, "Attempt failed, retries exhausted");
            }
            AttemptReport::Skipped | AttemptReport::Abandoned => {}
        }
        Ok(report)
    }

    /// Operator reset to `pending` followed by an immediate attempt.
    ///
    /// Allowed from `pending`, `failed` and `permanently_failed`. A
    /// `processing` event is left to finish its attempt.
    pub async fn manual_retry(&self, id: Uuid) -> Result<EventRecord, SchedulerError> {
        match self.inner.store.reset_for_retry(id).await? {
            ResetOutcome::Reset(event) => {
                info!(event_id = %id, "Event reset for manual retry");
                self.request(AttemptRequest::now(id)).await;
                Ok(event)
            }
            ResetOutcome::NotFound => Err(SchedulerError::NotFound(id)),
            ResetOutcome::InvalidState(status) => {
                Err(SchedulerError::InvalidTransition { id, status })
            }
        }
    }

    /// Reclaim stale `processing` rows, then attempt every due row.
    pub async fn sweep(&self) -> Result<SweepReport, SchedulerError> {
        let inner = &self.inner;
        let now = OffsetDateTime::now_utc();

        let reclaimed = inner
            .store
            .reclaim_stale(now - inner.config.stale_processing)
            .await?;
        if reclaimed > 0 {
            warn!(reclaimed, "Reclaimed stale processing events");
        }

        let due = inner.store.due_events(now, SWEEP_BATCH).await?;
        let handles: Vec<_> = due.iter().map(|e| self.spawn_attempt(e.id)).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Sweep attempt task failed");
            }
        }
        if !due.is_empty() {
            debug!(attempted = due.len(), "Sweep attempted due events");
        }

        Ok(SweepReport {
            reclaimed,
            attempted: due.len(),
        })
    }

    /// Run the timer loop until shutdown is signaled.
    pub async fn run(self, mut attempt_rx: AttemptReceiver, mut shutdown_rx: watch::Receiver<bool>) {
        let mut timers: HashMap<Uuid, JoinHandle<()>> = HashMap::new();
        let mut sweep_task: Option<JoinHandle<()>> = None;
        let mut sweep_tick = tokio::time::interval(self.inner.config.sweep_interval);
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            sweep_interval_secs = self.inner.config.sweep_interval.as_secs(),
            max_concurrent_attempts = self.inner.config.max_concurrent_attempts,
            "RetryScheduler started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("RetryScheduler received shutdown signal");
                        break;
                    }
                }

                Some(request) = attempt_rx.recv() => {
                    timers.retain(|_, handle| !handle.is_finished());
                    if let Some(previous) = timers.remove(&request.event) {
                        previous.abort();
                        debug!(event_id = %request.event, "Superseded armed timer");
                    }
                    timers.insert(request.event, self.arm(request));
                }

                _ = sweep_tick.tick() => {
                    if sweep_task.as_ref().is_none_or(JoinHandle::is_finished) {
                        let scheduler = self.clone();
                        sweep_task = Some(tokio::spawn(async move {
                            if let Err(e) = scheduler.sweep().await {
                                error!(error = %e, "Recovery sweep failed");
                            }
                        }));
                    }
                }
            }
        }

        for (_, handle) in timers.drain() {
            handle.abort();
        }
        if let Some(handle) = sweep_task {
            handle.abort();
        }
        self.drain().await;
        info!("RetryScheduler shutdown complete");
    }

    fn arm(&self, request: AttemptRequest) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            if !request.delay.is_zero() {
                tokio::time::sleep(request.delay).await;
            }
            // Detached so that superseding the timer never cancels a running attempt.
            scheduler.spawn_attempt(request.event);
        })
    }

    fn spawn_attempt(&self, id: Uuid) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let Ok(_permit) = scheduler.inner.permits.clone().acquire_owned().await else {
                return;
            };
            if let Err(e) = scheduler.attempt(id).await {
                error!(event_id = %id, error = %e, "Attempt failed to run");
            }
        })
    }

    async fn request(&self, request: AttemptRequest) {
        if let Err(e) = self.inner.attempt_tx.send(request).await {
            warn!(event_id = %request.event, error = %e, "Scheduler channel closed, sweep will pick the event up");
        }
    }

    /// Wait for in-flight attempts by taking every permit.
    async fn drain(&self) {
        let total = u32::try_from(self.inner.config.max_concurrent_attempts.max(1)).unwrap_or(u32::MAX);
        match tokio::time::timeout(DRAIN_TIMEOUT, self.inner.permits.acquire_many(total)).await {
            Ok(Ok(_permits)) => self.inner.permits.close(),
            Ok(Err(_)) => {}
            Err(_) => warn!("Timed out waiting for in-flight attempts"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::events::InsertEvent;
    use crate::events::attempt_channel;
    use crate::store::MemoryEventStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        succeed: bool,
    }

    impl CountingHandler {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                succeed,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AttemptHandler for CountingHandler {
        async fn handle(&self, _event: &EventRecord) -> AttemptOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            AttemptOutcome {
                success: self.succeed,
                error_message: (!self.succeed).then(|| "boom".to_string()),
                actions_triggered: i32::from(self.succeed),
                response: json!({"errors": []}),
            }
        }
    }

    async fn seeded_store() -> (Arc<MemoryEventStore>, Uuid) {
        let store = Arc::new(MemoryEventStore::new());
        let outcome = store
            .insert_if_absent(InsertEvent {
                id: Uuid::new_v4(),
                event_id: "e1".to_string(),
                event_type: "document_signed".to_string(),
                tenant_id: "t1".to_string(),
                payload: json!({}),
                max_retries: 3,
            })
            .await
            .unwrap();
        let id = outcome.event().id;
        (store, id)
    }

    fn scheduler(
        store: &Arc<MemoryEventStore>,
        handler: &Arc<CountingHandler>,
        config: ProcessingConfig,
    ) -> (RetryScheduler, AttemptReceiver) {
        let (tx, rx) = attempt_channel();
        (
            RetryScheduler::new(store.clone(), handler.clone(), config, tx),
            rx,
        )
    }

    #[tokio::test]
    async fn test_success_is_terminal() {
        let (store, id) = seeded_store().await;
        let handler = CountingHandler::new(true);
        let (scheduler, mut rx) = scheduler(&store, &handler, ProcessingConfig::default());

        let report = scheduler.attempt(id).await.unwrap();
        assert_eq!(report, AttemptReport::Succeeded { actions_triggered: 1 });

        let event = store.get(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Success);
        assert!(event.processed_at.is_some());
        assert!(event.processing_time_ms.is_some());
        assert!(rx.try_recv().is_err());

        assert_eq!(scheduler.attempt(id).await.unwrap(), AttemptReport::Skipped);
        assert_eq!(handler.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_count_is_monotonic_until_exhausted() {
        let (store, id) = seeded_store().await;
        let handler = CountingHandler::new(false);
        let (scheduler, mut rx) = scheduler(&store, &handler, ProcessingConfig::default());

        for expected in 1..=2 {
            let report = scheduler.attempt(id).await.unwrap();
            let AttemptReport::RetryScheduled { retry_count, delay } = report else {
                panic!("expected a retry, got {report:?}");
            };
            assert_eq!(retry_count, expected);
            let floor = Duration::from_millis(1000 * 2u64.pow(expected as u32 - 1));
            assert!(delay >= floor && delay <= floor.mul_f64(1.1));

            let event = store.get(id).await.unwrap().unwrap();
            assert_eq!(event.status, EventStatus::Failed);
            assert_eq!(event.retry_count, expected);
            assert!(event.next_retry_at.is_some());
            assert_eq!(event.error_message.as_deref(), Some("boom"));

            let request = rx.try_recv().unwrap();
            assert_eq!(request.event, id);
            assert_eq!(request.delay, delay);
        }

        let report = scheduler.attempt(id).await.unwrap();
        assert_eq!(report, AttemptReport::PermanentlyFailed { retry_count: 3 });
        let event = store.get(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::PermanentlyFailed);
        assert_eq!(event.retry_count, 3);
        assert!(event.next_retry_at.is_none());
        assert!(rx.try_recv().is_err());

        assert_eq!(scheduler.attempt(id).await.unwrap(), AttemptReport::Skipped);
        assert_eq!(handler.calls(), 3);
    }

    #[tokio::test]
    async fn test_manual_retry_resets_and_requests_attempt() {
        let (store, id) = seeded_store().await;
        let handler = CountingHandler::new(false);
        let config = ProcessingConfig {
            retry: crate::config::RetryPolicy {
                max_retries: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let (scheduler, mut rx) = scheduler(&store, &handler, config);
        let mut record = store.get(id).await.unwrap().unwrap();
        record.max_retries = 1;
        store.put(record).await;

        scheduler.attempt(id).await.unwrap();
        assert_eq!(
            store.get(id).await.unwrap().unwrap().status,
            EventStatus::PermanentlyFailed
        );

        let reset = scheduler.manual_retry(id).await.unwrap();
        assert_eq!(reset.status, EventStatus::Pending);
        assert_eq!(reset.retry_count, 0);
        assert_eq!(rx.try_recv().unwrap(), AttemptRequest::now(id));
    }

    #[tokio::test]
    async fn test_manual_retry_rejections() {
        let (store, id) = seeded_store().await;
        let handler = CountingHandler::new(true);
        let (scheduler, _rx) = scheduler(&store, &handler, ProcessingConfig::default());

        assert!(matches!(
            scheduler.manual_retry(Uuid::new_v4()).await,
            Err(SchedulerError::NotFound(_))
        ));

        scheduler.attempt(id).await.unwrap();
        assert!(matches!(
            scheduler.manual_retry(id).await,
            Err(SchedulerError::InvalidTransition {
                status: EventStatus::Success,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_sweep_attempts_due_and_stale_events() {
        let (store, id) = seeded_store().await;
        let mut stuck = store
            .insert_if_absent(InsertEvent {
                id: Uuid::new_v4(),
                event_id: "e2".to_string(),
                event_type: "document_signed".to_string(),
                tenant_id: "t1".to_string(),
                payload: json!({}),
                max_retries: 3,
            })
            .await
            .unwrap()
            .event()
            .clone();
        stuck.status = EventStatus::Processing;
        stuck.updated_at -= time::Duration::hours(1);
        store.put(stuck.clone()).await;

        let handler = CountingHandler::new(true);
        let (scheduler, _rx) = scheduler(&store, &handler, ProcessingConfig::default());

        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report, SweepReport { reclaimed: 1, attempted: 2 });
        assert_eq!(handler.calls(), 2);
        for id in [id, stuck.id] {
            assert_eq!(store.get(id).await.unwrap().unwrap().status, EventStatus::Success);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_request_supersedes_armed_timer() {
        let store = Arc::new(MemoryEventStore::new());
        let handler = CountingHandler::new(false);
        let config = ProcessingConfig {
            retry: crate::config::RetryPolicy {
                max_retries: 10,
                base_delay: Duration::from_secs(3600),
                max_delay: Duration::from_secs(3600),
                exponential: true,
            },
            sweep_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let (tx, rx) = attempt_channel();
        let scheduler = RetryScheduler::new(store.clone(), handler.clone(), config, tx.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // The first interval tick sweeps an empty store.
        let run = tokio::spawn(scheduler.run(rx, shutdown_rx));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let id = store
            .insert_if_absent(InsertEvent {
                id: Uuid::new_v4(),
                event_id: "e1".to_string(),
                event_type: "document_signed".to_string(),
                tenant_id: "t1".to_string(),
                payload: json!({}),
                max_retries: 10,
            })
            .await
            .unwrap()
            .event()
            .id;

        tx.send(AttemptRequest::after(id, Duration::from_secs(600))).await.unwrap();
        tx.send(AttemptRequest::after(id, Duration::from_secs(5))).await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(handler.calls(), 1);
        let event = store.get(id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Failed);

        // A surviving 600 s timer would claim the failed event again.
        tokio::time::sleep(Duration::from_secs(700)).await;
        assert_eq!(handler.calls(), 1);
        assert_eq!(store.get(id).await.unwrap().unwrap().retry_count, 1);

        shutdown_tx.send(true).unwrap();
        run.await.unwrap();
    }
}
