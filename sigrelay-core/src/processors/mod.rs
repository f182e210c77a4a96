//! Event processors.
//!
//! - `Ingestor`: validates and persists webhooks, requests the first attempt
//! - `RetryScheduler`: claims events, records outcomes, arms retry timers,
//!   sweeps for due and stale rows
//! - `EventProcessor`: the `AttemptHandler` that evaluates workflows and
//!   executes their actions

pub mod ingestor;
pub mod orchestrator;
pub mod scheduler;

pub use ingestor::{IngestError, IngestOutcome, IngestRequest, Ingestor};
pub use orchestrator::EventProcessor;
pub use scheduler::{
    AttemptHandler, AttemptOutcome, AttemptReport, RetryScheduler, SchedulerError, SweepReport,
};
