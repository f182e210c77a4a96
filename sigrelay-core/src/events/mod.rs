//! Messages passed between the ingestor, the HTTP layer and the scheduler.
//!
//! Requests carry identifiers only; the scheduler re-reads the event row
//! before acting, so a duplicated or stale request is harmless.

pub mod channels;
pub mod types;

pub use channels::{AttemptReceiver, AttemptSender, DEFAULT_CHANNEL_BUFFER, attempt_channel};
pub use types::AttemptRequest;
