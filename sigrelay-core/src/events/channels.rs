use super::types::AttemptRequest;
use tokio::sync::mpsc;

/// Enough to absorb an ingest burst while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

pub type AttemptSender = mpsc::Sender<AttemptRequest>;
pub type AttemptReceiver = mpsc::Receiver<AttemptRequest>;

/// Create the channel feeding [`RetryScheduler::run`](crate::processors::RetryScheduler::run).
pub fn attempt_channel() -> (AttemptSender, AttemptReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
