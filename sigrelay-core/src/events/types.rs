use std::time::Duration;
use uuid::Uuid;

/// Ask the scheduler to attempt an event after `delay`.
///
/// A newer request for the same event supersedes an armed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRequest {
    pub event: Uuid,
    pub delay: Duration,
}

impl AttemptRequest {
    pub fn now(event: Uuid) -> Self {
        Self {
            event,
            delay: Duration::ZERO,
        }
    }

    pub fn after(event: Uuid, delay: Duration) -> Self {
        Self { event, delay }
    }
}
