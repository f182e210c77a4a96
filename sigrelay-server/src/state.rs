//! Application state shared across all request handlers.

use sigrelay_core::processors::{Ingestor, RetryScheduler};
use sigrelay_core::store::EventStore;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    /// Handle on the running scheduler, used for manual retries.
    pub scheduler: RetryScheduler,
    /// Read side of the event store for the operator endpoints.
    pub events: Arc<dyn EventStore>,
}

impl AppState {
    pub fn new(ingestor: Ingestor, scheduler: RetryScheduler, events: Arc<dyn EventStore>) -> Self {
        Self {
            ingestor: Arc::new(ingestor),
            scheduler,
            events,
        }
    }
}
