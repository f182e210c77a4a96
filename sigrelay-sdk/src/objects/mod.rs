pub mod events;
pub mod webhook;

pub use events::{
    EventDetailResponse, EventStatsResponse, EventStatus, EventSummaryResponse,
    ListFailedEventsQuery, StatsQuery, clamp_pagination,
};
pub use webhook::{IngestResponse, IngestStatus};
