pub mod events;
pub mod field_mappings;
pub mod workflows;

use sigrelay_sdk::objects::EventStatus as SdkEventStatus;

/// Processing status of a stored event.
///
/// This is the sqlx::Type version. For API/DTO use, see `sigrelay_sdk::objects::EventStatus`.
///
/// ```text
/// pending ──► processing ──► success
///                 │  ▲
///                 ▼  │
///               failed ──► (processing) ──► permanently_failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "event_status")]
pub enum EventStatus {
    Pending,
    Processing,
    Success,
    Failed,
    PermanentlyFailed,
}

impl EventStatus {
    /// Statuses from which an attempt may claim the event.
    pub fn is_claimable(self) -> bool {
        matches!(self, EventStatus::Pending | EventStatus::Failed)
    }

    /// Statuses that no automatic attempt will ever leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Success | EventStatus::PermanentlyFailed)
    }

    /// Statuses an operator may reset back to `pending`.
    pub fn is_resettable(self) -> bool {
        matches!(
            self,
            EventStatus::Pending | EventStatus::Failed | EventStatus::PermanentlyFailed
        )
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        SdkEventStatus::from(*self).fmt(f)
    }
}

impl From<EventStatus> for SdkEventStatus {
    fn from(value: EventStatus) -> Self {
        match value {
            EventStatus::Pending => SdkEventStatus::Pending,
            EventStatus::Processing => SdkEventStatus::Processing,
            EventStatus::Success => SdkEventStatus::Success,
            EventStatus::Failed => SdkEventStatus::Failed,
            EventStatus::PermanentlyFailed => SdkEventStatus::PermanentlyFailed,
        }
    }
}

impl From<SdkEventStatus> for EventStatus {
    fn from(value: SdkEventStatus) -> Self {
        match value {
            SdkEventStatus::Pending => EventStatus::Pending,
            SdkEventStatus::Processing => EventStatus::Processing,
            SdkEventStatus::Success => EventStatus::Success,
            SdkEventStatus::Failed => EventStatus::Failed,
            SdkEventStatus::PermanentlyFailed => EventStatus::PermanentlyFailed,
        }
    }
}
