//! Error types for meetgrid.

use chrono::NaiveDate;
use thiserror::Error;

use crate::slot::format_date_key;

/// Problems with an event definition or participant input, detected before
/// anything is sent to a store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please provide an event title.")]
    MissingTitle,

    #[error("Please select at least one date.")]
    NoDates,

    #[error("Please set a time range for {}.", format_date_key(.0))]
    MissingTimeRange(NaiveDate),

    #[error("Time range for {} ends before it starts.", format_date_key(.0))]
    InvertedTimeRange(NaiveDate),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Please enter your name.")]
    EmptyParticipantName,
}

/// Errors that can occur in meetgrid operations.
#[derive(Error, Debug)]
pub enum MeetGridError {
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("Missing time range for date {0}")]
    MissingRange(String),

    #[error("Slot {0} is not part of the event grid")]
    SlotNotInGrid(String),

    #[error("Store request failed: {0}")]
    Transport(String),

    #[error("Malformed event payload: {0}")]
    MalformedPayload(String),

    #[error("Live updates unavailable: {0}")]
    SubscriptionUnavailable(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MeetGridError {
    /// Whether the session can carry on (retry, poll, or show a partial
    /// view) after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MeetGridError::Transport(_)
                | MeetGridError::MalformedPayload(_)
                | MeetGridError::MissingRange(_)
                | MeetGridError::SubscriptionUnavailable(_)
        )
    }
}

/// Result type alias for meetgrid operations.
pub type MeetGridResult<T> = Result<T, MeetGridError>;
