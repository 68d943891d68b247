use thiserror::Error;
use uuid::Uuid;

use crate::models::ConflictRecord;

#[derive(Error, Debug, Clone)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Booking conflicts with {} existing booking(s)", conflicts.len())]
    Conflict { conflicts: Vec<ConflictRecord> },

    /// Store collaborator failure; propagated unmodified to the caller.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
