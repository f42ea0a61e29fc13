pub mod assignment;
pub mod user;

pub use assignment::{
    Assignment, AssignmentFilters, AssignmentRow, AssignmentStats, NewAssignmentRequest, Priority,
    StatusFilter, UpdateAssignmentRequest,
};
pub use user::{NewUser, User, UserRow};

use chrono::{DateTime, Utc};

/// Timestamps are persisted as unix milliseconds.
pub(crate) fn timestamp_from_millis(ms: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| sqlx::Error::Decode(format!("timestamp out of range: {}", ms).into()))
}
