//! Deadline reminders: which assignments need a 24h or 1h email, and where the
//! "already sent" flags live.

pub mod evaluator;
pub mod store;

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;

pub use evaluator::{EligibleReminder, select_eligible};
pub use store::{FlagUpdate, InMemoryReminderStore, ReminderStore, SqliteReminderStore};

use crate::models::timestamp_from_millis;

/// Lead time before a deadline at which a reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Threshold {
    TwentyFourHours,
    OneHour,
}

impl Threshold {
    /// Scan order within a cycle.
    pub const ALL: [Threshold; 2] = [Threshold::TwentyFourHours, Threshold::OneHour];

    pub fn window(&self) -> Duration {
        match self {
            Threshold::TwentyFourHours => Duration::hours(24),
            Threshold::OneHour => Duration::hours(1),
        }
    }

    pub fn flag_column(&self) -> &'static str {
        match self {
            Threshold::TwentyFourHours => "reminder_24h_sent",
            Threshold::OneHour => "reminder_1h_sent",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Threshold::TwentyFourHours => "24h",
            Threshold::OneHour => "1h",
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An assignment as seen by one threshold scan, with its owner's contact details.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderCandidate {
    pub assignment_id: String,
    pub title: String,
    pub course: String,
    pub deadline: DateTime<Utc>,
    pub is_completed: bool,
    /// The flag of the threshold this candidate was fetched for.
    pub reminder_sent: bool,
    pub email: String,
    pub name: String,
}

#[derive(Debug, FromRow)]
pub struct ReminderCandidateRow {
    pub assignment_id: String,
    pub title: String,
    pub course: String,
    pub deadline_ms: i64,
    pub is_completed: bool,
    pub reminder_sent: bool,
    pub email: String,
    pub name: String,
}

impl TryFrom<ReminderCandidateRow> for ReminderCandidate {
    type Error = sqlx::Error;

    fn try_from(row: ReminderCandidateRow) -> Result<Self, Self::Error> {
        Ok(ReminderCandidate {
            assignment_id: row.assignment_id,
            title: row.title,
            course: row.course,
            deadline: timestamp_from_millis(row.deadline_ms)?,
            is_completed: row.is_completed,
            reminder_sent: row.reminder_sent,
            email: row.email,
            name: row.name,
        })
    }
}
