use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::{ReminderCandidate, Threshold};
use crate::db::repository;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagUpdate {
    Updated,
    NotFound,
}

/// Persistence the reminder dispatcher needs. The flags stored behind this
/// trait are the only record of which reminders went out.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Open assignments with the `threshold` flag unset and a deadline in
    /// `(now, now + threshold.window()]`, earliest deadline first.
    async fn find_reminder_candidates(
        &self,
        threshold: Threshold,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderCandidate>, AppError>;

    /// Sets the `threshold` flag to true. Calling it again is harmless.
    async fn set_reminder_flag(
        &self,
        assignment_id: &str,
        threshold: Threshold,
    ) -> Result<FlagUpdate, AppError>;
}

pub struct SqliteReminderStore {
    db: SqlitePool,
}

impl SqliteReminderStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn find_reminder_candidates(
        &self,
        threshold: Threshold,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderCandidate>, AppError> {
        let rows = repository::fetch_reminder_candidates(&self.db, threshold, now).await?;
        let candidates = rows
            .into_iter()
            .map(ReminderCandidate::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(candidates)
    }

    async fn set_reminder_flag(
        &self,
        assignment_id: &str,
        threshold: Threshold,
    ) -> Result<FlagUpdate, AppError> {
        if repository::set_reminder_flag(&self.db, assignment_id, threshold).await? {
            Ok(FlagUpdate::Updated)
        } else {
            Ok(FlagUpdate::NotFound)
        }
    }
}

/// Assignment state held by [`InMemoryReminderStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAssignment {
    pub id: String,
    pub title: String,
    pub course: String,
    pub deadline: DateTime<Utc>,
    pub is_completed: bool,
    pub reminder_24h_sent: bool,
    pub reminder_1h_sent: bool,
    pub email: String,
    pub name: String,
}

impl StoredAssignment {
    fn flag(&self, threshold: Threshold) -> bool {
        match threshold {
            Threshold::TwentyFourHours => self.reminder_24h_sent,
            Threshold::OneHour => self.reminder_1h_sent,
        }
    }
}

/// Map-backed store with the same semantics as the SQLite one.
#[derive(Default)]
pub struct InMemoryReminderStore {
    assignments: Mutex<HashMap<String, StoredAssignment>>,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, assignment: StoredAssignment) {
        self.lock().insert(assignment.id.clone(), assignment);
    }

    pub fn get(&self, id: &str) -> Option<StoredAssignment> {
        self.lock().get(id).cloned()
    }

    pub fn set_completed(&self, id: &str, is_completed: bool) -> bool {
        match self.lock().get_mut(id) {
            Some(a) => {
                a.is_completed = is_completed;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> Option<StoredAssignment> {
        self.lock().remove(id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredAssignment>> {
        self.assignments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn find_reminder_candidates(
        &self,
        threshold: Threshold,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderCandidate>, AppError> {
        let window_end = now + threshold.window();
        let mut candidates: Vec<ReminderCandidate> = self
            .lock()
            .values()
            .filter(|a| !a.is_completed && !a.flag(threshold))
            .filter(|a| a.deadline > now && a.deadline <= window_end)
            .map(|a| ReminderCandidate {
                assignment_id: a.id.clone(),
                title: a.title.clone(),
                course: a.course.clone(),
                deadline: a.deadline,
                is_completed: a.is_completed,
                reminder_sent: a.flag(threshold),
                email: a.email.clone(),
                name: a.name.clone(),
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.deadline
                .cmp(&b.deadline)
                .then_with(|| a.assignment_id.cmp(&b.assignment_id))
        });
        Ok(candidates)
    }

    async fn set_reminder_flag(
        &self,
        assignment_id: &str,
        threshold: Threshold,
    ) -> Result<FlagUpdate, AppError> {
        let mut assignments = self.lock();
        let Some(a) = assignments.get_mut(assignment_id) else {
            return Ok(FlagUpdate::NotFound);
        };
        match threshold {
            Threshold::TwentyFourHours => a.reminder_24h_sent = true,
            Threshold::OneHour => a.reminder_1h_sent = true,
        }
        Ok(FlagUpdate::Updated)
    }
}
