use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use sqlx::FromRow;

use super::timestamp_from_millis;
use crate::error::AppError;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_COURSE_LEN: usize = 100;
const INVALID_DEADLINE: &str = "Invalid deadline date";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub course: String,
    pub deadline: DateTime<Utc>,
    pub priority: Priority,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub reminder_24h_sent: bool,
    pub reminder_1h_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape of the `assignments` table.
#[derive(Debug, FromRow)]
pub struct AssignmentRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub course: String,
    pub deadline_ms: i64,
    pub priority: String,
    pub is_completed: bool,
    pub completed_at_ms: Option<i64>,
    pub reminder_24h_sent: bool,
    pub reminder_1h_sent: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = sqlx::Error;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let priority = row
            .priority
            .parse::<Priority>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Assignment {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            course: row.course,
            deadline: timestamp_from_millis(row.deadline_ms)?,
            priority,
            is_completed: row.is_completed,
            completed_at: row.completed_at_ms.map(timestamp_from_millis).transpose()?,
            reminder_24h_sent: row.reminder_24h_sent,
            reminder_1h_sent: row.reminder_1h_sent,
            created_at: timestamp_from_millis(row.created_at_ms)?,
            updated_at: timestamp_from_millis(row.updated_at_ms)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignmentRequest {
    pub title: String,
    pub description: Option<String>,
    pub course: String,
    #[serde(deserialize_with = "deserialize_deadline")]
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
}

impl NewAssignmentRequest {
    /// Trims text fields and enforces length limits.
    pub fn validate(self) -> Result<Self, AppError> {
        Ok(Self {
            title: required_text("Title", &self.title, MAX_TITLE_LEN)?,
            description: optional_text(self.description)?,
            course: required_text("Course", &self.course, MAX_COURSE_LEN)?,
            deadline: self.deadline,
            priority: self.priority,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentRequest {
    pub title: Option<String>,
    /// Absent leaves the description alone, `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub course: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_deadline")]
    pub deadline: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub is_completed: Option<bool>,
}

impl UpdateAssignmentRequest {
    pub fn validate(self) -> Result<Self, AppError> {
        Ok(Self {
            title: self
                .title
                .map(|t| required_text("Title", &t, MAX_TITLE_LEN))
                .transpose()?,
            description: self.description.map(optional_text).transpose()?,
            course: self
                .course
                .map(|c| required_text("Course", &c, MAX_COURSE_LEN))
                .transpose()?,
            deadline: self.deadline,
            priority: self.priority,
            is_completed: self.is_completed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Completed,
    Pending,
    Overdue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentFilters {
    pub course: Option<String>,
    pub status: Option<StatusFilter>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentStats {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub overdue: i64,
}

fn required_text(field: &str, value: &str, max: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{} must be less than {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<String>) -> Result<Option<String>, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.chars().count() > MAX_DESCRIPTION_LEN => Err(AppError::Validation(format!(
            "Description must be less than {} characters",
            MAX_DESCRIPTION_LEN
        ))),
        Some(v) if v.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// RFC 3339, or a bare `YYYY-MM-DD` taken as midnight UTC.
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn deserialize_deadline<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_deadline(&raw).ok_or_else(|| de::Error::custom(INVALID_DEADLINE))
}

fn deserialize_optional_deadline<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_deadline(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(INVALID_DEADLINE)),
        None => Ok(None),
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
