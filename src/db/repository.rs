use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::models::{
    Assignment, AssignmentFilters, AssignmentRow, AssignmentStats, NewAssignmentRequest, NewUser,
    StatusFilter, UpdateAssignmentRequest, User, UserRow,
};
use crate::reminders::{ReminderCandidateRow, Threshold};

const ASSIGNMENT_COLUMNS: &str = r#"
    id, user_id, title, description, course, deadline_ms, priority, is_completed,
    completed_at_ms, reminder_24h_sent, reminder_1h_sent, created_at_ms, updated_at_ms
"#;

pub async fn insert_user(
    db: &SqlitePool,
    req: NewUser,
    now: DateTime<Utc>,
) -> Result<User, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim().to_string();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, created_at_ms)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(&name)
    .bind(now.timestamp_millis())
    .execute(db)
    .await?;

    Ok(User {
        id,
        email,
        name,
        created_at: now,
    })
}

pub async fn fetch_user_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, email, name, created_at_ms FROM users WHERE email = ?1",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(db)
    .await?
    .map(User::try_from)
    .transpose()
}

pub async fn fetch_assignments(
    db: &SqlitePool,
    user_id: &str,
    filters: &AssignmentFilters,
    now: DateTime<Utc>,
) -> Result<Vec<Assignment>, sqlx::Error> {
    let now_ms = now.timestamp_millis();
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM assignments WHERE user_id = ",
        ASSIGNMENT_COLUMNS
    ));
    query.push_bind(user_id.to_string());

    if let Some(course) = &filters.course {
        query.push(" AND course = ").push_bind(course.clone());
    }
    if let Some(priority) = filters.priority {
        query.push(" AND priority = ").push_bind(priority.as_str());
    }
    match filters.status {
        Some(StatusFilter::Completed) => {
            query.push(" AND is_completed = 1");
        }
        Some(StatusFilter::Pending) => {
            query.push(" AND is_completed = 0 AND deadline_ms >= ").push_bind(now_ms);
        }
        Some(StatusFilter::Overdue) => {
            query.push(" AND is_completed = 0 AND deadline_ms < ").push_bind(now_ms);
        }
        None => {}
    }
    query.push(" ORDER BY deadline_ms ASC");

    query
        .build_query_as::<AssignmentRow>()
        .fetch_all(db)
        .await?
        .into_iter()
        .map(Assignment::try_from)
        .collect()
}

pub async fn fetch_assignment(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentRow>(&format!(
        "SELECT {} FROM assignments WHERE id = ?1 AND user_id = ?2",
        ASSIGNMENT_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .map(Assignment::try_from)
    .transpose()
}

pub async fn insert_assignment(
    db: &SqlitePool,
    user_id: &str,
    req: NewAssignmentRequest,
    now: DateTime<Utc>,
) -> Result<Assignment, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now_ms = now.timestamp_millis();

    sqlx::query(
        r#"
        INSERT INTO assignments
            (id, user_id, title, description, course, deadline_ms, priority,
            is_completed, completed_at_ms, reminder_24h_sent, reminder_1h_sent,
            created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL, 0, 0, ?8, ?8)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.course)
    .bind(req.deadline.timestamp_millis())
    .bind(req.priority.as_str())
    .bind(now_ms)
    .execute(db)
    .await?;

    let created = fetch_assignment(db, user_id, &id).await?;
    created.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update_assignment(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    req: UpdateAssignmentRequest,
    now: DateTime<Utc>,
) -> Result<Option<Assignment>, sqlx::Error> {
    let mut current = match fetch_assignment(db, user_id, id).await? {
        Some(a) => a,
        None => return Ok(None),
    };

    if let Some(title) = req.title {
        current.title = title;
    }
    if let Some(description) = req.description {
        current.description = description;
    }
    if let Some(course) = req.course {
        current.course = course;
    }
    if let Some(deadline) = req.deadline {
        current.deadline = deadline;
    }
    if let Some(priority) = req.priority {
        current.priority = priority;
    }
    if let Some(is_completed) = req.is_completed {
        current.is_completed = is_completed;
        current.completed_at = is_completed.then_some(now);
    }
    current.updated_at = now;

    // Reminder flags are owned by the dispatcher and never written here.
    sqlx::query(
        r#"
        UPDATE assignments
        SET title = ?1, description = ?2, course = ?3, deadline_ms = ?4, priority = ?5,
            is_completed = ?6, completed_at_ms = ?7, updated_at_ms = ?8
        WHERE id = ?9 AND user_id = ?10
        "#,
    )
    .bind(&current.title)
    .bind(&current.description)
    .bind(&current.course)
    .bind(current.deadline.timestamp_millis())
    .bind(current.priority.as_str())
    .bind(current.is_completed)
    .bind(current.completed_at.map(|t| t.timestamp_millis()))
    .bind(current.updated_at.timestamp_millis())
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn toggle_assignment(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Assignment>, sqlx::Error> {
    let current = match fetch_assignment(db, user_id, id).await? {
        Some(a) => a,
        None => return Ok(None),
    };

    let req = UpdateAssignmentRequest {
        is_completed: Some(!current.is_completed),
        ..Default::default()
    };
    update_assignment(db, user_id, id, req, now).await
}

pub async fn delete_assignment(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_courses(db: &SqlitePool, user_id: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT course FROM assignments WHERE user_id = ?1 ORDER BY course ASC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn fetch_stats(
    db: &SqlitePool,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<AssignmentStats, sqlx::Error> {
    let (total, completed, pending, overdue) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN is_completed = 1 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN is_completed = 0 AND deadline_ms >= ?2 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN is_completed = 0 AND deadline_ms < ?2 THEN 1 ELSE 0 END), 0)
        FROM assignments
        WHERE user_id = ?1
        "#,
    )
    .bind(user_id)
    .bind(now.timestamp_millis())
    .fetch_one(db)
    .await?;

    Ok(AssignmentStats {
        total,
        completed,
        pending,
        overdue,
    })
}

/// Open assignments whose `threshold` flag is unset and whose deadline lies in
/// `(now, now + window]`, joined with the owner's contact details.
pub async fn fetch_reminder_candidates(
    db: &SqlitePool,
    threshold: Threshold,
    now: DateTime<Utc>,
) -> Result<Vec<ReminderCandidateRow>, sqlx::Error> {
    let window_end = now + threshold.window();
    let flag = threshold.flag_column();

    sqlx::query_as::<_, ReminderCandidateRow>(&format!(
        r#"
        SELECT
            a.id AS assignment_id,
            a.title AS title,
            a.course AS course,
            a.deadline_ms AS deadline_ms,
            a.is_completed AS is_completed,
            a.{flag} AS reminder_sent,
            u.email AS email,
            u.name AS name
        FROM assignments a
        JOIN users u ON u.id = a.user_id
        WHERE a.is_completed = 0
            AND a.{flag} = 0
            AND a.deadline_ms > ?1
            AND a.deadline_ms <= ?2
        ORDER BY a.deadline_ms ASC
        "#
    ))
    .bind(now.timestamp_millis())
    .bind(window_end.timestamp_millis())
    .fetch_all(db)
    .await
}

/// Sets the flag for `threshold`. Returns false when the assignment no longer exists.
pub async fn set_reminder_flag(
    db: &SqlitePool,
    assignment_id: &str,
    threshold: Threshold,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!(
        "UPDATE assignments SET {} = 1 WHERE id = ?1",
        threshold.flag_column()
    ))
    .bind(assignment_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}
