//! Demo data for local development.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use super::repository;
use crate::models::{AssignmentFilters, NewAssignmentRequest, NewUser, Priority};

pub const DEMO_EMAIL: &str = "demo@trackademic.com";
pub const DEMO_NAME: &str = "Demo Student";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub user_created: bool,
    pub assignments_created: usize,
}

/// Sample coursework with deadlines relative to `now`, one of them overdue.
pub fn sample_assignments(now: DateTime<Utc>) -> Vec<NewAssignmentRequest> {
    let sample = |title: &str, description: &str, course: &str, due_in: Duration, priority| {
        NewAssignmentRequest {
            title: title.to_string(),
            description: Some(description.to_string()),
            course: course.to_string(),
            deadline: now + due_in,
            priority,
        }
    };

    vec![
        sample(
            "Data Structures Final Project",
            "Implement a balanced BST with visualization",
            "CS 201",
            Duration::days(2),
            Priority::High,
        ),
        sample(
            "Linear Algebra Problem Set 5",
            "Eigenvalues and eigenvectors exercises 1-15",
            "MATH 240",
            Duration::days(5),
            Priority::Medium,
        ),
        sample(
            "History Essay Draft",
            "First draft of research essay on the Industrial Revolution",
            "HIST 101",
            Duration::hours(12),
            Priority::Urgent,
        ),
        sample(
            "Physics Lab Report",
            "Write up results from the optics experiment",
            "PHYS 150",
            Duration::days(7),
            Priority::Low,
        ),
        sample(
            "Database Design ER Diagram",
            "Complete ER diagram for the library management system project",
            "CS 201",
            Duration::days(-1),
            Priority::High,
        ),
    ]
}

/// Creates the demo user and its sample assignments. Safe to rerun: an
/// existing demo user keeps its assignments and gets no new ones.
pub async fn seed_demo_data(db: &SqlitePool, now: DateTime<Utc>) -> Result<SeedReport, sqlx::Error> {
    let (user, user_created) = match repository::fetch_user_by_email(db, DEMO_EMAIL).await? {
        Some(user) => (user, false),
        None => {
            let user = repository::insert_user(
                db,
                NewUser {
                    email: DEMO_EMAIL.to_string(),
                    name: DEMO_NAME.to_string(),
                },
                now,
            )
            .await?;
            (user, true)
        }
    };

    let existing =
        repository::fetch_assignments(db, &user.id, &AssignmentFilters::default(), now).await?;
    if !existing.is_empty() {
        return Ok(SeedReport {
            user_created,
            assignments_created: 0,
        });
    }

    let mut assignments_created = 0;
    for req in sample_assignments(now) {
        repository::insert_assignment(db, &user.id, req, now).await?;
        assignments_created += 1;
    }

    Ok(SeedReport {
        user_created,
        assignments_created,
    })
}
