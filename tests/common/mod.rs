#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use trackademic::config::ReminderConfig;
use trackademic::db;
use trackademic::db::repository;
use trackademic::mailer::{MailError, Mailer, ReminderEmail};
use trackademic::models::{NewUser, User};
use trackademic::reminders::store::StoredAssignment;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn reminder_config() -> ReminderConfig {
    ReminderConfig {
        interval: Duration::from_secs(15 * 60),
        send_timeout: Duration::from_secs(10),
        max_concurrent_sends: 4,
    }
}

pub fn stored(id: &str, deadline: DateTime<Utc>) -> StoredAssignment {
    StoredAssignment {
        id: id.to_string(),
        title: format!("Assignment {}", id),
        course: "CS 201".to_string(),
        deadline,
        is_completed: false,
        reminder_24h_sent: false,
        reminder_1h_sent: false,
        email: format!("{}@example.com", id),
        name: format!("Student {}", id),
    }
}

/// Single-connection in-memory database with the schema applied.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    db::migrate(&pool).await.expect("Failed to run migrations");
    pool
}

pub async fn create_user(pool: &SqlitePool, email: &str, name: &str) -> User {
    repository::insert_user(
        pool,
        NewUser {
            email: email.to_string(),
            name: name.to_string(),
        },
        base_time(),
    )
    .await
    .expect("Failed to insert user")
}

/// Mailer that records deliveries and can be told to fail.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<ReminderEmail>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    failing_recipients: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_recipient(&self, email: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(email.to_string());
    }

    pub fn sent(&self) -> Vec<ReminderEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_deadline_reminder(&self, email: &ReminderEmail) -> Result<(), MailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let rejected = self.failing.load(Ordering::SeqCst)
            || self.failing_recipients.lock().unwrap().contains(&email.to);
        if rejected {
            return Err(MailError::Rejected {
                status: 503,
                body: "provider unavailable".to_string(),
            });
        }

        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
