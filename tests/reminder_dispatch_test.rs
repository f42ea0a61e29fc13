mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Notify;

use trackademic::clock::ManualClock;
use trackademic::config::ReminderConfig;
use trackademic::error::AppError;
use trackademic::mailer::{MailError, Mailer, ReminderEmail};
use trackademic::reminders::{
    FlagUpdate, InMemoryReminderStore, ReminderCandidate, ReminderStore, Threshold,
};
use trackademic::services::{CycleOutcome, CycleReport, ReminderDispatcher};

use common::{RecordingMailer, base_time, reminder_config, stored};

struct Harness {
    store: Arc<InMemoryReminderStore>,
    mailer: Arc<RecordingMailer>,
    clock: Arc<ManualClock>,
    dispatcher: ReminderDispatcher,
}

fn harness_with(mailer: RecordingMailer, config: &ReminderConfig) -> Harness {
    let store = Arc::new(InMemoryReminderStore::new());
    let mailer = Arc::new(mailer);
    let clock = Arc::new(ManualClock::new(base_time()));
    let dispatcher = ReminderDispatcher::new(store.clone(), mailer.clone(), clock.clone(), config);
    Harness {
        store,
        mailer,
        clock,
        dispatcher,
    }
}

fn harness() -> Harness {
    harness_with(RecordingMailer::new(), &reminder_config())
}

async fn completed(dispatcher: &ReminderDispatcher) -> CycleReport {
    match dispatcher.run_cycle().await {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::Skipped => panic!("cycle unexpectedly skipped"),
    }
}

#[tokio::test]
async fn due_in_30_minutes_gets_both_reminders_in_one_cycle() {
    let h = harness();
    h.store.insert(stored("a", base_time() + Duration::minutes(30)));

    let report = completed(&h.dispatcher).await;
    assert_eq!(report.sent, 2);
    assert_eq!(report.send_failures, 0);

    let a = h.store.get("a").unwrap();
    assert!(a.reminder_24h_sent);
    assert!(a.reminder_1h_sent);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|e| e.hours_remaining == 0.5));
    assert_eq!(sent[0].to, "a@example.com");
    assert_eq!(sent[0].student_name, "Student a");
    assert_eq!(sent[0].course, "CS 201");

    // Nothing left to send on the next pass.
    h.clock.advance(Duration::minutes(15));
    let report = completed(&h.dispatcher).await;
    assert_eq!(report.sent, 0);
    assert_eq!(h.mailer.attempts(), 2);
}

#[tokio::test]
async fn failed_send_is_retried_on_a_later_cycle() {
    let h = harness();
    h.store.insert(stored("a", base_time() + Duration::hours(3)));
    h.mailer.set_failing(true);

    let report = completed(&h.dispatcher).await;
    assert_eq!(report.sent, 0);
    assert_eq!(report.send_failures, 1);
    assert!(!h.store.get("a").unwrap().reminder_24h_sent);

    h.mailer.set_failing(false);
    h.clock.advance(Duration::minutes(15));

    let report = completed(&h.dispatcher).await;
    assert_eq!(report.sent, 1);
    assert!(h.store.get("a").unwrap().reminder_24h_sent);
    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn completed_assignment_is_never_reminded() {
    let h = harness();
    h.store.insert(stored("a", base_time() + Duration::hours(30)));

    assert_eq!(completed(&h.dispatcher).await.sent, 0);

    h.store.set_completed("a", true);
    h.clock.advance(Duration::hours(10));
    assert_eq!(completed(&h.dispatcher).await.sent, 0);

    h.clock.advance(Duration::hours(19) + Duration::minutes(30));
    assert_eq!(completed(&h.dispatcher).await.sent, 0);

    let a = h.store.get("a").unwrap();
    assert!(!a.reminder_24h_sent);
    assert!(!a.reminder_1h_sent);
    assert_eq!(h.mailer.attempts(), 0);
}

#[tokio::test]
async fn enters_24h_window_an_hour_later() {
    let h = harness();
    h.store.insert(stored("a", base_time() + Duration::hours(25)));

    assert_eq!(completed(&h.dispatcher).await.sent, 0);

    h.clock.advance(Duration::hours(1));
    let report = completed(&h.dispatcher).await;
    assert_eq!(report.sent, 1);

    let sent = h.mailer.sent();
    assert_eq!(sent[0].hours_remaining, 24.0);
    let a = h.store.get("a").unwrap();
    assert!(a.reminder_24h_sent);
    assert!(!a.reminder_1h_sent);
}

#[tokio::test]
async fn past_deadline_is_skipped_silently() {
    let h = harness();
    h.store.insert(stored("late", base_time() - Duration::minutes(1)));

    let report = completed(&h.dispatcher).await;
    assert_eq!(report, CycleReport::default());
    assert_eq!(h.mailer.attempts(), 0);
}

#[tokio::test]
async fn one_failing_recipient_does_not_block_the_batch() {
    let h = harness();
    h.store.insert(stored("a", base_time() + Duration::hours(2)));
    h.store.insert(stored("b", base_time() + Duration::hours(3)));
    h.store.insert(stored("c", base_time() + Duration::hours(4)));
    h.mailer.fail_recipient("b@example.com");

    let report = completed(&h.dispatcher).await;
    assert_eq!(report.sent, 2);
    assert_eq!(report.send_failures, 1);

    assert!(h.store.get("a").unwrap().reminder_24h_sent);
    assert!(!h.store.get("b").unwrap().reminder_24h_sent);
    assert!(h.store.get("c").unwrap().reminder_24h_sent);
}

#[tokio::test]
async fn unusable_provider_fails_every_send_but_completes() {
    let h = harness();
    h.store.insert(stored("a", base_time() + Duration::minutes(20)));
    h.store.insert(stored("b", base_time() + Duration::hours(8)));
    h.mailer.set_failing(true);

    let report = completed(&h.dispatcher).await;
    assert_eq!(report.sent, 0);
    // "a" fails for both thresholds, "b" for 24h only.
    assert_eq!(report.send_failures, 3);
    assert!(report.failed_scans.is_empty());

    for id in ["a", "b"] {
        let stored = h.store.get(id).unwrap();
        assert!(!stored.reminder_24h_sent);
        assert!(!stored.reminder_1h_sent);
    }
}

#[tokio::test(start_paused = true)]
async fn slow_send_times_out_and_leaves_flag_unset() {
    let config = ReminderConfig {
        send_timeout: StdDuration::from_secs(10),
        ..reminder_config()
    };
    let h = harness_with(RecordingMailer::with_delay(StdDuration::from_secs(60)), &config);
    h.store.insert(stored("a", base_time() + Duration::hours(5)));

    let report = completed(&h.dispatcher).await;
    assert_eq!(report.send_failures, 1);
    assert_eq!(report.sent, 0);
    assert!(!h.store.get("a").unwrap().reminder_24h_sent);
}

#[tokio::test(start_paused = true)]
async fn sends_run_with_bounded_concurrency() {
    let config = ReminderConfig {
        max_concurrent_sends: 3,
        ..reminder_config()
    };
    let h = harness_with(RecordingMailer::with_delay(StdDuration::from_secs(1)), &config);
    for i in 0..10 {
        h.store
            .insert(stored(&format!("a{}", i), base_time() + Duration::hours(2 + i)));
    }

    let report = completed(&h.dispatcher).await;
    assert_eq!(report.sent, 10);
    assert!(h.mailer.max_in_flight() <= 3);
    assert!(h.mailer.max_in_flight() > 1);
}

/// Store wrapper that can fail reads for one threshold or fail every write.
struct FlakyStore {
    inner: Arc<InMemoryReminderStore>,
    failing_scan: Option<Threshold>,
    fail_writes: AtomicBool,
}

#[async_trait]
impl ReminderStore for FlakyStore {
    async fn find_reminder_candidates(
        &self,
        threshold: Threshold,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderCandidate>, AppError> {
        if self.failing_scan == Some(threshold) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.find_reminder_candidates(threshold, now).await
    }

    async fn set_reminder_flag(
        &self,
        assignment_id: &str,
        threshold: Threshold,
    ) -> Result<FlagUpdate, AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.set_reminder_flag(assignment_id, threshold).await
    }
}

#[tokio::test]
async fn failed_scan_aborts_only_that_threshold() {
    let inner = Arc::new(InMemoryReminderStore::new());
    inner.insert(stored("a", base_time() + Duration::minutes(30)));
    let store = Arc::new(FlakyStore {
        inner: inner.clone(),
        failing_scan: Some(Threshold::TwentyFourHours),
        fail_writes: AtomicBool::new(false),
    });
    let mailer = Arc::new(RecordingMailer::new());
    let clock = Arc::new(ManualClock::new(base_time()));
    let dispatcher = ReminderDispatcher::new(store, mailer.clone(), clock, &reminder_config());

    let report = completed(&dispatcher).await;
    assert_eq!(report.failed_scans, vec![Threshold::TwentyFourHours]);
    assert_eq!(report.sent, 1);

    let a = inner.get("a").unwrap();
    assert!(!a.reminder_24h_sent);
    assert!(a.reminder_1h_sent);
}

#[tokio::test]
async fn unrecorded_send_is_repeated_next_cycle() {
    let inner = Arc::new(InMemoryReminderStore::new());
    inner.insert(stored("a", base_time() + Duration::hours(6)));
    let store = Arc::new(FlakyStore {
        inner: inner.clone(),
        failing_scan: None,
        fail_writes: AtomicBool::new(true),
    });
    let mailer = Arc::new(RecordingMailer::new());
    let clock = Arc::new(ManualClock::new(base_time()));
    let dispatcher =
        ReminderDispatcher::new(store.clone(), mailer.clone(), clock.clone(), &reminder_config());

    let report = completed(&dispatcher).await;
    assert_eq!(report.flag_failures, 1);
    assert_eq!(report.sent, 0);
    assert!(!inner.get("a").unwrap().reminder_24h_sent);

    store.fail_writes.store(false, Ordering::SeqCst);
    clock.advance(Duration::minutes(15));

    let report = completed(&dispatcher).await;
    assert_eq!(report.sent, 1);
    assert!(inner.get("a").unwrap().reminder_24h_sent);
    // Delivered twice: the accepted duplicate after a lost write.
    assert_eq!(mailer.sent().len(), 2);
}

/// Deletes the assignment from the store while its email is in flight.
struct DeletingMailer {
    store: Arc<InMemoryReminderStore>,
    id: String,
}

#[async_trait]
impl Mailer for DeletingMailer {
    async fn send_deadline_reminder(&self, _email: &ReminderEmail) -> Result<(), MailError> {
        self.store.remove(&self.id);
        Ok(())
    }
}

#[tokio::test]
async fn assignment_deleted_mid_send_is_not_an_error() {
    let store = Arc::new(InMemoryReminderStore::new());
    store.insert(stored("a", base_time() + Duration::hours(2)));
    let mailer = Arc::new(DeletingMailer {
        store: store.clone(),
        id: "a".to_string(),
    });
    let clock = Arc::new(ManualClock::new(base_time()));
    let dispatcher = ReminderDispatcher::new(store.clone(), mailer, clock, &reminder_config());

    let report = completed(&dispatcher).await;
    assert_eq!(report.sent, 1);
    assert_eq!(report.flag_failures, 0);
    assert!(store.get("a").is_none());
}

/// Blocks inside the send until released.
struct GatedMailer {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Mailer for GatedMailer {
    async fn send_deadline_reminder(&self, _email: &ReminderEmail) -> Result<(), MailError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn overlapping_cycle_is_skipped() {
    let store = Arc::new(InMemoryReminderStore::new());
    store.insert(stored("a", base_time() + Duration::hours(2)));
    let mailer = Arc::new(GatedMailer {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let clock = Arc::new(ManualClock::new(base_time()));
    let dispatcher = Arc::new(ReminderDispatcher::new(
        store.clone(),
        mailer.clone(),
        clock,
        &reminder_config(),
    ));

    let first = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run_cycle().await }
    });
    mailer.entered.notified().await;

    assert_eq!(dispatcher.run_cycle().await, CycleOutcome::Skipped);

    mailer.release.notify_one();
    let outcome = first.await.unwrap();
    match outcome {
        CycleOutcome::Completed(report) => assert_eq!(report.sent, 1),
        CycleOutcome::Skipped => panic!("first cycle should have completed"),
    }

    // The guard is released once the cycle ends.
    assert!(matches!(dispatcher.run_cycle().await, CycleOutcome::Completed(_)));
}

/// Panics for one recipient and delivers the rest.
struct PanicForRecipient {
    recipient: String,
    inner: RecordingMailer,
}

#[async_trait]
impl Mailer for PanicForRecipient {
    async fn send_deadline_reminder(&self, email: &ReminderEmail) -> Result<(), MailError> {
        if email.to == self.recipient {
            panic!("mail client crashed for {}", email.to);
        }
        self.inner.send_deadline_reminder(email).await
    }
}

#[tokio::test]
async fn panicking_send_is_contained_to_its_item() {
    let store = Arc::new(InMemoryReminderStore::new());
    store.insert(stored("a", base_time() + Duration::hours(2)));
    store.insert(stored("b", base_time() + Duration::hours(3)));
    store.insert(stored("c", base_time() + Duration::minutes(30)));
    let mailer = Arc::new(PanicForRecipient {
        recipient: "a@example.com".to_string(),
        inner: RecordingMailer::new(),
    });
    let clock = Arc::new(ManualClock::new(base_time()));
    let dispatcher = ReminderDispatcher::new(store.clone(), mailer.clone(), clock, &reminder_config());

    let report = completed(&dispatcher).await;
    assert_eq!(report.sent, 3);
    assert_eq!(report.send_failures, 1);
    assert!(report.failed_scans.is_empty());

    let a = store.get("a").unwrap();
    assert!(!a.reminder_24h_sent);
    assert!(store.get("b").unwrap().reminder_24h_sent);
    let c = store.get("c").unwrap();
    assert!(c.reminder_24h_sent && c.reminder_1h_sent);
    assert_eq!(mailer.inner.sent().len(), 3);
}
