use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::ReminderConfig;
use crate::error::AppError;
use crate::mailer::{MailError, Mailer, ReminderEmail};
use crate::reminders::{EligibleReminder, FlagUpdate, ReminderStore, Threshold, select_eligible};

/// Counts from one cycle across both thresholds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Delivered and recorded.
    pub sent: usize,
    /// Not delivered; the flag stays unset and the next cycle retries.
    pub send_failures: usize,
    /// Delivered, but the flag could not be written.
    pub flag_failures: usize,
    /// Thresholds whose candidate query failed.
    pub failed_scans: Vec<Threshold>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was still running.
    Skipped,
}

enum DeliveryOutcome {
    Sent,
    SendFailed,
    FlagFailed,
}

/// Runs reminder cycles: query, evaluate, send, then record.
pub struct ReminderDispatcher {
    store: Arc<dyn ReminderStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    send_timeout: Duration,
    max_concurrent_sends: usize,
    cycle_lock: Mutex<()>,
}

impl ReminderDispatcher {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        config: &ReminderConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            clock,
            send_timeout: config.send_timeout,
            max_concurrent_sends: config.max_concurrent_sends.max(1),
            cycle_lock: Mutex::new(()),
        }
    }

    /// One pass over both thresholds. Never runs concurrently with itself.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            warn!("Reminder cycle still running, skipping this tick");
            return CycleOutcome::Skipped;
        };

        let now = self.clock.now();
        debug!("Running deadline reminder check at {}", now);

        let mut report = CycleReport::default();
        for threshold in Threshold::ALL {
            if let Err(e) = self.run_threshold(threshold, now, &mut report).await {
                error!("{} reminder scan failed: {}", threshold, e);
                report.failed_scans.push(threshold);
            }
        }

        if report.sent > 0 {
            info!("Sent {} reminder(s)", report.sent);
        }
        if report.send_failures > 0 || report.flag_failures > 0 {
            warn!(
                "Reminder cycle finished with {} send failure(s), {} unrecorded send(s)",
                report.send_failures, report.flag_failures
            );
        }

        CycleOutcome::Completed(report)
    }

    async fn run_threshold(
        &self,
        threshold: Threshold,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<(), AppError> {
        let candidates = self.store.find_reminder_candidates(threshold, now).await?;
        let eligible = select_eligible(now, threshold.window(), &candidates);
        debug!(
            "{} reminders: {} candidate(s), {} eligible",
            threshold,
            candidates.len(),
            eligible.len()
        );

        let outcomes: Vec<DeliveryOutcome> = stream::iter(eligible)
            .map(|reminder| self.deliver_isolated(threshold, reminder))
            .buffer_unordered(self.max_concurrent_sends)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                DeliveryOutcome::Sent => report.sent += 1,
                DeliveryOutcome::SendFailed => report.send_failures += 1,
                DeliveryOutcome::FlagFailed => report.flag_failures += 1,
            }
        }
        Ok(())
    }

    /// A panic while delivering one reminder is contained to that item.
    async fn deliver_isolated(
        &self,
        threshold: Threshold,
        reminder: EligibleReminder,
    ) -> DeliveryOutcome {
        let assignment_id = reminder.candidate.assignment_id.clone();
        match AssertUnwindSafe(self.deliver(threshold, reminder))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(
                    "{} reminder for {} panicked during delivery",
                    threshold, assignment_id
                );
                DeliveryOutcome::SendFailed
            }
        }
    }

    async fn deliver(&self, threshold: Threshold, reminder: EligibleReminder) -> DeliveryOutcome {
        let EligibleReminder {
            candidate,
            hours_remaining,
        } = reminder;
        let email = ReminderEmail {
            to: candidate.email,
            student_name: candidate.name,
            assignment_title: candidate.title,
            course: candidate.course,
            deadline: candidate.deadline,
            hours_remaining,
        };

        let sent = tokio::time::timeout(self.send_timeout, self.mailer.send_deadline_reminder(&email))
            .await
            .unwrap_or(Err(MailError::Timeout));
        if let Err(e) = sent {
            warn!(
                "Failed to send {} reminder for \"{}\" ({}): {}",
                threshold, email.assignment_title, candidate.assignment_id, e
            );
            return DeliveryOutcome::SendFailed;
        }

        // The flag is written only once the provider has accepted the message.
        match self
            .store
            .set_reminder_flag(&candidate.assignment_id, threshold)
            .await
        {
            Ok(FlagUpdate::Updated) => DeliveryOutcome::Sent,
            Ok(FlagUpdate::NotFound) => {
                warn!(
                    "Assignment {} was deleted before its {} reminder could be recorded",
                    candidate.assignment_id, threshold
                );
                DeliveryOutcome::Sent
            }
            Err(e) => {
                error!(
                    "Sent {} reminder for {} but failed to record it: {}",
                    threshold, candidate.assignment_id, e
                );
                DeliveryOutcome::FlagFailed
            }
        }
    }
}
