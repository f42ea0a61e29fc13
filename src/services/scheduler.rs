use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::mailer::mailer_from_config;
use crate::reminders::SqliteReminderStore;
use crate::services::dispatcher::{CycleOutcome, ReminderDispatcher};

/// Periodically runs reminder cycles until stopped.
pub struct ReminderScheduler {
    dispatcher: Arc<ReminderDispatcher>,
    interval: Duration,
}

/// Owner of a running reminder job.
pub struct ReminderJobHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReminderScheduler {
    pub fn new(dispatcher: Arc<ReminderDispatcher>, interval: Duration) -> Self {
        Self {
            dispatcher,
            interval,
        }
    }

    pub fn start(self) -> ReminderJobHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        ReminderJobHandle { shutdown, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Deadline reminder job started (interval: {:?})",
            self.interval
        );

        // First cycle fires one interval after start.
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        // Ticks missed while a cycle was running are dropped, not replayed.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            // Each cycle runs in its own task so a panic cannot end the loop.
            let dispatcher = self.dispatcher.clone();
            let mut cycle = tokio::spawn(async move { dispatcher.run_cycle().await });

            tokio::select! {
                result = &mut cycle => match result {
                    Ok(CycleOutcome::Completed(report)) => {
                        debug!("Reminder cycle completed: {:?}", report);
                    }
                    Ok(CycleOutcome::Skipped) => {
                        warn!("Reminder cycle skipped: previous cycle still running");
                    }
                    Err(e) => {
                        error!("Reminder cycle aborted: {}", e);
                    }
                },
                _ = shutdown.changed() => {
                    cycle.abort();
                    break;
                }
            }
        }

        info!("Deadline reminder job stopped");
    }
}

impl ReminderJobHandle {
    /// Signals the job to stop and waits for it. An in-flight cycle is abandoned.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Reminder job ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Wires the SQLite store, the configured mailer and the wall clock into a
/// running reminder job. Call once at process start.
pub fn start_reminder_job(
    db: SqlitePool,
    config: &AppConfig,
) -> Result<ReminderJobHandle, AppError> {
    let mailer = mailer_from_config(&config.mail)
        .map_err(|e| AppError::Config(format!("failed to build mailer: {}", e)))?;
    if config.mail.sendgrid_api_key.is_none() {
        warn!("SENDGRID_API_KEY not set, reminder emails will only be logged");
    }

    let dispatcher = ReminderDispatcher::new(
        Arc::new(SqliteReminderStore::new(db)),
        mailer,
        Arc::new(SystemClock),
        &config.reminders,
    );

    Ok(ReminderScheduler::new(Arc::new(dispatcher), config.reminders.interval).start())
}
