use chrono::{DateTime, Duration, Utc};

use super::ReminderCandidate;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EligibleReminder {
    pub candidate: ReminderCandidate,
    /// Always in `(0, window]` hours.
    pub hours_remaining: f64,
}

/// Keeps the candidates that are open, not yet reminded, and due in
/// `(now, now + window]`. Input order is preserved.
pub fn select_eligible(
    now: DateTime<Utc>,
    window: Duration,
    candidates: &[ReminderCandidate],
) -> Vec<EligibleReminder> {
    let window_end = now + window;

    candidates
        .iter()
        .filter(|c| !c.is_completed && !c.reminder_sent)
        .filter(|c| c.deadline > now && c.deadline <= window_end)
        .map(|c| EligibleReminder {
            hours_remaining: hours_between(now, c.deadline),
            candidate: c.clone(),
        })
        .collect()
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}
