pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{CycleOutcome, CycleReport, ReminderDispatcher};
pub use scheduler::{ReminderJobHandle, ReminderScheduler, start_reminder_job};
