pub mod dev;
pub mod sendgrid;
pub mod template;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use dev::LogMailer;
pub use sendgrid::SendGridMailer;

use crate::config::MailConfig;

/// Everything a deadline reminder email needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderEmail {
    pub to: String,
    pub student_name: String,
    pub assignment_title: String,
    pub course: String,
    pub deadline: DateTime<Utc>,
    pub hours_remaining: f64,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("mail send timed out")]
    Timeout,

    #[error("mail provider misconfigured: {0}")]
    Misconfigured(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_deadline_reminder(&self, email: &ReminderEmail) -> Result<(), MailError>;
}

/// SendGrid when an API key is configured, otherwise reminders are only logged.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match &config.sendgrid_api_key {
        Some(api_key) => Ok(Arc::new(SendGridMailer::new(
            api_key.clone(),
            config.from_email.clone(),
        )?)),
        None => Ok(Arc::new(LogMailer)),
    }
}
