use async_trait::async_trait;
use tracing::info;

use super::{MailError, Mailer, ReminderEmail, template};

/// Development mailer: logs what would have been sent.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_deadline_reminder(&self, email: &ReminderEmail) -> Result<(), MailError> {
        info!(
            to = %email.to,
            subject = %template::subject(email),
            "[DEV] Email would be sent: {} ({}) due {}",
            email.assignment_title,
            email.course,
            template::format_deadline(email.deadline)
        );
        Ok(())
    }
}
