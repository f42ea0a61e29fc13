use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::{MailError, Mailer, ReminderEmail, template};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SENDER_NAME: &str = "Trackademic";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: String,
    content: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: String,
}

pub struct SendGridMailer {
    client: Client,
    api_key: String,
    from_email: String,
}

impl SendGridMailer {
    pub fn new(api_key: String, from_email: String) -> Result<Self, MailError> {
        if api_key.trim().is_empty() {
            return Err(MailError::Misconfigured("SENDGRID_API_KEY is empty".to_string()));
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            from_email,
        })
    }

    fn build_request<'a>(&'a self, email: &'a ReminderEmail) -> SendRequest<'a> {
        SendRequest {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: &email.to,
                    name: Some(&email.student_name),
                }],
            }],
            from: Address {
                email: &self.from_email,
                name: Some(SENDER_NAME),
            },
            subject: template::subject(email),
            content: vec![Content {
                content_type: "text/html",
                value: template::html_body(email),
            }],
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send_deadline_reminder(&self, email: &ReminderEmail) -> Result<(), MailError> {
        let request = self.build_request(email);
        debug!("Sending reminder to {} via SendGrid", email.to);

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }

        info!("Reminder sent to {} for \"{}\"", email.to, email.assignment_title);
        Ok(())
    }
}
