use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

const PLACEHOLDER_SENDGRID_KEY: &str = "your-sendgrid-api-key";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub client_url: String,
    pub mail: MailConfig,
    pub reminders: ReminderConfig,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    /// `None` means no usable provider key; reminders are logged instead of sent.
    pub sendgrid_api_key: Option<String>,
    pub from_email: String,
}

#[derive(Clone, Debug)]
pub struct ReminderConfig {
    pub interval: Duration,
    pub send_timeout: Duration,
    pub max_concurrent_sends: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            send_timeout: Duration::from_secs(10),
            max_concurrent_sends: 4,
        }
    }
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://trackademic.db?mode=rwc".to_string());
        let port = parse_var("PORT", 5000)?;
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Config("JWT_SECRET is not set".to_string()))?;
        let client_url = env::var("CLIENT_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let mail = MailConfig {
            sendgrid_api_key: usable_api_key(env::var("SENDGRID_API_KEY").ok()),
            from_email: env::var("SENDGRID_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@trackademic.com".to_string()),
        };

        let defaults = ReminderConfig::default();
        let max_concurrent_sends: usize =
            parse_var("REMINDER_MAX_CONCURRENT_SENDS", defaults.max_concurrent_sends)?;
        if max_concurrent_sends == 0 {
            return Err(AppError::Config(
                "REMINDER_MAX_CONCURRENT_SENDS must be at least 1".to_string(),
            ));
        }
        let interval_secs: u64 = parse_var("REMINDER_INTERVAL_SECS", defaults.interval.as_secs())?;
        if interval_secs == 0 {
            return Err(AppError::Config(
                "REMINDER_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        let reminders = ReminderConfig {
            interval: Duration::from_secs(interval_secs),
            send_timeout: Duration::from_secs(parse_var(
                "REMINDER_SEND_TIMEOUT_SECS",
                defaults.send_timeout.as_secs(),
            )?),
            max_concurrent_sends,
        };

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            client_url,
            mail,
            reminders,
        })
    }

    pub fn client_origins(&self) -> Vec<String> {
        self.client_url
            .split(',')
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect()
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(default),
    }
}

fn usable_api_key(raw: Option<String>) -> Option<String> {
    raw.map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty() && key != PLACEHOLDER_SENDGRID_KEY)
}
