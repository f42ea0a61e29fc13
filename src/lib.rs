pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod models;
pub mod reminders;
pub mod services;
pub mod state;
