use std::sync::Arc;

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use services::mailer::Mailer;

// Application state shared by the mail relay handlers.
pub struct AppState {
    pub config: config::MailConfig,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: config::MailConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self { config, mailer }
    }
}
