use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use etp_backend::{config::MailConfig, logging, routes, services::mailer::SmtpMailer, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = MailConfig::from_env()?;

    // Build the SMTP transport and probe the relay (non-fatal)
    let mailer = SmtpMailer::new(&config)?;
    mailer.verify().await;

    let http_port = config.http_port;
    let state = Arc::new(AppState::new(config, Arc::new(mailer)));

    let app = routes::routes().with_state(state);

    // Cloud hosts hand us the port; bind all interfaces for the mobile app.
    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    tracing::info!("Mail relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
