use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::MailConfig;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// A fully-rendered outbound message. Attachments are held in memory only
/// for the lifetime of the request; nothing is spooled to disk.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from_name: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachment: Option<EmailAttachment>,
}

/// Transport seam so handlers can be exercised without a live SMTP relay.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the message and return its message identifier.
    async fn send(&self, email: OutgoingEmail) -> Result<String, AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
    hostname: String,
}

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

impl SmtpMailer {
    /// Plain connection upgraded via STARTTLS, with credentials, matching the
    /// relay the mobile backend has always talked to.
    pub fn new(config: &MailConfig) -> Result<Self, AppError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::TransportError(format!("SMTP relay setup failed: {}", e)))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_user.clone(),
                config.smtp_pass.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            sender: config.smtp_user.clone(),
            hostname: config.smtp_host.clone(),
        })
    }

    /// Startup connectivity check; failure is logged but not fatal, the
    /// relay may come up after us.
    pub async fn verify(&self) {
        match self.transport.test_connection().await {
            Ok(true) => tracing::info!("SMTP server ready to send emails"),
            Ok(false) => tracing::warn!("SMTP server refused the connection test"),
            Err(e) => tracing::error!("SMTP connection test failed: {}", e),
        }
    }

    fn next_message_id(&self) -> String {
        format!(
            "<{}.{}@{}>",
            Utc::now().timestamp_millis(),
            MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed),
            self.hostname
        )
    }

    fn build_message(&self, email: &OutgoingEmail, message_id: &str) -> Result<Message, AppError> {
        let from_address = self
            .sender
            .parse::<Address>()
            .map_err(|e| AppError::TransportError(format!("Invalid sender address: {}", e)))?;
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|_| AppError::ValidationError("Format d'email invalide".to_string()))?;

        let body = MultiPart::alternative_plain_html(email.text.clone(), email.html.clone());
        let body = match &email.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .or_else(|_| ContentType::parse("application/octet-stream"))
                    .map_err(|e| {
                        AppError::TransportError(format!("Invalid attachment type: {}", e))
                    })?;
                MultiPart::mixed().multipart(body).singlepart(
                    Attachment::new(attachment.filename.clone())
                        .body(attachment.data.to_vec(), content_type),
                )
            }
            None => body,
        };

        Message::builder()
            .from(Mailbox::new(Some(email.from_name.clone()), from_address))
            .to(to)
            .subject(email.subject.clone())
            .message_id(Some(message_id.to_string()))
            .multipart(body)
            .map_err(|e| AppError::TransportError(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String, AppError> {
        let message_id = self.next_message_id();
        let message = self.build_message(&email, &message_id)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::TransportError(e.to_string()))?;

        Ok(message_id)
    }
}
