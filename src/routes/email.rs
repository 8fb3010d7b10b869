use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::AppError,
    services::mailer::{EmailAttachment, Mailer, OutgoingEmail},
    AppState,
};

/// Attachments are buffered in memory, so the whole request body is capped.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/send-email", post(send_email))
        .route("/send-csv", post(send_csv))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[derive(Debug, Default)]
struct EmailForm {
    to: Option<String>,
    subject: Option<String>,
    message: Option<String>,
    periode: Option<String>,
    file: Option<UploadedFile>,
}

#[derive(Debug)]
struct UploadedFile {
    filename: String,
    content_type: String,
    data: Bytes,
}

impl From<UploadedFile> for EmailAttachment {
    fn from(file: UploadedFile) -> Self {
        EmailAttachment {
            filename: file.filename,
            content_type: file.content_type,
            data: file.data,
        }
    }
}

async fn read_form(mut multipart: Multipart) -> Result<EmailForm, AppError> {
    let mut form = EmailForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "to" => form.to = Some(field.text().await?),
            "subject" => form.subject = Some(field.text().await?),
            "message" => form.message = Some(field.text().await?),
            "periode" => form.periode = Some(field.text().await?),
            "file" => {
                let filename = field.file_name().unwrap_or("attachment").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                form.file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Empty form values count as missing, like the legacy backend.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn validate_recipient(to: &str) -> Result<(), AppError> {
    if EMAIL_RE.is_match(to) {
        Ok(())
    } else {
        Err(AppError::ValidationError(
            "Format d'email invalide".to_string(),
        ))
    }
}

async fn send_email(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = read_form(multipart).await?;
    handle_send_email(form, state.mailer.as_ref(), &state.config.from_name)
        .await
        .map(Json)
}

async fn handle_send_email(
    form: EmailForm,
    mailer: &dyn Mailer,
    from_name: &str,
) -> Result<Value, AppError> {
    let (to, subject, message) = match (
        non_empty(form.to),
        non_empty(form.subject),
        non_empty(form.message),
    ) {
        (Some(to), Some(subject), Some(message)) => (to, subject, message),
        _ => {
            return Err(AppError::ValidationError(
                "Données manquantes: to, subject et message sont requis".to_string(),
            ))
        }
    };
    validate_recipient(&to)?;

    let email = OutgoingEmail {
        from_name: from_name.to_string(),
        to: to.clone(),
        subject,
        html: format!("<p>{}</p>", message.replace('\n', "<br>")),
        text: message,
        attachment: form.file.map(EmailAttachment::from),
    };

    let message_id = mailer.send(email).await?;
    tracing::info!("Email sent to {}, id: {}", to, message_id);

    Ok(json!({
        "success": true,
        "message": "Email envoyé avec succès!",
        "messageId": message_id,
    }))
}

async fn send_csv(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = read_form(multipart).await?;
    handle_send_csv(form, state.mailer.as_ref(), &state.config.from_name)
        .await
        .map(Json)
}

async fn handle_send_csv(
    form: EmailForm,
    mailer: &dyn Mailer,
    from_name: &str,
) -> Result<Value, AppError> {
    let (to, subject, periode) = match (
        non_empty(form.to),
        non_empty(form.subject),
        non_empty(form.periode),
    ) {
        (Some(to), Some(subject), Some(periode)) => (to, subject, periode),
        _ => {
            return Err(AppError::ValidationError(
                "Données manquantes: to, subject et periode sont requis".to_string(),
            ))
        }
    };
    validate_recipient(&to)?;

    let message = form.message.unwrap_or_default();
    let email = OutgoingEmail {
        from_name: format!("{} - {}", from_name, periode),
        to: to.clone(),
        subject: format!("{} - {}", subject, periode),
        text: format!("{}\n\nPériode: {}\nFichier CSV joint.", message, periode),
        html: format!(
            "<h3>Récapitulatif des activités</h3>\n\
             <p>{}</p>\n\
             <p><strong>Période:</strong> {}</p>\n\
             <p>Veuillez trouver ci-joint le fichier CSV contenant les détails des activités.</p>",
            message, periode
        ),
        attachment: form.file.map(EmailAttachment::from),
    };

    let message_id = mailer.send(email).await?;
    tracing::info!("CSV sent to {}, id: {}", to, message_id);

    Ok(json!({
        "success": true,
        "message": "CSV envoyé avec succès!",
        "messageId": message_id,
        "periode": periode,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockMailer {
        sent: AtomicUsize,
        last: Mutex<Option<OutgoingEmail>>,
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<String, AppError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().expect("mock lock") = Some(email);
            Ok("<mock@test>".to_string())
        }
    }

    fn form(to: Option<&str>, subject: Option<&str>, message: Option<&str>) -> EmailForm {
        EmailForm {
            to: to.map(String::from),
            subject: subject.map(String::from),
            message: message.map(String::from),
            periode: None,
            file: None,
        }
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_before_the_transport() {
        let mailer = MockMailer::default();
        let result = handle_send_email(
            form(Some("not-an-email"), Some("Sujet"), Some("Bonjour")),
            &mailer,
            "ETP App",
        )
        .await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_subject_is_rejected() {
        let mailer = MockMailer::default();
        let result = handle_send_email(
            form(Some("agent@example.com"), None, Some("Bonjour")),
            &mailer,
            "ETP App",
        )
        .await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_field_counts_as_missing() {
        let mailer = MockMailer::default();
        let result = handle_send_email(
            form(Some("agent@example.com"), Some(""), Some("Bonjour")),
            &mailer,
            "ETP App",
        )
        .await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn valid_email_is_sent_and_id_returned() {
        let mailer = MockMailer::default();
        let response = handle_send_email(
            form(Some("agent@example.com"), Some("Sujet"), Some("Ligne 1\nLigne 2")),
            &mailer,
            "ETP App",
        )
        .await
        .expect("send succeeds");

        assert_eq!(response["success"], json!(true));
        assert_eq!(response["messageId"], json!("<mock@test>"));
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 1);

        let sent = mailer.last.lock().expect("mock lock").take().expect("captured email");
        assert_eq!(sent.html, "<p>Ligne 1<br>Ligne 2</p>");
        assert!(sent.attachment.is_none());
    }

    #[tokio::test]
    async fn csv_requires_periode() {
        let mailer = MockMailer::default();
        let result = handle_send_csv(
            form(Some("agent@example.com"), Some("Rapport"), Some("Bonjour")),
            &mailer,
            "ETP App",
        )
        .await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn csv_echoes_periode_and_templates_the_subject() {
        let mailer = MockMailer::default();
        let mut request = form(Some("agent@example.com"), Some("Rapport"), Some("Bonjour"));
        request.periode = Some("Janvier 2025".to_string());
        request.file = Some(UploadedFile {
            filename: "activites.csv".to_string(),
            content_type: "text/csv".to_string(),
            data: Bytes::from_static(b"a;b;c"),
        });

        let response = handle_send_csv(request, &mailer, "ETP App")
            .await
            .expect("send succeeds");

        assert_eq!(response["success"], json!(true));
        assert_eq!(response["periode"], json!("Janvier 2025"));

        let sent = mailer.last.lock().expect("mock lock").take().expect("captured email");
        assert_eq!(sent.subject, "Rapport - Janvier 2025");
        assert_eq!(sent.from_name, "ETP App - Janvier 2025");
        assert!(sent.text.contains("Période: Janvier 2025"));
        let attachment = sent.attachment.expect("attachment forwarded");
        assert_eq!(attachment.filename, "activites.csv");
    }

    #[test]
    fn email_regex_matches_simple_addresses_only() {
        assert!(EMAIL_RE.is_match("a@b.co"));
        assert!(!EMAIL_RE.is_match("a b@c.co"));
        assert!(!EMAIL_RE.is_match("a@b"));
        assert!(!EMAIL_RE.is_match("@b.co"));
    }
}
