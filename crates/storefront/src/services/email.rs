//! Outgoing mail.
//!
//! Uses SMTP via lettre for delivery. When no relay is configured a
//! [`PreviewMailer`] logs messages instead of sending them.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment as MailAttachment, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use guidebook_core::Email;

use crate::config::SmtpConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Invalid attachment content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A file attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A plain-text message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    /// Sender mailbox, may include a display name.
    pub from: String,
    pub to: Email,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// Mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// SMTP delivery through lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a mailer for the configured relay.
    ///
    /// Port 465 uses implicit TLS, every other port STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns error if the relay settings are invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let mut builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        }
        .port(config.port);

        if let Some(username) = &config.username {
            let password = config
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_owned())
                .unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let message = build_message(&email)?;
        self.transport.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Logs messages instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct PreviewMailer;

#[async_trait]
impl Mailer for PreviewMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        // Build anyway so address and attachment problems surface in development.
        build_message(&email)?;

        let attachments: Vec<String> = email
            .attachments
            .iter()
            .map(|a| format!("{} ({} bytes)", a.filename, a.bytes.len()))
            .collect();
        tracing::info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            attachments = ?attachments,
            body = %email.text,
            "SMTP not configured, email preview only"
        );
        Ok(())
    }
}

/// Build a lettre message: a plain-text body, plus a mixed multipart when
/// there are attachments.
///
/// # Errors
///
/// Returns error if an address or content type doesn't parse.
pub fn build_message(email: &OutgoingEmail) -> Result<Message, EmailError> {
    let builder = Message::builder()
        .from(
            email
                .from
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.from.clone()))?,
        )
        .to(email
            .to
            .as_str()
            .parse()
            .map_err(|_| EmailError::InvalidAddress(email.to.to_string()))?)
        .subject(email.subject.as_str());

    if email.attachments.is_empty() {
        return Ok(builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text.clone())?);
    }

    let mut body = MultiPart::mixed().singlepart(SinglePart::plain(email.text.clone()));
    for attachment in &email.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|_| EmailError::InvalidContentType(attachment.content_type.clone()))?;
        body = body.singlepart(
            MailAttachment::new(attachment.filename.clone())
                .body(attachment.bytes.clone(), content_type),
        );
    }

    Ok(builder.multipart(body)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email(attachments: Vec<Attachment>) -> OutgoingEmail {
        OutgoingEmail {
            from: "Przewodnik <noreply@example.pl>".to_owned(),
            to: Email::parse("partner@example.pl").unwrap(),
            subject: "Rozdział 1 - Wasz plan krok po kroku".to_owned(),
            text: "Cześć!".to_owned(),
            attachments,
        }
    }

    #[test]
    fn test_build_message_with_attachment() {
        let message = build_message(&email(vec![Attachment {
            filename: "rozdzial-1.pdf".to_owned(),
            content_type: "application/pdf".to_owned(),
            bytes: b"%PDF-1.4".to_vec(),
        }]))
        .unwrap();

        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("rozdzial-1.pdf"));
        assert!(raw.contains("application/pdf"));
    }

    #[test]
    fn test_build_message_plain() {
        let message = build_message(&email(Vec::new())).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(!raw.contains("multipart"));
        assert!(raw.contains("To: partner@example.pl"));
    }

    #[test]
    fn test_bad_sender_rejected() {
        let mut msg = email(Vec::new());
        msg.from = "not an address".to_owned();
        assert!(matches!(
            build_message(&msg),
            Err(EmailError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_preview_mailer_accepts_valid_message() {
        assert!(PreviewMailer.send(email(Vec::new())).await.is_ok());
    }
}
