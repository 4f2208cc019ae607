//! Outbound notifications.
//!
//! Uses SMTP via lettre for delivery with Askama templates. When SMTP is not
//! configured the server falls back to [`LogNotifier`], which writes the
//! message parameters to the log so codes can be read during development.

use std::collections::BTreeMap;
use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use notekeeper_core::Email;

use crate::config::EmailConfig;

/// HTML template for the verification code email.
#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeHtml<'a> {
    code: &'a str,
}

/// Plain text template for the verification code email.
#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeText<'a> {
    code: &'a str,
}

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    /// A parameter the template needs was not supplied.
    #[error("missing template parameter: {0}")]
    MissingParam(&'static str),

    /// The notification has nobody to go to.
    #[error("notification has no recipients")]
    NoRecipients,
}

/// Message bodies the service knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    /// One-time registration code. Requires the `code` parameter.
    VerificationCode,
}

/// Rendered plain text and HTML bodies.
#[derive(Debug, Clone)]
pub struct RenderedBody {
    pub text: String,
    pub html: String,
}

impl EmailTemplate {
    /// Render both bodies from `params`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::MissingParam` if a required parameter is absent,
    /// or `NotifyError::Template` if rendering fails.
    pub fn render(self, params: &BTreeMap<String, String>) -> Result<RenderedBody, NotifyError> {
        match self {
            Self::VerificationCode => {
                let code = params
                    .get("code")
                    .map(String::as_str)
                    .ok_or(NotifyError::MissingParam("code"))?;
                Ok(RenderedBody {
                    text: VerificationCodeText { code }.render()?,
                    html: VerificationCodeHtml { code }.render()?,
                })
            }
        }
    }
}

/// A templated message addressed to one or more recipients.
#[derive(Debug, Clone)]
pub struct Notification {
    pub to: Vec<Email>,
    pub subject: String,
    pub template: EmailTemplate,
    pub params: BTreeMap<String, String>,
}

impl Notification {
    /// Verification code email for a single recipient.
    #[must_use]
    pub fn verification_code(to: Email, code: &str) -> Self {
        Self {
            to: vec![to],
            subject: "Your Notekeeper verification code".to_owned(),
            template: EmailTemplate::VerificationCode,
            params: BTreeMap::from([("code".to_owned(), code.to_owned())]),
        }
    }
}

/// Delivers notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one notification. Delivery is best effort.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// SMTP delivery with multipart text and HTML bodies.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Create a notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured or the sender address
    /// is invalid.
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        let from = config
            .from_address
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(config.from_address.clone()))?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.to.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let body = notification.template.render(&notification.params)?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject.as_str());
        for recipient in &notification.to {
            let mailbox: Mailbox = recipient
                .as_str()
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(recipient.to_string()))?;
            builder = builder.to(mailbox);
        }

        let email = builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(body.text),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(body.html),
                ),
        )?;

        self.mailer.send(email).await?;

        tracing::info!(
            recipients = notification.to.len(),
            subject = %notification.subject,
            "Email sent successfully"
        );
        Ok(())
    }
}

/// Development notifier: logs instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.to.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        for recipient in &notification.to {
            tracing::warn!(
                to = %recipient,
                subject = %notification.subject,
                params = ?notification.params,
                "SMTP not configured - dev mode, notification not sent"
            );
        }
        Ok(())
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Send with retries, returning the last error once attempts run out.
///
/// # Errors
///
/// Returns the error from the final attempt.
pub async fn send_with_retry(
    notifier: &dyn Notifier,
    notification: &Notification,
    policy: RetryPolicy,
) -> Result<(), NotifyError> {
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        match notifier.send(notification).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= policy.attempts.max(1) => return Err(e),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Notification failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}
