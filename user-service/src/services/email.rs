use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use service_core::error::AppError;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::GmailConfig;

pub const INVITATION_SUBJECT: &str = "Invitation";
pub const RESET_PASSWORD_SUBJECT: &str = "Reset Password";
pub const WELCOME_SUBJECT: &str = "Welcome";

#[derive(Debug, Clone, PartialEq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MailMessage {
    pub subject: String,
    pub html_body: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<MailAttachment>,
}

impl MailMessage {
    pub fn new(to: &str, subject: &str, html_body: String) -> Self {
        Self {
            subject: subject.to_string(),
            html_body,
            to: vec![to.to_string()],
            ..Self::default()
        }
    }
}

/// Outbound mail delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), AppError>;
}

pub fn invitation_body(link: &str) -> String {
    format!(
        "<html><body><p>You have been invited to join a project.</p>\
         <p><a href=\"{link}\">Accept the invitation</a></p>\
         <p>This link expires in 24 hours.</p></body></html>"
    )
}

pub fn reset_password_body(link: &str) -> String {
    format!(
        "<html><body><p>We received a request to reset your password.</p>\
         <p><a href=\"{link}\">Reset password</a></p>\
         <p>If you didn't request this, please ignore this email.</p></body></html>"
    )
}

pub fn welcome_body(name: &str) -> String {
    format!("<html><body><p>Welcome, {name}! Your account is ready.</p></body></html>")
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl EmailService {
    pub fn new(config: &GmailConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.user.clone(), config.app_password.clone());

        let mailer = SmtpTransport::relay("smtp.gmail.com")
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        let from = Mailbox::new(
            Some(config.sender_name.clone()),
            config
                .user
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::ConfigError(e.into()))?,
        );

        tracing::info!("Email service initialized with Gmail SMTP");

        Ok(Self { mailer, from })
    }

    fn build(&self, message: &MailMessage) -> Result<Message, AppError> {
        let parse = |addr: &String| -> Result<Mailbox, AppError> {
            addr.parse()
                .map_err(|e: lettre::address::AddressError| AppError::EmailError(e.to_string()))
        };

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.clone());
        for addr in &message.to {
            builder = builder.to(parse(addr)?);
        }
        for addr in &message.cc {
            builder = builder.cc(parse(addr)?);
        }
        for addr in &message.bcc {
            builder = builder.bcc(parse(addr)?);
        }

        let mut body = MultiPart::mixed().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(message.html_body.clone()),
        );
        for attachment in &message.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| AppError::EmailError(e.to_string()))?;
            body = body.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }

        builder
            .multipart(body)
            .map_err(|e| AppError::EmailError(e.to_string()))
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send(&self, message: MailMessage) -> Result<(), AppError> {
        let email = self.build(&message)?;

        // SMTP transport is blocking.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(
                    recipients = message.to.len(),
                    subject = %message.subject,
                    "Email sent successfully"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    subject = %message.subject,
                    "Failed to send email"
                );
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

/// Keeps every message in memory instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<MailMessage>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::EmailError("delivery disabled".to_string()));
        }
        self.sent
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mailer mutex poisoned: {}", e)))?
            .push(message);
        Ok(())
    }
}
