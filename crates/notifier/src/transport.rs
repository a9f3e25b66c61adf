//! Outbound email delivery.
//!
//! A [`Transport`] makes exactly one delivery attempt per call. Retrying is the
//! dispatcher's job, never the transport's.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;

use courier_common::config::{MailConfig, MailTransportKind};
use courier_common::types::EmailMessage;

use crate::error::TransportError;

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one message. A single attempt, no internal retry.
    async fn deliver(&self, message: &EmailMessage) -> Result<(), TransportError>;
}

/// Build the transport selected by `MAIL_TRANSPORT`.
pub fn build_transport(config: &MailConfig) -> Result<Arc<dyn Transport>, TransportError> {
    match config.transport {
        MailTransportKind::Smtp => Ok(Arc::new(SmtpTransport::new(config)?)),
        MailTransportKind::Resend => Ok(Arc::new(ResendTransport::new(config)?)),
    }
}

fn sender_mailbox(config: &MailConfig) -> Result<Mailbox, TransportError> {
    let address = config
        .from_email
        .parse::<lettre::Address>()
        .map_err(|e| TransportError::InvalidAddress(format!("{}: {e}", config.from_email)))?;
    Ok(Mailbox::new(config.from_name.clone(), address))
}

// ============================================================
// SMTP
// ============================================================

/// SMTP delivery through lettre's async transport.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    pub fn new(config: &MailConfig) -> Result<Self, TransportError> {
        let builder = if config.smtp_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| TransportError::Connection(format!("SMTP relay: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        let mut builder = builder.port(config.smtp_port).timeout(Some(SEND_TIMEOUT));
        if let Some(username) = &config.smtp_username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.smtp_password.clone().unwrap_or_default(),
            ));
        }

        tracing::info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            starttls = config.smtp_starttls,
            "SMTP transport configured"
        );

        Ok(Self {
            mailer: builder.build(),
            from: sender_mailbox(config)?,
        })
    }

    /// Compose the MIME message, reading file attachments from disk.
    pub async fn compose(&self, message: &EmailMessage) -> Result<Message, TransportError> {
        let to: Mailbox = message
            .to()
            .parse()
            .map_err(|e| TransportError::InvalidAddress(format!("{}: {e}", message.to())))?;

        let content_type = if message.is_html() {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject());

        let email = if message.attachments().is_empty() {
            builder
                .header(content_type)
                .body(message.body().to_string())
        } else {
            let mut parts = MultiPart::mixed().singlepart(
                SinglePart::builder()
                    .header(content_type)
                    .body(message.body().to_string()),
            );
            for reference in message.attachments() {
                parts = parts.singlepart(read_attachment(reference).await?);
            }
            builder.multipart(parts)
        };

        email.map_err(|e| TransportError::Build(e.to_string()))
    }
}

async fn read_attachment(reference: &str) -> Result<SinglePart, TransportError> {
    let path = Path::new(reference);
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TransportError::Attachment(format!("{reference}: not a file path")))?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| TransportError::Attachment(format!("{reference}: {e}")))?;

    let content_type = ContentType::parse("application/octet-stream")
        .map_err(|e| TransportError::Attachment(e.to_string()))?;

    Ok(Attachment::new(filename).body(bytes, content_type))
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), TransportError> {
        let email = self.compose(message).await?;

        self.mailer.send(email).await.map_err(|e| {
            if e.is_permanent() {
                TransportError::Rejected(e.to_string())
            } else if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else if e.is_transient() {
                TransportError::Delivery(e.to_string())
            } else {
                TransportError::Connection(e.to_string())
            }
        })?;

        tracing::debug!(to = message.to(), "Email accepted by SMTP server");
        Ok(())
    }
}

// ============================================================
// Resend HTTP API
// ============================================================

#[derive(Debug, Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ResendAttachment<'a>>,
}

/// Resend fetches `path` itself, so attachment references must be URLs.
#[derive(Debug, Serialize)]
struct ResendAttachment<'a> {
    path: &'a str,
    filename: &'a str,
}

impl<'a> ResendEmail<'a> {
    fn from_message(from: &'a str, message: &'a EmailMessage) -> Self {
        let (html, text) = if message.is_html() {
            (Some(message.body()), None)
        } else {
            (None, Some(message.body()))
        };

        Self {
            from,
            to: [message.to()],
            subject: message.subject(),
            html,
            text,
            attachments: message
                .attachments()
                .iter()
                .map(|path| ResendAttachment {
                    path,
                    filename: path.rsplit('/').next().unwrap_or(path),
                })
                .collect(),
        }
    }
}

/// Delivery through the Resend HTTP API.
pub struct ResendTransport {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl ResendTransport {
    pub fn new(config: &MailConfig) -> Result<Self, TransportError> {
        let api_key = config
            .resend_api_key
            .clone()
            .ok_or_else(|| TransportError::Build("RESEND_API_KEY is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        tracing::info!("Resend transport configured");

        Ok(Self {
            client,
            api_key,
            from: sender_mailbox(config)?.to_string(),
            endpoint: RESEND_API_URL.to_string(),
        })
    }

    /// Point the transport at a different API base (e.g. a local mock server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Transport for ResendTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), TransportError> {
        let payload = ResendEmail::from_message(&self.from, message);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(e.to_string())
                } else {
                    TransportError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to = message.to(), "Email accepted by Resend");
        Ok(())
    }
}
