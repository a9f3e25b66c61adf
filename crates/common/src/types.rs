use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person who should receive the one-time welcome notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Flips to `true` once, together with `notified_at`.
    pub notified: bool,
    pub notified_at: Option<DateTime<Utc>>,
}

impl Recipient {
    pub fn pending(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            notified: false,
            notified_at: None,
        }
    }
}

/// Seed input for a recipient that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecipient {
    pub name: String,
    pub email: String,
}

/// A composed email, ready to hand to a transport.
///
/// Built fresh for each recipient; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    to: String,
    subject: String,
    body: String,
    is_html: bool,
    attachments: Vec<String>,
}

impl EmailMessage {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        is_html: bool,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            is_html,
            attachments: Vec::new(),
        }
    }

    /// Append an attachment reference (a file path for SMTP, a URL for Resend).
    pub fn with_attachment(mut self, reference: impl Into<String>) -> Self {
        self.attachments.push(reference.into());
        self
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_html(&self) -> bool {
        self.is_html
    }

    pub fn attachments(&self) -> &[String] {
        &self.attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_recipient_is_not_notified() {
        let r = Recipient::pending("Jane Smith", "jane@example.com");
        assert!(!r.notified);
        assert!(r.notified_at.is_none());
    }

    #[test]
    fn test_email_message_keeps_attachment_order() {
        let msg = EmailMessage::new("a@example.com", "Hi", "<p>Hi</p>", true)
            .with_attachment("terms.pdf")
            .with_attachment("guide.pdf");
        assert_eq!(msg.attachments(), ["terms.pdf", "guide.pdf"]);
        assert!(msg.is_html());
        assert_eq!(msg.to(), "a@example.com");
    }

    #[test]
    fn test_new_recipient_deserializes_from_seed_json() {
        let seeds: Vec<NewRecipient> = serde_json::from_str(
            r#"[{"name": "John Doe", "email": "john@example.com"}]"#,
        )
        .unwrap();
        assert_eq!(seeds[0].name, "John Doe");
    }
}
