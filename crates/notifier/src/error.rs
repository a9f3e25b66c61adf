use thiserror::Error;

/// Failures raised by a [`RecipientStore`](crate::store::RecipientStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failures raised while producing message content.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid template name: {0}")]
    InvalidName(String),

    #[error("Failed to read template {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures raised by a single delivery attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Connection(_)
            | TransportError::Timeout(_)
            | TransportError::Delivery(_) => true,
            TransportError::Http { status, .. } => *status == 429 || *status >= 500,
            TransportError::InvalidAddress(_)
            | TransportError::Build(_)
            | TransportError::Attachment(_)
            | TransportError::Rejected(_) => false,
        }
    }
}

/// Any failure of the render → deliver → record unit of work.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Render(_) => false,
            DispatchError::Transport(e) => e.is_transient(),
            DispatchError::Store(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_classification() {
        assert!(TransportError::Timeout("smtp".into()).is_transient());
        assert!(TransportError::Connection("refused".into()).is_transient());
        assert!(!TransportError::InvalidAddress("not-an-email".into()).is_transient());
        assert!(!TransportError::Rejected("550 mailbox unavailable".into()).is_transient());
    }

    #[test]
    fn test_http_status_classification() {
        let throttled = TransportError::Http { status: 429, body: String::new() };
        let outage = TransportError::Http { status: 503, body: String::new() };
        let invalid = TransportError::Http { status: 422, body: String::new() };
        assert!(throttled.is_transient());
        assert!(outage.is_transient());
        assert!(!invalid.is_transient());
    }

    #[test]
    fn test_dispatch_error_classification() {
        let render: DispatchError = RenderError::NotFound("welcome_email".into()).into();
        let store: DispatchError = StoreError::Unavailable("pool closed".into()).into();
        assert!(!render.is_transient());
        assert!(store.is_transient());
    }
}
