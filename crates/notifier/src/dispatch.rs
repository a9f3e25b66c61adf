use std::sync::Arc;

use chrono::Utc;

use courier_common::types::{EmailMessage, Recipient};

use crate::error::DispatchError;
use crate::render::{Renderer, Substitutions};
use crate::store::RecipientStore;
use crate::transport::Transport;

/// The per-recipient unit of work: render → build message → deliver → record.
#[derive(Clone)]
pub struct WelcomeDispatch {
    store: Arc<dyn RecipientStore>,
    renderer: Arc<dyn Renderer>,
    transport: Arc<dyn Transport>,
    template: String,
    subject: String,
}

impl WelcomeDispatch {
    pub fn new(
        store: Arc<dyn RecipientStore>,
        renderer: Arc<dyn Renderer>,
        transport: Arc<dyn Transport>,
        template: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            store,
            renderer,
            transport,
            template: template.into(),
            subject: subject.into(),
        }
    }

    pub async fn send(&self, recipient: &Recipient) -> Result<(), DispatchError> {
        let result = self.try_send(recipient).await;
        if let Err(e) = &result {
            tracing::error!(
                recipient_id = %recipient.id,
                email = %recipient.email,
                error = %e,
                "Failed to process welcome email"
            );
        }
        result
    }

    async fn try_send(&self, recipient: &Recipient) -> Result<(), DispatchError> {
        let mut substitutions = Substitutions::new();
        substitutions.insert("UserName".to_string(), recipient.name.clone());

        let body = self.renderer.render(&self.template, &substitutions).await?;
        let message = EmailMessage::new(&recipient.email, &self.subject, body, true);

        self.transport.deliver(&message).await?;
        self.store.mark_notified(recipient.id, Utc::now()).await?;

        tracing::info!(
            recipient_id = %recipient.id,
            email = %recipient.email,
            "Sent welcome email"
        );
        Ok(())
    }
}
