use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::MessagingConfig;
use crate::error::AppError;
use crate::models::OutgoingMessage;

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Delivers every message or fails the whole batch.
    async fn send_messages(&self, messages: &[OutgoingMessage]) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct SendMessagesRequest<'a> {
    messages: &'a [OutgoingMessage],
}

/// Posts message batches to the platform's instant-messaging endpoint.
pub struct HttpMessenger {
    client: Client,
    config: MessagingConfig,
}

impl HttpMessenger {
    pub fn new(config: MessagingConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Messenger for HttpMessenger {
    async fn send_messages(&self, messages: &[OutgoingMessage]) -> Result<(), AppError> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&SendMessagesRequest { messages });
        if let Some(token) = &self.config.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Messaging(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Messaging(format!("endpoint returned {}: {}", status, body)));
        }

        tracing::debug!(count = messages.len(), "messages delivered");
        Ok(())
    }
}

/// Accepts and drops everything; used when no messaging endpoint is configured.
pub struct NoopMessenger;

#[async_trait]
impl Messenger for NoopMessenger {
    async fn send_messages(&self, messages: &[OutgoingMessage]) -> Result<(), AppError> {
        tracing::warn!(count = messages.len(), "no messaging endpoint configured, dropping messages");
        Ok(())
    }
}
