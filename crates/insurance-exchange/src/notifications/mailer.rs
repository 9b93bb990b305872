use async_trait::async_trait;
use serde_json::Value;

use super::payload::EmailMessage;
use crate::config::NotificationConfig;

/// Outbound transactional email transport.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("email transport failed: {0}")]
    Transport(String),
    #[error("email API rejected the message (status {status}): {detail}")]
    Rejected { status: u16, detail: String },
}

/// Unisender `sendEmail` client. The message travels as query parameters.
#[derive(Debug, Clone)]
pub struct UnisenderGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl UnisenderGateway {
    /// Every request, including reading the reply, is bounded by the
    /// configured timeout so a stalled API cannot hold a worker.
    pub fn new(config: &NotificationConfig) -> Result<Self, MailerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| MailerError::Transport(err.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &NotificationConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    pub(crate) fn params(&self, message: &EmailMessage) -> Vec<(&'static str, String)> {
        vec![
            ("format", "json".to_string()),
            ("api_key", self.api_key.clone()),
            ("email", message.recipient.clone()),
            ("sender_name", message.sender_name.clone()),
            ("sender_email", message.sender_email.clone()),
            ("subject", message.subject.clone()),
            ("body", message.html_body.clone()),
            ("list_id", "1".to_string()),
        ]
    }
}

#[async_trait]
impl EmailGateway for UnisenderGateway {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        let response = self
            .client
            .post(&self.api_url)
            .query(&self.params(message))
            .send()
            .await
            .map_err(|err| MailerError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| MailerError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(MailerError::Rejected {
                status: status.as_u16(),
                detail: body,
            });
        }

        // The API answers 200 with an `error` member when it refuses a message.
        if let Ok(Value::Object(payload)) = serde_json::from_str::<Value>(&body) {
            if let Some(error) = payload.get("error") {
                return Err(MailerError::Rejected {
                    status: status.as_u16(),
                    detail: error.to_string(),
                });
            }
        }

        Ok(())
    }
}
