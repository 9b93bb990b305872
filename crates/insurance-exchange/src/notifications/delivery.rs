use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::mailer::EmailGateway;
use super::payload::{EmailMessage, ResponseNotification, SenderIdentity};
use super::queue::{Job, JobError, JobHandler, JobId, JobKind, JobQueue, QueueError};

/// Hands response notifications off for asynchronous delivery.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: &ResponseNotification) -> Result<JobId, QueueError>;
}

impl NotificationDispatcher for JobQueue {
    fn dispatch(&self, notification: &ResponseNotification) -> Result<JobId, QueueError> {
        let payload = serde_json::to_value(notification)
            .map_err(|err| QueueError::Encode(err.to_string()))?;
        self.enqueue(JobKind::ResponseNotification, payload)
    }
}

/// Worker-side handler: decode the payload, render the email, send it.
pub struct ResponseNotificationHandler {
    gateway: Arc<dyn EmailGateway>,
    sender: SenderIdentity,
}

impl ResponseNotificationHandler {
    pub fn new(gateway: Arc<dyn EmailGateway>, sender: SenderIdentity) -> Self {
        Self { gateway, sender }
    }
}

#[async_trait]
impl JobHandler for ResponseNotificationHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        let notification: ResponseNotification = serde_json::from_value(job.payload.clone())
            .map_err(|err| JobError(format!("malformed notification payload: {err}")))?;
        let message = EmailMessage::for_response(&notification, &self.sender);

        self.gateway
            .send(&message)
            .await
            .map_err(|err| JobError(err.to_string()))?;

        info!(
            id = %job.id,
            recipient = %message.recipient,
            service = %notification.service,
            "response notification sent"
        );
        Ok(())
    }
}
