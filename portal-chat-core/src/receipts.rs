// ABOUTME: Fire-and-forget read receipts
// ABOUTME: Failures are logged only and never touch the local timeline

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::error::ChatError;
use crate::model::Message;
use crate::transport::ChatTransport;

#[derive(Clone)]
pub struct ReadReceiptNotifier {
    transport: Arc<dyn ChatTransport>,
}

impl ReadReceiptNotifier {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self { transport }
    }

    /// Acknowledge `message_id` in the background. The handle may be ignored.
    pub fn mark_read(&self, message_id: &str) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let message_id = message_id.to_string();
        tokio::spawn(async move {
            match acknowledge(transport.as_ref(), &message_id).await {
                Ok(_) => tracing::debug!(message_id = %message_id, "Read receipt delivered"),
                Err(e) => tracing::warn!(
                    message_id = %message_id,
                    error = %e,
                    kind = e.kind(),
                    "Read receipt not delivered"
                ),
            }
        })
    }
}

/// Send one read acknowledgment and wait for the service's answer.
pub async fn acknowledge(
    transport: &dyn ChatTransport,
    message_id: &str,
) -> Result<Message, ChatError> {
    transport
        .mark_read(message_id)
        .await
        .map_err(ChatError::ReadAckFailed)
}
