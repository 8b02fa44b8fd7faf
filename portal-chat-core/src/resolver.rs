// ABOUTME: Chat identity resolver mapping a counterpart to a stable conversation handle
// ABOUTME: Validates identities locally; the service creates conversations idempotently

use std::sync::Arc;

use crate::error::ChatError;
use crate::model::Conversation;
use crate::transport::ChatTransport;

pub struct IdentityResolver {
    transport: Arc<dyn ChatTransport>,
    actor_id: String,
}

impl IdentityResolver {
    pub fn new(transport: Arc<dyn ChatTransport>, actor_id: impl Into<String>) -> Self {
        Self {
            transport,
            actor_id: actor_id.into(),
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// Return the conversation for {actor, counterpart}, creating it on first contact.
    ///
    /// Safe to call redundantly from either side; the service never creates a
    /// second conversation for the same pair. Transport failures are not retried.
    pub async fn resolve(&self, counterpart_id: &str) -> Result<Conversation, ChatError> {
        let counterpart_id = counterpart_id.trim();
        if counterpart_id.is_empty() {
            return Err(ChatError::IdentityMissing);
        }
        if counterpart_id == self.actor_id {
            return Err(ChatError::SelfConversation);
        }

        let conversation = self
            .transport
            .resolve_conversation(counterpart_id)
            .await
            .map_err(|e| {
                tracing::warn!(
                    counterpart = %counterpart_id,
                    error = %e,
                    "Failed to resolve conversation"
                );
                ChatError::ConversationUnavailable(e)
            })?;

        if !(conversation.involves(&self.actor_id) && conversation.involves(counterpart_id)) {
            tracing::error!(
                conversation_id = %conversation.id,
                counterpart = %counterpart_id,
                "Service returned a conversation for a different pair"
            );
            return Err(ChatError::ConversationUnavailable(
                crate::error::TransportError::Decode(format!(
                    "conversation {} does not belong to this pair",
                    conversation.id
                )),
            ));
        }

        tracing::debug!(
            conversation_id = %conversation.id,
            counterpart = %counterpart_id,
            "Conversation resolved"
        );
        Ok(conversation)
    }

    /// All conversations the actor takes part in.
    pub async fn list(&self) -> Result<Vec<Conversation>, ChatError> {
        self.transport
            .list_conversations()
            .await
            .map_err(ChatError::ConversationUnavailable)
    }
}
