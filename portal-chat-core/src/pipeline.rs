// ABOUTME: Optimistic send pipeline: Composed -> Pending -> Confirmed | Failed
// ABOUTME: Provisional echoes are reconciled by local id, never by list position

use chrono::Utc;
use std::collections::HashMap;

use crate::error::{ChatError, TransportError};
use crate::model::{Conversation, Message, MessageBody, SendMessageRequest, SystemAction};
use crate::timeline::{LocalId, ProvisionalMessage, Timeline};
use crate::transport::ChatTransport;

/// Lifecycle of one outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Composed,
    Pending,
    Confirmed,
    Failed,
}

impl std::fmt::Display for SendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Composed => write!(f, "composed"),
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A validated outgoing message that has not touched the timeline yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    body: MessageBody,
    /// Draft text to hand back if the send fails. None for system signals.
    original: Option<String>,
}

impl Composed {
    /// Validate user-entered text. Whitespace-only input is rejected.
    pub fn text(draft: &str) -> Result<Self, ChatError> {
        let content = draft.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyContent);
        }
        Ok(Self {
            body: MessageBody::text(content),
            original: Some(draft.to_string()),
        })
    }

    /// Build a workflow signal. Empty content falls back to the action's label.
    pub fn system(action: SystemAction, content: &str) -> Result<Self, ChatError> {
        if !action.is_recognized() {
            return Err(ChatError::UnsupportedAction(action.as_str().to_string()));
        }
        let content = match content.trim() {
            "" => action.label().to_string(),
            trimmed => trimmed.to_string(),
        };
        Ok(Self {
            body: MessageBody::system(action, content),
            original: None,
        })
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }
}

/// A pending send. Dispatching it is the only await point of the pipeline.
#[derive(Debug, Clone)]
pub struct SendTicket {
    local_id: LocalId,
    request: SendMessageRequest,
}

impl SendTicket {
    pub fn local_id(&self) -> &LocalId {
        &self.local_id
    }

    pub fn request(&self) -> &SendMessageRequest {
        &self.request
    }

    pub async fn dispatch(self, transport: &dyn ChatTransport) -> SendOutcome {
        let result = transport.send_message(&self.request).await;
        SendOutcome {
            local_id: self.local_id,
            result,
        }
    }
}

/// Result of a dispatched send, keyed by the ticket's local id.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub local_id: LocalId,
    pub result: Result<Message, TransportError>,
}

/// What reconciling an outcome did to the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The echo was replaced in place by the server's message, or dropped
    /// because a reload had already brought that message in.
    Confirmed(Message),
    /// The echo was removed; `restored` is the draft text to put back.
    Failed {
        restored: Option<String>,
        error: ChatError,
    },
    /// No matching echo remained; the outcome had nowhere to land.
    Discarded,
}

impl Reconciliation {
    pub fn state(&self) -> Option<SendState> {
        match self {
            Self::Confirmed(_) => Some(SendState::Confirmed),
            Self::Failed { .. } => Some(SendState::Failed),
            Self::Discarded => None,
        }
    }
}

/// Per-conversation send bookkeeping. Holds the original text of every
/// in-flight send so a failure can restore it.
#[derive(Debug)]
pub struct SendPipeline {
    conversation_id: String,
    actor_id: String,
    receiver_id: String,
    in_flight: HashMap<LocalId, Option<String>>,
}

impl SendPipeline {
    pub fn new(conversation: &Conversation, actor_id: &str) -> Result<Self, ChatError> {
        let receiver_id = conversation
            .counterpart_of(actor_id)
            .ok_or(ChatError::IdentityMissing)?
            .to_string();
        Ok(Self {
            conversation_id: conversation.id.clone(),
            actor_id: actor_id.to_string(),
            receiver_id,
            in_flight: HashMap::new(),
        })
    }

    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Append the optimistic echo and hand back the ticket to dispatch.
    pub fn begin(&mut self, timeline: &mut Timeline, composed: Composed) -> SendTicket {
        let local_id = LocalId::generate();
        let request =
            SendMessageRequest::new(&self.conversation_id, &self.receiver_id, &composed.body);

        timeline.push_provisional(ProvisionalMessage {
            local_id: local_id.clone(),
            conversation_id: self.conversation_id.clone(),
            sender_id: self.actor_id.clone(),
            receiver_id: self.receiver_id.clone(),
            body: composed.body,
            created_at: Utc::now(),
        });
        self.in_flight.insert(local_id.clone(), composed.original);

        tracing::debug!(
            conversation_id = %self.conversation_id,
            local_id = %local_id,
            in_flight = self.in_flight.len(),
            "Send pending"
        );

        SendTicket { local_id, request }
    }

    /// Apply a settled send to the timeline.
    pub fn complete(&mut self, timeline: &mut Timeline, outcome: SendOutcome) -> Reconciliation {
        let SendOutcome { local_id, result } = outcome;

        let Some(original) = self.in_flight.remove(&local_id) else {
            tracing::debug!(local_id = %local_id, "Send outcome for unknown ticket discarded");
            return Reconciliation::Discarded;
        };

        match result {
            Ok(message) => {
                if timeline.confirm(&local_id, message.clone()) {
                    tracing::debug!(
                        local_id = %local_id,
                        message_id = %message.id,
                        "Send confirmed"
                    );
                    Reconciliation::Confirmed(message)
                } else {
                    tracing::debug!(local_id = %local_id, "Confirmed send has no echo to replace");
                    Reconciliation::Discarded
                }
            }
            Err(e) => {
                timeline.retract(&local_id);
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    local_id = %local_id,
                    error = %e,
                    "Send failed, echo rolled back"
                );
                Reconciliation::Failed {
                    restored: original,
                    error: ChatError::SendFailed(e),
                }
            }
        }
    }
}
