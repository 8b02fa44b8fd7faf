// ABOUTME: Message timeline for one conversation plus the store that re-fetches it
// ABOUTME: Server order is authoritative; provisional echoes are tracked by local id

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::ChatError;
use crate::model::{Message, MessageBody};
use crate::transport::ChatTransport;

/// Locally generated key for a provisional message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalId(String);

impl LocalId {
    pub fn generate() -> Self {
        Self(format!("local-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-only echo of an outgoing message. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalMessage {
    pub local_id: LocalId,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEntry {
    Confirmed(Message),
    Provisional(ProvisionalMessage),
}

impl TimelineEntry {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }

    pub fn body(&self) -> &MessageBody {
        match self {
            Self::Confirmed(m) => &m.body,
            Self::Provisional(p) => &p.body,
        }
    }

    pub fn content(&self) -> &str {
        self.body().content()
    }

    pub fn sender_id(&self) -> &str {
        match self {
            Self::Confirmed(m) => &m.sender_id,
            Self::Provisional(p) => &p.sender_id,
        }
    }

    fn is_local(&self, local_id: &LocalId) -> bool {
        matches!(self, Self::Provisional(p) if &p.local_id == local_id)
    }
}

/// In-memory view of one conversation, owned by a single screen.
///
/// When a reload fails the confirmed history is dropped rather than kept
/// stale; provisional entries stay because their sends are still in flight.
/// Sends that settle while unavailable still land as confirmed entries, so an
/// unavailable timeline may hold the actor's own fresh messages but never a
/// full history. Only a successful reload makes it available again.
#[derive(Debug, Clone)]
pub struct Timeline {
    conversation_id: String,
    entries: Vec<TimelineEntry>,
    available: bool,
}

impl Timeline {
    pub fn unavailable(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            entries: Vec::new(),
            available: false,
        }
    }

    pub fn from_history(conversation_id: impl Into<String>, history: Vec<Message>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            entries: history.into_iter().map(TimelineEntry::Confirmed).collect(),
            available: true,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Confirmed messages in server order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|e| match e {
            TimelineEntry::Confirmed(m) => Some(m),
            TimelineEntry::Provisional(_) => None,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    pub fn contains_local(&self, local_id: &LocalId) -> bool {
        self.entries.iter().any(|e| e.is_local(local_id))
    }

    pub fn push_provisional(&mut self, provisional: ProvisionalMessage) {
        self.entries.push(TimelineEntry::Provisional(provisional));
    }

    /// Replace the provisional entry keyed by `local_id` in place. Returns false if it is gone.
    ///
    /// If a reload already brought in the server's copy of the message, the
    /// echo is dropped instead so the message appears once, where the server put it.
    pub fn confirm(&mut self, local_id: &LocalId, message: Message) -> bool {
        let Some(index) = self.entries.iter().position(|e| e.is_local(local_id)) else {
            return false;
        };
        if self.contains_message(&message.id) {
            self.entries.remove(index);
        } else {
            self.entries[index] = TimelineEntry::Confirmed(message);
        }
        true
    }

    pub fn contains_message(&self, message_id: &str) -> bool {
        self.messages().any(|m| m.id == message_id)
    }

    /// Remove the provisional entry keyed by `local_id`.
    pub fn retract(&mut self, local_id: &LocalId) -> Option<ProvisionalMessage> {
        let index = self.entries.iter().position(|e| e.is_local(local_id))?;
        match self.entries.remove(index) {
            TimelineEntry::Provisional(p) => Some(p),
            TimelineEntry::Confirmed(_) => None,
        }
    }

    /// Swap in a freshly loaded history, keeping in-flight echoes after it.
    pub fn replace_history(&mut self, history: Vec<Message>) {
        let pending = self.drain_provisional();
        self.entries = history.into_iter().map(TimelineEntry::Confirmed).collect();
        self.entries.extend(pending);
        self.available = true;
    }

    /// Forget confirmed history after a failed load.
    pub fn mark_unavailable(&mut self) {
        let pending = self.drain_provisional();
        self.entries = pending;
        self.available = false;
    }

    fn drain_provisional(&mut self) -> Vec<TimelineEntry> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .filter(|e| e.is_pending())
            .collect()
    }
}

/// Loads the full ordered history of a conversation. Every call re-fetches.
#[derive(Clone)]
pub struct TimelineStore {
    transport: Arc<dyn ChatTransport>,
}

impl TimelineStore {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self { transport }
    }

    pub async fn load(&self, conversation_id: &str) -> Result<Vec<Message>, ChatError> {
        match self.transport.load_messages(conversation_id).await {
            Ok(messages) => {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    count = messages.len(),
                    "Timeline loaded"
                );
                Ok(messages)
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Failed to load timeline"
                );
                Err(ChatError::ConversationUnavailable(e))
            }
        }
    }
}
