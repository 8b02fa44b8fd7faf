// ABOUTME: System event interpreter for workflow-control messages in a timeline
// ABOUTME: Derives the interview capability and maps entries to render items

use crate::model::{Message, MessageBody, SystemAction};
use crate::timeline::{Timeline, TimelineEntry};

/// What the rendering surface draws for one timeline entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderItem {
    /// Ordinary chat text
    Text {
        message_id: String,
        sender_id: String,
        content: String,
        mine: bool,
        read: bool,
    },
    /// Optimistic echo still waiting on the service
    Pending { local_id: String, content: String },
    /// Recognized workflow signal, drawn as an actionable control.
    /// Only the receiving participant may act on it.
    Control {
        message_id: String,
        action: SystemAction,
        label: String,
        enabled: bool,
    },
    /// Unrecognized workflow signal; shown but inert
    Notice { message_id: String, text: String },
}

#[derive(Debug, Clone)]
pub struct SystemEventInterpreter {
    actor_id: String,
}

impl SystemEventInterpreter {
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
        }
    }

    /// True if this message grants the actor the interview capability.
    pub fn unlocks(&self, message: &Message) -> bool {
        message.receiver_id == self.actor_id
            && matches!(message.action(), Some(SystemAction::ProceedToInterview))
    }

    /// Derive the capability from a sequence of confirmed messages.
    pub fn derive<'a>(&self, messages: impl IntoIterator<Item = &'a Message>) -> bool {
        messages.into_iter().any(|m| self.unlocks(m))
    }

    pub fn render(&self, entry: &TimelineEntry) -> RenderItem {
        match entry {
            TimelineEntry::Provisional(p) => RenderItem::Pending {
                local_id: p.local_id.to_string(),
                content: p.body.content().to_string(),
            },
            TimelineEntry::Confirmed(message) => match &message.body {
                MessageBody::Text { content } => RenderItem::Text {
                    message_id: message.id.clone(),
                    sender_id: message.sender_id.clone(),
                    content: content.clone(),
                    mine: message.sender_id == self.actor_id,
                    read: message.is_read(),
                },
                MessageBody::System { content, action } if action.is_recognized() => {
                    // Prefer the sender's wording when they supplied one
                    let label = match content.trim() {
                        "" => action.label().to_string(),
                        trimmed => trimmed.to_string(),
                    };
                    RenderItem::Control {
                        message_id: message.id.clone(),
                        action: action.clone(),
                        label,
                        enabled: message.receiver_id == self.actor_id,
                    }
                }
                MessageBody::System { action, .. } => {
                    tracing::debug!(
                        message_id = %message.id,
                        action = %action,
                        "Unrecognized system action rendered as notice"
                    );
                    RenderItem::Notice {
                        message_id: message.id.clone(),
                        text: format!("Unsupported workflow update ({})", action),
                    }
                }
            },
        }
    }

    pub fn render_all(&self, timeline: &Timeline) -> Vec<RenderItem> {
        timeline.entries().iter().map(|e| self.render(e)).collect()
    }
}
