// ABOUTME: Chat data model shared by the client core and the message service
// ABOUTME: Wire shapes are camelCase JSON; message kind/action decode into a tagged body

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Participants
// =============================================================================

/// Role of a participant in the portal. Only superadmins may emit workflow signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Superadmin,
}

impl Role {
    pub fn can_signal(&self) -> bool {
        matches!(self, Role::Superadmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
            Self::Superadmin => write!(f, "superadmin"),
        }
    }
}

/// An opaque identity referenced by conversations. Not owned by chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

// =============================================================================
// Conversations
// =============================================================================

/// A two-party conversation. The pair is unordered; the service stores it
/// normalized so `participant_a < participant_b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn involves(&self, participant_id: &str) -> bool {
        self.participant_a == participant_id || self.participant_b == participant_id
    }

    /// The other side of the conversation, or None if `participant_id` is not a member.
    pub fn counterpart_of(&self, participant_id: &str) -> Option<&str> {
        if self.participant_a == participant_id {
            Some(&self.participant_b)
        } else if self.participant_b == participant_id {
            Some(&self.participant_a)
        } else {
            None
        }
    }
}

/// Order an unordered participant pair so both directions map to one key.
pub fn ordered_pair<'a>(first: &'a str, second: &'a str) -> (&'a str, &'a str) {
    if first <= second {
        (first, second)
    } else {
        (second, first)
    }
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Text,
    System,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "TEXT"),
            Self::System => write!(f, "SYSTEM"),
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = MessageDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(Self::Text),
            "SYSTEM" => Ok(Self::System),
            other => Err(MessageDecodeError::UnknownKind(other.to_string())),
        }
    }
}

/// Workflow action carried by a SYSTEM message.
///
/// Unknown action strings are kept as `Unrecognized` so they fail closed:
/// they never unlock a capability and render as an inert notice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SystemAction {
    ProceedToInterview,
    Unrecognized(String),
}

impl SystemAction {
    pub const PROCEED_TO_INTERVIEW: &'static str = "PROCEED_TO_INTERVIEW";

    pub fn parse(raw: &str) -> Self {
        if raw == Self::PROCEED_TO_INTERVIEW {
            Self::ProceedToInterview
        } else {
            Self::Unrecognized(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ProceedToInterview => Self::PROCEED_TO_INTERVIEW,
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    /// Label for the control affordance a recognized action renders as.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ProceedToInterview => "Schedule interview",
            Self::Unrecognized(_) => "Unsupported action",
        }
    }
}

impl std::fmt::Display for SystemAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message payload as a tagged variant instead of kind + optional action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text { content: String },
    System { content: String, action: SystemAction },
}

impl MessageBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn system(action: SystemAction, content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
            action,
        }
    }

    /// Rebuild a body from its wire parts, rejecting inconsistent kind/action pairs.
    pub fn from_parts(
        kind: MessageKind,
        content: String,
        action: Option<String>,
    ) -> Result<Self, MessageDecodeError> {
        match (kind, action) {
            (MessageKind::Text, None) => Ok(Self::Text { content }),
            (MessageKind::Text, Some(action)) => Err(MessageDecodeError::ActionOnText(action)),
            (MessageKind::System, Some(action)) => Ok(Self::System {
                content,
                action: SystemAction::parse(&action),
            }),
            (MessageKind::System, None) => Err(MessageDecodeError::MissingAction),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Text { content } | Self::System { content, .. } => content,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::System { .. } => MessageKind::System,
        }
    }

    pub fn action(&self) -> Option<&SystemAction> {
        match self {
            Self::Text { .. } => None,
            Self::System { action, .. } => Some(action),
        }
    }
}

/// Errors decoding a message from its wire representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageDecodeError {
    #[error("unknown message kind: {0}")]
    UnknownKind(String),
    #[error("TEXT message must not carry an action (got {0})")]
    ActionOnText(String),
    #[error("SYSTEM message is missing its action")]
    MissingAction,
}

/// A server-confirmed message. Only `read_at` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn content(&self) -> &str {
        self.body.content()
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    pub fn action(&self) -> Option<&SystemAction> {
        self.body.action()
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: String,
    conversation_id: String,
    sender_id: String,
    receiver_id: String,
    content: String,
    kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    read_at: Option<DateTime<Utc>>,
}

impl TryFrom<WireMessage> for Message {
    type Error = MessageDecodeError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        Ok(Message {
            body: MessageBody::from_parts(wire.kind, wire.content, wire.action)?,
            id: wire.id,
            conversation_id: wire.conversation_id,
            sender_id: wire.sender_id,
            receiver_id: wire.receiver_id,
            created_at: wire.created_at,
            read_at: wire.read_at,
        })
    }
}

impl From<Message> for WireMessage {
    fn from(message: Message) -> Self {
        let kind = message.body.kind();
        let (content, action) = match message.body {
            MessageBody::Text { content } => (content, None),
            MessageBody::System { content, action } => (content, Some(action.as_str().to_string())),
        };
        WireMessage {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content,
            kind,
            action,
            created_at: message.created_at,
            read_at: message.read_at,
        }
    }
}

// =============================================================================
// Request / response bodies
// =============================================================================

/// Body of `POST /chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveConversationRequest {
    #[serde(default)]
    pub counterpart_id: Option<String>,
}

/// Body of `POST /chat/message`. `kind` defaults to TEXT when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl SendMessageRequest {
    pub fn new(conversation_id: &str, receiver_id: &str, body: &MessageBody) -> Self {
        let (kind, action) = match body {
            MessageBody::Text { .. } => (None, None),
            MessageBody::System { action, .. } => {
                (Some(MessageKind::System), Some(action.as_str().to_string()))
            }
        };
        Self {
            conversation_id: conversation_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: body.content().to_string(),
            kind,
            action,
        }
    }

    pub fn body(&self) -> Result<MessageBody, MessageDecodeError> {
        MessageBody::from_parts(
            self.kind.unwrap_or(MessageKind::Text),
            self.content.clone(),
            self.action.clone(),
        )
    }
}

/// JSON error payload returned by the message service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(kind: &str, action: Option<&str>) -> serde_json::Value {
        let mut value = json!({
            "id": "m1",
            "conversationId": "c1",
            "senderId": "alice",
            "receiverId": "bob",
            "content": "hi",
            "kind": kind,
            "createdAt": "2026-01-05T10:00:00Z",
            "readAt": null,
        });
        if let Some(action) = action {
            value["action"] = json!(action);
        }
        value
    }

    #[test]
    fn test_ordered_pair_is_symmetric() {
        assert_eq!(ordered_pair("bob", "alice"), ("alice", "bob"));
        assert_eq!(ordered_pair("alice", "bob"), ("alice", "bob"));
    }

    #[test]
    fn test_counterpart_of() {
        let conversation = Conversation {
            id: "c1".to_string(),
            participant_a: "alice".to_string(),
            participant_b: "bob".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(conversation.counterpart_of("alice"), Some("bob"));
        assert_eq!(conversation.counterpart_of("bob"), Some("alice"));
        assert_eq!(conversation.counterpart_of("carol"), None);
        assert!(!conversation.involves("carol"));
    }

    #[test]
    fn test_text_message_decodes_to_text_body() {
        let message: Message = serde_json::from_value(wire("TEXT", None)).unwrap();
        assert_eq!(message.body, MessageBody::text("hi"));
        assert!(!message.is_read());
    }

    #[test]
    fn test_system_message_decodes_recognized_action() {
        let message: Message =
            serde_json::from_value(wire("SYSTEM", Some("PROCEED_TO_INTERVIEW"))).unwrap();
        assert_eq!(message.action(), Some(&SystemAction::ProceedToInterview));
        assert_eq!(message.kind(), MessageKind::System);
    }

    #[test]
    fn test_unknown_action_is_kept_unrecognized() {
        let message: Message = serde_json::from_value(wire("SYSTEM", Some("REVOKE"))).unwrap();
        let action = message.action().unwrap();
        assert!(!action.is_recognized());
        assert_eq!(action.as_str(), "REVOKE");
    }

    #[test]
    fn test_inconsistent_kind_and_action_rejected() {
        assert!(serde_json::from_value::<Message>(wire("SYSTEM", None)).is_err());
        assert!(
            serde_json::from_value::<Message>(wire("TEXT", Some("PROCEED_TO_INTERVIEW"))).is_err()
        );
        assert!(serde_json::from_value::<Message>(wire("VIDEO", None)).is_err());
    }

    #[test]
    fn test_message_serializes_camel_case_with_nullable_read_at() {
        let message: Message =
            serde_json::from_value(wire("SYSTEM", Some("PROCEED_TO_INTERVIEW"))).unwrap();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["conversationId"], "c1");
        assert_eq!(value["kind"], "SYSTEM");
        assert_eq!(value["action"], "PROCEED_TO_INTERVIEW");
        assert!(value["readAt"].is_null());
    }

    #[test]
    fn test_send_request_omits_kind_for_text() {
        let request = SendMessageRequest::new("c1", "bob", &MessageBody::text("Hello"));
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("kind").is_none());
        assert!(value.get("action").is_none());
        assert_eq!(request.body().unwrap(), MessageBody::text("Hello"));
    }

    #[test]
    fn test_send_request_carries_system_action() {
        let body = MessageBody::system(SystemAction::ProceedToInterview, "Please book a slot");
        let request = SendMessageRequest::new("c1", "bob", &body);
        assert_eq!(request.kind, Some(MessageKind::System));
        assert_eq!(request.action.as_deref(), Some("PROCEED_TO_INTERVIEW"));
        assert_eq!(request.body().unwrap(), body);
    }
}
