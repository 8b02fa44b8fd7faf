// ABOUTME: Error taxonomy for the chat core
// ABOUTME: Transport failures are converted into chat errors at each operation boundary

use thiserror::Error;

/// Failure of a single request/response exchange with the message service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("No credential available for the message service")]
    MissingCredential,

    #[error("Request failed: {0}")]
    Network(String),

    #[error("Service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Could not decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Decode(e.to_string())
    }
}

/// Errors surfaced by chat operations. Local validation errors never reach the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Counterpart identity is missing")]
    IdentityMissing,

    #[error("Cannot open a conversation with yourself")]
    SelfConversation,

    #[error("Message content is empty")]
    EmptyContent,

    #[error("Unsupported system action: {0}")]
    UnsupportedAction(String),

    #[error("Conversation unavailable: {0}")]
    ConversationUnavailable(#[source] TransportError),

    #[error("Message could not be sent: {0}")]
    SendFailed(#[source] TransportError),

    #[error("Read acknowledgment failed: {0}")]
    ReadAckFailed(#[source] TransportError),
}

impl ChatError {
    /// Short stable name for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IdentityMissing => "identity_missing",
            Self::SelfConversation => "self_conversation",
            Self::EmptyContent => "empty_content",
            Self::UnsupportedAction(_) => "unsupported_action",
            Self::ConversationUnavailable(_) => "conversation_unavailable",
            Self::SendFailed(_) => "send_failed",
            Self::ReadAckFailed(_) => "read_ack_failed",
        }
    }

    /// Validation errors are fatal to the caller; transport errors may be retried by the user.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConversationUnavailable(_) | Self::SendFailed(_) | Self::ReadAckFailed(_)
        )
    }
}
