// ABOUTME: Platform-agnostic one-to-one chat core
// ABOUTME: Identity resolution, timelines, optimistic sends, workflow signals, read receipts

pub mod capability;
pub mod error;
pub mod interpreter;
pub mod model;
pub mod pipeline;
pub mod receipts;
pub mod resolver;
pub mod screen;
pub mod timeline;
pub mod transport;

pub use error::{ChatError, TransportError};

// Re-export core types for convenient access
pub use model::{
    // Identities
    Conversation, Participant, Role,
    // Messages
    Message, MessageBody, MessageKind, SystemAction,
    // Wire bodies
    ErrorBody, ResolveConversationRequest, SendMessageRequest,
};

pub use capability::{CapabilityLatch, CapabilityStore, FileCapabilityStore, MemoryCapabilityStore};
pub use interpreter::{RenderItem, SystemEventInterpreter};
pub use pipeline::{Composed, Reconciliation, SendOutcome, SendPipeline, SendState, SendTicket};
pub use receipts::ReadReceiptNotifier;
pub use resolver::IdentityResolver;
pub use screen::{ChatScreen, Notice, ScreenEvent};
pub use timeline::{LocalId, ProvisionalMessage, Timeline, TimelineEntry, TimelineStore};
pub use transport::{ChatTransport, CredentialSource, HttpTransport, StaticCredential};
