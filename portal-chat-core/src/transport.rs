// ABOUTME: Transport client for the message service REST API
// ABOUTME: Defines the ChatTransport seam and its bearer-authenticated reqwest implementation

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;
use crate::model::{
    Conversation, ErrorBody, Message, Participant, ResolveConversationRequest, SendMessageRequest,
};

/// Request/response exchanges against the message service.
///
/// Implementations do not retry or cancel on their own; callers decide.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Identity bound to the credential in use (`GET /me`)
    async fn whoami(&self) -> Result<Participant, TransportError>;

    async fn resolve_conversation(&self, counterpart_id: &str)
        -> Result<Conversation, TransportError>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>, TransportError>;

    async fn send_message(&self, request: &SendMessageRequest) -> Result<Message, TransportError>;

    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>, TransportError>;

    async fn mark_read(&self, message_id: &str) -> Result<Message, TransportError>;
}

/// Source of the bearer token. The credential store itself lives outside the core.
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, typically read from config or environment.
#[derive(Clone)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

impl std::fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticCredential")
            .field(&self.0.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CredentialSource for StaticCredential {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpTransport {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            credentials,
        }
    }

    /// Build a transport whose requests time out after `timeout`.
    pub fn with_timeout(
        base_url: &str,
        credentials: Arc<dyn CredentialSource>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or(TransportError::MissingCredential)?;
        Ok(builder.bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = self.authorized(builder)?.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|body| body.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            tracing::debug!(status = status.as_u16(), message = %message, "Message service rejected request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        self.execute(self.client.post(self.url(path)).json(body))
            .await
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn whoami(&self) -> Result<Participant, TransportError> {
        self.execute(self.client.get(self.url("/me"))).await
    }

    async fn resolve_conversation(
        &self,
        counterpart_id: &str,
    ) -> Result<Conversation, TransportError> {
        let request = ResolveConversationRequest {
            counterpart_id: Some(counterpart_id.to_string()),
        };
        self.post("/chat", &request).await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, TransportError> {
        self.execute(self.client.get(self.url("/chat"))).await
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<Message, TransportError> {
        self.post("/chat/message", request).await
    }

    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>, TransportError> {
        let path = format!("/chat/{}/messages", conversation_id);
        self.execute(self.client.get(self.url(&path))).await
    }

    async fn mark_read(&self, message_id: &str) -> Result<Message, TransportError> {
        let path = format!("/chat/message/{}/read", message_id);
        self.execute(
            self.client
                .put(self.url(&path))
                .json(&serde_json::json!({})),
        )
        .await
    }
}
