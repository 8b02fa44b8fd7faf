// ABOUTME: Bearer-token authentication for the chat API
// ABOUTME: Maps tokens from the configured participant directory to the calling participant

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use portal_chat_core::Participant;
use std::sync::Arc;

use crate::config::ParticipantConfig;
use crate::error::ApiError;

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Clone)]
struct Entry {
    participant: Participant,
    token: String,
}

/// Known participants and their bearer tokens
#[derive(Clone, Default)]
pub struct Directory {
    entries: Arc<Vec<Entry>>,
}

impl Directory {
    pub fn from_config(participants: &[ParticipantConfig]) -> Self {
        let entries = participants
            .iter()
            .map(|p| Entry {
                participant: Participant {
                    id: p.id.clone(),
                    display_name: if p.display_name.is_empty() {
                        p.id.clone()
                    } else {
                        p.display_name.clone()
                    },
                    role: p.role,
                },
                token: p.token.clone(),
            })
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, participant_id: &str) -> Option<&Participant> {
        self.entries
            .iter()
            .map(|e| &e.participant)
            .find(|p| p.id == participant_id)
    }

    /// Every entry is compared so lookup time does not depend on which token matched
    pub fn authenticate(&self, token: &str) -> Option<&Participant> {
        let mut found = None;
        for entry in self.entries.iter() {
            if constant_time_eq(token.as_bytes(), entry.token.as_bytes()) {
                found = Some(&entry.participant);
            }
        }
        found
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("participants", &self.entries.len())
            .finish()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware that resolves the caller and stores it as a request extension
pub async fn require_bearer(
    State(directory): State<Directory>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    let Some(token) = token else {
        tracing::warn!(path = %request.uri().path(), "Chat access denied: no bearer token");
        return Err(ApiError::Unauthorized);
    };

    let Some(participant) = directory.authenticate(token).cloned() else {
        tracing::warn!(path = %request.uri().path(), "Chat access denied: unknown token");
        return Err(ApiError::Unauthorized);
    };

    request.extensions_mut().insert(participant);
    Ok(next.run(request).await)
}
