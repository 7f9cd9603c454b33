use async_trait::async_trait;
use serde::Serialize;

use crate::matching::MatchResult;

#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailDigest {
    /// Always "pattern_match"; the delivery side routes templates on it.
    pub kind: String,
    pub matches: Vec<MatchResult>,
}

impl EmailDigest {
    pub fn pattern_match(matches: Vec<MatchResult>) -> Self {
        Self {
            kind: "pattern_match".into(),
            matches,
        }
    }
}

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notify: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Fire-and-forget from the engine's perspective; the transports behind
/// these seams are external collaborators.
#[async_trait]
pub trait PushSender: Send + Sync {
    fn name(&self) -> &str;
    async fn send_push(&self, owner: &str, payload: &PushPayload) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    fn name(&self) -> &str;
    async fn send_email(&self, owner: &str, digest: &EmailDigest) -> Result<(), NotifyError>;
}
