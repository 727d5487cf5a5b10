use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::schemas::TaskKind;

/// One self-contained request to the model. No conversation state travels
/// with it; two instructions never share a session.
#[derive(Debug, Clone, Serialize)]
pub struct Instruction {
    pub task: TaskKind,
    /// Identifies the prompt wording, for logs.
    pub prompt_id: &'static str,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the backend for machine-parseable JSON instead of free text.
    pub structured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("model backend unavailable: {message}")]
    Unavailable { message: String },
    #[error("model backend timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Send one instruction and return the raw completion text.
    async fn complete(&self, instruction: &Instruction) -> Result<String, BackendError>;

    /// Model identifier, for logs and the info endpoint.
    fn model(&self) -> &str;
}
