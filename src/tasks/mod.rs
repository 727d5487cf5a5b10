//! The two inference tasks and the shared routine that runs either one.
//!
//! A task builds exactly one [`Instruction`], makes exactly one backend call,
//! and turns the reply into a validated record or a [`TaskError`]. Retries are
//! the backend client's business, never the task's.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use crate::clients::{Instruction, ModelBackend};
use crate::error::TaskError;
use crate::schemas::{AnalysisRequest, SchemaViolation, TaskKind};
use crate::utils::truncate_snippet;

pub mod insight;
pub mod traits;

pub use insight::InsightTask;
pub use traits::TraitTask;

/// Sampling knobs shared by both tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskTuning {
    pub temperature: f32,
    pub max_tokens: u32,
}

pub trait InferenceTask: Send + Sync {
    type Output: Send;

    fn kind(&self) -> TaskKind;

    /// Build the structured-output instruction for `request`.
    fn instruction(&self, request: &AnalysisRequest) -> Instruction;

    /// Turn parsed JSON into the task's record.
    fn validate(&self, payload: &Value) -> Result<Self::Output, SchemaViolation>;
}

/// Run `task` once against `backend`, bounded by `timeout`.
pub async fn run_task<T: InferenceTask>(
    task: &T,
    backend: &dyn ModelBackend,
    request: &AnalysisRequest,
    timeout: Duration,
) -> Result<T::Output, TaskError> {
    let kind = task.kind();
    let instruction = task.instruction(request);
    let started = Instant::now();

    let raw = match tokio::time::timeout(timeout, backend.complete(&instruction)).await {
        Ok(reply) => reply?,
        Err(_) => {
            return Err(TaskError::BackendTimeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
    };

    debug!(
        identifier = request.identifier(),
        task = kind.as_str(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        chars = raw.len(),
        "backend replied"
    );

    let payload = parse_structured(&raw)?;
    Ok(task.validate(&payload)?)
}

/// Parse raw completion text as JSON. Anything that is not JSON is a
/// malformed response, including an empty reply.
pub fn parse_structured(raw: &str) -> Result<Value, TaskError> {
    serde_json::from_str(raw.trim()).map_err(|e| TaskError::MalformedResponse {
        message: format!(
            "{} (response began: {:?})",
            e,
            truncate_snippet(raw.trim(), 80)
        ),
    })
}
