//! Domain-specific error types for ember-insight

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::clients::BackendError;
use crate::schemas::{InputInvalid, SchemaViolation, TaskKind};

/// Terminal failure of a single inference task.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("backend timed out after {timeout_ms}ms")]
    BackendTimeout { timeout_ms: u64 },

    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("schema violation: {0}")]
    SchemaViolation(#[from] SchemaViolation),
}

/// Stable, serializable name for each [`TaskError`] variant. Serializes
/// exactly as [`FailureKind::as_str`] spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    BackendUnavailable,
    BackendTimeout,
    MalformedResponse,
    SchemaViolation,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::BackendUnavailable => "BackendUnavailable",
            FailureKind::BackendTimeout => "BackendTimeout",
            FailureKind::MalformedResponse => "MalformedResponse",
            FailureKind::SchemaViolation => "SchemaViolation",
        }
    }
}

impl TaskError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::BackendUnavailable { .. } => FailureKind::BackendUnavailable,
            TaskError::BackendTimeout { .. } => FailureKind::BackendTimeout,
            TaskError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            TaskError::SchemaViolation(_) => FailureKind::SchemaViolation,
        }
    }
}

impl From<BackendError> for TaskError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable { message } => TaskError::BackendUnavailable { message },
            BackendError::Timeout { timeout_ms } => TaskError::BackendTimeout { timeout_ms },
        }
    }
}

/// A task failure tagged with the task that produced it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{task}/{kind} ({error})", kind = .error.kind().as_str())]
pub struct TaskFailure {
    pub task: TaskKind,
    pub error: TaskError,
}

/// One or two task failures from a single analysis, in task order.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("analysis failed: {}", describe(.failures))]
pub struct OrchestrationFailure {
    pub failures: Vec<TaskFailure>,
}

fn describe(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl OrchestrationFailure {
    /// Failure kind recorded for `task`, if that task failed.
    pub fn kind_of(&self, task: TaskKind) -> Option<FailureKind> {
        self.failures
            .iter()
            .find(|f| f.task == task)
            .map(|f| f.error.kind())
    }

    pub fn failed_tasks(&self) -> Vec<TaskKind> {
        self.failures.iter().map(|f| f.task).collect()
    }
}

fn timeout_detail(timeout_ms: &u64, cancelled: &bool) -> String {
    if *cancelled {
        format!("analysis cancelled after {timeout_ms}ms before both tasks settled")
    } else {
        format!("analysis timed out after {timeout_ms}ms")
    }
}

/// Everything `analyze` can return instead of an output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InputInvalid(#[from] InputInvalid),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationFailure),

    /// The barrier did not release in time, either because the analysis
    /// timeout elapsed or because the caller cancelled. `timeout_ms` is the
    /// configured limit, or the time waited when `cancelled`.
    #[error("{}", timeout_detail(.timeout_ms, .cancelled))]
    Timeout { timeout_ms: u64, cancelled: bool },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AnalysisError {
    /// Client-side errors are the caller's fault; everything else is ours.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AnalysisError::InputInvalid(_))
    }

    /// JSON error body shared by the HTTP and CLI shells. `verbose` adds the
    /// underlying messages (model excerpts, transport details).
    pub fn to_json(&self, verbose: bool) -> Value {
        match self {
            AnalysisError::InputInvalid(err) => json!({
                "detail": "Validation error",
                "errors": [{ "field": err.field, "message": err.reason }]
            }),
            AnalysisError::Orchestration(failure) => {
                let failures: Vec<Value> = failure
                    .failures
                    .iter()
                    .map(|f| {
                        let mut entry = json!({
                            "task": f.task,
                            "kind": f.error.kind(),
                        });
                        if verbose {
                            entry["message"] = json!(f.error.to_string());
                        }
                        entry
                    })
                    .collect();
                json!({ "detail": failure.to_string(), "failures": failures })
            }
            AnalysisError::Timeout {
                timeout_ms,
                cancelled,
            } => json!({
                "detail": self.to_string(),
                "kind": "Timeout",
                "timeout_ms": timeout_ms,
                "cancelled": cancelled
            }),
            AnalysisError::Internal { .. } => {
                let detail = if verbose {
                    self.to_string()
                } else {
                    "internal error".to_string()
                };
                json!({ "detail": detail, "kind": "Internal" })
            }
        }
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
