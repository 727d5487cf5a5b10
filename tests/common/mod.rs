//! Shared fixtures: a scripted in-memory model backend and canned replies.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ember_insight::clients::{BackendError, Instruction, ModelBackend};
use ember_insight::{AnalysisRequest, AnalysisSettings, Orchestrator, TaskKind};

/// What the backend does when it receives an instruction for one task.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    DelayedReply(Duration, String),
    Fail(BackendError),
    Hang,
}

pub struct ScriptedBackend {
    scripts: HashMap<TaskKind, Script>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(insight: Script, traits: Script) -> Self {
        let mut scripts = HashMap::new();
        scripts.insert(TaskKind::Insight, insight);
        scripts.insert(TaskKind::Trait, traits);
        Self {
            scripts,
            calls: AtomicUsize::new(0),
        }
    }

    /// Both tasks answer immediately with valid payloads.
    pub fn happy() -> Self {
        Self::new(
            Script::Reply(INSIGHT_OK.to_string()),
            Script::Reply(TRAITS_OK.to_string()),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(&self, instruction: &Instruction) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(&instruction.task)
            .cloned()
            .unwrap_or(Script::Hang);
        match script {
            Script::Reply(text) => Ok(text),
            Script::DelayedReply(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Script::Fail(err) => Err(err),
            Script::Hang => std::future::pending().await,
        }
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

pub const INSIGHT_OK: &str = r#"{
  "summary": "The user wants a committed, long-term relationship.",
  "keywords": ["serious relationship", "commitment", "long-term"]
}"#;

pub const TRAITS_OK: &str = r#"{
  "traits": [
    {"name": "relationship_goal_readiness", "score": 0.9, "reason": "Clearly states a serious goal."},
    {"name": "openness_to_commitment", "score": 0.85, "reason": "Wants something lasting."}
  ]
}"#;

pub fn scenario_a() -> AnalysisRequest {
    AnalysisRequest::new("u1", "What are you looking for?", "A serious relationship")
        .expect("valid request")
}

/// Short timeouts so timeout scenarios finish quickly.
pub fn fast_settings() -> AnalysisSettings {
    AnalysisSettings {
        task_timeout: Duration::from_millis(200),
        analysis_timeout: Duration::from_millis(1_000),
        ..AnalysisSettings::default()
    }
}

pub fn orchestrator(backend: Arc<ScriptedBackend>, settings: AnalysisSettings) -> Orchestrator {
    Orchestrator::new(backend, settings)
}
