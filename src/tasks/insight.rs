use serde_json::Value;

use crate::clients::Instruction;
use crate::prompts::{INSIGHT_PROMPT, user_message};
use crate::schemas::{AnalysisRequest, InsightResult, SchemaViolation, TaskKind, validate_insight};
use crate::tasks::{InferenceTask, TaskTuning};

/// Summary plus two or three key phrases.
#[derive(Debug, Clone)]
pub struct InsightTask {
    tuning: TaskTuning,
}

impl InsightTask {
    pub fn new(tuning: TaskTuning) -> Self {
        Self { tuning }
    }
}

impl Default for InsightTask {
    fn default() -> Self {
        Self::new(TaskTuning {
            temperature: 0.7,
            max_tokens: 300,
        })
    }
}

impl InferenceTask for InsightTask {
    type Output = InsightResult;

    fn kind(&self) -> TaskKind {
        TaskKind::Insight
    }

    fn instruction(&self, request: &AnalysisRequest) -> Instruction {
        Instruction {
            task: TaskKind::Insight,
            prompt_id: INSIGHT_PROMPT.id,
            system: INSIGHT_PROMPT.system.to_string(),
            user: user_message(request, &INSIGHT_PROMPT),
            max_tokens: self.tuning.max_tokens,
            temperature: self.tuning.temperature,
            structured: true,
        }
    }

    fn validate(&self, payload: &Value) -> Result<InsightResult, SchemaViolation> {
        validate_insight(payload)
    }
}
