use serde_json::Value;
use tracing::warn;

use crate::clients::Instruction;
use crate::prompts::{TRAIT_PROMPT, user_message};
use crate::schemas::{
    AnalysisRequest, SchemaViolation, TaskKind, TraitResult, duplicate_trait_names,
    validate_traits,
};
use crate::tasks::{InferenceTask, TaskTuning};

/// Two or three named traits, each scored in [-1, 1] with a reason.
#[derive(Debug, Clone)]
pub struct TraitTask {
    tuning: TaskTuning,
}

impl TraitTask {
    pub fn new(tuning: TaskTuning) -> Self {
        Self { tuning }
    }
}

impl Default for TraitTask {
    fn default() -> Self {
        Self::new(TaskTuning {
            temperature: 0.7,
            max_tokens: 400,
        })
    }
}

impl InferenceTask for TraitTask {
    type Output = Vec<TraitResult>;

    fn kind(&self) -> TaskKind {
        TaskKind::Trait
    }

    fn instruction(&self, request: &AnalysisRequest) -> Instruction {
        Instruction {
            task: TaskKind::Trait,
            prompt_id: TRAIT_PROMPT.id,
            system: TRAIT_PROMPT.system.to_string(),
            user: user_message(request, &TRAIT_PROMPT),
            max_tokens: self.tuning.max_tokens,
            temperature: self.tuning.temperature,
            structured: true,
        }
    }

    fn validate(&self, payload: &Value) -> Result<Vec<TraitResult>, SchemaViolation> {
        let traits = validate_traits(payload)?;
        // Duplicates are tolerated, but worth seeing in the logs.
        let dups = duplicate_trait_names(&traits);
        if !dups.is_empty() {
            warn!(names = ?dups, "trait response repeats trait names");
        }
        Ok(traits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instruction_is_structured() {
        let req = AnalysisRequest::new("u1", "q?", "a.").unwrap();
        let instr = TraitTask::default().instruction(&req);
        assert!(instr.structured);
        assert_eq!(instr.task, TaskKind::Trait);
        assert_eq!(instr.max_tokens, 400);
    }

    #[test]
    fn test_duplicate_names_are_accepted() {
        let traits = TraitTask::default()
            .validate(&json!({"traits": [
                {"name": "social_energy", "score": 0.2, "reason": "r"},
                {"name": "social_energy", "score": 0.4, "reason": "r"}
            ]}))
            .unwrap();
        assert_eq!(traits.len(), 2);
    }
}
