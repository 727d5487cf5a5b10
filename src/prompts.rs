//! Instruction text for the two inference tasks.
//!
//! Each prompt carries a stable id so log lines can say which wording a
//! result came from when the text is revised.

use crate::schemas::AnalysisRequest;

/// System prompt plus the closing directive appended to the user message.
#[derive(Debug, Clone, Copy)]
pub struct TaskPrompt {
    pub id: &'static str,
    pub system: &'static str,
    pub directive: &'static str,
}

pub const INSIGHT_PROMPT: TaskPrompt = TaskPrompt {
    id: "insight-summary-v1",
    system: r#"You analyze answers given during the onboarding flow of a dating app.

Read the user's answer to the onboarding question and produce:
1. A short, friendly summary of what the user wants (one or two sentences).
2. Two or three key phrases that capture the answer.

Be warm and concrete. Describe what the user is actually asking for.

Respond with a single JSON object and nothing else, in exactly this shape:
{
  "summary": "A brief, friendly summary of what the user is looking for",
  "keywords": ["phrase one", "phrase two", "phrase three"]
}"#,
    directive: "Summarize this answer and list its key phrases.",
};

pub const TRAIT_PROMPT: TaskPrompt = TaskPrompt {
    id: "trait-scores-v1",
    system: r#"You score personality and dating traits from onboarding answers in a dating app.

Pick the two or three traits MOST relevant to what the user said. For each trait give:
- "name": a snake_case label (for example relationship_goal_readiness, openness_to_commitment,
  social_energy, emotional_availability, self_awareness)
- "score": a number from -1.0 to 1.0, where -1.0 is strongly low, 0.0 is neutral or unclear
  and 1.0 is strongly high. The score must be a JSON number, never a string.
- "reason": one sentence explaining the score

Respond with a single JSON object and nothing else, in exactly this shape:
{
  "traits": [
    {"name": "trait_name", "score": 0.8, "reason": "One sentence explanation"},
    {"name": "another_trait", "score": -0.2, "reason": "One sentence explanation"}
  ]
}"#,
    directive: "Score the most relevant personality and dating traits for this answer.",
};

/// User message shared by both tasks; only the closing directive differs.
pub fn user_message(request: &AnalysisRequest, prompt: &TaskPrompt) -> String {
    format!(
        "Onboarding question: {}\n\nUser's answer: {}\n\n{}",
        request.question().trim(),
        request.answer().trim(),
        prompt.directive
    )
}
