//! Request and result shapes for onboarding analysis.
//!
//! Everything the model produces passes through [`validate_insight`] or
//! [`validate_traits`] before it becomes a typed record. Validation is pure:
//! it never coerces (a score of `"0.9"` is a type mismatch, not a float) and
//! never clamps (a score of `1.5` is out of range, not `1.0`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const MIN_KEYWORDS: usize = 2;
pub const MAX_KEYWORDS: usize = 3;
pub const MIN_TRAITS: usize = 2;
pub const MAX_TRAITS: usize = 3;
pub const SCORE_MIN: f64 = -1.0;
pub const SCORE_MAX: f64 = 1.0;

/// Which half of the analysis a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Insight,
    Trait,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Insight => "insight",
            TaskKind::Trait => "trait",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Insight => f.write_str("Insight"),
            TaskKind::Trait => f.write_str("Trait"),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// Rejected request shape, detected before any backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct InputInvalid {
    pub field: &'static str,
    pub reason: String,
}

/// A validated question/answer pair. Fields are private so a constructed
/// request cannot be altered afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    #[serde(rename = "user_id")]
    identifier: String,
    question: String,
    answer: String,
}

impl AnalysisRequest {
    pub fn new(
        identifier: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<Self, InputInvalid> {
        let identifier = identifier.into();
        let question = question.into();
        let answer = answer.into();

        require_text("user_id", &identifier)?;
        require_text("question", &question)?;
        require_text("answer", &answer)?;

        Ok(Self {
            identifier,
            question,
            answer,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), InputInvalid> {
    if value.trim().is_empty() {
        return Err(InputInvalid {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Raw ingress body as sent by HTTP and CLI callers. Every field is optional
/// here so that a missing field is reported as [`InputInvalid`] rather than a
/// deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisRequestBody {
    #[serde(default, alias = "identifier")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

impl TryFrom<AnalysisRequestBody> for AnalysisRequest {
    type Error = InputInvalid;

    fn try_from(body: AnalysisRequestBody) -> Result<Self, Self::Error> {
        let missing = |field: &'static str| InputInvalid {
            field,
            reason: "field required".to_string(),
        };
        let identifier = body.user_id.ok_or_else(|| missing("user_id"))?;
        let question = body.question.ok_or_else(|| missing("question"))?;
        let answer = body.answer.ok_or_else(|| missing("answer"))?;
        AnalysisRequest::new(identifier, question, answer)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Summary and key phrases produced by the insight task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResult {
    pub summary: String,
    pub keywords: Vec<String>,
}

/// A single scored trait produced by the trait task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitResult {
    pub name: String,
    pub score: f64,
    pub reason: String,
}

/// Merged output. Only produced when both tasks succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    #[serde(rename = "user_id", alias = "identifier")]
    pub identifier: String,
    pub insight: InsightResult,
    pub traits: Vec<TraitResult>,
}

// ============================================================================
// Validation
// ============================================================================

/// The rule a field broke.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Missing,
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    OutOfRange {
        value: f64,
        min: f64,
        max: f64,
    },
    Empty,
    Count {
        min: usize,
        max: usize,
        actual: usize,
    },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Missing => f.write_str("required field is missing"),
            Constraint::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Constraint::OutOfRange { value, min, max } => {
                write!(f, "value {value} is outside [{min}, {max}]")
            }
            Constraint::Empty => f.write_str("must not be empty"),
            Constraint::Count { min, max, actual } => {
                write!(f, "expected {min} to {max} items, found {actual}")
            }
        }
    }
}

/// A parsed payload that does not fit the result schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("`{field}` {constraint}")]
pub struct SchemaViolation {
    pub field: String,
    pub constraint: Constraint,
}

impl SchemaViolation {
    fn new(field: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            field: field.into(),
            constraint,
        }
    }
}

/// Validate an insight payload: `{"summary": str, "keywords": [str; 2..=3]}`.
pub fn validate_insight(payload: &Value) -> Result<InsightResult, SchemaViolation> {
    let obj = expect_object(payload, "$")?;
    let summary = expect_text(required(obj, "summary", "summary")?, "summary")?;

    let keywords = expect_array(required(obj, "keywords", "keywords")?, "keywords")?;
    expect_count(keywords.len(), MIN_KEYWORDS, MAX_KEYWORDS, "keywords")?;
    let keywords = keywords
        .iter()
        .enumerate()
        .map(|(i, kw)| expect_text(kw, &format!("keywords[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InsightResult { summary, keywords })
}

/// Validate a trait payload: `{"traits": [{"name", "score", "reason"}; 2..=3]}`.
pub fn validate_traits(payload: &Value) -> Result<Vec<TraitResult>, SchemaViolation> {
    let obj = expect_object(payload, "$")?;
    let traits = expect_array(required(obj, "traits", "traits")?, "traits")?;
    expect_count(traits.len(), MIN_TRAITS, MAX_TRAITS, "traits")?;

    traits
        .iter()
        .enumerate()
        .map(|(i, entry)| validate_trait(entry, &format!("traits[{i}]")))
        .collect()
}

fn validate_trait(entry: &Value, path: &str) -> Result<TraitResult, SchemaViolation> {
    let obj = expect_object(entry, path)?;

    let name_path = format!("{path}.name");
    let name = expect_text(required(obj, "name", &name_path)?, &name_path)?;

    let score_path = format!("{path}.score");
    let score = match required(obj, "score", &score_path)? {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            SchemaViolation::new(
                &score_path,
                Constraint::TypeMismatch {
                    expected: "number",
                    found: "non-finite number",
                },
            )
        })?,
        other => {
            return Err(SchemaViolation::new(
                &score_path,
                Constraint::TypeMismatch {
                    expected: "number",
                    found: json_type_name(other),
                },
            ));
        }
    };
    if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
        return Err(SchemaViolation::new(
            &score_path,
            Constraint::OutOfRange {
                value: score,
                min: SCORE_MIN,
                max: SCORE_MAX,
            },
        ));
    }

    let reason_path = format!("{path}.reason");
    let reason = expect_text(required(obj, "reason", &reason_path)?, &reason_path)?;

    Ok(TraitResult {
        name,
        score,
        reason,
    })
}

/// Names that occur more than once in one trait list, in first-seen order.
pub fn duplicate_trait_names(traits: &[TraitResult]) -> Vec<&str> {
    let mut dups: Vec<&str> = Vec::new();
    for (i, t) in traits.iter().enumerate() {
        let seen_before = traits[..i].iter().any(|p| p.name == t.name);
        if seen_before && !dups.contains(&t.name.as_str()) {
            dups.push(&t.name);
        }
    }
    dups
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Value, SchemaViolation> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(SchemaViolation::new(path, Constraint::Missing)),
        Some(v) => Ok(v),
    }
}

fn expect_object<'a>(
    value: &'a Value,
    path: &str,
) -> Result<&'a Map<String, Value>, SchemaViolation> {
    value.as_object().ok_or_else(|| {
        SchemaViolation::new(
            path,
            Constraint::TypeMismatch {
                expected: "object",
                found: json_type_name(value),
            },
        )
    })
}

fn expect_array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, SchemaViolation> {
    value.as_array().ok_or_else(|| {
        SchemaViolation::new(
            path,
            Constraint::TypeMismatch {
                expected: "array",
                found: json_type_name(value),
            },
        )
    })
}

fn expect_text(value: &Value, path: &str) -> Result<String, SchemaViolation> {
    let text = value.as_str().ok_or_else(|| {
        SchemaViolation::new(
            path,
            Constraint::TypeMismatch {
                expected: "string",
                found: json_type_name(value),
            },
        )
    })?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SchemaViolation::new(path, Constraint::Empty));
    }
    Ok(trimmed.to_string())
}

fn expect_count(actual: usize, min: usize, max: usize, path: &str) -> Result<(), SchemaViolation> {
    if (min..=max).contains(&actual) {
        Ok(())
    } else {
        Err(SchemaViolation::new(
            path,
            Constraint::Count { min, max, actual },
        ))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
