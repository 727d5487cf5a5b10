//! Two-branch fan-out/fan-in over the insight and trait tasks.
//!
//! Both tasks read the same immutable request and settle their own slot of
//! [`GraphState`]. The merge runs only after both slots are settled, and reads
//! them in a fixed order, so the result does not depend on which branch
//! finished first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::{ModelBackend, OpenAiClient};
use crate::config::Config;
use crate::error::{AnalysisError, OrchestrationFailure, Result, TaskError, TaskFailure};
use crate::schemas::{AnalysisOutput, AnalysisRequest, InsightResult, TaskKind, TraitResult};
use crate::tasks::{InferenceTask, InsightTask, TaskTuning, TraitTask, run_task};

/// Timeouts and sampling for one orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    /// Bounded wait for a single backend reply.
    pub task_timeout: Duration,
    /// Bounded wait for the whole fan-out, barrier included.
    pub analysis_timeout: Duration,
    pub insight: TaskTuning,
    pub traits: TaskTuning,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_millis(30_000),
            analysis_timeout: Duration::from_millis(45_000),
            insight: TaskTuning {
                temperature: 0.7,
                max_tokens: 300,
            },
            traits: TaskTuning {
                temperature: 0.7,
                max_tokens: 400,
            },
        }
    }
}

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialized,
    Dispatched,
    AwaitingBoth,
    Merged { success: bool },
}

/// A write-once result slot.
#[derive(Debug)]
enum Slot<T> {
    Empty,
    Settled(std::result::Result<T, TaskError>),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Empty
    }
}

impl<T> Slot<T> {
    fn is_settled(&self) -> bool {
        matches!(self, Slot::Settled(_))
    }
}

/// Per-request intermediate state: the request plus one slot per task.
#[derive(Debug)]
pub struct GraphState {
    request: AnalysisRequest,
    insight: Slot<InsightResult>,
    traits: Slot<Vec<TraitResult>>,
    phase: Phase,
}

impl GraphState {
    pub fn new(request: AnalysisRequest) -> Self {
        Self {
            request,
            insight: Slot::Empty,
            traits: Slot::Empty,
            phase: Phase::Initialized,
        }
    }

    pub fn request(&self) -> &AnalysisRequest {
        &self.request
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self, next: Phase) {
        debug!(
            identifier = self.request.identifier(),
            from = ?self.phase,
            to = ?next,
            "analysis phase"
        );
        self.phase = next;
    }

    /// Settle the insight slot. Returns `false`, leaving the slot untouched,
    /// if it was already settled.
    pub fn settle_insight(&mut self, outcome: std::result::Result<InsightResult, TaskError>) -> bool {
        if self.insight.is_settled() {
            warn!(identifier = self.request.identifier(), "insight slot already settled");
            return false;
        }
        self.insight = Slot::Settled(outcome);
        true
    }

    /// Settle the trait slot. Returns `false`, leaving the slot untouched, if
    /// it was already settled.
    pub fn settle_traits(
        &mut self,
        outcome: std::result::Result<Vec<TraitResult>, TaskError>,
    ) -> bool {
        if self.traits.is_settled() {
            warn!(identifier = self.request.identifier(), "trait slot already settled");
            return false;
        }
        self.traits = Slot::Settled(outcome);
        true
    }

    pub fn is_settled(&self) -> bool {
        self.insight.is_settled() && self.traits.is_settled()
    }

    /// Combine both slots into the final result. Every failed task is
    /// reported, insight before trait; no partial output is ever returned.
    pub fn merge(&mut self) -> Result<AnalysisOutput> {
        if !self.is_settled() {
            return Err(AnalysisError::Internal {
                message: "merge attempted before both tasks settled".to_string(),
            });
        }

        let insight = std::mem::take(&mut self.insight);
        let traits = std::mem::take(&mut self.traits);

        let (Slot::Settled(insight), Slot::Settled(traits)) = (insight, traits) else {
            return Err(AnalysisError::Internal {
                message: "slot emptied during merge".to_string(),
            });
        };

        let merged: Result<AnalysisOutput> = match (insight, traits) {
            (Ok(insight), Ok(traits)) => Ok(AnalysisOutput {
                identifier: self.request.identifier().to_string(),
                insight,
                traits,
            }),
            (insight, traits) => {
                let mut failures = Vec::with_capacity(2);
                if let Err(error) = insight {
                    failures.push(TaskFailure {
                        task: TaskKind::Insight,
                        error,
                    });
                }
                if let Err(error) = traits {
                    failures.push(TaskFailure {
                        task: TaskKind::Trait,
                        error,
                    });
                }
                Err(OrchestrationFailure { failures }.into())
            }
        };

        self.advance(Phase::Merged {
            success: merged.is_ok(),
        });
        merged
    }
}

/// Runs both inference tasks for a request and merges their outcomes.
pub struct Orchestrator {
    backend: Arc<dyn ModelBackend>,
    insight: InsightTask,
    traits: TraitTask,
    settings: AnalysisSettings,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ModelBackend>, settings: AnalysisSettings) -> Self {
        Self {
            backend,
            insight: InsightTask::new(settings.insight),
            traits: TraitTask::new(settings.traits),
            settings,
        }
    }

    /// Orchestrator backed by the configured OpenAI-compatible endpoint.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend = OpenAiClient::new(&config.backend)?;
        Ok(Self::new(Arc::new(backend), config.analysis_settings()))
    }

    pub fn backend(&self) -> &dyn ModelBackend {
        self.backend.as_ref()
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Analyze one request.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutput> {
        self.analyze_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Analyze one request, abandoning both backend calls if `cancel` fires
    /// or the analysis timeout elapses before the barrier releases. Both cases
    /// fail with [`AnalysisError::Timeout`].
    pub async fn analyze_with_cancel(
        &self,
        request: AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<AnalysisOutput> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut state = GraphState::new(request);

        info!(
            %run_id,
            identifier = state.request().identifier(),
            model = self.backend.model(),
            "analysis started"
        );

        state.advance(Phase::Dispatched);
        state.advance(Phase::AwaitingBoth);

        let joined = {
            let request = state.request();
            let insight = self.branch(&self.insight, request, started);
            let traits = self.branch(&self.traits, request, started);
            let barrier = async { tokio::join!(insight, traits) };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AnalysisError::Timeout {
                    timeout_ms: started.elapsed().as_millis() as u64,
                    cancelled: true,
                }),
                settled = tokio::time::timeout(self.settings.analysis_timeout, barrier) => {
                    settled.map_err(|_| AnalysisError::Timeout {
                        timeout_ms: self.settings.analysis_timeout.as_millis() as u64,
                        cancelled: false,
                    })
                }
            }
        };

        let (insight, traits) = match joined {
            Ok(outcomes) => outcomes,
            Err(err) => {
                warn!(
                    %run_id,
                    identifier = state.request().identifier(),
                    error = %err,
                    "analysis abandoned before both tasks settled"
                );
                return Err(err);
            }
        };

        state.settle_insight(insight);
        state.settle_traits(traits);
        let merged = state.merge();

        match &merged {
            Ok(output) => info!(
                %run_id,
                identifier = %output.identifier,
                keywords = output.insight.keywords.len(),
                traits = output.traits.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "analysis complete"
            ),
            Err(err) => warn!(
                %run_id,
                identifier = state.request().identifier(),
                error = %err,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "analysis failed"
            ),
        }
        merged
    }

    async fn branch<T: InferenceTask>(
        &self,
        task: &T,
        request: &AnalysisRequest,
        started: Instant,
    ) -> std::result::Result<T::Output, TaskError> {
        let outcome = run_task(task, self.backend.as_ref(), request, self.settings.task_timeout).await;
        debug!(
            identifier = request.identifier(),
            task = task.kind().as_str(),
            ok = outcome.is_ok(),
            at_ms = started.elapsed().as_millis() as u64,
            "task settled"
        );
        outcome
    }
}
