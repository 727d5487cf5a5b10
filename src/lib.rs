pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod prompts;
pub mod schemas;
pub mod tasks;
pub mod utils;

pub use config::Config;
pub use error::{AnalysisError, FailureKind, OrchestrationFailure, TaskError, TaskFailure};
pub use orchestrator::{AnalysisSettings, GraphState, Orchestrator, Phase};
pub use schemas::{AnalysisOutput, AnalysisRequest, InsightResult, TaskKind, TraitResult};

/// Install the global tracing subscriber. Logs go to stderr so the CLI's
/// stdout carries only the analysis JSON. `RUST_LOG` wins when set.
pub fn init_tracing(debug: bool) {
    let default = if debug {
        "ember_insight=debug,tower_http=debug"
    } else {
        "ember_insight=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
