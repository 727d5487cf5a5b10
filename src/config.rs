use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::orchestrator::AnalysisSettings;
use crate::tasks::TaskTuning;

/// Main configuration structure loaded from ember_insight.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub backend: BackendConfig,
    pub analysis: AnalysisConfig,
    pub server: ServerConfig,
}

/// Application metadata surfaced by the info endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    /// Include underlying failure messages in error bodies
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Ember Date Onboarding Analysis".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            debug: false,
        }
    }
}

/// Model backend endpoint and credentials
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Only ever read from the environment, never from or into TOML
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Per-HTTP-attempt timeout
    pub request_timeout_ms: u64,
    /// Retries for transport errors, 429 and 5xx; timeouts are never retried
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            request_timeout_ms: 12_000,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

/// Timeouts and sampling for the two inference tasks
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub task_timeout_ms: u64,
    pub analysis_timeout_ms: u64,
    pub temperature: f32,
    pub insight_max_tokens: u32,
    pub trait_max_tokens: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            task_timeout_ms: 30_000,
            analysis_timeout_ms: 45_000,
            temperature: 0.7,
            insight_max_tokens: 300,
            trait_max_tokens: 400,
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses EMBER_CONFIG or defaults to "ember_insight.toml".
    pub fn load() -> anyhow::Result<Self> {
        // 1) EMBER_ENV_FILE if set, 2) ./.env
        if let Ok(env_path) = std::env::var("EMBER_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
        }

        let config_path =
            std::env::var("EMBER_CONFIG").unwrap_or_else(|_| "ember_insight.toml".to_string());

        let mut config = Self::from_file(Path::new(&config_path))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file, falling back to defaults when it cannot be
    /// read. A file that exists but does not parse is an error.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                tracing::warn!(
                    "Config file {} could not be read ({}), using defaults",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment-style overrides (env-first). `lookup` is
    /// `std::env::var` in production and a map in tests.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parsed = |key: &str| -> Option<String> {
            let value = lookup(key)?;
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        if let Some(key) = parsed("OPENAI_API_KEY") {
            self.backend.api_key = Some(key);
        }
        if let Some(model) = parsed("OPENAI_MODEL") {
            self.backend.model = model;
        }
        if let Some(url) = parsed("OPENAI_BASE_URL") {
            self.backend.base_url = url;
        }
        override_parsed(
            &mut self.backend.request_timeout_ms,
            parsed("EMBER_REQUEST_TIMEOUT_MS"),
            "EMBER_REQUEST_TIMEOUT_MS",
        );
        override_parsed(
            &mut self.backend.max_retries,
            parsed("EMBER_BACKEND_RETRIES"),
            "EMBER_BACKEND_RETRIES",
        );
        override_parsed(
            &mut self.analysis.task_timeout_ms,
            parsed("EMBER_TASK_TIMEOUT_MS"),
            "EMBER_TASK_TIMEOUT_MS",
        );
        override_parsed(
            &mut self.analysis.analysis_timeout_ms,
            parsed("EMBER_ANALYSIS_TIMEOUT_MS"),
            "EMBER_ANALYSIS_TIMEOUT_MS",
        );
        override_parsed(
            &mut self.analysis.temperature,
            parsed("EMBER_TEMPERATURE"),
            "EMBER_TEMPERATURE",
        );
        override_parsed(
            &mut self.server.http_bind,
            parsed("EMBER_HTTP_BIND"),
            "EMBER_HTTP_BIND",
        );

        if let Some(debug) = parsed("EMBER_DEBUG") {
            self.app.debug = debug == "1" || debug.eq_ignore_ascii_case("true");
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend.api_key.is_none() {
            anyhow::bail!("OPENAI_API_KEY is not set");
        }
        if self.backend.model.trim().is_empty() {
            anyhow::bail!("backend.model must not be empty");
        }
        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            anyhow::bail!(
                "backend.base_url '{}' must start with http:// or https://",
                self.backend.base_url
            );
        }
        if self.backend.request_timeout_ms == 0 {
            anyhow::bail!("backend.request_timeout_ms must be > 0");
        }
        if self.backend.max_retries > 5 {
            anyhow::bail!("backend.max_retries must be at most 5");
        }
        if self.analysis.task_timeout_ms == 0 || self.analysis.analysis_timeout_ms == 0 {
            anyhow::bail!("analysis timeouts must be > 0");
        }
        if self.analysis.task_timeout_ms > self.analysis.analysis_timeout_ms {
            anyhow::bail!(
                "analysis.task_timeout_ms ({}) must not exceed analysis.analysis_timeout_ms ({})",
                self.analysis.task_timeout_ms,
                self.analysis.analysis_timeout_ms
            );
        }
        if self.backend.max_retries > 0
            && self.first_retry_budget_ms() > self.analysis.task_timeout_ms
        {
            anyhow::bail!(
                "two backend attempts plus backoff ({}ms) must fit in analysis.task_timeout_ms ({}); \
                 lower backend.request_timeout_ms or set backend.max_retries = 0",
                self.first_retry_budget_ms(),
                self.analysis.task_timeout_ms
            );
        }
        if !(0.0..=2.0).contains(&self.analysis.temperature) {
            anyhow::bail!("analysis.temperature must be between 0.0 and 2.0");
        }
        if self.analysis.insight_max_tokens == 0 || self.analysis.trait_max_tokens == 0 {
            anyhow::bail!("max token limits must be > 0");
        }
        Ok(())
    }

    /// Worst case for a failed attempt followed by one retry. Later retries
    /// may still run past the task timeout; that surfaces as BackendTimeout.
    fn first_retry_budget_ms(&self) -> u64 {
        self.backend
            .request_timeout_ms
            .saturating_mul(2)
            .saturating_add(self.backend.retry_delay_ms)
    }

    /// Convenience: snapshot orchestrator settings
    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            task_timeout: Duration::from_millis(self.analysis.task_timeout_ms),
            analysis_timeout: Duration::from_millis(self.analysis.analysis_timeout_ms),
            insight: TaskTuning {
                temperature: self.analysis.temperature,
                max_tokens: self.analysis.insight_max_tokens,
            },
            traits: TaskTuning {
                temperature: self.analysis.temperature,
                max_tokens: self.analysis.trait_max_tokens,
            },
        }
    }
}

fn override_parsed<T: FromStr>(slot: &mut T, value: Option<String>, key: &str) {
    let Some(raw) = value else { return };
    match raw.parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!("Ignoring unparseable {}={}", key, raw),
    }
}
