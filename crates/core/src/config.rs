use serde::Deserialize;

use crate::error::{SplitflowError, SplitflowResult};
use crate::types::MAX_REPORT_SAMPLE_SIZE;

/// Root application configuration. Loaded from environment variables
/// with the prefix `SPLITFLOW__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Allocation engine tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Exploration rate for epsilon-greedy allocation. Must lie in [0, 1].
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Strategy applied when a variant request does not name one.
    #[serde(default = "default_strategy")]
    pub default_strategy: String,
    /// Monte Carlo draws per posterior when building stats reports.
    #[serde(default = "default_report_sample_size")]
    pub report_sample_size: usize,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_epsilon() -> f64 {
    0.1
}
fn default_strategy() -> String {
    "thompson".to_string()
}
fn default_report_sample_size() -> usize {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            default_strategy: default_strategy(),
            report_sample_size: default_report_sample_size(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, e.g.
    /// `SPLITFLOW__ENGINE__EPSILON=0.05` or `SPLITFLOW__API__HTTP_PORT=8081`.
    pub fn load() -> SplitflowResult<Self> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SPLITFLOW")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder
            .build()
            .map_err(|e| SplitflowError::Config(e.to_string()))?;
        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| SplitflowError::Config(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    /// Rejects out-of-domain values before anything starts serving.
    pub fn validate(&self) -> SplitflowResult<()> {
        if !(0.0..=1.0).contains(&self.engine.epsilon) {
            return Err(SplitflowError::Config(format!(
                "engine.epsilon must lie in [0, 1], got {}",
                self.engine.epsilon
            )));
        }
        if self.engine.report_sample_size == 0
            || self.engine.report_sample_size > MAX_REPORT_SAMPLE_SIZE
        {
            return Err(SplitflowError::Config(format!(
                "engine.report_sample_size must lie in [1, {MAX_REPORT_SAMPLE_SIZE}], got {}",
                self.engine.report_sample_size
            )));
        }
        Ok(())
    }
}
