use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

mod loader;
mod logging;

pub use loader::{load_config_from, ConfigError, ConfigLoader};
pub use logging::setup_logging;

pub type AppConfig = TtsJobConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TtsJobConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    #[validate(range(min = 1024))]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    #[serde(default)]
    #[validate(nested)]
    pub job: JobConfig,
    #[serde(default)]
    #[validate(nested)]
    pub model: ModelConfig,
    #[serde(default)]
    pub accelerator: AcceleratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JobConfig {
    #[serde(default = "default_chunk_max_chars")]
    #[validate(range(min = 1))]
    pub chunk_max_chars: usize,
    #[serde(default = "default_min_voice_seconds")]
    #[validate(range(exclusive_min = 0.0))]
    pub min_voice_seconds: f32,
    #[serde(default = "default_max_text_chars")]
    #[validate(range(min = 1))]
    pub max_text_chars: usize,
    /// Parent directory for per-job scratch directories; the system temp dir
    /// when unset.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    #[serde(default)]
    #[validate(range(min = 1000))]
    pub output_sample_rate_hz: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ModelConfig {
    #[serde(default = "default_model_endpoint")]
    #[validate(length(min = 1))]
    pub endpoint: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,
    #[serde(default = "default_startup_retries")]
    pub startup_retries: u32,
    #[serde(default = "default_startup_retry_delay_ms")]
    pub startup_retry_delay_ms: u64,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_cfg_weight")]
    pub cfg_weight: f32,
    #[serde(default = "default_min_p")]
    pub min_p: f32,
    #[serde(default = "default_exaggeration")]
    pub exaggeration: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorKind {
    #[default]
    None,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceleratorConfig {
    #[serde(default)]
    pub kind: AcceleratorKind,
    /// Defaults to the model endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_reclaim_path")]
    pub reclaim_path: String,
    #[serde(default = "default_accelerator_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            chunk_max_chars: default_chunk_max_chars(),
            min_voice_seconds: default_min_voice_seconds(),
            max_text_chars: default_max_text_chars(),
            scratch_dir: None,
            output_sample_rate_hz: None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            startup_retries: default_startup_retries(),
            startup_retry_delay_ms: default_startup_retry_delay_ms(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            repetition_penalty: default_repetition_penalty(),
            temperature: default_temperature(),
            cfg_weight: default_cfg_weight(),
            min_p: default_min_p(),
            exaggeration: default_exaggeration(),
        }
    }
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            kind: AcceleratorKind::default(),
            endpoint: None,
            reclaim_path: default_reclaim_path(),
            timeout_ms: default_accelerator_timeout_ms(),
        }
    }
}

impl ConfigLoader for TtsJobConfig {
    fn config_prefix() -> &'static str {
        "TTS_JOB_SERVICE"
    }
}

/// Loads `config/default.toml`, then `config/{RUN_ENV}.toml`, then
/// `TTS_JOB_SERVICE__SECTION__KEY` environment overrides.
pub fn load_config() -> Result<TtsJobConfig, ConfigError> {
    let dir = std::env::var("TTS_JOB_SERVICE_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());
    load_config_from::<TtsJobConfig>(dir.as_ref(), &run_env, std::env::vars())
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_chunk_max_chars() -> usize {
    500
}

fn default_min_voice_seconds() -> f32 {
    5.0
}

fn default_max_text_chars() -> usize {
    20_000
}

fn default_model_endpoint() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_request_timeout_ms() -> u64 {
    300_000
}

fn default_startup_retries() -> u32 {
    30
}

fn default_startup_retry_delay_ms() -> u64 {
    1_000
}

fn default_repetition_penalty() -> f32 {
    2.0
}

fn default_temperature() -> f32 {
    0.5
}

fn default_cfg_weight() -> f32 {
    0.8
}

fn default_min_p() -> f32 {
    0.15
}

fn default_exaggeration() -> f32 {
    0.3
}

fn default_reclaim_path() -> String {
    "/v1/accelerator/reclaim".to_string()
}

fn default_accelerator_timeout_ms() -> u64 {
    5_000
}
