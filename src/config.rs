//! Service configuration
//!
//! Sources, later ones overriding earlier ones:
//! 1. `config/default.toml` (optional)
//! 2. the file named by `SYMPTOM_TRIAGE_CONFIG` (optional)
//! 3. environment variables `SYMPTOM_TRIAGE__<SECTION>__<KEY>`

use secrecy::SecretString;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::conversation::GatePolicy;
use crate::error::{AppError, Result};

/// Environment variable naming an extra configuration file
pub const CONFIG_FILE_ENV: &str = "SYMPTOM_TRIAGE_CONFIG";

const ENV_PREFIX: &str = "SYMPTOM_TRIAGE";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub text: TextModelConfig,
    #[serde(default)]
    pub image: ImageConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body, mostly relevant for image uploads
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
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

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid server address: {}", e)))
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Text pipeline settings: artifacts, acceptance gate and response wording
#[derive(Debug, Clone, Deserialize)]
pub struct TextModelConfig {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_vectorizer_path")]
    pub vectorizer_path: String,

    /// Accept an utterance when its peak probability is strictly above this
    #[serde(default = "default_accept_above")]
    pub accept_above: f64,

    /// Reply with the advisory when the peak probability is strictly below this
    #[serde(default = "default_advise_below")]
    pub advise_below: f64,

    /// Number of ranked conditions returned
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_diagnosis_prefix")]
    pub diagnosis_prefix: String,

    #[serde(default = "default_advisory_message")]
    pub advisory_message: String,
}

fn default_model_path() -> String {
    "models/naive_bayes_model.json".to_string()
}
fn default_vectorizer_path() -> String {
    "models/tfidf_vectorizer.json".to_string()
}
fn default_accept_above() -> f64 {
    0.20
}
fn default_advise_below() -> f64 {
    0.20
}
fn default_top_k() -> usize {
    3
}
fn default_diagnosis_prefix() -> String {
    "I have been diagnosed with".to_string()
}
fn default_advisory_message() -> String {
    "I am not confident enough to suggest a diagnosis yet. Could you describe more of your symptoms?"
        .to_string()
}

impl Default for TextModelConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            vectorizer_path: default_vectorizer_path(),
            accept_above: default_accept_above(),
            advise_below: default_advise_below(),
            top_k: default_top_k(),
            diagnosis_prefix: default_diagnosis_prefix(),
            advisory_message: default_advisory_message(),
        }
    }
}

/// Image pipeline settings
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Text-only deployments switch the whole image pipeline off
    #[serde(default = "default_image_enabled")]
    pub enabled: bool,

    /// Zero-shot inference service
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Background removal service
    #[serde(default = "default_background_url")]
    pub background_url: String,

    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Bearer token for both services
    #[serde(default)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Coarse first-pass vocabulary
    #[serde(default = "default_triage_labels")]
    pub triage_labels: Vec<String>,

    /// Triage labels whose images are classified without background removal
    #[serde(default = "default_raw_image_labels")]
    pub raw_image_labels: Vec<String>,

    /// Final diagnostic vocabulary
    #[serde(default = "default_diagnostic_labels")]
    pub diagnostic_labels: Vec<String>,
}

fn default_image_enabled() -> bool {
    true
}
fn default_service_url() -> String {
    "http://localhost:8090".to_string()
}
fn default_background_url() -> String {
    "http://localhost:8091".to_string()
}
fn default_model_name() -> String {
    "openai/clip-vit-large-patch14".to_string()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_triage_labels() -> Vec<String> {
    ["throat", "skin", "lips", "eyes"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_raw_image_labels() -> Vec<String> {
    ["throat", "lips", "eyes"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_diagnostic_labels() -> Vec<String> {
    [
        "acne",
        "eczema",
        "psoriasis",
        "melanoma",
        "rosacea",
        "hives",
        "ringworm",
        "chickenpox",
        "strep throat",
        "tonsillitis",
        "cold sore",
        "conjunctivitis",
        "stye",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: default_image_enabled(),
            service_url: default_service_url(),
            background_url: default_background_url(),
            model_name: default_model_name(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            triage_labels: default_triage_labels(),
            raw_image_labels: default_raw_image_labels(),
            diagnostic_labels: default_diagnostic_labels(),
        }
    }
}

impl ImageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let text = &self.text;
        GatePolicy::new(text.accept_above, text.advise_below)?;
        if text.top_k == 0 {
            return Err(AppError::Config("text.top_k must be at least 1".to_string()));
        }

        if self.image.enabled {
            if self.image.triage_labels.is_empty() {
                return Err(AppError::Config(
                    "image.triage_labels cannot be empty".to_string(),
                ));
            }
            if self.image.diagnostic_labels.is_empty() {
                return Err(AppError::Config(
                    "image.diagnostic_labels cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
