use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Everything the clients need, built once and passed down explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub generation: GenerationConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

/// OpenAI-compatible chat completions endpoint used for generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub api_url: String,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries on rate limiting only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Injected from the environment, never read from the config file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub base_url: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub endpoint: String,
    /// Attempts before giving up on id collisions.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_temperature() -> f32 {
    0.3
}

fn default_database() -> String {
    "courses".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    pub fn trace_loaded(&self) {
        info!(
            generation_api = %self.generation.api_url,
            model = %self.generation.model,
            store = %self.store.base_url,
            database = %self.store.database,
            publish_endpoint = %self.publish.endpoint,
            "Loaded AppConfig"
        );
        debug!(
            timeout_secs = self.generation.timeout_secs,
            max_retries = self.generation.max_retries,
            max_attempts = self.publish.max_attempts,
            generation_key_set = self.generation.api_key.is_some(),
            store_key_set = self.store.api_key.is_some(),
            "AppConfig loaded (details)"
        );
    }
}
