/// `load_config` module: reads the static YAML config and injects secrets from the environment.
///
/// The YAML file never holds credentials. After parsing, the following are read:
/// - `GENERATION_API_KEY` (required) for the text generation API
/// - `STORE_API_KEY` (optional) for the document store
///
/// # Errors
/// All failures are `anyhow::Error` with a message naming the file, the YAML problem
/// or the missing variable, and are surfaced at the CLI boundary.
use anyhow::Result;
use coursegen_core::config::AppConfig;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const GENERATION_API_KEY: &str = "GENERATION_API_KEY";
pub const STORE_API_KEY: &str = "STORE_API_KEY";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: AppConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    config.generation.api_key = match env::var(GENERATION_API_KEY) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => {
            error!("{GENERATION_API_KEY} missing in environment");
            return Err(anyhow::anyhow!(
                "{GENERATION_API_KEY} must be set in the environment"
            ));
        }
    };
    config.store.api_key = env::var(STORE_API_KEY).ok().filter(|k| !k.trim().is_empty());

    config.trace_loaded();
    Ok(config)
}
