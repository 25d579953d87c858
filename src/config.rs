//! Configuration module, populated from environment variables.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Directory scanned for model artifacts (*.json)
    pub models_dir: String,
    /// Optional artifact registered under the id "default"
    pub default_model_path: Option<String>,
    /// Base URL of the live air-quality feed
    pub waqi_base_url: String,
    /// Feed API token
    pub waqi_token: String,
    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            models_dir: env::var("MODELS_DIR").unwrap_or_else(|_| "models".to_string()),
            default_model_path: env::var("DEFAULT_MODEL_PATH").ok(),
            waqi_base_url: env::var("WAQI_BASE_URL")
                .unwrap_or_else(|_| "https://api.waqi.info".to_string()),
            waqi_token: env::var("WAQI_TOKEN").unwrap_or_default(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
