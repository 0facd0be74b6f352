//! Configuration loader for Countersign.
//!
//! Reads `config.toml` from the data directory (`~/.countersign/` in
//! production) and deserializes it into [`AppConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// Public base URL used when building supplier decision links.
    pub public_base_url: String,
    /// Directory for stored signature images. Defaults to `{data_dir}/blobs`.
    pub blob_dir: Option<PathBuf>,
    pub notifier: NotifierConfig,
    pub decision_token: DecisionTokenConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            public_base_url: "http://127.0.0.1:8080".to_string(),
            blob_dir: None,
            notifier: NotifierConfig::default(),
            decision_token: DecisionTokenConfig::default(),
        }
    }
}

/// Outbound notification delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Webhook endpoint notifications are posted to. When unset, sends are
    /// logged and dropped.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 10,
        }
    }
}

/// Supplier decision-link token settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecisionTokenConfig {
    /// HMAC secret the decision links are signed with. The default is only
    /// suitable for local development.
    pub secret: String,
    /// How long a decision link stays valid, in hours.
    pub ttl_hours: i64,
}

impl Default for DecisionTokenConfig {
    fn default() -> Self {
        Self {
            secret: "countersign-dev-secret".to_string(),
            ttl_hours: 72,
        }
    }
}

impl AppConfig {
    /// The blob directory, resolved against the data directory when not set
    /// explicitly.
    pub fn blob_dir(&self, data_dir: &Path) -> PathBuf {
        self.blob_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("blobs"))
    }
}

/// Resolve the data directory from `COUNTERSIGN_DATA_DIR`, falling back to
/// `~/.countersign`.
pub fn default_data_dir() -> PathBuf {
    match std::env::var("COUNTERSIGN_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".countersign")
        }
    }
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`AppConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}
