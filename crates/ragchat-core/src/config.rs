use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, Result};

/// Top-level configuration for the ragchat client.
///
/// Loaded from `~/.ragchat/config.toml` by default. Every field has a default,
/// so a partial or missing file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagchatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl RagchatConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RagchatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the persisted credentials. `~` expands to the home directory.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.ragchat".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl GeneralConfig {
    /// `data_dir` with a leading `~` expanded against `$HOME` (or `%USERPROFILE%`).
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(rest) = self.data_dir.strip_prefix("~") {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| ".".to_string());
            return PathBuf::from(home).join(rest.trim_start_matches(['/', '\\']));
        }
        PathBuf::from(&self.data_dir)
    }

    /// Location of the persisted token and display name.
    pub fn credentials_path(&self) -> PathBuf {
        self.resolved_data_dir().join("credentials.json")
    }
}

/// Remote chat service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the chat backend, without a trailing slash.
    pub base_url: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Session manager behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Display name used when no user is signed in.
    pub guest_name: String,
    /// Assistant greeting synthesized into empty timelines.
    pub greeting: String,
    /// Maximum characters kept in a conversation's last-message preview.
    pub preview_chars: usize,
    /// Drop responses whose conversation is no longer active when they resolve.
    pub discard_stale_responses: bool,
    /// File extensions accepted for document upload.
    pub allowed_extensions: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            guest_name: "Guest".to_string(),
            greeting: "Hello! I'm your RAG Assistant. I can help you find information and \
                       answer questions based on your knowledge base. You can also attach \
                       documents to enhance our conversation. What would you like to know?"
                .to_string(),
            preview_chars: 50,
            discard_stale_responses: true,
            allowed_extensions: vec!["pdf".to_string(), "txt".to_string()],
        }
    }
}
