//! Bearer token and display name persistence.
//!
//! The token provider is the only client-persisted state. It is injected
//! into every component that needs credentials instead of being read from
//! ambient storage.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// What the credential service hands back on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub display_name: Option<String>,
}

impl Credentials {
    pub fn new(token: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            token: token.into(),
            display_name,
        }
    }
}

/// Source of the current bearer token and user display name.
pub trait TokenProvider: Send + Sync {
    /// Current bearer token, if signed in.
    fn token(&self) -> Option<String>;

    /// Stored display name, if any.
    fn display_name(&self) -> Option<String>;

    /// Replace the stored credentials.
    fn store(&self, credentials: Credentials) -> Result<()>;

    /// Remove token and display name.
    fn clear(&self) -> Result<()>;

    /// Stored display name or the supplied guest default.
    fn display_name_or(&self, guest: &str) -> String {
        self.display_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| guest.to_string())
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local token store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Some(credentials)),
        }
    }
}

impl TokenProvider for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|c| c.as_ref().map(|c| c.token.clone()))
    }

    fn display_name(&self) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|c| c.as_ref().and_then(|c| c.display_name.clone()))
    }

    fn store(&self, credentials: Credentials) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| CoreError::TokenStore(format!("lock poisoned: {}", e)))?;
        *inner = Some(credentials);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| CoreError::TokenStore(format!("lock poisoned: {}", e)))?;
        *inner = None;
        Ok(())
    }
}

// =============================================================================
// File store
// =============================================================================

/// Token store backed by a JSON file, readable by the owner only.
///
/// The file is re-read on every access so a login from another process is
/// picked up without restarting.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<Credentials> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read credentials from {}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str::<Credentials>(&contents) {
            Ok(creds) if !creds.token.trim().is_empty() => Some(creds),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed credentials file {}", self.path.display());
                None
            }
        }
    }
}

impl TokenProvider for FileTokenStore {
    fn token(&self) -> Option<String> {
        self.read().map(|c| c.token)
    }

    fn display_name(&self) -> Option<String> {
        self.read().and_then(|c| c.display_name)
    }

    fn store(&self, credentials: Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&credentials)?;
        std::fs::write(&self.path, content)?;

        // Restrict credentials file to owner-only access.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!("Credentials saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Credentials removed from {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
