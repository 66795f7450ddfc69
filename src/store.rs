//! Session token persistence.
//!
//! Stores the session token in `${EXAMDECK_HOME}/token.json` with
//! restricted permissions (0600). This is the only durable client-side
//! state; the token is never logged in full.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::paths;

/// On-disk token file structure.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct TokenFile {
    token: Option<String>,
}

/// Persisted store for the session token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store backed by the given file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a store backed by the default token path.
    pub fn at_default_path() -> Self {
        Self::new(paths::token_path())
    }

    /// Loads the persisted token from disk.
    /// Returns None if the file doesn't exist or holds no token.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token from {}", self.path.display()))?;

        let file: TokenFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse token file {}", self.path.display()))?;

        Ok(file.token.filter(|t| !t.is_empty()))
    }

    /// Saves the token to disk with restricted permissions (0600).
    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let file = TokenFile {
            token: Some(token.to_string()),
        };
        let contents = serde_json::to_string_pretty(&file).context("Failed to serialize token")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut out = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            out.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }

    /// Removes the persisted token. Succeeds if none exists.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove token file {}", self.path.display())),
        }
    }

    /// Returns a masked version of a token for display (first 8 chars + ...).
    pub fn mask(token: &str) -> String {
        if token.len() <= 12 {
            return "***".to_string();
        }
        format!("{}...", &token[..8])
    }
}
