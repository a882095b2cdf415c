//! Configuration module for letterhead.
//!
//! The persisted configuration holds two paths: the letterhead PDF and
//! the folder to watch. It is stored as pretty-printed JSON in the user's
//! home directory and rewritten on every change.
//!
//! A missing or malformed file is never fatal. Loading falls back to the
//! empty default and logs the problem.
//!
//! # Examples
//!
//! ```no_run
//! use letterhead::config::{Config, ConfigStore};
//!
//! let store = ConfigStore::at_default_location();
//! let mut config = store.load();
//! config.letterhead_path = "/home/me/letterhead.pdf".into();
//! store.save(&config)?;
//! # Ok::<(), letterhead::LetterheadError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::error::{LetterheadError, Result};

/// File name of the persisted configuration inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".pdf_letterhead_merger_config.json";

/// Persisted user configuration.
///
/// Empty strings mean "not configured".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the single-page letterhead PDF.
    pub letterhead_path: String,

    /// Folder watched for new invoices.
    pub watch_folder: String,
}

impl Config {
    /// Letterhead path, if one is configured.
    pub fn letterhead(&self) -> Option<PathBuf> {
        non_empty_path(&self.letterhead_path)
    }

    /// Watch folder, if one is configured.
    pub fn folder(&self) -> Option<PathBuf> {
        non_empty_path(&self.watch_folder)
    }

    /// Check whether both the letterhead and the folder are set, so that
    /// watching can start without asking the user.
    pub fn is_complete(&self) -> bool {
        self.letterhead().is_some() && self.folder().is_some()
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

/// Default location of the configuration file (`~/.pdf_letterhead_merger_config.json`).
///
/// Falls back to the current directory when no home directory can be found.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

/// Reads and writes [`Config`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at [`default_config_path`].
    pub fn at_default_location() -> Self {
        Self::new(default_config_path())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, falling back to the default on any problem.
    pub fn load(&self) -> Config {
        match self.try_load() {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!(path = %self.path.display(), "No configuration file, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!("{e}");
                Config::default()
            }
        }
    }

    /// Load the configuration, reporting read and parse failures.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn try_load(&self) -> Result<Option<Config>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LetterheadError::ConfigLoad {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| LetterheadError::ConfigLoad {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Write the configuration as JSON indented with four spaces.
    pub fn save(&self, config: &Config) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        config
            .serialize(&mut serializer)
            .map_err(|e| LetterheadError::ConfigSave {
                path: self.path.clone(),
                source: std::io::Error::other(e),
            })?;

        std::fs::write(&self.path, buf).map_err(|e| LetterheadError::ConfigSave {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(path = %self.path.display(), "Saved configuration");
        Ok(())
    }
}

/// Configuration shared between the front end and the watch pipeline.
///
/// Jobs take a snapshot when they start, so a letterhead change applies to
/// the next file without restarting the session.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Config>>,
}

impl SharedConfig {
    /// Wrap an initial configuration.
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current configuration.
    pub fn snapshot(&self) -> Config {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Modify the configuration in place and return the updated copy.
    pub fn update<F>(&self, change: F) -> Config
    where
        F: FnOnce(&mut Config),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut guard);
        guard.clone()
    }

    /// Currently configured letterhead, if any.
    pub fn letterhead(&self) -> Option<PathBuf> {
        self.snapshot().letterhead()
    }
}
