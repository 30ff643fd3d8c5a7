//! # Configuration
//!
//! The TOML file the binary reads on every run.
//!
//! ```toml
//! seed = 42                      # optional, fixed trial seed
//!
//! [store]
//! driver = "file"
//! path = "inventory.tbl"
//! patch = "disabled"             # auto | prompt | disabled
//!
//! [files]
//! state = "droplimiter.state"
//! drops = "droplimiter.drops"
//! log = "droplimiter.log"        # optional
//! report = "droplimiter.csv"     # optional
//! ```
//!
//! Unknown keys are rejected. Relative paths resolve against the directory
//! holding the configuration file, not the working directory of whatever
//! scheduler fired the run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "droplimiter.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Fixed trial seed. Entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Inventory store settings.
    pub store: StoreConfig,
    /// File locations.
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Inventory store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Which store implementation to use.
    pub driver: Driver,
    /// Store location.
    pub path: PathBuf,
    /// Store patch handling.
    #[serde(default)]
    pub patch: PatchMode,
}

/// Supported inventory store drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// A `itemId|count|limit` text table.
    File,
}

/// What to do about the store-side patch that keeps `limit` in step with
/// spawns.
///
/// The file driver has nothing to patch; the mode is only validated and
/// logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    /// Install the patch if missing.
    Auto,
    /// Ask before installing.
    Prompt,
    /// Remove the patch if present.
    #[default]
    Disabled,
}

impl fmt::Display for PatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Prompt => "prompt",
            Self::Disabled => "disabled",
        })
    }
}

/// File locations, relative to the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FilesConfig {
    /// History ledger.
    pub state: PathBuf,
    /// Drop table.
    pub drops: PathBuf,
    /// Extra log file, next to stderr.
    pub log: Option<PathBuf>,
    /// CSV report of every drop.
    pub report: Option<PathBuf>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            state: PathBuf::from("droplimiter.state"),
            drops: PathBuf::from("droplimiter.drops"),
            log: None,
            report: None,
        }
    }
}

impl Config {
    /// Parses configuration text. Relative paths resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for invalid TOML, unknown keys, missing
    /// required keys or unsupported choices.
    pub fn parse(text: &str, base_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let mut config: Self = toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))?;
        if config.store.path.as_os_str().is_empty() {
            return Err(AppError::Config("store.path must not be empty".to_string()));
        }
        config.base_dir = base_dir.into();
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {}: {e}", path.display())))?;

        let base_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        Self::parse(&text, base_dir).map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Directory relative paths resolve against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolved ledger path.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.resolve(&self.files.state)
    }

    /// Resolved drop table path.
    #[must_use]
    pub fn drops_path(&self) -> PathBuf {
        self.resolve(&self.files.drops)
    }

    /// Resolved store path.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.resolve(&self.store.path)
    }

    /// Resolved log file path, if any.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.files.log.as_deref().map(|p| self.resolve(p))
    }

    /// Resolved report path, if any.
    #[must_use]
    pub fn report_path(&self) -> Option<PathBuf> {
        self.files.report.as_deref().map(|p| self.resolve(p))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
