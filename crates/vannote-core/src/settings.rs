//! Settings Persistence System
//!
//! Provides persistent configuration with:
//! - Atomic file writes
//! - Schema validation with defaults
//! - Migration support for schema changes
//!
//! Storage location: {data_dir}/settings.json

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::fs::{atomic_write_json_pretty, validate_name_component};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Namespace used when none (or an unusable one) is configured
pub const DEFAULT_NAMESPACE: &str = "vannote";

/// Default data directory: `{platform data dir}/vannote`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vannote")
}

// =============================================================================
// Schema
// =============================================================================

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub export: ExportSettings,

    #[serde(default)]
    pub templates: TemplateSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            storage: StorageSettings::default(),
            export: ExportSettings::default(),
            templates: TemplateSettings::default(),
        }
    }
}

impl AppSettings {
    /// Corrects bad values instead of failing, so an old or hand-edited file
    /// still loads.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;
        self.storage.normalize();
    }
}

/// Which adapter backs the storage façade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Remote,
}

/// Key-value substrate under the local adapter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Memory,
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default)]
    pub kind: StoreKind,

    /// Directory name under the data dir holding the entity lists
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Endpoint for the remote backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            kind: StoreKind::default(),
            namespace: default_namespace(),
            remote_url: None,
        }
    }
}

impl StorageSettings {
    fn normalize(&mut self) {
        let trimmed = self.namespace.trim().to_string();
        if validate_name_component(&trimmed, "namespace").is_err() {
            warn!(
                "Invalid storage namespace '{}', falling back to '{}'",
                self.namespace, DEFAULT_NAMESPACE
            );
            self.namespace = default_namespace();
        } else {
            self.namespace = trimmed;
        }

        if self
            .remote_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            self.remote_url = None;
        }
    }
}

/// Export settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    /// Indent JSON exports
    #[serde(default = "default_true")]
    pub pretty_json: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { pretty_json: true }
    }
}

/// Template settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSettings {
    /// Create the built-in preset templates on first use
    #[serde(default = "default_true")]
    pub seed_presets: bool,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self { seed_presets: true }
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Loads and saves [`AppSettings`] under a data directory
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager with the given data directory
    pub fn new(data_dir: &Path) -> Self {
        Self {
            settings_path: data_dir.join(SETTINGS_FILE),
        }
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> AppSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(AppSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)?;
            let mut settings = serde_json::from_str::<AppSettings>(&content)?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
                settings = self.migrate(settings);
            }

            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    /// Normalize and persist settings atomically; returns what was written
    pub fn save(&self, settings: &AppSettings) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();
            atomic_write_json_pretty(&self.settings_path, &normalized).map_err(|e| {
                CoreError::Storage(format!(
                    "Failed to write {}: {}",
                    self.settings_path.display(),
                    e
                ))
            })?;
            info!("Settings saved to {}", self.settings_path.display());
            Ok(normalized)
        })
    }

    /// Upgrades an older schema. Version 1 is the first schema, so there is
    /// nothing to rewrite yet.
    fn migrate(&self, settings: AppSettings) -> AppSettings {
        settings
    }
}

// =============================================================================
// Tests
// =============================================================================
