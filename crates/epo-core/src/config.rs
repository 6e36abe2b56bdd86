//! Orchestrator configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! backend_timeout_secs = 30
//! code_strategy = "sequence"
//!
//! [codes]
//! study_counter_start = 10000
//! study_min_digits = 5
//!
//! [storage]
//! default_drive = "local"
//! program_root_folder = "/programs"
//!
//! [[storage.drives]]
//! id = "local"
//! drive_type = "local_file_system"
//! display_name = "Local"
//! root_path = "/data"
//!
//! [notebook]
//! integration = "benchling"
//!
//! [git]
//! service = "gitlab"
//! ```
//!
//! Every section is optional; omitted keys take their defaults.

use epo_backend::{BackendsBuilder, GitServiceType, NotebookIntegrationType, RegistryError};
use epo_codegen::{CodeSettings, CodeStrategy};
use epo_model::naming::join_path;
use epo_model::{StorageDrive, StorageDriveFolder, StorageDriveId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Storage section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Drive program folders live on; the first drive when unset
    pub default_drive: Option<StorageDriveId>,
    /// Program root, relative to the default drive's root path
    pub program_root_folder: String,
    pub drives: Vec<StorageDrive>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_drive: None,
            program_root_folder: "/programs".to_string(),
            drives: Vec::new(),
        }
    }
}

/// Notebook section; no integration disables the notebook step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotebookConfig {
    pub integration: Option<NotebookIntegrationType>,
}

/// Git section; no service disables the repository step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub service: Option<GitServiceType>,
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Bound on every remote call
    pub backend_timeout_secs: u64,
    pub code_strategy: CodeStrategy,
    pub codes: CodeSettings,
    pub storage: StorageConfig,
    pub notebook: NotebookConfig,
    pub git: GitConfig,
}

impl OrchestratorConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate
    ///
    /// # Errors
    /// `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate
    ///
    /// # Errors
    /// `ConfigError::Io`, `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    /// `ConfigError::Invalid` describing the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend_timeout_secs must be positive".into(),
            ));
        }
        let digits = [
            ("study_min_digits", self.codes.study_min_digits),
            ("assay_min_digits", self.codes.assay_min_digits),
            ("external_min_digits", self.codes.external_min_digits),
        ];
        for (key, value) in digits {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("codes.{key} must be positive")));
            }
        }

        let mut seen = HashSet::new();
        for drive in &self.storage.drives {
            if !seen.insert(&drive.id) {
                return Err(ConfigError::Invalid(format!(
                    "storage drive {} declared twice",
                    drive.id
                )));
            }
        }
        if let Some(default) = &self.storage.default_drive {
            if !seen.contains(default) {
                return Err(ConfigError::Invalid(format!(
                    "default drive {default} is not declared"
                )));
            }
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Drive program folders are created on
    #[must_use]
    pub fn default_drive(&self) -> Option<&StorageDrive> {
        match &self.storage.default_drive {
            Some(id) => self.storage.drives.iter().find(|d| &d.id == id),
            None => self.storage.drives.first(),
        }
    }

    /// Folder program folders are created under
    #[must_use]
    pub fn program_root(&self) -> Option<StorageDriveFolder> {
        let drive = self.default_drive()?;
        let relative = self.storage.program_root_folder.trim_matches('/');
        if relative.is_empty() {
            return Some(drive.folder(drive.display_name.clone(), drive.root_path.clone()));
        }
        let name = relative.rsplit('/').next().unwrap_or(relative);
        Some(drive.folder(name, join_path(&drive.root_path, relative)))
    }

    /// Builder preloaded with the declared drives and selections; callers
    /// register implementations on it
    ///
    /// # Errors
    /// `RegistryError::DuplicateDrive` if a drive id repeats
    pub fn backends_builder(&self) -> Result<BackendsBuilder, RegistryError> {
        let mut builder = BackendsBuilder::new();
        for drive in &self.storage.drives {
            builder.add_drive(drive.clone())?;
        }
        builder
            .select_notebook(self.notebook.integration)
            .select_git(self.git.service);
        Ok(builder)
    }

    #[inline]
    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout_secs = timeout.as_secs().max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_code_strategy(mut self, strategy: CodeStrategy) -> Self {
        self.code_strategy = strategy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_codes(mut self, codes: CodeSettings) -> Self {
        self.codes = codes;
        self
    }

    #[must_use]
    pub fn with_drive(mut self, drive: StorageDrive) -> Self {
        self.storage.drives.push(drive);
        self
    }

    #[must_use]
    pub fn with_default_drive(mut self, id: impl Into<String>) -> Self {
        self.storage.default_drive = Some(StorageDriveId::new(id));
        self
    }

    #[must_use]
    pub fn with_program_root_folder(mut self, folder: impl Into<String>) -> Self {
        self.storage.program_root_folder = folder.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_notebook(mut self, integration: Option<NotebookIntegrationType>) -> Self {
        self.notebook.integration = integration;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_git(mut self, service: Option<GitServiceType>) -> Self {
        self.git.service = service;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            backend_timeout_secs: 30,
            code_strategy: CodeStrategy::default(),
            codes: CodeSettings::default(),
            storage: StorageConfig::default(),
            notebook: NotebookConfig::default(),
            git: GitConfig::default(),
        }
    }
}
