//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::library::CollisionPolicy;

/// Deepest nested archive unwrapping accepted in configuration.
pub const MAX_NESTED_ARCHIVE_DEPTH: u32 = 8;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Root of the component library (holds `lib_sym/`, `lib_fp/`, `3d_models/`).
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// Project whose library tables `--add-to-project` updates.
    /// Defaults to the parent of the library root.
    #[serde(default)]
    pub project_dir: Option<PathBuf>,

    /// Prefix written into footprint model references.
    /// Defaults to `${KIPRJMOD}/<library dir name>/3d_models`.
    #[serde(default)]
    pub model_path_prefix: Option<String>,

    /// Import settings.
    #[serde(default)]
    pub import: ImportConfig,

    /// Version control settings.
    #[serde(default)]
    pub git: GitConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.import.max_selection_attempts == 0 {
            return Err(ConfigError::ValidationError {
                message: "import.max_selection_attempts must be at least 1".to_string(),
            });
        }

        if self.import.nested_archive_depth > MAX_NESTED_ARCHIVE_DEPTH {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "import.nested_archive_depth {} exceeds the maximum of {MAX_NESTED_ARCHIVE_DEPTH}",
                    self.import.nested_archive_depth
                ),
            });
        }

        if let Some(ref prefix) = self.model_path_prefix {
            if prefix.trim_end_matches('/').is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "model_path_prefix must not be empty".to_string(),
                });
            }
        }

        if self.git.binary.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "git.binary must not be empty".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            });
        }

        Ok(())
    }
}

/// Import workflow configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// How many invalid category answers are tolerated before giving up.
    #[serde(default = "default_max_selection_attempts")]
    pub max_selection_attempts: u32,

    /// How many levels of archives-within-archives are unpacked.
    #[serde(default = "default_nested_archive_depth")]
    pub nested_archive_depth: u32,

    /// What to do when a footprint or model of the same name already exists.
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_selection_attempts: default_max_selection_attempts(),
            nested_archive_depth: default_nested_archive_depth(),
            collision_policy: CollisionPolicy::default(),
        }
    }
}

const fn default_max_selection_attempts() -> u32 {
    3
}

const fn default_nested_archive_depth() -> u32 {
    2
}

/// Version control configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitConfig {
    /// Client executable.
    #[serde(default = "default_git_binary")]
    pub binary: String,

    /// Remote to push to. When unset, the branch's configured upstream is used.
    #[serde(default)]
    pub remote: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            remote: None,
        }
    }
}

fn default_git_binary() -> String {
    "git".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
