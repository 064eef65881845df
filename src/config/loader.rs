//! Session file loader.
//!
//! Loading runs in a fixed order: size check, read, YAML parse into the
//! typed schema, validation, freeze behind an `Arc`. Validation collects
//! every issue before failing.

use std::path::Path;
use std::sync::Arc;

use crate::config::schema::SessionConfig;
use crate::config::validation::Validator;
use crate::error::{ConfigError, ValidationIssue};

// ============================================================================
// Public API
// ============================================================================

/// Options for the session loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Size limits.
    pub config_limits: ConfigLimits,
}

/// Limits applied while loading, overridable through `TRIALKIT_MAX_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum session file size in bytes.
    pub max_config_size: usize,

    /// Maximum number of trials in one session.
    pub max_trials: usize,

    /// Maximum number of advisors.
    pub max_advisors: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("TRIALKIT_MAX_CONFIG_SIZE", 1024 * 1024),
            max_trials: env_or("TRIALKIT_MAX_TRIALS", 10_000),
            max_advisors: env_or("TRIALKIT_MAX_ADVISORS", 32),
        }
    }
}

/// Result of loading a session file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated session.
    pub config: Arc<SessionConfig>,

    /// Non-fatal validation issues.
    pub warnings: Vec<ValidationIssue>,
}

/// Session loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads and validates a session file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is missing or unreadable
    /// - The file exceeds the size limit
    /// - YAML parsing fails
    /// - Validation reports at least one error
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let limit = self.options.config_limits.max_config_size;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > limit {
            return Err(ConfigError::TooLarge { size, limit });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.load_str(&raw, path)
    }

    /// Parses and validates session YAML already in memory.
    ///
    /// `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file access errors.
    pub fn load_str(&self, raw: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let limit = self.options.config_limits.max_config_size;
        if raw.len() > limit {
            return Err(ConfigError::TooLarge {
                size: raw.len(),
                limit,
            });
        }

        // Handle UTF-8 BOM
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        if raw.trim().is_empty() {
            return Err(ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: None,
                message: "session file is empty".to_string(),
            });
        }

        let config: SessionConfig =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        let result = Validator::new().validate(&config, &self.options.config_limits);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: origin.display().to_string(),
                errors: result.errors,
            });
        }

        Ok(LoadResult {
            config: Arc::new(config),
            warnings: result.warnings,
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_session() {
        let file = write_temp("trials:\n  - stimulus: a\n  - stimulus: b\n");
        let result = ConfigLoader::with_defaults().load(file.path()).unwrap();
        assert_eq!(result.config.trials.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::with_defaults()
            .load(Path::new("/nonexistent/session.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_size_limit() {
        let loader = ConfigLoader::new(LoaderOptions {
            config_limits: ConfigLimits {
                max_config_size: 16,
                ..ConfigLimits::default()
            },
        });
        let file = write_temp("trials:\n  - stimulus: a long enough stimulus\n");
        let err = loader.load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge { limit: 16, .. }));
    }

    #[test]
    fn test_parse_error_has_line() {
        let err = ConfigLoader::with_defaults()
            .load_str("trials:\n  - stimulus: a\n    bogus: 1\n", &PathBuf::from("s.yaml"))
            .unwrap_err();
        let ConfigError::ParseError { line, message, .. } = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert!(line.is_some());
        assert!(message.contains("bogus"));
    }

    #[test]
    fn test_empty_file_rejected() {
        let err = ConfigLoader::with_defaults()
            .load_str("\u{feff}  \n", Path::new("empty.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { line: None, .. }));
    }

    #[test]
    fn test_validation_errors_collected() {
        let err = ConfigLoader::with_defaults()
            .load_str("trials: []\n", Path::new("none.yaml"))
            .unwrap_err();
        let ConfigError::ValidationError { errors, .. } = err else {
            panic!("expected validation error");
        };
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_warnings_returned() {
        let result = ConfigLoader::with_defaults()
            .load_str("variant: advised\ntrials:\n  - stimulus: a\n", Path::new("w.yaml"))
            .unwrap();
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn test_env_or_default() {
        assert_eq!(env_or("TRIALKIT_TEST_UNSET_LIMIT", 7_usize), 7);
    }
}
