//! Error types for `trialkit`
//!
//! Configuration problems fail fast at load or construction time, collaborator
//! failures abort the running trial, and response timeouts are not errors at
//! all (see [`crate::collaborator::ResponseOutcome`]).

use std::path::PathBuf;
use thiserror::Error;

use crate::phase::PhaseName;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `trialkit` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Phase sequencing error (phase failed, trial already run)
    pub const PHASE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `trialkit` operations.
///
/// Aggregates the domain errors and maps each onto a CLI exit code.
#[derive(Debug, Error)]
pub enum TrialKitError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Phase sequencing error
    #[error(transparent)]
    Phase(#[from] PhaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TrialKitError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Phase(_) => ExitCode::PHASE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path (or label) of the configuration that failed
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Configuration file exceeds the size limit
    #[error("configuration too large: {size} bytes (limit: {limit})")]
    TooLarge {
        /// Actual size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "trials[2].prompt.showAdvice")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Phase Errors
// ============================================================================

/// Phase sequencing errors.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// A phase operation failed; the remaining phases were not executed
    #[error("phase '{phase}' failed: {source}")]
    Failed {
        /// Phase whose operation failed
        phase: PhaseName,
        /// Underlying collaborator failure
        #[source]
        source: CollaboratorError,
    },

    /// The trial was already run (or is running)
    #[error("trial {0} has already been run")]
    AlreadyRun(String),

    /// A behaviour was declared with no phases
    #[error("behavior '{0}' has no phases")]
    EmptyBehavior(&'static str),

    /// A behaviour refers to a phase it does not list
    #[error("behavior '{behavior}' has no phase '{phase}'")]
    UnknownPhase {
        /// Behaviour name
        behavior: &'static str,
        /// Missing phase
        phase: PhaseName,
    },

    /// A behaviour lists the same phase twice
    #[error("behavior '{behavior}' lists phase '{phase}' more than once")]
    DuplicatePhase {
        /// Behaviour name
        behavior: &'static str,
        /// Duplicated phase
        phase: PhaseName,
    },
}

impl PhaseError {
    /// Returns the phase that failed, if the error came from a phase operation.
    #[must_use]
    pub const fn failed_phase(&self) -> Option<PhaseName> {
        match self {
            Self::Failed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Failures raised by external collaborators (collector, advisors, feedback).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The response collector failed
    #[error("response collector failed: {0}")]
    Collector(String),

    /// An advisor could not produce advice; the trial reports it as
    /// [`CollaboratorError::Advisor`] with the advisor's position
    #[error("advice unavailable: {0}")]
    Advice(String),

    /// An advisor failed
    #[error("advisor {index} failed: {message}")]
    Advisor {
        /// Position of the advisor in the trial's advisor list
        index: usize,
        /// Failure description
        message: String,
    },

    /// The feedback callback failed
    #[error("feedback display failed: {0}")]
    Feedback(String),

    /// The shared display failed
    #[error("display failed: {0}")]
    Display(String),
}

// ============================================================================
// Tests
// ============================================================================
