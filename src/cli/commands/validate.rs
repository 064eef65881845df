//! `validate` command handler.

use std::path::Path;

use serde_json::json;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::loader::{ConfigLoader, LoadResult};
use crate::error::{ConfigError, TrialKitError, ValidationIssue};

/// Validate session files without running them.
///
/// # Errors
///
/// Returns a config error if a file is missing or fails to parse or
/// validate. With `--strict`, warnings fail the file as well.
pub fn validate(args: &ValidateArgs) -> Result<(), TrialKitError> {
    let loader = ConfigLoader::with_defaults();

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating session");

        let load_result = loader.load(path)?;
        for warning in &load_result.warnings {
            tracing::warn!(location = %warning.path, "{}", warning.message);
        }

        report(path, &load_result, args.format);

        if args.strict && !load_result.warnings.is_empty() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: load_result.warnings,
            }
            .into());
        }

        tracing::info!(file = %path.display(), "session valid");
    }

    Ok(())
}

fn report(path: &Path, load_result: &LoadResult, format: OutputFormat) {
    let session = &load_result.config;
    match format {
        OutputFormat::Human => {
            println!(
                "{}: {} trial(s), variant '{}', {} warning(s)",
                path.display(),
                session.trials.len(),
                session.variant,
                load_result.warnings.len()
            );
            for warning in &load_result.warnings {
                println!("  {warning}");
            }
        }
        OutputFormat::Json => {
            let report = json!({
                "file": path.display().to_string(),
                "variant": session.variant,
                "trials": session.trials.len(),
                "warnings": load_result.warnings.iter().map(issue_json).collect::<Vec<_>>(),
            });
            println!("{report}");
        }
    }
}

fn issue_json(issue: &ValidationIssue) -> serde_json::Value {
    json!({ "path": issue.path, "message": issue.message })
}
