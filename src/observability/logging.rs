//! Diagnostics on stderr.
//!
//! stdout carries the session's table rows, so every log line goes to
//! stderr. Session loading and trial completion log at `info`, phase
//! entry and collaborator traffic at `debug`.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable whose filter directives replace the `-v` level.
pub const LOG_LEVEL_ENV: &str = "TRIALKIT_LOG_LEVEL";

/// Rendering of log lines on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// One plain line per event, coloured on a terminal.
    #[default]
    Human,
    /// One JSON object per event.
    Json,
}

/// Filter level for a `-v` count: warnings only by default, one step
/// louder per flag, `trace` from three on.
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Whether human output gets ANSI colours. `auto` colours only a terminal
/// and honours `NO_COLOR`.
#[must_use]
pub const fn ansi_enabled(color: ColorChoice, is_terminal: bool, no_color_set: bool) -> bool {
    match color {
        ColorChoice::Auto => is_terminal && !no_color_set,
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Installs the global subscriber. Later calls are ignored, so tests may
/// call it freely.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));

    // module paths only help once phase-level detail is on
    let show_target = verbosity >= 2;

    match format {
        LogFormat::Human => {
            let use_ansi = ansi_enabled(
                color,
                std::io::stderr().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            );
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
