//! `trialkit` - run simulated behavioural trials from a session file

use clap::Parser;

use trialkit::cli::args::Cli;
use trialkit::cli::commands;
use trialkit::error::ExitCode;
use trialkit::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too and are not failures
            let code = if e.use_stderr() {
                ExitCode::USAGE_ERROR
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if !cli.quiet {
        init_logging(cli.log_format, cli.verbose, cli.color);
    }

    // Exit with the conventional signal codes; trials are not resumable
    tokio::spawn(async {
        let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        else {
            return;
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\ninterrupted");
                std::process::exit(ExitCode::INTERRUPTED);
            }
            _ = sigterm.recv() => std::process::exit(ExitCode::TERMINATED),
        }
    });

    let result = commands::dispatch(cli).await;

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
