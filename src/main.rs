use clap::Parser;

use appssh::cli::Cli;
use appssh::commands::ssh::Outcome;
use appssh::error::CommandError;

#[tokio::main]
async fn main() {
    let log_dir = appssh::config::paths::ensure_log_dir().ok();
    let guard = appssh::logging::init_logging(log_dir);

    let cli = Cli::parse();
    tracing::debug!("Starting appssh {}", env!("CARGO_PKG_VERSION"));

    let code = match cli.run().await {
        Ok(outcome) => {
            if let Outcome::Exited(exit) = &outcome {
                if let Some(diagnostic) = exit.diagnostic() {
                    eprintln!("{}", diagnostic);
                }
            }
            outcome.exit_code()
        }
        Err(e) => {
            if e.is_cleanup_failure() {
                tracing::error!(target: "security", "Staged key cleanup failed: {}", e);
            } else {
                tracing::error!("ssh failed: {}", e);
            }
            eprintln!("FAILED\n{}", e);
            CommandError::GENERIC_FAILURE
        }
    };

    drop(guard);
    std::process::exit(code);
}
