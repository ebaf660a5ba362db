//! statuswatch entry point

use clap::Parser;
use statuswatch::cli::{serve::ServeArgs, Cli, Commands};
use statuswatch::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Keep the file writer alive until exit.
    let _log_guard = match logging::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Probe(args)) => statuswatch::cli::probe::execute(args).await,
        Some(Commands::Serve(args)) => statuswatch::cli::serve::execute(args).await,
        None => statuswatch::cli::serve::execute(ServeArgs::from_env()).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %format!("{e:#}"), "statuswatch exited with error");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
