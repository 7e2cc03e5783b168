use std::process::ExitCode;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod core;
mod config;
mod error;

use cli::Cli;
use crate::core::Engine;
use error::ExtractError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --verbose switches from warnings to info
    let default_directive = if cli.verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Starting llextract v{}", env!("CARGO_PKG_VERSION"));

    let result = Engine::new(cli.config.as_deref()).and_then(|engine| cli.execute(engine));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e.downcast_ref::<ExtractError>().map_or("error", ExtractError::kind);
            eprintln!("error[{}]: {:#}", kind, e);
            ExitCode::FAILURE
        }
    }
}
