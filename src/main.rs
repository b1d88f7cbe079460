use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

mod aggregator;
mod commands;
mod config;
mod db;
mod error;
mod feed;
mod models;

use commands::{AppState, Command, Router};
use config::Config;
use db::Repository;
use error::Result;

#[tokio::main]
async fn main() -> ExitCode {
    // Cycle reports are shown by default; RUST_LOG overrides
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,gator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let router = Router::default();

    let Some(cmd) = Command::from_args(std::env::args().skip(1)) else {
        eprintln!("Usage: gator <command> [args...]");
        eprintln!("Commands: {}", router.verbs().collect::<Vec<_>>().join(", "));
        return ExitCode::FAILURE;
    };

    match run(&router, &cmd).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(router: &Router, cmd: &Command) -> Result<()> {
    let config = Config::load()?;
    let repository = Repository::new(&config.db_path).await?;
    let mut state = AppState { config, repository };

    router.run(&mut state, cmd).await
}
