//! Chainweave CLI entry point.
//!
//! Binary name: `cweave`
//!
//! Parses CLI arguments, initializes the database, then dispatches to the
//! appropriate command handler.

mod cli;
mod state;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, MemoryCommand, WorkflowCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,chainweave=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            workflow,
            params,
            config,
            yes,
            simulate_unknown_tools,
        } => {
            tracing::debug!(workflow = %workflow, config = %config, "dispatching run command");
            let state = AppState::init(cli.db.clone()).await?;
            cli::run::run_workflow(
                &state,
                &workflow,
                &params,
                &config,
                yes,
                simulate_unknown_tools,
                cli.json,
            )
            .await?;
        }

        Commands::Workflow { action } => match action {
            WorkflowCommand::List { config } => {
                cli::workflow::list(&config, cli.json)?;
            }
        },

        Commands::Memory { action } => {
            let state = AppState::init(cli.db.clone()).await?;
            match action {
                MemoryCommand::History { run_id } => {
                    cli::memory::history(&state, &run_id, cli.json).await?;
                }
                MemoryCommand::Summary { run_id } => {
                    cli::memory::summary(&state, &run_id, cli.json).await?;
                }
                MemoryCommand::Stats => {
                    cli::memory::stats(&state, cli.json).await?;
                }
                MemoryCommand::Cleanup { days, force } => {
                    cli::memory::cleanup(&state, days, force, cli.json).await?;
                }
            }
        }
    }

    Ok(())
}
