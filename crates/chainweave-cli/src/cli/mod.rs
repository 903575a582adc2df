//! CLI command definitions and dispatch for the `cweave` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI follows a
//! verb-noun pattern (e.g., `cweave run research`, `cweave workflow list`,
//! `cweave memory stats`).

pub mod memory;
pub mod run;
pub mod workflow;

use clap::{Parser, Subcommand};

/// Run multi-step LLM workflows with persistent memory.
#[derive(Parser)]
#[command(name = "cweave", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database URL override (default: ~/.chainweave/chainweave.db).
    #[arg(long, global = true, env = "CHAINWEAVE_DB")]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow from the config file.
    Run {
        /// Name of the workflow to run.
        workflow: String,

        /// Workflow parameter as key=value (repeatable). Values that parse
        /// as JSON are passed structured, anything else as a string.
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Path to the workflow config file.
        #[arg(long, default_value = "chainweave.yaml")]
        config: String,

        /// Approve all gate steps without prompting.
        #[arg(long, short = 'y')]
        yes: bool,

        /// Substitute simulated output for unknown tools instead of aborting.
        #[arg(long)]
        simulate_unknown_tools: bool,
    },

    /// Inspect workflow definitions.
    Workflow {
        #[command(subcommand)]
        action: WorkflowCommand,
    },

    /// Inspect and maintain the persistent memory store.
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },
}

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// List all workflows with their steps and parameters.
    #[command(alias = "ls")]
    List {
        /// Path to the workflow config file.
        #[arg(long, default_value = "chainweave.yaml")]
        config: String,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Show the full slice history of a run.
    History {
        /// Run id (e.g. research_20250830_142501_a1b2c3d4).
        run_id: String,
    },

    /// Show a condensed summary of a run.
    Summary {
        /// Run id.
        run_id: String,
    },

    /// Show store-wide statistics.
    Stats,

    /// Delete slices older than the retention window.
    Cleanup {
        /// Retention window in days.
        #[arg(long, default_value = "30")]
        days: u32,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },
}
