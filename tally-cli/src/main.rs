//! Tally CLI - import bank CSV exports into your ledger

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{accounts, columns, import, logs, profile};
use tally_core::services::logging::COMMAND_EXECUTED;
use tally_core::LogEvent;

/// Tally - import bank CSV exports into a double-entry ledger
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import transactions from a CSV file
    Import {
        /// CSV file to import
        file: PathBuf,
        /// Saved import profile to use
        #[arg(short, long, conflicts_with = "profile_file")]
        profile: Option<String>,
        /// Read the import profile from a JSON file instead
        #[arg(long)]
        profile_file: Option<PathBuf>,
        /// Show what would be imported without importing
        #[arg(long)]
        preview: bool,
        /// Transactions per ledger request (defaults to settings)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Only list rows that have issues
        #[arg(long)]
        issues_only: bool,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a CSV file's columns and a suggested profile
    Columns {
        /// CSV file to inspect
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage saved import profiles
    Profile {
        #[command(subcommand)]
        command: profile::ProfileCommands,
    },

    /// Manage ledger accounts
    Accounts {
        #[command(subcommand)]
        command: accounts::AccountsCommands,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Import { .. } => "import",
            Commands::Columns { .. } => "columns",
            Commands::Profile { .. } => "profile",
            Commands::Accounts { .. } => "accounts",
            Commands::Logs { .. } => "logs",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise only warnings unless --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("tally_core=debug,tally=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .init();

    let logger = commands::get_logger();
    commands::log_event(&logger, LogEvent::new(COMMAND_EXECUTED).with_command(cli.command.name()));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Import {
            file,
            profile,
            profile_file,
            preview,
            batch_size,
            issues_only,
            yes,
            json,
        } => {
            import::run(import::ImportArgs {
                file,
                profile,
                profile_file,
                preview,
                batch_size,
                issues_only,
                yes,
                json,
            })
            .await
        }
        Commands::Columns { file, json } => columns::run(&file, json),
        Commands::Profile { command } => profile::run(command),
        Commands::Accounts { command } => accounts::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
