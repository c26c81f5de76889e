//! Courier CLI - serve, migrate and inspect the Courier REST API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod exit_codes;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  65  Migration error (unknown, dirty or modified migration)
  69  Database unavailable
  74  Cannot bind or serve the listener
  78  Configuration error (profile, setting or database URL)";

#[derive(Parser)]
#[command(name = "courier")]
#[command(author, version, about = "Courier REST API server and tooling", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the API on the profile's host and port
    Serve,

    /// Inspect and apply database migrations
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// List every route served by the application
    Routes,
}

#[derive(Subcommand)]
enum DbCommand {
    /// Apply every pending migration
    Upgrade,

    /// Revert migrations newer than VERSION (0 reverts everything)
    Downgrade {
        #[arg(value_name = "VERSION")]
        version: i64,
    },

    /// Show the newest applied migration
    Current,

    /// List known migrations and whether each is applied
    History,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = match (cli.verbose, &cli.command) {
        (true, _) => "courier_server=debug,tower_http=debug",
        (false, Commands::Serve) => courier_server::telemetry::DEFAULT_FILTER,
        (false, _) => "warn",
    };
    courier_server::telemetry::init_tracing(default_filter);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve => commands::serve::execute().await,
        Commands::Db { command } => match command {
            DbCommand::Upgrade => commands::db::upgrade().await,
            DbCommand::Downgrade { version } => commands::db::downgrade(version).await,
            DbCommand::Current => commands::db::current().await,
            DbCommand::History => commands::db::history().await,
        },
        Commands::Routes => commands::routes::execute(),
    }
}
