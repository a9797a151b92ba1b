use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use aangifte_cli::commands::{self, Outcome};
use aangifte_cli::config::{FileConfig, Overrides, Settings};
use aangifte_cli::logging;

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Dutch personal income tax declarations.
///
/// Loads the published rate tables, then validates, calculates or files a
/// declaration read from a JSON file. Results are printed as JSON.
#[derive(Debug, Parser)]
#[command(name = "aangifte", version, about)]
struct Cli {
    /// Config file. Defaults to `aangifte.toml` in the working directory
    /// when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where the rate tables live; for `csv-dir` a directory.
    #[arg(long, global = true)]
    rate_tables: Option<String>,

    /// Rate table source backend.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Skip faulty rate tables instead of refusing to start.
    #[arg(long, global = true)]
    quarantine: bool,

    /// Log level or filter directive; `RUST_LOG` takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also append log output to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the loaded rate tables and any quarantined ones.
    Tables,
    /// Validate a declaration and resolve its claims.
    Validate { file: PathBuf },
    /// Calculate a declaration without filing it.
    Calculate { file: PathBuf },
    /// Validate and submit a declaration.
    File { file: PathBuf },
}

// ─── entry point ─────────────────────────────────────────────────────────────

fn print_json(outcome: &Outcome) -> Result<ExitCode> {
    let json = serde_json::to_string_pretty(outcome).context("Failed to serialize result")?;
    println!("{json}");
    Ok(if outcome.is_rejected() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let file_config = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(
        file_config,
        Overrides {
            rate_tables: cli.rate_tables,
            source_backend: cli.backend,
            quarantine: cli.quarantine,
            log_level: cli.log_level,
            log_file: cli.log_file,
        },
    );
    logging::init(&settings.log_level, settings.log_file.as_deref())?;
    debug!(?settings, "resolved settings");

    let registry = Arc::new(commands::build_registry(&settings).await?);

    match cli.command {
        Command::Tables => {
            for line in commands::describe_tables(&registry) {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { file } => {
            let declaration = commands::read_declaration(&file)?;
            print_json(&commands::validate(registry, declaration)?)
        }
        Command::Calculate { file } => {
            let declaration = commands::read_declaration(&file)?;
            print_json(&commands::calculate(registry, declaration)?)
        }
        Command::File { file } => {
            let declaration = commands::read_declaration(&file)?;
            print_json(&commands::file(registry, declaration)?)
        }
    }
}
