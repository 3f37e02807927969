//! gitdoc command-line interface.
//!
//! Loads configuration, applies command-line overrides, and runs one command
//! against the document store.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gitdoc::service::{Versioner, VersionerConfig};
use gitdoc::transaction::Outcome;

/// Transactional document versioning on git.
#[derive(Parser, Debug)]
#[command(name = "gitdoc", version, about = "Version documents through a git store")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store working tree (overrides `repository`).
    #[arg(short, long, global = true)]
    repo: Option<PathBuf>,

    /// Mainline branch (overrides `mainline`).
    #[arg(long, global = true)]
    mainline: Option<String>,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new store with an empty mainline.
    Init,

    /// Submit a file as the new revision of a document.
    Version {
        /// File holding the new content.
        file: PathBuf,

        /// Document name; defaults to the file's base name.
        #[arg(long)]
        name: Option<String>,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the mainline content of a document.
    Show {
        name: String,
    },

    /// Show mainline history.
    Log {
        /// Number of commits to show.
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Print the log as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete revision branches left behind by interrupted transactions.
    Sweep,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => VersionerConfig::from_file(path).context("failed to load configuration file")?,
        None => VersionerConfig::default(),
    };
    if let Some(repo) = &args.repo {
        config.repository = repo.clone();
    }
    if let Some(mainline) = &args.mainline {
        config.mainline = mainline.clone();
    }

    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    debug!(?config, "configuration resolved");

    match args.command {
        Command::Init => {
            let versioner = Versioner::init(config).context("failed to initialize store")?;
            println!("initialized store at {}", versioner.path().display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Version { file, name, json } => {
            let versioner = open(config)?;
            let report = versioner
                .version_file(&file, name.as_deref())
                .with_context(|| format!("failed to submit {}", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report.outcome)?);
            } else {
                println!("{}", describe(&report.outcome));
            }
            Ok(exit_code(&report.outcome))
        }
        Command::Show { name } => {
            let versioner = open(config)?;
            let content = versioner.read_document(&name)?;
            std::io::stdout().write_all(&content)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Log { limit, json } => {
            let versioner = open(config)?;
            let log = versioner.history(Some(limit))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&log)?);
                return Ok(ExitCode::SUCCESS);
            }
            for commit in log {
                println!(
                    "{} {} {}",
                    commit.id.short(),
                    commit.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    commit.summary()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Sweep => {
            let mut config = config;
            // sweeping on open would leave nothing to report
            config.sweep_on_open = false;
            let versioner = open(config)?;
            let swept = versioner.sweep()?;
            println!("removed {} abandoned revision branch(es)", swept);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open(config: VersionerConfig) -> Result<Versioner> {
    let path = config.repository.clone();
    Versioner::open_with_config(config)
        .with_context(|| format!("failed to open store at {}", path.display()))
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Merged { branch, head } => format!("merged {} ({})", branch, head.short()),
        Outcome::Conflict { report } => format!("conflict: {}", report.summary),
        Outcome::Failed { reason } if reason.needs_operator => {
            format!("failed: {} (store needs manual repair)", reason.message)
        }
        Outcome::Failed { reason } if reason.retryable => {
            format!("failed: {} (may succeed if retried)", reason.message)
        }
        Outcome::Failed { reason } => format!("failed: {}", reason.message),
        Outcome::NotFound { document } => format!("not found: {}", document),
    }
}

fn exit_code(outcome: &Outcome) -> ExitCode {
    match outcome {
        Outcome::Merged { .. } => ExitCode::SUCCESS,
        Outcome::Failed { .. } => ExitCode::from(1),
        Outcome::NotFound { .. } => ExitCode::from(2),
        Outcome::Conflict { .. } => ExitCode::from(3),
    }
}
