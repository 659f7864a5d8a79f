//! tsql-lower CLI
//!
//! Lowers JSON syntax trees of T-SQL procedures into the procedure AST

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "CLI tool needs to print to stdout/stderr"
)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod pipeline;
mod report;

use config::Config;

#[derive(Parser)]
#[command(name = "tsql-lower")]
#[command(about = "Lower T-SQL procedure syntax trees into a procedure AST", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a syntax tree and write the AST as JSON
    Lower {
        /// JSON syntax tree produced by a parser adapter
        tree: PathBuf,

        /// SQL source the tree spans point into
        #[arg(long)]
        source: Option<PathBuf>,

        /// Write the AST here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Lower a syntax tree and print only its faults
    Faults {
        /// JSON syntax tree produced by a parser adapter
        tree: PathBuf,

        /// SQL source the tree spans point into
        #[arg(long)]
        source: Option<PathBuf>,

        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = FaultFormat::Text)]
        format: FaultFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FaultFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Lower {
            tree,
            source,
            output,
            config,
            compact,
        } => {
            let config = Config::load(config.as_deref())?;
            init_logging(&config);
            lower(&tree, source.as_deref(), output.as_deref(), &config, compact)?;
        }
        Commands::Faults {
            tree,
            source,
            config,
            format,
        } => {
            let config = Config::load(config.as_deref())?;
            init_logging(&config);
            faults(&tree, source.as_deref(), &config, format)?;
        }
    }

    Ok(())
}

/// `RUST_LOG`, else the config filter, else `warn`; always to stderr
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.filter.as_deref().unwrap_or("warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn lower(
    tree: &Path,
    source: Option<&Path>,
    output: Option<&Path>,
    config: &Config,
    compact: bool,
) -> Result<()> {
    let session = pipeline::lower_file(tree, source, config.lowering.clone())?;
    let json = pipeline::ast_json(&session.output, config.output.pretty && !compact)
        .context("Failed to serialize AST")?;

    match output {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write AST: {}", path.display()))?,
        None => println!("{json}"),
    }

    report::print_faults(&session.output.faults, session.source.as_ref());
    report::print_summary(
        session.output.procedures().count(),
        session.output.faults.len(),
    );
    Ok(())
}

fn faults(tree: &Path, source: Option<&Path>, config: &Config, format: FaultFormat) -> Result<()> {
    let session = pipeline::lower_file(tree, source, config.lowering.clone())?;
    match format {
        FaultFormat::Json => {
            let json = report::faults_json(&session.output.faults)
                .context("Failed to serialize faults")?;
            println!("{json}");
        }
        FaultFormat::Text => {
            report::print_faults(&session.output.faults, session.source.as_ref());
            report::print_summary(
                session.output.procedures().count(),
                session.output.faults.len(),
            );
        }
    }
    Ok(())
}
