mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dqc")]
#[command(version, about = "Data quality contract verification", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify contracts against the data of a data source
    Verify {
        /// Contract files (YAML or JSON)
        #[arg(required = true)]
        contracts: Vec<PathBuf>,

        /// Data source configuration file (defaults to $DQC_DATA_SOURCE)
        #[arg(short, long)]
        data_source: Option<PathBuf>,

        /// Contract variable as NAME=value, overrides the environment
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Fail on warnings too
        #[arg(short, long)]
        strict: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check contracts without touching any data
    Check {
        /// Contract files (YAML or JSON)
        #[arg(required = true)]
        contracts: Vec<PathBuf>,

        /// Also print the SQL the checks compile to for this dialect
        #[arg(long)]
        dialect: Option<String>,

        /// Contract variable as NAME=value, overrides the environment
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Commands::Verify {
            contracts,
            data_source,
            vars,
            strict,
            format,
        } => {
            commands::verify::execute(commands::verify::VerifyArgs {
                contracts,
                data_source,
                vars,
                strict,
                format,
            })
            .await
        }

        Commands::Check {
            contracts,
            dialect,
            vars,
            format,
        } => commands::check::execute(&contracts, dialect.as_deref(), &vars, format).await,
    }
}
