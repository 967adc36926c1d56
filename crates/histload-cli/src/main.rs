mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use logging::LogFormat;

#[derive(Parser)]
#[command(
    name = "histload",
    version,
    about = "Full-table history loads from SQL Server into Redshift"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log line format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every active table in the configuration
    Run {
        /// Path to history load YAML file
        config: PathBuf,
        /// Only load these tables (by configured name)
        #[arg(long = "table")]
        tables: Vec<String>,
    },
    /// Print the resolved column schema of one table
    Schema {
        /// Path to history load YAML file
        config: PathBuf,
        /// Configured table name
        table: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Run { config, tables } => commands::run::execute(&config, &tables).await,
        Commands::Schema { config, table } => {
            commands::schema::execute(&config, &table).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
