//! Sales CLI - Sales data analysis in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{logs, monthly, preview, query, run, status, top};

/// Sales - load, clean and analyze sales spreadsheets
#[derive(Parser)]
#[command(name = "sales", version, about, long_about = None)]
struct Cli {
    /// Show debug diagnostics on stderr (overridden by SALES_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a CSV or Excel file
    Run {
        /// Path to the sales file (.csv, .xlsx, .xls)
        file: PathBuf,
        /// Number of products in the top-N rankings
        #[arg(long)]
        top_n: Option<usize>,
        /// Skip writing chart data
        #[arg(long)]
        no_charts: bool,
        /// Skip writing the report workbook
        #[arg(long)]
        no_report: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the first rows of a sales file and the detected columns
    Preview {
        /// Path to the sales file
        file: PathBuf,
        /// Number of rows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what the store currently holds
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a read-only SQL query against the store
    Query {
        /// SQL query to execute
        sql: Option<String>,
        /// Read SQL from file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: String,
        /// Output as JSON (shorthand for --format json)
        #[arg(long)]
        json: bool,
    },

    /// Top products by quantity sold
    Top {
        /// Number of products
        #[arg(short = 'n', long, default_value = "5")]
        limit: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Revenue per month
    Monthly {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

/// Initialise the global `tracing` subscriber on stderr
///
/// `SALES_LOG` takes an EnvFilter directive; without it the level is
/// `debug` with `--verbose` and `warn` otherwise.
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SALES_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            file,
            top_n,
            no_charts,
            no_report,
            json,
        } => run::run(
            &file,
            run::RunOptions {
                top_n,
                charts: !no_charts,
                report: !no_report,
            },
            json,
        ),
        Commands::Preview { file, limit, json } => preview::run(&file, limit, json),
        Commands::Status { json } => status::run(json),
        Commands::Query {
            sql,
            file,
            format,
            json,
        } => {
            let fmt = if json { "json".to_string() } else { format };
            query::run(sql.as_deref(), file.as_deref(), &fmt)
        }
        Commands::Top { limit, json } => top::run(limit, json),
        Commands::Monthly { json } => monthly::run(json),
        Commands::Logs { command } => logs::run(command),
    }
}
