use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use txlog_core::Level;
use txlog_logging::{init_tracing, LogFormat};

mod config;
mod demo;
mod viz;

use config::ProjectConfig;
use demo::DemoOptions;

#[derive(Parser, Debug)]
#[command(
    name = "txlog",
    about = "Inspect and exercise per-transaction log records",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Diagnostic log level (default: warn)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Diagnostic log format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatChoice>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the timer chart of stored records
    Viz {
        /// JSON lines file of records, or a single JSON record
        file: PathBuf,

        /// Chart width in columns (default: 80)
        #[arg(short, long)]
        width: Option<usize>,

        /// Only render the record at this position
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Run a simulated request and show its record
    Demo {
        /// Session verbosity: error, warn, info, debug, or a number
        #[arg(short, long)]
        verbosity: Option<String>,

        /// Append the record to this JSON lines file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the record as JSON instead of a chart
        #[arg(long)]
        json: bool,

        /// Chart width in columns (default: 80)
        #[arg(short, long)]
        width: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    let log_format = match cli.log_format {
        Some(choice) => choice.into(),
        None => config.log_format()?.unwrap_or_default(),
    };
    let log_level = cli
        .log_level
        .as_deref()
        .or(config.log_level.as_deref())
        .unwrap_or("warn");
    init_tracing(log_level, log_format);

    let default_width = config.width.unwrap_or(txlog_viz::DEFAULT_WIDTH);

    match cli.command {
        Command::Viz { file, width, index } => {
            let file = if file.is_absolute() {
                file
            } else {
                working_dir.join(file)
            };
            viz::handle_viz_command(&file, width.unwrap_or(default_width), index)
        }
        Command::Demo {
            verbosity,
            output,
            json,
            width,
        } => {
            let verbosity = match verbosity {
                Some(name) => Some(
                    name.parse::<Level>()
                        .context("Invalid --verbosity")?,
                ),
                None => config.verbosity()?,
            };
            let output = output
                .map(|path| {
                    if path.is_absolute() {
                        path
                    } else {
                        working_dir.join(path)
                    }
                })
                .or_else(|| {
                    config
                        .records_dir
                        .as_ref()
                        .map(|dir| working_dir.join(dir).join("demo.jsonl"))
                });
            demo::handle_demo_command(DemoOptions {
                verbosity,
                output,
                json,
                width: width.unwrap_or(default_width),
            })
            .await
        }
    }
}
