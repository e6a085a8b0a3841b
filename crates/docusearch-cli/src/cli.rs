use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use docusearch::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "docusearch", author, version, about = "Inspect and manage document-processing jobs", long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, env = "DOCUSEARCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding job metadata, results logs and metrics
    #[arg(long, env = "DOCUSEARCH_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "DOCUSEARCH_LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Text, global = true)]
    pub log_format: LogFormatArg,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "DOCUSEARCH_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or delete jobs
    #[command(subcommand)]
    Jobs(JobsCommand),

    /// Print the current metrics
    Metrics {
        #[arg(long, value_enum, default_value_t = MetricsFormat::Json)]
        format: MetricsFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    /// List jobs, most recent first
    List {
        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one job with its results as JSON
    Show { job_id: String },

    /// Print a job's raw results log
    Results { job_id: String },

    /// Delete a job and its files
    Delete { job_id: String },

    /// Delete every job and reset metrics
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsFormat {
    Json,
    Prometheus,
}
