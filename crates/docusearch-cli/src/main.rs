mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use docusearch::config::{config_from_env, load_config};
use docusearch::{Config, ExportError, JobStore, MetricsStore};

use crate::cli::{Cli, Command, JobsCommand, MetricsFormat};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = docusearch::init_logging(cli.log_format.into(), &cli.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn resolve_config(cli: &Cli) -> docusearch::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => config_from_env()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> docusearch::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(ExportError::from)?;
    println!("{}", text);
    Ok(())
}

fn run(cli: Cli) -> docusearch::Result<ExitCode> {
    let config = resolve_config(&cli)?;
    log::debug!("Using data directory {}", config.data_dir.display());

    let metrics = Arc::new(MetricsStore::from_config(&config));
    let store = JobStore::open(&config, metrics);

    match cli.command {
        Command::Jobs(JobsCommand::List { json }) => {
            let jobs = store.list_jobs();
            if json {
                print_json(&jobs)?;
            } else if jobs.is_empty() {
                println!("No jobs.");
            } else {
                println!(
                    "{:<10} {:<11} {:>11} {:>5}  {:<20} SOURCE",
                    "ID", "STATUS", "FILES", "DONE", "STARTED"
                );
                for job in jobs {
                    println!(
                        "{:<10} {:<11} {:>11} {:>4}%  {:<20} {}",
                        job.job_id,
                        job.status.as_str(),
                        format!("{}/{}", job.processed_files, job.total_files),
                        job.progress_percentage,
                        job.start_time.format("%Y-%m-%d %H:%M:%S"),
                        job.data_source
                    );
                }
            }
        }
        Command::Jobs(JobsCommand::Show { job_id }) => match store.job_results(&job_id) {
            Some(record) => print_json(&record)?,
            None => {
                eprintln!("Job {} not found", job_id);
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Jobs(JobsCommand::Results { job_id }) => match store.read_results_log(&job_id) {
            Some(raw) => print!("{}", raw),
            None => {
                eprintln!("No results log for job {}", job_id);
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Jobs(JobsCommand::Delete { job_id }) => {
            let summary = store.delete_job(&job_id);
            print_json(&summary)?;
            if !summary.removed_anything() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Jobs(JobsCommand::Clear { yes }) => {
            if !yes {
                eprintln!("Refusing to delete every job without --yes");
                return Ok(ExitCode::from(2));
            }
            print_json(&store.delete_all_jobs())?;
        }
        Command::Metrics { format } => match format {
            MetricsFormat::Json => println!("{}", store.metrics_json()),
            MetricsFormat::Prometheus => print!("{}", store.metrics_prometheus()),
        },
    }

    Ok(ExitCode::SUCCESS)
}
