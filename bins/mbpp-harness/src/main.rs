mod chart;
mod engine;
mod evaluator;
mod executor;
mod producer;
mod reporter;
mod sampler;
mod stats;


use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::PythonEngine;
use mbpp_common::config::{DatasetSourceKind, HarnessConfig, ProducerKind};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, instrument};

#[derive(Parser)]
#[command(name = "mbpp-harness")]
#[command(about = "MBPP harness - Compare code-generation strategies on sampled benchmark tasks", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $MBPP_CONFIG, then config/harness.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample tasks, generate candidates with every strategy and score them
    Run {
        /// Number of tasks to sample
        #[arg(short = 'n', long)]
        sample_size: Option<usize>,

        /// Sampling seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Results CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read the dataset from a local JSON / JSON Lines file instead of the hub
        #[arg(long)]
        dataset_file: Option<PathBuf>,

        /// Code producer (chat, reference)
        #[arg(short, long, value_parser = parse_producer_kind)]
        producer: Option<ProducerKind>,
    },

    /// Recompute summary, t-test and chart from a results CSV
    Report {
        /// Results CSV written by `run`
        csv: PathBuf,
    },

    /// Run a Python file through the execution sandbox and print the result
    Exec {
        /// Source file
        file: PathBuf,
    },
}

fn parse_producer_kind(value: &str) -> Result<ProducerKind, String> {
    match value.to_lowercase().as_str() {
        "chat" => Ok(ProducerKind::Chat),
        "reference" => Ok(ProducerKind::Reference),
        other => Err(format!(
            "invalid producer '{}' (valid options: chat, reference)",
            other
        )),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<HarnessConfig> {
    let config = match path {
        Some(path) => HarnessConfig::load(path),
        None => HarnessConfig::load_default(),
    };
    config.map_err(|e| {
        error!("Failed to load harness configuration: {}", e);
        anyhow::Error::new(e)
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            sample_size,
            seed,
            output,
            dataset_file,
            producer,
        } => {
            let mut config = config;
            if let Some(sample_size) = sample_size {
                config.sampling.sample_size = sample_size;
            }
            if let Some(seed) = seed {
                config.sampling.seed = seed;
            }
            if let Some(output) = output {
                config.report.output_path = output;
            }
            if let Some(path) = dataset_file {
                config.dataset.source = DatasetSourceKind::File;
                config.dataset.path = Some(path);
            }
            if let Some(kind) = producer {
                config.producer.kind = kind;
            }
            config.validate().context("Invalid configuration after CLI overrides")?;

            run(config).await
        }
        Commands::Report { csv } => {
            let rows = reporter::load_results_from_csv(&csv)?;
            info!(path = %csv.display(), rows = rows.len(), "Loaded results");
            reporter::report(&rows, config.report.chart_width);
            Ok(())
        }
        Commands::Exec { file } => {
            let code = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let engine = PythonEngine::new_with_config(&config.runtime);
            engine.preflight().await?;
            println!("{}", engine::execute_code(&engine, &code).await);
            Ok(())
        }
    }
}

/// Full benchmark run: sample, evaluate, persist, report
#[instrument(skip_all, fields(run_id = %uuid::Uuid::new_v4()))]
async fn run(config: HarnessConfig) -> Result<()> {
    info!(
        sample_size = config.sampling.sample_size,
        seed = config.sampling.seed,
        producer = ?config.producer.kind,
        output = %config.report.output_path.display(),
        "MBPP harness starting"
    );

    let engine = PythonEngine::new_with_config(&config.runtime);
    engine
        .preflight()
        .await
        .context("Python interpreter is required to score candidates")?;

    let producer = producer::build_producer(&config.producer)?;

    let tasks = sampler::load_sampled_tasks(&config.dataset, &config.sampling)
        .await
        .context("Failed to load benchmark tasks")?;

    let start = Instant::now();
    let rows = executor::evaluate_tasks(&tasks, producer.as_ref(), &engine).await?;
    info!(
        tasks = rows.len(),
        elapsed_secs = start.elapsed().as_secs(),
        "Evaluation finished"
    );

    // Persist before computing statistics so the rows survive a later failure
    reporter::save_results_to_csv(&rows, &config.report.output_path)?;
    reporter::report(&rows, config.report.chart_width);

    Ok(())
}
