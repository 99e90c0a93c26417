use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::{Commands, RunArgs};
use refinr::config::Config;
use refinr::domain::{ArtifactKind, RunRecord};
use refinr::ledger::{RunLedger, render_receipt};
use refinr::llm::build_backend;
use refinr::pipeline::{Driver, DriverOptions, DriverStop, RunPipeline};
use refinr::prompt::{PromptLoader, TemplateSet};
use refinr::stages::Stages;
use refinr::storage::FsArtifactStore;

const CODE_SEED: &str = r#"/**
 * Example function
 * @param {string} input
 * @returns {string}
 */
function example(input) {
  return input;
}
"#;

const DOCUMENT_SEED: &str = r#"# Example Title

## Introduction

A short paragraph that states what the reader will learn.

## Details

The body of the document, organized into sections.
"#;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("refinr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("refinr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Wire config into a ready pipeline
fn build_pipeline(config: &Config) -> Result<RunPipeline> {
    let backend = build_backend(&config.llm).context("Failed to create generation backend")?;

    let mut templates = TemplateSet::for_kind(config.pipeline.kind).context("Failed to load prompt templates")?;
    if let Some(dir) = &config.pipeline.templates_dir {
        templates = templates
            .with_overrides(&PromptLoader::new(dir))
            .context(format!("Failed to load template overrides from {}", dir.display()))?;
    }

    let stages = Stages::new(backend, templates).with_refine_attempts(config.pipeline.refine_attempts);
    let ledger = Arc::new(open_ledger(config)?);
    let store = Arc::new(FsArtifactStore::new("."));

    Ok(RunPipeline::new(stages, ledger, store, config.storage.runs_dir()))
}

fn open_ledger(config: &Config) -> Result<RunLedger> {
    let dir = config.storage.ledger_dir();
    RunLedger::open(&dir).context(format!("Failed to open run ledger at {}", dir.display()))
}

fn print_run_summary(run: &RunRecord) {
    let status = if run.is_sealed() {
        "sealed".green()
    } else {
        format!("{:?}", run.status()).to_lowercase().red()
    };
    println!(
        "{} {} [{}] {} of {} iterations",
        "Run".cyan(),
        run.id,
        status,
        run.iterations.len(),
        run.context.iteration_budget
    );
    if run.intent_degraded() {
        println!("  {}", "Intent interpretation unavailable".yellow());
    }
    if let Some(index) = run.final_artifacts.as_ref().and_then(|f| f.good_enough_iteration) {
        println!("  Good enough from iteration {}", index);
    }
    if let Some(steering) = &run.steering
        && let Some(focus) = &steering.focus_area
    {
        println!("  {} {}", "Next focus:".cyan(), focus);
    }
}

async fn handle_run(
    config: &mut Config,
    args: &RunArgs,
    max_runs: Option<u32>,
    delay_ms: Option<u64>,
    resume: bool,
) -> Result<()> {
    args.apply(config);
    if let Some(max) = max_runs {
        config.pipeline.max_runs = Some(max);
    }
    if let Some(delay) = delay_ms {
        config.pipeline.run_delay_ms = delay;
    }

    let fresh = config.to_run_context()?;
    let options = DriverOptions {
        max_runs: config.pipeline.max_runs,
        run_delay: Duration::from_millis(config.pipeline.run_delay_ms),
        promote_best_to_seed: config.pipeline.promote_best_to_seed,
        latest_artifact_path: config.storage.latest_artifact_path.clone(),
    };
    let driver = Driver::new(build_pipeline(config)?, options);

    let ctx = if resume {
        match driver.resume_context().await.context("Failed to resume from the ledger")? {
            Some(ctx) => {
                println!("{} {}", "Resuming with focus:".cyan(), ctx.focus_area);
                ctx
            }
            None => {
                println!("{}", "Nothing to resume; starting from config.".yellow());
                fresh
            }
        }
    } else {
        fresh
    };

    println!("{} {}", "Refining:".green(), ctx.goal);
    let outcome = driver.run(ctx).await;
    for run in &outcome.runs {
        print_run_summary(run);
    }

    match outcome.stop {
        DriverStop::Converged => {
            println!("{}", "No more next steps; done.".green());
            Ok(())
        }
        DriverStop::MaxRuns => {
            println!("{}", "Stopped after the configured number of runs.".yellow());
            Ok(())
        }
        DriverStop::Aborted(ref reason) => {
            if let Some(last) = outcome.last_sealed() {
                println!("{} {}", "Last sealed run:".yellow(), last.id);
            }
            Err(eyre!("Refinement halted: {}", reason))
        }
    }
}

async fn handle_once(config: &mut Config, args: &RunArgs) -> Result<()> {
    args.apply(config);
    let ctx = config.to_run_context()?;
    let pipeline = build_pipeline(config)?;

    println!("{} {}", "Refining:".green(), ctx.goal);
    let run = pipeline.run_once(ctx).await.context("Run failed")?;
    print_run_summary(&run);
    println!();
    println!("{}", render_receipt(&run));
    Ok(())
}

fn handle_init(config: &Config, kind: ArtifactKind, seed: &Path, force: bool) -> Result<()> {
    let config_path = Config::local_path();
    if config_path.exists() && !force {
        return Err(eyre!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        ));
    }

    let starter = Config::starter(kind, seed.to_path_buf(), config.storage.output_dir.clone());
    fs::write(&config_path, starter.to_yaml()?)
        .context(format!("Failed to write {}", config_path.display()))?;
    println!("{} {}", "Wrote".green(), config_path.display());

    if seed.exists() {
        println!("{} {} already exists", "Kept".yellow(), seed.display());
    } else {
        let content = match kind {
            ArtifactKind::Code => CODE_SEED,
            ArtifactKind::Document => DOCUMENT_SEED,
        };
        fs::write(seed, content).context(format!("Failed to write {}", seed.display()))?;
        println!("{} {}", "Wrote".green(), seed.display());
    }
    Ok(())
}

fn handle_list(config: &Config) -> Result<()> {
    let runs = open_ledger(config)?.list_runs().context("Failed to read runs")?;
    if runs.is_empty() {
        println!("{}", "No runs recorded".yellow());
        return Ok(());
    }
    for run in &runs {
        print_run_summary(run);
    }
    Ok(())
}

fn handle_show(config: &Config, id: &str) -> Result<()> {
    let run = open_ledger(config)?
        .get_run(id)
        .context(format!("Failed to load run {}", id))?;
    println!("{}", render_receipt(&run));
    Ok(())
}

async fn run_application(cli: &Cli, mut config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            args,
            max_runs,
            delay_ms,
            resume,
        } => handle_run(&mut config, args, *max_runs, *delay_ms, *resume).await,
        Commands::Once { args } => handle_once(&mut config, args).await,
        Commands::Init { kind, seed, force } => handle_init(&config, *kind, seed, *force),
        Commands::List => handle_list(&config),
        Commands::Show { id } => handle_show(&config, id),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}
