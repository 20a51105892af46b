use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use cxai::config::Settings;
use cxai::console::{self, commands, ConsoleContext};
use cxai::coordinator::{self, Coordinator};
use cxai::inference::default_loader;

/// Chest X-ray classifier
#[derive(Parser)]
#[command(name = "cxai")]
#[command(about = "Classify chest X-rays and evaluate models on labeled datasets")]
#[command(version)]
struct Cli {
    /// Directory holding default.toml and an optional local.toml
    #[arg(short, long, global = true, default_value = "config")]
    config: PathBuf,

    /// Runs the interactive console when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models
    Models,
    /// Copy a model file into the models directory and register it
    Import { path: PathBuf },
    /// Select the model used for classification and evaluation
    Use { name: String },
    /// Unregister a model
    Remove { name: String },
    /// Unregister models whose files are missing
    Prune,
    /// Show a registered model
    Info { name: String },
    /// Classify one image with the selected model
    Classify { image: PathBuf },
    /// Evaluate the selected model on <dataset>/<class name>/*
    Evaluate { dataset: PathBuf },
    /// Show the classification history
    History,
    /// Show the confusion matrix history
    Matrices,
}

/// Installs the tracing subscriber. Logs go to a daily rolling file when
/// `logging.file` is set and to stderr otherwise.
fn init_logging(settings: &Settings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.to_lowercase()));

    match &settings.logging.file {
        Some(log_dir) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "cxai");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_line_number(true)
                .with_file(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::from_dir(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let _guard = init_logging(&settings);

    info!("cxai starting up");
    info!("Models directory: {}", settings.models.directory.display());

    let coordinator = Coordinator::new(&settings, default_loader()).context("opening model registry and history")?;
    let (handle, worker) = coordinator::spawn(coordinator)?;

    let class_names = settings.evaluation.class_names.clone();
    let context = ConsoleContext { handle: &handle, class_names: &class_names };

    match cli.command {
        None => console::console_loop(&handle, &class_names).await?,
        Some(Commands::Models) => commands::handle_list_models(&context).await?,
        Some(Commands::Import { path }) => commands::handle_import(&context, &path).await?,
        Some(Commands::Use { name }) => commands::handle_use(&context, &name).await?,
        Some(Commands::Remove { name }) => commands::handle_remove(&context, &name).await?,
        Some(Commands::Prune) => commands::handle_prune(&context).await?,
        Some(Commands::Info { name }) => commands::handle_info(&context, &name).await?,
        Some(Commands::Classify { image }) => commands::handle_classify(&context, &image).await?,
        Some(Commands::Evaluate { dataset }) => commands::handle_evaluate(&context, &dataset).await?,
        Some(Commands::History) => commands::handle_history(&context).await?,
        Some(Commands::Matrices) => commands::handle_matrices(&context).await?,
    }

    drop(handle);
    if worker.join().is_err() {
        anyhow::bail!("coordinator thread panicked");
    }
    info!("cxai shut down");
    Ok(())
}
