use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cadenza_core::{
    load_config, plan_chunks, song_key_for, CadenzaConfig, FfprobeProber, Job, MediaProber,
    Pipeline, PipelineError, StorageEvent,
};

pub mod server;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] cadenza_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("invalid invocation: {0}")]
    Usage(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Cadenza audio transcoding service", long_about = None)]
pub struct Cli {
    /// Path to the main cadenza.toml
    #[arg(long, default_value = "configs/cadenza.toml")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP listener and process bucket notifications
    Serve,
    /// Transcode a single object and exit
    Run(RunArgs),
    /// Probe a local file and print its chunk plan
    Plan(PlanArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Read a bucket notification envelope from this JSON file
    #[arg(long, conflicts_with = "key")]
    pub event: Option<PathBuf>,
    /// Transcode this object key from the configured source bucket
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Local audio file to probe
    pub file: PathBuf,
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    init_tracing(&config);

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Run(args) => run_once(config, args).await,
        Commands::Plan(args) => plan(config, args).await,
    }
}

fn init_tracing(config: &CadenzaConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn serve(config: CadenzaConfig) -> Result<()> {
    let addr = format!("{}:{}", config.service.host, config.service.port);
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let pipeline = Arc::new(Pipeline::from_config(&config));
    let state = server::AppState::new(pipeline, Arc::new(config), cancel.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening for bucket notifications");
    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn run_once(config: CadenzaConfig, args: RunArgs) -> Result<()> {
    let job = match (&args.event, &args.key) {
        (Some(path), None) => {
            let raw = tokio::fs::read_to_string(path).await?;
            let event = StorageEvent::from_json(&raw)?;
            event.into_job(&config.source_bucket.name, &config.destination_bucket.name)?
        }
        (None, Some(key)) => Job::new(
            &config.source_bucket.name,
            key,
            &config.destination_bucket.name,
        ),
        _ => {
            return Err(AppError::Usage(
                "exactly one of --event or --key is required".into(),
            ))
        }
    };

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let pipeline = Pipeline::from_config(&config);
    let report = pipeline.run(&job, &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn plan(config: CadenzaConfig, args: PlanArgs) -> Result<()> {
    let prober = FfprobeProber::new(&config.transcode.prober_binary);
    let duration = prober
        .duration(&args.file, &CancellationToken::new())
        .await?;
    let chunks = plan_chunks(duration, config.transcode.chunk_size_seconds)?;

    println!(
        "{}: {duration:.3}s, {} chunk(s) of {}s",
        song_key_for(&args.file.display().to_string()),
        chunks.len(),
        config.transcode.chunk_size_seconds
    );
    for chunk in &chunks {
        println!(
            "  {:>3}  start {:>8.1}s  duration {:>6.1}s  {}",
            chunk.index,
            chunk.start_seconds,
            chunk.duration_seconds,
            chunk.playlist_name()
        );
    }
    Ok(())
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            cancel.cancel();
        }
    });
}
