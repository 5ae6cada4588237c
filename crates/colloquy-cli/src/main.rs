//! `colloquy` binary: replays a conversation stream through the windowing
//! pipeline and prints or stores one report per closed window.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colloquy_analysis::{AnalysisClient, AnalysisService};
use colloquy_channels::{ConsoleSink, JsonlSink, SinkManager};
use colloquy_orchestrator::{DispatchConfig, JsonlSource, Pipeline, PipelineConfig};
use config::ColloquyConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "colloquy",
    version,
    about = "Colloquy: real-time conversation windowing and analysis"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "colloquy.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines conversation file through the pipeline
    Run {
        /// Input file, one JSON record per line
        #[arg(short, long, default_value = "messages.jsonl")]
        input: PathBuf,
        /// Window size in seconds (overrides config)
        #[arg(long)]
        window_size: Option<f64>,
        /// Replay speed multiplier; 0 replays without delay (overrides config)
        #[arg(long)]
        speed_factor: Option<f64>,
        /// Skip analysis; windows are delivered marked as disabled
        #[arg(long)]
        no_analysis: bool,
        /// Append reports as JSON lines to this file (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that the configured analysis service is reachable
    Check,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let mut config = ColloquyConfig::load(&cli.config).await?;
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        config.analysis.model.apply_api_key(&key);
    }

    match cli.command {
        Commands::Run {
            input,
            window_size,
            speed_factor,
            no_analysis,
            output,
        } => {
            if let Some(secs) = window_size {
                config.engine.window_size_secs = secs;
            }
            if let Some(factor) = speed_factor {
                config.source.speed_factor = factor;
            }
            if no_analysis {
                config.analysis.enabled = false;
            }
            if output.is_some() {
                config.sink.jsonl_path = output;
            }
            run(config, input).await
        }
        Commands::Check => check(&config).await,
    }
}

async fn run(config: ColloquyConfig, input: PathBuf) -> anyhow::Result<()> {
    let engine = config.engine.to_engine_config()?;
    let mut pipeline_config = PipelineConfig::new(engine);
    pipeline_config.sweep_interval = config.engine.sweep_interval()?;
    pipeline_config.dispatch = DispatchConfig {
        timeout: config.analysis.model.timeout(),
        grace: config.shutdown.grace()?,
    };

    let service: Option<Arc<dyn AnalysisService>> = if config.analysis.enabled {
        let client = AnalysisClient::from_config(&config.analysis.model)?;
        if client.is_available().await {
            info!(backend = client.backend_name(), "Analysis service available");
        } else {
            warn!(
                backend = client.backend_name(),
                "Analysis service not available; windows will be delivered with fallbacks"
            );
        }
        Some(Arc::new(client))
    } else {
        info!("Analysis disabled");
        None
    };

    let mut sinks = SinkManager::new();
    if config.sink.console {
        sinks.add_sink(Box::new(ConsoleSink::new()));
    }
    if let Some(path) = &config.sink.jsonl_path {
        sinks.add_sink(Box::new(JsonlSink::open(path).await?));
    }
    if sinks.is_empty() {
        warn!("No sinks configured; reports will only be counted");
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            stop_tx.send_replace(true);
        }
    });

    let (pipeline, handle) = Pipeline::new(pipeline_config, service, sinks);
    let pipeline = tokio::spawn(pipeline.with_shutdown(stop_rx.clone()).run());

    let source = JsonlSource::new(&input, &config.source);
    let replay = source.replay(&handle).await;
    drop(handle);

    let summary = pipeline.await.context("pipeline task failed")?;
    match replay {
        Ok(stats) => info!(
            records = stats.records,
            invalid_lines = stats.invalid_lines,
            "Input exhausted"
        ),
        Err(e) if *stop_rx.borrow() => info!(error = %e, "Replay interrupted"),
        Err(e) => return Err(e).context(format!("failed to replay {}", input.display())),
    }

    println!("{}", serde_json::to_string_pretty(&summary.to_json())?);
    Ok(())
}

async fn check(config: &ColloquyConfig) -> anyhow::Result<()> {
    let client = AnalysisClient::from_config(&config.analysis.model)?;
    let available = client.is_available().await;
    if available {
        info!(backend = client.backend_name(), "Analysis service is available");
    } else {
        warn!(
            backend = client.backend_name(),
            base_url = config.analysis.model.base_url(),
            "Analysis service is not available"
        );
    }
    println!(
        "{}",
        serde_json::json!({
            "backend": client.backend_name(),
            "base_url": config.analysis.model.base_url(),
            "available": available,
        })
    );
    Ok(())
}
