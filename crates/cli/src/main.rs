use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipqueue_core::{
    load_config, validate_config, BatchOrchestrator, BatchRequest, Config, Converter,
    FfmpegConverter, InMemoryItemStore, ItemStatus, ItemStore, QueueItem,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convert a batch of media files with FFmpeg, one at a time.
#[derive(Debug, Parser)]
#[command(name = "clipqueue", version)]
struct Args {
    /// Configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "CLIPQUEUE_CONFIG")]
    config: Option<PathBuf>,

    /// Export preset id.
    #[arg(short, long, default_value = "h264")]
    preset: String,

    /// Output folder; outputs go next to their sources when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Join all files into one output when their streams allow it.
    #[arg(long)]
    merge: bool,

    /// Only report whether the files could be merged.
    #[arg(long)]
    check_merge: bool,

    /// Comment written into each output's metadata.
    #[arg(long, default_value = "")]
    comment: String,

    /// Prefix the comment with today's date.
    #[arg(long)]
    date_tag: bool,

    /// Render a waveform video track from each file's audio.
    #[arg(long)]
    waveform: bool,

    /// Print the preset catalogue and exit.
    #[arg(long)]
    list_presets: bool,

    /// Files to convert, in queue order.
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("clipqueue {}", VERSION);

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => Config::default(),
    };
    validate_config(&config).context("Configuration validation failed")?;

    if args.list_presets {
        for preset in config.preset_catalogue()? {
            println!("{:<12} {} (.{})", preset.id, preset.name, preset.extension);
        }
        return Ok(());
    }

    let preset = config
        .find_preset(&args.preset)?
        .with_context(|| format!("Unknown preset: {}", args.preset))?;

    if args.files.is_empty() {
        bail!("No input files given");
    }

    let converter = Arc::new(FfmpegConverter::new(config.converter.clone()));
    converter
        .validate()
        .await
        .context("FFmpeg is not available")?;

    let store = Arc::new(InMemoryItemStore::new());
    for path in &args.files {
        let mut item = QueueItem::new(path).with_comment(args.comment.clone());
        item.include_date_tag = args.date_tag;
        item.waveform_video = args.waveform;
        store.insert(item);
    }

    let orchestrator = BatchOrchestrator::from_config(
        &config,
        converter,
        Arc::clone(&store) as Arc<dyn ItemStore>,
    );

    if args.check_merge {
        let result = orchestrator
            .evaluate_merge_compatibility(&store.list(), &preset)
            .await;
        println!("{}", result);
        return Ok(());
    }

    let mut progress = orchestrator.subscribe_progress();
    tokio::spawn(async move {
        let mut last_percent = None;
        while let Some(value) = progress.recv().await {
            let percent = (value * 100.0).round() as u32;
            if last_percent != Some(percent) {
                info!("Overall progress: {}%", percent);
                last_percent = Some(percent);
            }
        }
    });

    let mut request = BatchRequest::new(preset).with_merge(args.merge);
    if let Some(output) = &args.output {
        request = request.with_output_folder(output);
    }
    orchestrator.start_conversion(request).await;

    tokio::select! {
        _ = orchestrator.wait_idle() => {},
        _ = shutdown_signal() => {
            warn!("Interrupted, cancelling conversion");
            orchestrator.cancel_conversion();
            orchestrator.wait_idle().await;
        }
    }

    let mut failed = 0;
    for item in store.list() {
        match (&item.status, &item.output_path) {
            (ItemStatus::Done, Some(output)) => {
                info!("{}: done -> {}", item.name, output.display())
            }
            (ItemStatus::Failed, _) => {
                failed += 1;
                error!("{}: failed", item.name);
            }
            (status, _) => info!("{}: {}", item.name, status),
        }
    }

    if failed > 0 {
        bail!("{} item(s) failed", failed);
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
