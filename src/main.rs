// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Birdwatch - Camera Trap Recorder

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use birdwatch::capture::{SimulatedCamera, SimulatedDetector};
use birdwatch::{Config, Engine, HttpTransport, RawFileSinkFactory, VERSION};

/// Birdwatch - Camera Trap Recorder
#[derive(Parser, Debug)]
#[command(name = "birdwatch")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Record visitors in front of the camera and share the clips")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with simulated camera and detector
    #[arg(long)]
    demo: bool,

    /// Recording output directory
    #[arg(long)]
    video_root: Option<PathBuf>,

    /// Seconds presence or absence must persist before acting
    #[arg(long)]
    confirmation_delay: Option<f64>,

    /// Seconds to wait before each upload attempt
    #[arg(long)]
    upload_delay: Option<f64>,

    /// Stop after this many frames (demo mode)
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Initialize logging
    let log_level = if args.trace {
        "trace".to_string()
    } else if args.debug {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🐦 Birdwatch v{} - Camera Trap Recorder", VERSION);

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(video_root) = args.video_root {
        config.video_root = video_root;
    }
    if let Some(delay) = args.confirmation_delay {
        config.detection.confirmation_delay_secs = delay;
    }
    if let Some(delay) = args.upload_delay {
        config.delivery.inter_attempt_delay_secs = delay;
    }
    if args.max_frames.is_some() {
        config.demo.max_frames = args.max_frames;
    }
    config.validate()?;

    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);
    info!("Recording to {:?}", config.video_root);

    if !config.demo_mode {
        anyhow::bail!("No camera backend available. Use --demo to run with the simulated camera");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = quit.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received, finishing up...");
                quit.store(true, Ordering::SeqCst);
            }
        });
    }

    let source = SimulatedCamera::from_config(&config.camera, &config.demo);
    let detector = SimulatedDetector::from_config(&config.camera, &config.demo);
    let sinks = RawFileSinkFactory::new(&config.video_root);
    let transport = HttpTransport::new(&config.delivery)?;

    info!("🚀 Birdwatch running");
    info!("   Press Ctrl+C to shutdown");

    let engine = Engine::new(config);
    let report = engine
        .run(Box::new(source), Box::new(detector), Box::new(sinks), Arc::new(transport), quit)
        .await?;

    match serde_json::to_string_pretty(&report) {
        Ok(json) => info!("Run summary:\n{}", json),
        Err(e) => warn!("Could not render run summary: {}", e),
    }

    info!("Birdwatch shutdown complete");
    Ok(())
}
