// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Main engine - wires capture, recording and delivery together

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info};

use super::frame_loop::{FrameLoop, FrameLoopStats};
use super::shutdown;
use crate::capture::{FrameSource, PresenceDetector};
use crate::config::Config;
use crate::delivery::{DeliveryPipeline, PipelineReport, Transport};
use crate::recording::SinkFactory;

/// Summary of one engine run
#[derive(Debug, Clone, Serialize)]
pub struct EngineReport {
    pub capture: FrameLoopStats,
    pub delivery: PipelineReport,
    pub elapsed_secs: f64,
}

/// Main birdwatch engine
pub struct Engine {
    config: Arc<Config>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run until the source ends or `quit` is set, then drain delivery.
    ///
    /// The capture loop runs on a blocking thread. Shutdown is only signalled
    /// to the delivery worker after the capture loop has returned, so the
    /// final recording is already queued when draining starts.
    pub async fn run(
        &self,
        mut source: Box<dyn FrameSource>,
        detector: Box<dyn PresenceDetector>,
        sinks: Box<dyn SinkFactory>,
        transport: Arc<dyn Transport>,
        quit: Arc<AtomicBool>,
    ) -> Result<EngineReport> {
        let started = Instant::now();
        info!("Starting birdwatch engine (delivery via {})", transport.name());

        let (pipeline, queue) = DeliveryPipeline::new(transport, &self.config.delivery);
        let (trigger, signal) = shutdown::channel();
        let worker = pipeline.spawn(signal);

        let mut frame_loop = FrameLoop::from_config(&self.config, detector, sinks, queue);
        let capture = tokio::task::spawn_blocking(move || frame_loop.run(source.as_mut(), &quit))
            .await
            .context("capture loop panicked")
            .and_then(|result| result);

        info!("Capture finished, draining delivery queue");
        trigger.trigger();
        let delivery = worker.await.context("delivery worker panicked")?;

        let capture = match capture {
            Ok(stats) => stats,
            Err(e) => {
                error!("Engine stopped with error after delivering {} videos", delivery.delivered);
                return Err(e);
            }
        };

        let report = EngineReport {
            capture,
            delivery,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        info!(
            "Engine stopped: {} recordings, {} delivered, {} failed",
            report.capture.sessions.completed, report.delivery.delivered, report.delivery.failed
        );
        Ok(report)
    }
}
