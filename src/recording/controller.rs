// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Recording controller - owns at most one open session at a time

use chrono::Local;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{RecordingError, RecordingId, SinkFactory, VideoSink};
use crate::capture::Frame;
use crate::delivery::DeliveryQueue;
use crate::detection::DetectionEvent;

enum Session {
    /// No confirmed visit in progress
    Inactive,
    /// Visit in progress, frames are being written
    Active {
        id: RecordingId,
        sink: Box<dyn VideoSink>,
    },
    /// Visit in progress but the sink could not be opened
    Abandoned { id: RecordingId },
}

/// Per-run session counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub started: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub frames_appended: u64,
    pub frames_dropped: u64,
    pub submit_failures: u64,
}

/// Turns detection events into recording sessions and hands finished
/// artifacts to delivery
pub struct RecordingController {
    sinks: Box<dyn SinkFactory>,
    queue: DeliveryQueue,
    session: Session,
    last_id: Option<RecordingId>,
    collisions: u32,
    stats: SessionStats,
}

impl RecordingController {
    pub fn new(sinks: Box<dyn SinkFactory>, queue: DeliveryQueue) -> Self {
        Self {
            sinks,
            queue,
            session: Session::Inactive,
            last_id: None,
            collisions: 0,
            stats: SessionStats::default(),
        }
    }

    /// True while frames are being written
    pub fn is_recording(&self) -> bool {
        matches!(self.session, Session::Active { .. })
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn handle_event(&mut self, event: DetectionEvent) -> Result<(), RecordingError> {
        match event {
            DetectionEvent::RecordingStart => self.start(),
            DetectionEvent::RecordingStop => self.stop(),
        }
    }

    /// Append a frame to the open session, if any. A failed write loses the
    /// frame but keeps the session going.
    pub fn record_frame(&mut self, frame: &Frame) {
        if let Session::Active { id, sink } = &mut self.session {
            match sink.append(frame) {
                Ok(()) => self.stats.frames_appended += 1,
                Err(e) => {
                    self.stats.frames_dropped += 1;
                    warn!("Dropped frame {} from {}: {}", frame.sequence, id, e);
                }
            }
        }
    }

    /// Finalize whatever is open; used when capture shuts down mid-visit
    pub fn finish(&mut self) {
        if let Session::Active { id, sink } = std::mem::replace(&mut self.session, Session::Inactive) {
            info!("Capture stopping during {}; finalizing recording", id);
            self.finalize(id, sink);
        }
    }

    fn start(&mut self) -> Result<(), RecordingError> {
        if let Session::Active { id, .. } | Session::Abandoned { id } = &self.session {
            return Err(RecordingError::ContractViolation(format!(
                "recording start while {} is still open",
                id
            )));
        }

        let id = self.next_id();
        self.stats.started += 1;

        match self.sinks.open(&id) {
            Ok(sink) => {
                info!("Recording started: {}", id);
                self.session = Session::Active { id, sink };
            }
            Err(e) => {
                self.stats.abandoned += 1;
                error!("Could not open recording {}, abandoning session: {}", id, e);
                self.session = Session::Abandoned { id };
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordingError> {
        match std::mem::replace(&mut self.session, Session::Inactive) {
            Session::Inactive => Err(RecordingError::ContractViolation(
                "recording stop without an open session".to_string(),
            )),
            Session::Abandoned { id } => {
                debug!("Abandoned session {} ended", id);
                Ok(())
            }
            Session::Active { id, sink } => {
                self.finalize(id, sink);
                Ok(())
            }
        }
    }

    /// Close the sink and hand the artifact over to delivery
    fn finalize(&mut self, id: RecordingId, sink: Box<dyn VideoSink>) {
        let artifact = match sink.close() {
            Ok(artifact) => artifact,
            Err(e) => {
                self.stats.abandoned += 1;
                error!("Could not finalize recording {}, nothing will be delivered: {}", id, e);
                return;
            }
        };

        self.stats.completed += 1;
        info!(
            "Recording stopped: {} ({} frames, {:.1}s)",
            artifact.id,
            artifact.frames_written,
            artifact.duration_secs()
        );

        let path = artifact.path.clone();
        if let Err(e) = self.queue.submit(artifact) {
            self.stats.submit_failures += 1;
            error!("Could not queue {:?} for delivery: {}", path, e);
        }
    }

    /// Identifier from the local start time, disambiguated within the same second
    fn next_id(&mut self) -> RecordingId {
        let base = RecordingId::from_start(Local::now());

        let id = if self.last_id.as_ref() == Some(&base) {
            self.collisions += 1;
            base.with_suffix(self.collisions)
        } else {
            self.collisions = 0;
            base.clone()
        };

        self.last_id = Some(base);
        id
    }
}
