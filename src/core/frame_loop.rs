// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Per-frame capture loop: detect, debounce, record
//!
//! Runs on one thread. Detection and recording always execute back to back
//! for the same frame, never concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::capture::{Frame, FrameSource, PresenceDetector};
use crate::config::Config;
use crate::delivery::DeliveryQueue;
use crate::detection::{DetectionEvent, DetectionState, DetectionStateMachine, PresenceSignal};
use crate::recording::{RecordingController, RecordingError, SessionStats, SinkFactory};

/// Capture-side totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameLoopStats {
    pub frames: u64,
    pub warmup_frames: u64,
    pub detector_errors: u64,
    pub events: u64,
    pub sessions: SessionStats,
}

pub struct FrameLoop {
    detector: Box<dyn PresenceDetector>,
    machine: DetectionStateMachine,
    recorder: RecordingController,
    warmup: Duration,
    debug_overlay: bool,
    first_frame: Option<Instant>,
    stats: FrameLoopStats,
}

impl FrameLoop {
    pub fn new(
        detector: Box<dyn PresenceDetector>,
        machine: DetectionStateMachine,
        recorder: RecordingController,
        warmup: Duration,
        debug_overlay: bool,
    ) -> Self {
        Self {
            detector,
            machine,
            recorder,
            warmup,
            debug_overlay,
            first_frame: None,
            stats: FrameLoopStats::default(),
        }
    }

    pub fn from_config(
        config: &Config,
        detector: Box<dyn PresenceDetector>,
        sinks: Box<dyn SinkFactory>,
        queue: DeliveryQueue,
    ) -> Self {
        Self::new(
            detector,
            DetectionStateMachine::new(config.detection.confirmation_delay()),
            RecordingController::new(sinks, queue),
            config.camera.warmup(),
            config.detection.debug_overlay,
        )
    }

    pub fn state(&self) -> DetectionState {
        self.machine.state()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn stats(&self) -> FrameLoopStats {
        FrameLoopStats {
            sessions: self.recorder.stats().clone(),
            ..self.stats.clone()
        }
    }

    /// Process one frame. Only a broken detection/recording contract is an error.
    pub fn step(&mut self, frame: Frame) -> Result<Option<DetectionEvent>, RecordingError> {
        let now = frame.timestamp;
        let first = *self.first_frame.get_or_insert(now);
        self.stats.frames += 1;

        // The detector sees warm-up frames too so its background model can settle
        let presence = match self.detector.detect(&frame) {
            Ok(presence) => Some(presence),
            Err(e) => {
                self.stats.detector_errors += 1;
                warn!("Detector failed on frame {}: {}", frame.sequence, e);
                None
            }
        };

        if !self.warmup.is_zero() && now.saturating_duration_since(first) <= self.warmup {
            self.stats.warmup_frames += 1;
            return Ok(None);
        }

        let event = match presence {
            Some(presence) => self.observe(PresenceSignal::from_presence(presence, now), frame.sequence)?,
            None => None,
        };

        self.recorder.record_frame(&frame);
        Ok(event)
    }

    fn observe(&mut self, signal: PresenceSignal, sequence: u64) -> Result<Option<DetectionEvent>, RecordingError> {
        if self.debug_overlay && !signal.regions.is_empty() {
            debug!(frame = sequence, state = %self.machine.state(), regions = ?signal.regions, "Detected regions");
        }

        let before = self.machine.state();
        let event = self.machine.observe_signal(&signal);
        let after = self.machine.state();

        if before != after {
            log_transition(before, after);
        }

        if let Some(event) = event {
            self.stats.events += 1;
            self.recorder.handle_event(event)?;
        }

        Ok(event)
    }

    /// Pull frames until end of stream, a quit request, or a fatal error.
    /// The source is always released and any open recording finalized before
    /// returning, so its artifact is queued before delivery is told to drain.
    pub fn run(&mut self, source: &mut dyn FrameSource, quit: &AtomicBool) -> Result<FrameLoopStats> {
        info!("Capture loop started");
        let mut outcome = Ok(());

        loop {
            if quit.load(Ordering::SeqCst) {
                info!("Quit requested");
                break;
            }

            match source.next_frame() {
                Ok(Some(frame)) => {
                    if let Err(e) = self.step(frame) {
                        error!("Stopping capture: {}", e);
                        outcome = Err(anyhow::Error::new(e));
                        break;
                    }
                }
                Ok(None) => {
                    info!("Frame source reached end of stream");
                    break;
                }
                Err(e) => {
                    error!("Frame source failed: {}", e);
                    outcome = Err(anyhow::Error::new(e).context("frame source failed"));
                    break;
                }
            }
        }

        if let Err(e) = source.close() {
            warn!("Failed to release frame source: {}", e);
        }
        self.recorder.finish();

        let stats = self.stats();
        info!(
            "Capture loop stopped after {} frames ({} sessions recorded)",
            stats.frames, stats.sessions.completed
        );
        outcome.map(|_| stats)
    }
}

fn log_transition(before: DetectionState, after: DetectionState) {
    use DetectionState::*;

    match (before, after) {
        (Idle, Pending) => info!("Motion detected, waiting for confirmation..."),
        (Pending, Confirmed) => info!("Presence confirmed, starting recording"),
        (Pending, Idle) => info!("Motion not sustained, nothing detected"),
        (Confirmed, Lingering) => info!("Object might have left, waiting..."),
        (Lingering, Confirmed) => info!("Object left and came back"),
        (Lingering, Idle) => info!("Object left, stopping recording"),
        _ => debug!("State {} -> {}", before, after),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureError, Presence};
    use crate::delivery::{DeliveryPipeline, DeliveryError, ShareableReference, Transport};
    use crate::recording::{Artifact, RawFileSinkFactory};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Arc;

    fn presence(present: bool) -> Presence {
        Presence { present, regions: Vec::new() }
    }

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        fn name(&self) -> &str {
            "null"
        }

        async fn upload(&self, _artifact: &Artifact) -> Result<ShareableReference, DeliveryError> {
            Ok(ShareableReference::new("https://clips.example/x"))
        }

        async fn notify(&self, _reference: &ShareableReference) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    /// Frames at scripted offsets, with a scripted presence per frame
    struct ScriptedSource {
        frames: VecDeque<Frame>,
        closed: bool,
        fail_at_end: bool,
    }

    impl ScriptedSource {
        fn new(base: Instant, offsets: &[f64]) -> Self {
            let frames = offsets
                .iter()
                .enumerate()
                .map(|(i, secs)| Frame::new(i as u64, base + Duration::from_secs_f64(*secs), 2, 2, vec![i as u8; 4]))
                .collect();
            Self {
                frames,
                closed: false,
                fail_at_end: false,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            match self.frames.pop_front() {
                Some(frame) => Ok(Some(frame)),
                None if self.fail_at_end => Err(CaptureError::Disconnected("usb reset".to_string())),
                None => Ok(None),
            }
        }

        fn close(&mut self) -> Result<(), CaptureError> {
            self.closed = true;
            Ok(())
        }
    }

    struct ScriptedDetector {
        script: VecDeque<Result<bool, ()>>,
    }

    impl ScriptedDetector {
        fn new(script: &[bool]) -> Self {
            Self {
                script: script.iter().map(|p| Ok(*p)).collect(),
            }
        }
    }

    impl PresenceDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Presence, CaptureError> {
            match self.script.pop_front() {
                Some(Ok(present)) => Ok(presence(present)),
                Some(Err(())) => Err(CaptureError::Detector("model not loaded".to_string())),
                None => Ok(Presence::absent()),
            }
        }
    }

    fn frame_loop(
        detector: ScriptedDetector,
        root: &std::path::Path,
        warmup: Duration,
    ) -> (FrameLoop, DeliveryQueue, DeliveryPipeline) {
        let (pipeline, queue) = DeliveryPipeline::with_settings(Arc::new(NullTransport), Duration::from_secs(1), 1);
        let recorder = RecordingController::new(Box::new(RawFileSinkFactory::new(root)), queue.clone());
        let machine = DetectionStateMachine::new(Duration::from_secs(1));
        (FrameLoop::new(Box::new(detector), machine, recorder, warmup, true), queue, pipeline)
    }

    #[test]
    fn test_visit_produces_one_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let base = Instant::now();
        let offsets = [0.0, 0.5, 1.1, 1.5, 2.0, 2.4, 2.6, 3.7, 4.0];
        let script = [true, true, true, true, false, true, false, false, false];

        let (mut fl, queue, _pipeline) = frame_loop(ScriptedDetector::new(&script), dir.path(), Duration::ZERO);
        let mut source = ScriptedSource::new(base, &offsets);
        let stats = fl.run(&mut source, &AtomicBool::new(false)).unwrap();

        assert!(source.closed);
        assert_eq!(stats.frames, 9);
        assert_eq!(stats.events, 2);
        assert_eq!(stats.sessions.completed, 1);
        // Frames 2 (start) through 6; the stop frame is not written
        assert_eq!(stats.sessions.frames_appended, 5);
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_step_reports_events_on_trigger_frames() {
        let dir = tempfile::tempdir().unwrap();
        let base = Instant::now();
        let script = [true, true, true, false, false];
        let offsets = [0.0, 0.5, 1.1, 2.0, 3.1];

        let (mut fl, _queue, _pipeline) = frame_loop(ScriptedDetector::new(&script), dir.path(), Duration::ZERO);
        let mut source = ScriptedSource::new(base, &offsets);

        let mut events = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            events.push(fl.step(frame).unwrap());
        }

        assert_eq!(
            events,
            vec![None, None, Some(DetectionEvent::RecordingStart), None, Some(DetectionEvent::RecordingStop)]
        );
        assert!(!fl.is_recording());
        assert_eq!(fl.state(), DetectionState::Idle);
    }

    #[test]
    fn test_warmup_frames_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let base = Instant::now();
        let offsets = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let (mut fl, queue, _pipeline) = frame_loop(ScriptedDetector::new(&[true; 7]), dir.path(), Duration::from_secs(4));
        let mut source = ScriptedSource::new(base, &offsets);
        let stats = fl.run(&mut source, &AtomicBool::new(false)).unwrap();

        // The frame exactly at the warm-up boundary is still discarded
        assert_eq!(stats.warmup_frames, 5);
        // Presence only counted from t=5.0, confirmed at t=6.0
        assert_eq!(stats.sessions.started, 1);
        // Capture ended mid-visit; the recording is finalized and queued
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_detector_error_skips_observation() {
        let dir = tempfile::tempdir().unwrap();
        let base = Instant::now();
        let offsets = [0.0, 0.6, 1.2];

        let detector = ScriptedDetector {
            script: vec![Ok(true), Err(()), Ok(true)].into(),
        };
        let (mut fl, _queue, _pipeline) = frame_loop(detector, dir.path(), Duration::ZERO);
        let mut source = ScriptedSource::new(base, &offsets);
        let stats = fl.run(&mut source, &AtomicBool::new(false)).unwrap();

        assert_eq!(stats.detector_errors, 1);
        // The failed frame did not reset the pending timer
        assert_eq!(stats.sessions.started, 1);
    }

    #[test]
    fn test_quit_flag_stops_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let (mut fl, _queue, _pipeline) = frame_loop(ScriptedDetector::new(&[true]), dir.path(), Duration::ZERO);
        let mut source = ScriptedSource::new(Instant::now(), &[0.0, 0.1]);

        let stats = fl.run(&mut source, &AtomicBool::new(true)).unwrap();

        assert_eq!(stats.frames, 0);
        assert!(source.closed);
    }

    #[test]
    fn test_source_error_mid_visit_finalizes_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (mut fl, queue, _pipeline) = frame_loop(ScriptedDetector::new(&[true; 4]), dir.path(), Duration::ZERO);
        let mut source = ScriptedSource::new(Instant::now(), &[0.0, 0.5, 1.1, 1.5]);
        source.fail_at_end = true;

        let err = fl.run(&mut source, &AtomicBool::new(false)).unwrap_err();

        assert!(matches!(err.downcast_ref::<CaptureError>(), Some(CaptureError::Disconnected(_))));
        assert!(source.closed);
        assert!(!fl.is_recording());
        let stats = fl.stats();
        assert_eq!(stats.sessions.completed, 1);
        assert_eq!(stats.sessions.frames_appended, 2);
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_contract_violation_stops_capture() {
        let dir = tempfile::tempdir().unwrap();
        let (_pipeline, queue) = DeliveryPipeline::with_settings(Arc::new(NullTransport), Duration::from_secs(1), 1);
        let mut recorder = RecordingController::new(Box::new(RawFileSinkFactory::new(dir.path())), queue.clone());
        // Recorder already has a session the detection side knows nothing about
        recorder.handle_event(DetectionEvent::RecordingStart).unwrap();

        let machine = DetectionStateMachine::new(Duration::from_secs(1));
        let detector = ScriptedDetector::new(&[true; 4]);
        let mut fl = FrameLoop::new(Box::new(detector), machine, recorder, Duration::ZERO, false);
        let mut source = ScriptedSource::new(Instant::now(), &[0.0, 0.5, 1.1, 1.5]);

        let err = fl.run(&mut source, &AtomicBool::new(false)).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RecordingError>(),
            Some(RecordingError::ContractViolation(_))
        ));
        // Stopped on the start frame; the last frame was never read
        assert_eq!(fl.stats().frames, 3);
        assert_eq!(source.frames.len(), 1);
        assert!(source.closed);
        // The stray session is still finalized and queued
        assert!(!fl.is_recording());
        assert_eq!(queue.pending(), 1);
    }
}
