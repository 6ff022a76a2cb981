// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Camera and detector simulators for demo mode and testing

use std::time::{Duration, Instant};
use rand::prelude::*;
use tracing::debug;

use super::{BoundingBox, CaptureError, Frame, FrameSource, Presence, PresenceDetector};
use crate::config::{CameraConfig, DemoConfig};

/// Paced synthetic camera producing grey frames at a fixed rate
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    frame_interval: Duration,
    max_frames: Option<u64>,
    sequence: u64,
    last_frame: Option<Instant>,
    closed: bool,
}

impl SimulatedCamera {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        let frame_interval = if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::ZERO
        };

        Self {
            width,
            height,
            frame_interval,
            max_frames: None,
            sequence: 0,
            last_frame: None,
            closed: false,
        }
    }

    pub fn from_config(camera: &CameraConfig, demo: &DemoConfig) -> Self {
        Self::new(camera.width, camera.height, camera.fps).with_max_frames(demo.max_frames)
    }

    /// Stop after `max_frames` frames (end of stream)
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());
    }
}

impl FrameSource for SimulatedCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.closed {
            return Err(CaptureError::Closed);
        }

        if let Some(max) = self.max_frames {
            if self.sequence >= max {
                return Ok(None);
            }
        }

        self.pace();

        let len = self.width as usize * self.height as usize;
        let shade = (self.sequence % 256) as u8;
        let frame = Frame::new(self.sequence, Instant::now(), self.width, self.height, vec![shade; len]);
        self.sequence += 1;

        Ok(Some(frame))
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        if !self.closed {
            debug!("Simulated camera closed after {} frames", self.sequence);
        }
        self.closed = true;
        Ok(())
    }
}

/// Presence detector that invents visits of random length, with flicker
pub struct SimulatedDetector {
    rng: StdRng,
    fps: f64,
    width: u32,
    height: u32,
    visit_probability: f64,
    mean_visit_secs: f64,
    flicker_probability: f64,
    remaining_frames: u64,
    current_box: Option<BoundingBox>,
}

impl SimulatedDetector {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            fps,
            width,
            height,
            visit_probability: 0.01,
            mean_visit_secs: 5.0,
            flicker_probability: 0.05,
            remaining_frames: 0,
            current_box: None,
        }
    }

    pub fn from_config(camera: &CameraConfig, demo: &DemoConfig) -> Self {
        let mut detector = Self::new(camera.width, camera.height, camera.fps);
        detector.visit_probability = demo.visit_probability;
        detector.mean_visit_secs = demo.mean_visit_secs;
        detector.flicker_probability = demo.flicker_probability;
        if let Some(seed) = demo.seed {
            detector.rng = StdRng::seed_from_u64(seed);
        }
        detector
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn start_visit(&mut self) {
        let mean_frames = (self.mean_visit_secs * self.fps).max(1.0);
        let frames = self.rng.gen_range(mean_frames * 0.5..=mean_frames * 1.5);
        self.remaining_frames = frames.round() as u64;

        let w = (self.width / 8).max(1);
        let h = (self.height / 8).max(1);
        let x = self.rng.gen_range(0..=self.width.saturating_sub(w));
        let y = self.rng.gen_range(0..=self.height.saturating_sub(h));
        self.current_box = Some(BoundingBox::new(x, y, w, h));

        debug!("Simulated visit for {} frames", self.remaining_frames);
    }
}

impl PresenceDetector for SimulatedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Presence, CaptureError> {
        if self.remaining_frames == 0 {
            self.current_box = None;
            if self.rng.gen::<f64>() < self.visit_probability {
                self.start_visit();
            } else {
                return Ok(Presence::absent());
            }
        }

        self.remaining_frames -= 1;

        if self.rng.gen::<f64>() < self.flicker_probability {
            return Ok(Presence::absent());
        }

        Ok(Presence::with_regions(self.current_box.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_stops_at_max_frames() {
        let mut camera = SimulatedCamera::new(4, 4, 0.0).with_max_frames(Some(3));

        let mut count = 0;
        while let Some(frame) = camera.next_frame().unwrap() {
            assert_eq!(frame.sequence, count);
            assert_eq!(frame.len(), 16);
            count += 1;
        }

        assert_eq!(count, 3);
    }

    #[test]
    fn test_camera_closed_rejects_reads() {
        let mut camera = SimulatedCamera::new(4, 4, 0.0);
        camera.close().unwrap();

        assert!(matches!(camera.next_frame(), Err(CaptureError::Closed)));
    }

    #[test]
    fn test_detector_visits_produce_regions() {
        let mut camera = SimulatedCamera::new(64, 48, 0.0).with_max_frames(Some(500));
        let mut detector = SimulatedDetector::new(64, 48, 10.0).with_seed(7);
        detector.visit_probability = 0.2;
        detector.flicker_probability = 0.0;

        let mut present_frames = 0;
        while let Some(frame) = camera.next_frame().unwrap() {
            let presence = detector.detect(&frame).unwrap();
            if presence.present {
                present_frames += 1;
                assert_eq!(presence.regions.len(), 1);
                let region = presence.regions[0];
                assert!(region.x + region.width <= 64);
                assert!(region.y + region.height <= 48);
            } else {
                assert!(presence.regions.is_empty());
            }
        }

        assert!(present_frames > 0);
    }
}
