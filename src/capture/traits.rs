// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Frame and presence types, plus the traits the camera and detector implement

use std::time::Instant;
use serde::{Deserialize, Serialize};

use super::CaptureError;

/// A single raw frame as delivered by the camera
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    /// Monotonic capture time, used for all debounce timing
    pub timestamp: Instant,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(sequence: u64, timestamp: Instant, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            sequence,
            timestamp,
            width,
            height,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Axis-aligned box around a detected object, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Detector verdict for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presence {
    pub present: bool,
    /// Debug geometry only; never consulted by the state machine
    pub regions: Vec<BoundingBox>,
}

impl Presence {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn with_regions(regions: Vec<BoundingBox>) -> Self {
        Self {
            present: !regions.is_empty(),
            regions,
        }
    }
}

/// Camera abstraction: yields frames in capture order until end of stream
pub trait FrameSource: Send {
    /// Next frame, or `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Release the device. Further calls to `next_frame` fail with `Closed`.
    fn close(&mut self) -> Result<(), CaptureError>;
}

/// Object-presence detector (segmentation, thresholding and area filtering
/// live behind this trait)
pub trait PresenceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Presence, CaptureError>;
}
