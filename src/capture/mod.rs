// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Capture module - frames, presence readings and the camera/detector seams

mod traits;
mod simulator;

pub use traits::*;
pub use simulator::{SimulatedCamera, SimulatedDetector};

use thiserror::Error;

/// Errors raised by a frame source or a presence detector
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The camera went away mid-stream
    #[error("Frame source disconnected: {0}")]
    Disconnected(String),

    #[error("Frame source already closed")]
    Closed,

    #[error("Detector error: {0}")]
    Detector(String),
}
