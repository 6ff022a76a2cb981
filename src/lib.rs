// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Birdwatch - Camera Trap Recorder
//!
//! Watches a camera feed, records while something is in front of the lens and
//! ships each clip to a video host without ever stalling capture:
//! - Debounced presence detection (idle, pending, confirmed, lingering)
//! - One recording artifact per confirmed visit
//! - Unbounded FIFO delivery queue drained by a single rate-limited worker
//! - Drain-on-shutdown so no finished clip is lost
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Birdwatch Engine                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  capture thread                                              │
//! │  ┌─────────┐  ┌──────────┐  ┌───────────┐  ┌─────────────┐   │
//! │  │  Frame  │→ │ Presence │→ │ Detection │→ │  Recording  │   │
//! │  │ Source  │  │ Detector │  │  Machine  │  │ Controller  │   │
//! │  └─────────┘  └──────────┘  └───────────┘  └─────────────┘   │
//! │                                                  ↓ submit    │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │                 Delivery Queue (FIFO)                │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │                          ↓ one at a time, rate limited       │
//! │  ┌───────────────┐  ┌───────────┐  ┌──────────────┐          │
//! │  │   Delivery    │→ │  Upload   │→ │    Notify    │          │
//! │  │    Worker     │  │           │  │              │          │
//! │  └───────────────┘  └───────────┘  └──────────────┘          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod core;
pub mod delivery;
pub mod detection;
pub mod recording;

// Re-exports for convenience
pub use capture::{Frame, FrameSource, Presence, PresenceDetector};
pub use config::Config;
pub use core::{Engine, EngineReport};
pub use delivery::{DeliveryPipeline, DeliveryQueue, HttpTransport, Transport};
pub use detection::{DetectionEvent, DetectionState, DetectionStateMachine};
pub use recording::{Artifact, RecordingController, RawFileSinkFactory};

/// Birdwatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Birdwatch name
pub const NAME: &str = "Birdwatch";
