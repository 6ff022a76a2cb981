// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Detection module - debounces per-frame presence into recording events

mod state_machine;

pub use state_machine::DetectionStateMachine;

use std::fmt;
use std::time::Instant;
use serde::{Deserialize, Serialize};

use crate::capture::{BoundingBox, Presence};

/// Debounce state of the watched region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionState {
    /// Nothing present, not recording
    Idle,
    /// Something appeared; waiting for it to stay
    Pending,
    /// Presence confirmed; recording
    Confirmed,
    /// Object briefly gone after confirmation; still recording
    Lingering,
}

impl DetectionState {
    /// Recording is active exactly in `Confirmed` and `Lingering`
    pub fn is_recording(&self) -> bool {
        matches!(self, DetectionState::Confirmed | DetectionState::Lingering)
    }
}

impl Default for DetectionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for DetectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DetectionState::Idle => "idle",
            DetectionState::Pending => "pending",
            DetectionState::Confirmed => "confirmed",
            DetectionState::Lingering => "lingering",
        };
        f.write_str(label)
    }
}

/// Event emitted when the debounced presence flips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionEvent {
    RecordingStart,
    RecordingStop,
}

/// Per-frame presence with its capture time
#[derive(Debug, Clone)]
pub struct PresenceSignal {
    pub present: bool,
    pub timestamp: Instant,
    pub regions: Vec<BoundingBox>,
}

impl PresenceSignal {
    pub fn from_presence(presence: Presence, timestamp: Instant) -> Self {
        Self {
            present: presence.present,
            timestamp,
            regions: presence.regions,
        }
    }
}
