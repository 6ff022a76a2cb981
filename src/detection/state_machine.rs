// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Symmetric debounce state machine
//!
//! Presence must hold for `confirmation_delay` before a recording starts, and
//! absence must hold for the same delay before it stops. The machine does no
//! I/O and reads no clock; callers pass the frame time in, one frame at a
//! time and in frame order.

use std::time::{Duration, Instant};

use super::{DetectionEvent, DetectionState, PresenceSignal};

/// Internal phase; timed phases carry the instant they were entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pending { since: Instant },
    Confirmed,
    Lingering { since: Instant },
}

impl Phase {
    fn state(&self) -> DetectionState {
        match self {
            Phase::Idle => DetectionState::Idle,
            Phase::Pending { .. } => DetectionState::Pending,
            Phase::Confirmed => DetectionState::Confirmed,
            Phase::Lingering { .. } => DetectionState::Lingering,
        }
    }
}

/// Converts noisy presence readings into `RecordingStart` / `RecordingStop`
#[derive(Debug, Clone)]
pub struct DetectionStateMachine {
    phase: Phase,
    confirmation_delay: Duration,
}

impl DetectionStateMachine {
    pub fn new(confirmation_delay: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            confirmation_delay,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.phase.state()
    }

    pub fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    pub fn confirmation_delay(&self) -> Duration {
        self.confirmation_delay
    }

    /// Feed one frame's presence. Returns the event this frame triggers, if any.
    pub fn observe(&mut self, present: bool, now: Instant) -> Option<DetectionEvent> {
        let (next, event) = transition(self.phase, present, now, self.confirmation_delay);
        self.phase = next;
        event
    }

    pub fn observe_signal(&mut self, signal: &PresenceSignal) -> Option<DetectionEvent> {
        self.observe(signal.present, signal.timestamp)
    }
}

fn elapsed(since: Instant, now: Instant) -> Duration {
    now.saturating_duration_since(since)
}

fn transition(
    phase: Phase,
    present: bool,
    now: Instant,
    delay: Duration,
) -> (Phase, Option<DetectionEvent>) {
    match (phase, present) {
        (Phase::Idle, true) => (Phase::Pending { since: now }, None),
        (Phase::Idle, false) => (Phase::Idle, None),

        (Phase::Pending { since }, true) => {
            if elapsed(since, now) >= delay {
                (Phase::Confirmed, Some(DetectionEvent::RecordingStart))
            } else {
                (phase, None)
            }
        }
        // Gone before confirmation: noise
        (Phase::Pending { .. }, false) => (Phase::Idle, None),

        (Phase::Confirmed, true) => (Phase::Confirmed, None),
        (Phase::Confirmed, false) => (Phase::Lingering { since: now }, None),

        (Phase::Lingering { .. }, true) => (Phase::Confirmed, None),
        (Phase::Lingering { since }, false) => {
            if elapsed(since, now) >= delay {
                (Phase::Idle, Some(DetectionEvent::RecordingStop))
            } else {
                (phase, None)
            }
        }
    }
}
