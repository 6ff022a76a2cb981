// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Recording module - one session per confirmed visit, finalized into an artifact

mod controller;
mod raw_file;

pub use controller::{RecordingController, SessionStats};
pub use raw_file::{RawFileSink, RawFileSinkFactory, RecordStore, RAW_EXTENSION};

use std::fmt;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::Frame;

/// Recording errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to open sink for {id}: {reason}")]
    SinkOpen { id: RecordingId, reason: String },

    #[error("Failed to append frame {sequence}: {reason}")]
    Append { sequence: u64, reason: String },

    #[error("Failed to close sink for {id}: {reason}")]
    SinkClose { id: RecordingId, reason: String },

    /// Detection and recording disagree about whether a session is open
    #[error("Recording contract violated: {0}")]
    ContractViolation(String),
}

/// Stable identifier of one recording session: `<YYYY-MM-DD>/<HHMMSS>[-N]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordingId {
    day: String,
    name: String,
}

impl RecordingId {
    /// Identifier for a session starting at `started`
    pub fn from_start(started: DateTime<Local>) -> Self {
        Self {
            day: started.format("%Y-%m-%d").to_string(),
            name: started.format("%H%M%S").to_string(),
        }
    }

    pub fn new(day: &str, name: &str) -> Self {
        Self {
            day: day.to_string(),
            name: name.to_string(),
        }
    }

    /// Same identifier with a `-n` disambiguation suffix
    pub fn with_suffix(&self, n: u32) -> Self {
        Self {
            day: self.day.clone(),
            name: format!("{}-{}", self.name, n),
        }
    }

    pub fn day(&self) -> &str {
        &self.day
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location of this session under a storage root
    pub fn path_under(&self, root: &Path, extension: &str) -> PathBuf {
        root.join(&self.day).join(format!("{}.{}", self.name, extension))
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.day, self.name)
    }
}

/// A finished recording. Move-only: ownership passes from the recorder to delivery.
#[derive(Debug, Serialize)]
pub struct Artifact {
    pub id: RecordingId,
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub frames_written: u64,
    pub frames_dropped: u64,
}

impl Artifact {
    pub fn new(id: RecordingId, path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id,
            path,
            started_at: now,
            finished_at: now,
            frames_written: 0,
            frames_dropped: 0,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.id.name().to_string())
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// An open recording: frames go in, an artifact comes out
pub trait VideoSink: Send {
    fn append(&mut self, frame: &Frame) -> Result<(), RecordingError>;

    /// Finalize the recording
    fn close(self: Box<Self>) -> Result<Artifact, RecordingError>;
}

/// Opens sinks for new sessions (the video writer)
pub trait SinkFactory: Send {
    fn open(&mut self, id: &RecordingId) -> Result<Box<dyn VideoSink>, RecordingError>;
}
