// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Raw frame dump sink
//!
//! Each record is `width: u32`, `height: u32`, `len: u32` (little endian)
//! followed by `len` bytes of frame data.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::{Artifact, RecordingError, RecordingId, SinkFactory, VideoSink};
use crate::capture::Frame;

pub const RAW_EXTENSION: &str = "raw";

const HEADER_LEN: u64 = 12;

/// Writes sessions to `<root>/<day>/<name>.raw`
pub struct RawFileSinkFactory {
    root: PathBuf,
}

impl RawFileSinkFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SinkFactory for RawFileSinkFactory {
    fn open(&mut self, id: &RecordingId) -> Result<Box<dyn VideoSink>, RecordingError> {
        let path = id.path_under(&self.root, RAW_EXTENSION);
        let sink = RawFileSink::create(id.clone(), path).map_err(|e| RecordingError::SinkOpen {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(sink))
    }
}

/// Byte store a recording can be cut back on after a failed write
pub trait RecordStore: Write + Seek + Send {
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Make written bytes durable
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RecordStore for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// One open raw recording.
///
/// Only complete records are kept: `committed` is the end of the last one, and
/// a failed append cuts the store back to it. If that cut fails too the sink
/// refuses further frames.
pub struct RawFileSink<S: RecordStore = File> {
    id: RecordingId,
    path: PathBuf,
    store: S,
    committed: u64,
    broken: bool,
    started_at: DateTime<Utc>,
    frames_written: u64,
    frames_dropped: u64,
}

impl RawFileSink<File> {
    pub fn create(id: RecordingId, path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Never clobber an earlier session
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        info!("Opened recording file {:?}", path);

        Ok(Self::with_store(id, path, file))
    }
}

impl<S: RecordStore> RawFileSink<S> {
    fn with_store(id: RecordingId, path: PathBuf, store: S) -> Self {
        Self {
            id,
            path,
            store,
            committed: 0,
            broken: false,
            started_at: Utc::now(),
            frames_written: 0,
            frames_dropped: 0,
        }
    }

    fn write_record(&mut self, frame: &Frame) -> io::Result<u64> {
        let len = u32::try_from(frame.data.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame larger than 4 GiB"))?;

        let mut header = [0u8; HEADER_LEN as usize];
        header[0..4].copy_from_slice(&frame.width.to_le_bytes());
        header[4..8].copy_from_slice(&frame.height.to_le_bytes());
        header[8..12].copy_from_slice(&len.to_le_bytes());

        self.store.write_all(&header)?;
        self.store.write_all(&frame.data)?;
        Ok(HEADER_LEN + u64::from(len))
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.store.seek(SeekFrom::Start(self.committed))?;
        self.store.truncate(self.committed)
    }
}

impl<S: RecordStore> VideoSink for RawFileSink<S> {
    fn append(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        if self.broken {
            self.frames_dropped += 1;
            return Err(RecordingError::Append {
                sequence: frame.sequence,
                reason: "sink stopped after an unrecoverable write error".to_string(),
            });
        }

        match self.write_record(frame) {
            Ok(written) => {
                self.committed += written;
                self.frames_written += 1;
                Ok(())
            }
            Err(e) => {
                self.frames_dropped += 1;
                if let Err(rewind_err) = self.rewind() {
                    self.broken = true;
                    error!("Could not roll back {:?} after a failed write: {}", self.path, rewind_err);
                }
                Err(RecordingError::Append {
                    sequence: frame.sequence,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn close(self: Box<Self>) -> Result<Artifact, RecordingError> {
        let RawFileSink {
            id,
            path,
            mut store,
            committed,
            broken,
            started_at,
            frames_written,
            frames_dropped,
        } = *self;

        let close_err = |reason: String| RecordingError::SinkClose {
            id: id.clone(),
            reason,
        };

        store.flush().map_err(|e| close_err(e.to_string()))?;
        if broken {
            // Drop a trailing partial record
            store.truncate(committed).map_err(|e| close_err(e.to_string()))?;
        }
        store.sync().map_err(|e| close_err(e.to_string()))?;

        debug!("Closed {:?}: {} frames, {} dropped", path, frames_written, frames_dropped);

        Ok(Artifact {
            id,
            path,
            started_at,
            finished_at: Utc::now(),
            frames_written,
            frames_dropped,
        })
    }
}
