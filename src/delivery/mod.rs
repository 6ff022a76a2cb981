// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Delivery module - uploads finished recordings and announces them

mod pipeline;
mod http;

pub use pipeline::{DeliveryPipeline, DeliveryQueue, PipelineReport};
pub use http::HttpTransport;

use std::fmt;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recording::Artifact;

/// Delivery errors
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Delivery queue is closed")]
    QueueClosed,
}

/// Link a viewer can open to watch an uploaded clip
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareableReference(String);

impl ShareableReference {
    pub fn new(link: impl Into<String>) -> Self {
        Self(link.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An artifact waiting in the delivery queue
#[derive(Debug)]
pub struct DeliveryTask {
    pub id: u64,
    pub artifact: Artifact,
    /// Upload attempts made so far
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl DeliveryTask {
    pub fn new(id: u64, artifact: Artifact) -> Self {
        Self {
            id,
            artifact,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }
}

/// Remote side of delivery: the video host and the notification channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Upload the artifact and return where it can be viewed
    async fn upload(&self, artifact: &Artifact) -> Result<ShareableReference, DeliveryError>;

    /// Tell the viewer a new clip is available
    async fn notify(&self, reference: &ShareableReference) -> Result<(), DeliveryError>;
}
