// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! HTTP transport: multipart upload to the video host, form POST to the mail API

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use super::{DeliveryError, ShareableReference, Transport};
use crate::config::{DeliveryConfig, NotifyConfig, UploadConfig};
use crate::recording::Artifact;

/// Body returned by the video host on a successful upload
#[derive(Debug, Deserialize)]
struct UploadResponse {
    shortcode: String,
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    upload: UploadConfig,
    notify: NotifyConfig,
}

impl HttpTransport {
    pub fn new(config: &DeliveryConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("birdwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            upload: config.upload.clone(),
            notify: config.notify.clone(),
        })
    }

    fn share_link(&self, shortcode: &str) -> ShareableReference {
        share_link(&self.upload.share_base_url, shortcode)
    }
}

fn share_link(base: &str, shortcode: &str) -> ShareableReference {
    ShareableReference::new(format!("{}/{}", base.trim_end_matches('/'), shortcode))
}

fn parse_upload_response(body: &str) -> Result<String, DeliveryError> {
    let response: UploadResponse = serde_json::from_str(body)
        .map_err(|e| DeliveryError::InvalidResponse(format!("{}: {}", e, body)))?;

    if response.shortcode.trim().is_empty() {
        return Err(DeliveryError::InvalidResponse("empty shortcode".to_string()));
    }
    Ok(response.shortcode)
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(&self, artifact: &Artifact) -> Result<ShareableReference, DeliveryError> {
        let file = tokio::fs::File::open(&artifact.path).await?;
        let len = file.metadata().await?.len();
        debug!("Uploading {:?} ({} bytes) to {}", artifact.path, len, self.upload.url);

        // Streamed from disk, never buffered whole
        let part = Part::stream_with_length(file, len)
            .file_name(artifact.file_name())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        let response = self.client
            .post(&self.upload.url)
            .basic_auth(&self.upload.username, Some(&self.upload.password))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let shortcode = parse_upload_response(&body)?;
        Ok(self.share_link(&shortcode))
    }

    async fn notify(&self, reference: &ShareableReference) -> Result<(), DeliveryError> {
        if !self.notify.enabled {
            info!("Notifications disabled; video link: {}", reference);
            return Ok(());
        }

        let text = format!("Video link: {}", reference);
        let params = [
            ("from", self.notify.sender.as_str()),
            ("to", self.notify.recipient.as_str()),
            ("subject", self.notify.subject.as_str()),
            ("text", text.as_str()),
        ];

        let response = self.client
            .post(&self.notify.url)
            .basic_auth("api", Some(&self.notify.api_key))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
