// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Configuration module

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root folder for recordings; each day gets a subfolder
    pub video_root: PathBuf,

    /// Log level
    pub log_level: String,

    /// Run with the simulated camera and detector
    pub demo_mode: bool,

    /// Camera configuration
    pub camera: CameraConfig,

    /// Detection configuration
    pub detection: DetectionConfig,

    /// Delivery configuration
    pub delivery: DeliveryConfig,

    /// Simulator knobs for demo mode
    pub demo: DemoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video_root: PathBuf::from("./videos"),
            log_level: "info".to_string(),
            demo_mode: true,
            camera: CameraConfig::default(),
            detection: DetectionConfig::default(),
            delivery: DeliveryConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("birdwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        check_seconds("detection.confirmation_delay_secs", self.detection.confirmation_delay_secs)?;
        check_seconds("delivery.inter_attempt_delay_secs", self.delivery.inter_attempt_delay_secs)?;
        check_seconds("camera.warmup_secs", self.camera.warmup_secs)?;

        if !(self.camera.fps.is_finite() && self.camera.fps > 0.0) {
            bail!("camera.fps must be positive, got {}", self.camera.fps);
        }
        if self.delivery.max_attempts == 0 {
            bail!("delivery.max_attempts must be at least 1");
        }
        if self.delivery.upload.url.trim().is_empty() {
            bail!("delivery.upload.url must not be empty");
        }
        if self.delivery.notify.enabled && self.delivery.notify.url.trim().is_empty() {
            bail!("delivery.notify.url must not be empty when notifications are enabled");
        }

        Ok(())
    }
}

/// Upper bound for every configured delay (one week)
pub const MAX_DELAY_SECS: f64 = 7.0 * 24.0 * 3600.0;

fn check_seconds(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("{} must be a non-negative number of seconds, got {}", name, value);
    }
    if value > MAX_DELAY_SECS || Duration::try_from_secs_f64(value).is_err() {
        bail!("{} must be at most {} seconds, got {}", name, MAX_DELAY_SECS, value);
    }
    Ok(())
}

/// Seconds to a `Duration`, clamped to `[0, MAX_DELAY_SECS]`. NaN maps to zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_DELAY_SECS)).unwrap_or(Duration::ZERO)
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Frames per second
    pub fps: f64,

    /// Time the camera needs to settle after boot; detection is ignored meanwhile
    pub warmup_secs: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 10.0,
            warmup_secs: 10.0,
        }
    }
}

impl CameraConfig {
    pub fn warmup(&self) -> Duration {
        seconds(self.warmup_secs)
    }
}

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// How long presence (and later absence) must hold before acting
    pub confirmation_delay_secs: f64,

    /// Log detector geometry every frame
    pub debug_overlay: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confirmation_delay_secs: 1.0,
            debug_overlay: true,
        }
    }
}

impl DetectionConfig {
    pub fn confirmation_delay(&self) -> Duration {
        seconds(self.confirmation_delay_secs)
    }
}

/// Delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Pause before every dequeue attempt; keeps the upload service from throttling us
    pub inter_attempt_delay_secs: f64,

    /// Upload attempts per artifact. 1 drops the artifact on its first failure.
    pub max_attempts: u32,

    /// HTTP request timeout
    pub request_timeout_secs: u64,

    pub upload: UploadConfig,

    pub notify: NotifyConfig,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            inter_attempt_delay_secs: 60.0,
            max_attempts: 1,
            request_timeout_secs: 120,
            upload: UploadConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl DeliveryConfig {
    pub fn inter_attempt_delay(&self) -> Duration {
        seconds(self.inter_attempt_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Video hosting endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Shareable links are `<share_base_url>/<shortcode>`
    pub share_base_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            url: "https://api.streamable.com/upload".to_string(),
            username: String::new(),
            password: String::new(),
            share_base_url: "https://streamable.com".to_string(),
        }
    }
}

/// Mail API used to announce new footage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub url: String,
    pub api_key: String,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "https://api.mailgun.net/v3/YOUR_SANDBOX.mailgun.org/messages".to_string(),
            api_key: String::new(),
            sender: "Birdwatch <postmaster@YOUR_SANDBOX.mailgun.org>".to_string(),
            recipient: String::new(),
            subject: "Birdwatch got you new bird footage!".to_string(),
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// End the simulated stream after this many frames
    pub max_frames: Option<u64>,

    /// Per-frame chance that a visit begins
    pub visit_probability: f64,

    /// Average visit length
    pub mean_visit_secs: f64,

    /// Per-frame chance a present object is missed
    pub flicker_probability: f64,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            max_frames: None,
            visit_probability: 0.01,
            mean_visit_secs: 5.0,
            flicker_probability: 0.05,
            seed: None,
        }
    }
}
