// SPDX-License-Identifier: GPL-3.0-only

//! Session request and tuning configuration

use crate::backends::camera::FocusMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Fixed portrait preview orientation, matching the sensor mounting
pub const DEFAULT_DISPLAY_ORIENTATION: u32 = 90;

/// Default bound on the wait for a capture result
pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 5;

/// What the caller asks a session to do.
///
/// Supplied once at session start and never mutated by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Destination for the captured image; must resolve to writable
    /// durable storage
    pub image_destination: PathBuf,
    /// Optional preview overlay image; absence renders no overlay
    #[serde(default)]
    pub overlay_image: Option<PathBuf>,
    /// Overlay opacity in percent (0-100, clamped); passthrough only
    #[serde(default)]
    pub overlay_alpha_percent: Option<u32>,
}

impl SessionRequest {
    pub fn new(image_destination: impl Into<PathBuf>) -> Self {
        Self {
            image_destination: image_destination.into(),
            overlay_image: None,
            overlay_alpha_percent: None,
        }
    }

    pub fn with_overlay(mut self, path: impl Into<PathBuf>, alpha_percent: Option<u32>) -> Self {
        self.overlay_image = Some(path.into());
        self.overlay_alpha_percent = alpha_percent;
        self
    }
}

/// Tuning knobs for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Focus mode requested on configure (best effort)
    pub focus_mode: FocusMode,
    /// Fixed display orientation for the live preview, in degrees
    pub display_orientation: u32,
    /// Bound on the wait for a capture result, in seconds
    pub capture_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            focus_mode: FocusMode::Auto,
            display_orientation: DEFAULT_DISPLAY_ORIENTATION,
            capture_timeout_secs: DEFAULT_CAPTURE_TIMEOUT_SECS,
        }
    }
}

impl SessionConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }
}
