// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipeline: trigger, bounded wait, durable write
//!
//! One run is one still image. The pipeline never retries; every failure
//! surfaces to the session controller, which owns the state transition
//! and the device release.

use crate::backends::camera::DeviceHandle;
use crate::errors::CaptureError;
use crate::storage;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Single-shot capture pipeline
pub struct CapturePipeline;

impl CapturePipeline {
    /// Capture one image from the device and persist it to `target`.
    ///
    /// Storage is probed before the capture is triggered, so an
    /// unwritable destination reports `StorageUnavailable` without
    /// touching the device. The wait for the capture result is bounded
    /// by `timeout`; a device that never answers (or drops its channel)
    /// cannot hang the session.
    ///
    /// On success the destination file exists, is flushed and closed.
    pub async fn run(
        device: &mut DeviceHandle,
        target: &Path,
        timeout: Duration,
    ) -> Result<(), CaptureError> {
        storage::ensure_writable(target)?;

        debug!(
            device = %device.identity(),
            rotation = %device.capture_rotation(),
            "Requesting capture"
        );
        let receiver = device.capture();

        let bytes = match tokio::time::timeout(timeout, receiver).await {
            Err(_) => return Err(CaptureError::CaptureTimeout),
            Ok(Err(_)) => {
                return Err(CaptureError::DeviceLost(
                    "capture result channel closed".to_string(),
                ));
            }
            Ok(Ok(bytes)) => bytes,
        };

        if bytes.is_empty() {
            return Err(CaptureError::DeviceLost("empty capture result".to_string()));
        }

        storage::durable_write(target, bytes).await?;
        info!(path = %target.display(), "Capture persisted");
        Ok(())
    }
}
