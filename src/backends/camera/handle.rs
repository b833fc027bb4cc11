// SPDX-License-Identifier: GPL-3.0-only

//! Exclusive device ownership
//!
//! [`DeviceHandle`] is the only way to reach a [`CaptureDevice`]'s
//! mutating operations. It claims a process-wide slot for the device
//! identity on acquire and frees it on release; release is idempotent
//! and also runs on drop, so the slot cannot leak on any exit path.

use super::{CaptureDevice, FocusMode};
use crate::errors::AcquireError;
use crate::orientation::CaptureRotation;
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Device identities currently held open in this process
fn claimed_devices() -> &'static Mutex<HashSet<String>> {
    static CLAIMED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    CLAIMED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive handle to one open imaging device.
///
/// At most one live handle exists per device identity; a second acquire
/// for the same identity fails with `DeviceUnavailable` until the first
/// handle is released.
pub struct DeviceHandle {
    device: Box<dyn CaptureDevice>,
    identity: String,
    capture_rotation: CaptureRotation,
    released: bool,
}

impl DeviceHandle {
    /// Request exclusive ownership of a device and open it.
    ///
    /// The process-wide slot is claimed before the device is touched and
    /// freed again if opening fails, so a failed acquire never blocks a
    /// later one.
    pub fn acquire(mut device: Box<dyn CaptureDevice>) -> Result<Self, AcquireError> {
        let identity = device.identity().to_string();

        {
            let mut claimed = claimed_devices().lock().unwrap();
            if !claimed.insert(identity.clone()) {
                warn!(device = %identity, "Device already in use");
                return Err(AcquireError::DeviceUnavailable(format!(
                    "{} is already in use",
                    identity
                )));
            }
        }

        if let Err(e) = device.open() {
            claimed_devices().lock().unwrap().remove(&identity);
            return Err(e);
        }

        info!(device = %identity, "Device acquired");
        Ok(Self {
            device,
            identity,
            capture_rotation: CaptureRotation::default(),
            released: false,
        })
    }

    /// Identity of the held device
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Configure the device for the session.
    ///
    /// Best effort: an unsupported focus mode falls back to the device
    /// default rather than failing the session.
    pub fn configure(&mut self, focus_mode: FocusMode, display_orientation: u32) {
        if self.released {
            return;
        }
        if !self.device.set_focus_mode(focus_mode) {
            debug!(
                device = %self.identity,
                requested = %focus_mode,
                "Focus mode unsupported, keeping device default"
            );
        }
        self.device.set_display_orientation(display_orientation);
    }

    /// Set the rotation applied to the next captured image.
    ///
    /// Takes effect on the next capture only; an in-flight capture keeps
    /// the rotation it started with.
    pub fn set_capture_rotation(&mut self, rotation: CaptureRotation) {
        self.capture_rotation = rotation;
    }

    /// Rotation currently staged for the next capture
    pub fn capture_rotation(&self) -> CaptureRotation {
        self.capture_rotation
    }

    /// Pause or resume the live preview stream
    pub fn set_streaming(&mut self, enabled: bool) {
        if !self.released {
            self.device.set_streaming(enabled);
        }
    }

    /// Trigger an asynchronous single-shot capture.
    ///
    /// The receiver resolves exactly once with encoded bytes, or never
    /// if the device errors; the caller bounds the wait.
    pub fn capture(&mut self) -> oneshot::Receiver<Vec<u8>> {
        if self.released {
            // Closed channel; observed by the pipeline as a lost device
            let (_tx, rx) = oneshot::channel();
            return rx;
        }
        self.device.capture(self.capture_rotation)
    }

    /// Release the device and free its exclusive slot.
    ///
    /// Idempotent: second and later calls are no-ops. Invoked on every
    /// exit path from the session, and again on drop as a backstop.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.device.close();
        claimed_devices().lock().unwrap().remove(&self.identity);
        info!(device = %self.identity, "Device released");
    }

    /// Whether the handle has been released
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("identity", &self.identity)
            .field("capture_rotation", &self.capture_rotation)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::virtual_device::VirtualDevice;

    #[test]
    fn test_acquire_is_exclusive_per_identity() {
        let first = DeviceHandle::acquire(Box::new(VirtualDevice::new("excl-a"))).unwrap();

        let second = DeviceHandle::acquire(Box::new(VirtualDevice::new("excl-a")));
        assert!(matches!(
            second,
            Err(AcquireError::DeviceUnavailable(_))
        ));

        // A different identity is an independent resource
        let other = DeviceHandle::acquire(Box::new(VirtualDevice::new("excl-b")));
        assert!(other.is_ok());

        drop(first);
        let retry = DeviceHandle::acquire(Box::new(VirtualDevice::new("excl-a")));
        assert!(retry.is_ok(), "slot should free once the handle drops");
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut handle = DeviceHandle::acquire(Box::new(VirtualDevice::new("excl-c"))).unwrap();
        handle.release();
        assert!(handle.is_released());
        // Second release must be a silent no-op
        handle.release();
        assert!(handle.is_released());
    }

    #[test]
    fn test_failed_open_frees_slot() {
        let broken = VirtualDevice::new("excl-d").failing_open();
        assert!(DeviceHandle::acquire(Box::new(broken)).is_err());

        // The slot must not stay claimed after a failed open
        let ok = DeviceHandle::acquire(Box::new(VirtualDevice::new("excl-d")));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_configure_after_release_is_noop() {
        let mut handle = DeviceHandle::acquire(Box::new(VirtualDevice::new("excl-e"))).unwrap();
        handle.release();
        // Must not panic or touch the closed device
        handle.configure(FocusMode::Auto, 90);
    }
}
