// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! A backend is one exclusive imaging device with one capture path. The
//! trait is deliberately narrow: open, best-effort configuration, a
//! single-shot asynchronous capture, close. Everything stateful about
//! ownership lives in [`handle::DeviceHandle`].

pub mod handle;
pub mod types;
pub mod v4l2;
pub mod virtual_device;

pub use handle::DeviceHandle;
pub use types::FocusMode;

use crate::errors::AcquireError;
use crate::orientation::CaptureRotation;
use tokio::sync::oneshot;

/// A single exclusive imaging device.
///
/// Implementations must be cheap to construct; real device access only
/// happens in [`CaptureDevice::open`]. Mutating operations are only ever
/// called through [`DeviceHandle`], which serializes them.
pub trait CaptureDevice: Send {
    /// Stable identity of the underlying resource (e.g. `/dev/video0`).
    ///
    /// Two devices with the same identity contend for the same exclusive
    /// slot.
    fn identity(&self) -> &str;

    /// Open the device for exclusive use
    fn open(&mut self) -> Result<(), AcquireError>;

    /// Request a focus mode; returns false when the device does not
    /// support it and kept its default
    fn set_focus_mode(&mut self, mode: FocusMode) -> bool;

    /// Set the fixed display orientation of the live preview, in degrees
    fn set_display_orientation(&mut self, degrees: u32);

    /// Pause or resume the live preview stream
    fn set_streaming(&mut self, enabled: bool);

    /// Trigger an asynchronous single-shot capture.
    ///
    /// The returned receiver resolves exactly once with encoded JPEG
    /// bytes, or never resolves if the device errors (the sender is
    /// dropped or parked); callers bound the wait.
    fn capture(&mut self, rotation: CaptureRotation) -> oneshot::Receiver<Vec<u8>>;

    /// Close the device and free the underlying resource
    fn close(&mut self);
}

/// Which concrete backend a session should open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Real V4L2 device
    #[default]
    V4l2,
    /// Synthetic test-pattern device
    Virtual,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::V4l2 => write!(f, "v4l2"),
            BackendKind::Virtual => write!(f, "virtual"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v4l2" => Ok(BackendKind::V4l2),
            "virtual" => Ok(BackendKind::Virtual),
            other => Err(format!("unknown backend '{}' (v4l2, virtual)", other)),
        }
    }
}
