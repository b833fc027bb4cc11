// SPDX-License-Identifier: GPL-3.0-only

//! Virtual capture device
//!
//! Produces frames from a generated test pattern or a source image file
//! instead of real hardware. Used by tests and by the CLI on machines
//! without a camera.

use super::types::{FocusMode, rotate_and_encode_jpeg};
use super::CaptureDevice;
use crate::errors::AcquireError;
use crate::orientation::CaptureRotation;
use image::RgbImage;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Default pattern frame size
const PATTERN_WIDTH: u32 = 640;
const PATTERN_HEIGHT: u32 = 480;

/// Observed device activity, shared with tests through [`DeviceProbe`]
#[derive(Debug, Default)]
pub struct ProbeState {
    pub opens: u32,
    pub closes: u32,
    pub focus_modes: Vec<FocusMode>,
    pub display_orientations: Vec<u32>,
    pub streaming_changes: Vec<bool>,
    pub capture_rotations: Vec<CaptureRotation>,
    pub completed_captures: u32,
    pub discarded_results: u32,
}

/// Shared window into a virtual device's activity.
///
/// The device is boxed away inside the session once acquired; tests keep
/// a probe clone to observe what actually reached the hardware layer.
#[derive(Debug, Clone, Default)]
pub struct DeviceProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl DeviceProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot accessor; the closure runs under the probe lock
    pub fn read<T>(&self, f: impl FnOnce(&ProbeState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    fn write(&self, f: impl FnOnce(&mut ProbeState)) {
        f(&mut self.state.lock().unwrap());
    }
}

/// Synthetic camera device
pub struct VirtualDevice {
    identity: String,
    source_image: Option<PathBuf>,
    capture_delay: Duration,
    unresponsive: bool,
    fail_open: bool,
    opened: bool,
    probe: DeviceProbe,
    /// Senders parked by unresponsive mode so they never fire
    parked: Vec<oneshot::Sender<Vec<u8>>>,
}

impl VirtualDevice {
    /// Create a virtual device with a distinct identity.
    ///
    /// Devices with the same label contend for the same exclusive slot,
    /// exactly like two openers of one `/dev/video*` node.
    pub fn new(label: &str) -> Self {
        Self {
            identity: format!("virtual:{}", label),
            source_image: None,
            capture_delay: Duration::ZERO,
            unresponsive: false,
            fail_open: false,
            opened: false,
            probe: DeviceProbe::new(),
            parked: Vec::new(),
        }
    }

    /// Source frames from an image file instead of the generated pattern
    pub fn with_source_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_image = Some(path.into());
        self
    }

    /// Delay each capture result by the given duration
    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = delay;
        self
    }

    /// Never deliver capture results (the device "hangs")
    pub fn unresponsive(mut self) -> Self {
        self.unresponsive = true;
        self
    }

    /// Fail at open time, as an absent or permission-denied device would
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Observe this device's activity from outside the session
    pub fn with_probe(mut self, probe: DeviceProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Produce one frame: the source image if configured, else a gradient
    /// test pattern.
    fn source_frame(source: Option<&PathBuf>) -> RgbImage {
        if let Some(path) = source {
            match image::open(path) {
                Ok(img) => return img.to_rgb8(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Source image unreadable, using pattern");
                }
            }
        }

        RgbImage::from_fn(PATTERN_WIDTH, PATTERN_HEIGHT, |x, y| {
            let r = (x * 255 / PATTERN_WIDTH) as u8;
            let g = (y * 255 / PATTERN_HEIGHT) as u8;
            image::Rgb([r, g, 128])
        })
    }
}

impl CaptureDevice for VirtualDevice {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn open(&mut self) -> Result<(), AcquireError> {
        if self.fail_open {
            return Err(AcquireError::DeviceUnavailable(format!(
                "{} failed to open",
                self.identity
            )));
        }
        self.opened = true;
        self.probe.write(|s| s.opens += 1);
        debug!(device = %self.identity, "Virtual device opened");
        Ok(())
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> bool {
        self.probe.write(|s| s.focus_modes.push(mode));
        // The synthetic sensor has no focus hardware
        mode == FocusMode::DeviceDefault
    }

    fn set_display_orientation(&mut self, degrees: u32) {
        self.probe.write(|s| s.display_orientations.push(degrees));
    }

    fn set_streaming(&mut self, enabled: bool) {
        self.probe.write(|s| s.streaming_changes.push(enabled));
    }

    fn capture(&mut self, rotation: CaptureRotation) -> oneshot::Receiver<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.probe.write(|s| s.capture_rotations.push(rotation));

        if self.unresponsive {
            debug!(device = %self.identity, "Parking capture result (unresponsive mode)");
            self.parked.push(tx);
            return rx;
        }

        let source = self.source_image.clone();
        let delay = self.capture_delay;
        let probe = self.probe.clone();
        let identity = self.identity.clone();

        std::thread::spawn(move || {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            let frame = Self::source_frame(source.as_ref());
            match rotate_and_encode_jpeg(frame, rotation) {
                Ok(bytes) => {
                    if tx.send(bytes).is_ok() {
                        probe.write(|s| s.completed_captures += 1);
                    } else {
                        // Receiver gone: session timed out or was torn down
                        probe.write(|s| s.discarded_results += 1);
                        debug!(device = %identity, "Capture result discarded");
                    }
                }
                Err(e) => {
                    warn!(device = %identity, error = %e, "Virtual capture failed");
                }
            }
        });

        rx
    }

    fn close(&mut self) {
        if self.opened {
            self.opened = false;
            self.parked.clear();
            self.probe.write(|s| s.closes += 1);
            debug!(device = %self.identity, "Virtual device closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_capture_produces_jpeg() {
        let mut device = VirtualDevice::new("unit-pattern");
        device.open().unwrap();
        let rx = device.capture(CaptureRotation::None);
        let bytes = rx.blocking_recv().unwrap();
        assert!(!bytes.is_empty());
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_capture_rotation_reaches_encoded_frame() {
        let mut device = VirtualDevice::new("unit-rotation");
        device.open().unwrap();
        let bytes = device
            .capture(CaptureRotation::Rotate90)
            .blocking_recv()
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        // Pattern is landscape; a 90° rotation makes it portrait
        assert_eq!(decoded.width(), PATTERN_HEIGHT);
        assert_eq!(decoded.height(), PATTERN_WIDTH);
    }

    #[test]
    fn test_unresponsive_device_never_resolves() {
        let mut device = VirtualDevice::new("unit-hang").unresponsive();
        device.open().unwrap();
        let mut rx = device.capture(CaptureRotation::None);
        assert!(rx.try_recv().is_err());
        // Sender is parked, not dropped, so the channel is still open
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn test_probe_records_configuration() {
        let probe = DeviceProbe::new();
        let mut device = VirtualDevice::new("unit-probe").with_probe(probe.clone());
        device.open().unwrap();
        device.set_focus_mode(FocusMode::Auto);
        device.set_display_orientation(90);
        device.close();

        assert_eq!(probe.read(|s| s.opens), 1);
        assert_eq!(probe.read(|s| s.closes), 1);
        assert_eq!(probe.read(|s| s.focus_modes.clone()), vec![FocusMode::Auto]);
        assert_eq!(probe.read(|s| s.display_orientations.clone()), vec![90]);
    }
}
