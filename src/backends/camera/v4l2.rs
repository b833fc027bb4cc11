// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture device
//!
//! Opens a `/dev/video*` node, negotiates a still-capture format (MJPG
//! preferred, YUYV converted in software) and grabs single frames from
//! an mmap capture stream.

use super::types::{FocusMode, rotate_and_encode_jpeg, yuyv_to_rgb};
use super::CaptureDevice;
use crate::errors::AcquireError;
use crate::orientation::CaptureRotation;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::control::{Control, Value};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;

/// Auto focus enable control (camera class)
const V4L2_CID_FOCUS_AUTO: u32 = 0x009a_090c;

/// Frames discarded after stream start so auto exposure can settle
const WARMUP_FRAMES: usize = 5;

/// Buffers for the mmap capture stream
const STREAM_BUFFERS: u32 = 4;

/// A V4L2 capture device node
pub struct V4l2Device {
    path: PathBuf,
    identity: String,
    device: Option<v4l::Device>,
    format: Option<v4l::Format>,
    display_orientation: u32,
    streaming: bool,
}

impl V4l2Device {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identity = path.display().to_string();
        Self {
            path,
            identity,
            device: None,
            format: None,
            display_orientation: 0,
            streaming: false,
        }
    }

    /// Open `/dev/videoN` by index
    pub fn by_index(index: usize) -> Self {
        Self::new(format!("/dev/video{}", index))
    }

    /// Orientation the preview surface should apply, in degrees
    pub fn display_orientation(&self) -> u32 {
        self.display_orientation
    }

    /// Whether the live preview is running
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Negotiate a capture format on the open device.
    ///
    /// MJPG is preferred so the captured frame is already JPEG; YUYV is
    /// accepted and converted. Anything else keeps the driver's current
    /// format and the capture thread decodes on a best-effort basis.
    fn negotiate_format(device: &v4l::Device) -> std::io::Result<v4l::Format> {
        let current = device.format()?;

        for fourcc in [b"MJPG", b"YUYV"] {
            let mut wanted = current.clone();
            wanted.fourcc = FourCC::new(fourcc);
            let applied = device.set_format(&wanted)?;
            if applied.fourcc == wanted.fourcc {
                return Ok(applied);
            }
        }

        debug!(fourcc = ?current.fourcc, "Keeping driver format");
        device.set_format(&current)
    }

    /// Grab one settled frame and encode it with the given rotation.
    ///
    /// Runs on the capture thread; any error drops the result sender.
    fn grab_frame(
        device: &v4l::Device,
        format: &v4l::Format,
        rotation: CaptureRotation,
    ) -> Result<Vec<u8>, String> {
        let mut stream = Stream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| format!("failed to start capture stream: {}", e))?;

        // Let auto exposure and white balance settle
        for _ in 0..WARMUP_FRAMES {
            stream
                .next()
                .map_err(|e| format!("capture stream stalled: {}", e))?;
        }

        let (data, _meta) = stream
            .next()
            .map_err(|e| format!("capture failed: {}", e))?;

        let frame = match &format.fourcc.repr {
            b"MJPG" => image::load_from_memory(data)
                .map_err(|e| format!("MJPG decode failed: {}", e))?
                .to_rgb8(),
            b"YUYV" => yuyv_to_rgb(data, format.width, format.height)
                .ok_or_else(|| "YUYV frame too short".to_string())?,
            other => {
                // Unknown layout; try a container decode before giving up
                let fourcc = String::from_utf8_lossy(other).into_owned();
                image::load_from_memory(data)
                    .map_err(|_| format!("unsupported pixel format {}", fourcc))?
                    .to_rgb8()
            }
        };

        rotate_and_encode_jpeg(frame, rotation)
    }
}

impl CaptureDevice for V4l2Device {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn open(&mut self) -> Result<(), AcquireError> {
        let device = v4l::Device::with_path(&self.path).map_err(|e| {
            AcquireError::DeviceUnavailable(format!("{}: {}", self.identity, e))
        })?;

        let format = Self::negotiate_format(&device).map_err(|e| {
            AcquireError::DeviceUnavailable(format!(
                "{}: format negotiation failed: {}",
                self.identity, e
            ))
        })?;

        info!(
            device = %self.identity,
            width = format.width,
            height = format.height,
            fourcc = ?format.fourcc,
            "V4L2 device opened"
        );

        self.device = Some(device);
        self.format = Some(format);
        self.streaming = true;
        Ok(())
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> bool {
        if mode == FocusMode::DeviceDefault {
            return true;
        }
        let Some(device) = &self.device else {
            return false;
        };

        let supported = device
            .query_controls()
            .map(|controls| controls.iter().any(|c| c.id == V4L2_CID_FOCUS_AUTO))
            .unwrap_or(false);
        if !supported {
            return false;
        }

        match device.set_control(Control {
            id: V4L2_CID_FOCUS_AUTO,
            value: Value::Boolean(true),
        }) {
            Ok(()) => {
                debug!(device = %self.identity, "Autofocus enabled");
                true
            }
            Err(e) => {
                debug!(device = %self.identity, error = %e, "Autofocus rejected");
                false
            }
        }
    }

    fn set_display_orientation(&mut self, degrees: u32) {
        // The node has no display transform; the preview surface reads
        // this back when compositing.
        self.display_orientation = degrees;
    }

    fn set_streaming(&mut self, enabled: bool) {
        self.streaming = enabled;
        debug!(device = %self.identity, streaming = enabled, "Preview streaming toggled");
    }

    fn capture(&mut self, rotation: CaptureRotation) -> oneshot::Receiver<Vec<u8>> {
        let (tx, rx) = oneshot::channel();

        // The capture thread takes the open device; a repeated capture on
        // the same handle reopens the node instead.
        let device = self.device.take();
        let format = self.format.clone();
        let path = self.path.clone();
        let identity = self.identity.clone();

        std::thread::spawn(move || {
            let device = match device {
                Some(d) => d,
                None => match v4l::Device::with_path(&path) {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(device = %identity, error = %e, "Device reopen failed");
                        return;
                    }
                },
            };
            let format = match format.map(Ok).unwrap_or_else(|| device.format()) {
                Ok(f) => f,
                Err(e) => {
                    warn!(device = %identity, error = %e, "Format query failed");
                    return;
                }
            };

            match Self::grab_frame(&device, &format, rotation) {
                Ok(bytes) => {
                    if tx.send(bytes).is_err() {
                        debug!(device = %identity, "Capture result discarded");
                    }
                }
                Err(e) => {
                    // Dropping the sender surfaces as a lost device
                    warn!(device = %identity, error = %e, "Capture failed");
                }
            }
        });

        rx
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            debug!(device = %self.identity, "V4L2 device closed");
        }
        self.streaming = false;
    }
}

/// One enumerated capture node
#[derive(Debug, Clone)]
pub struct V4l2DeviceInfo {
    pub index: usize,
    pub path: PathBuf,
    pub name: String,
}

/// Enumerate V4L2 capture nodes on this machine
pub fn enumerate_devices() -> Vec<V4l2DeviceInfo> {
    let mut devices: Vec<V4l2DeviceInfo> = v4l::context::enum_devices()
        .iter()
        .map(|node| V4l2DeviceInfo {
            index: node.index(),
            path: node.path().to_path_buf(),
            name: node
                .name()
                .unwrap_or_else(|| node.path().display().to_string()),
        })
        .collect();
    devices.sort_by_key(|d| d.index);
    devices
}

/// Whether a capture node exists at the given path
pub fn device_present(path: &Path) -> bool {
    path.exists()
}
