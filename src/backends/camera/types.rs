// SPDX-License-Identifier: GPL-3.0-only

//! Shared types and frame helpers for camera backends

use crate::orientation::CaptureRotation;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

/// JPEG quality used for captured stills (0-100)
pub const JPEG_QUALITY: u8 = 92;

/// Focus mode requested when configuring a device.
///
/// Configuration is best effort: a device that does not support the
/// requested mode keeps its default instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum FocusMode {
    /// Continuous autofocus
    #[default]
    Auto,
    /// Leave the device at its default focus behaviour
    DeviceDefault,
}

impl std::fmt::Display for FocusMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusMode::Auto => write!(f, "auto"),
            FocusMode::DeviceDefault => write!(f, "device default"),
        }
    }
}

/// Apply a capture rotation to a decoded frame and encode it as JPEG.
///
/// Both backends funnel through this so the rotation a session selected
/// is baked into the bytes that reach the pipeline.
pub fn rotate_and_encode_jpeg(
    frame: RgbImage,
    rotation: CaptureRotation,
) -> Result<Vec<u8>, String> {
    let rotated = match rotation {
        CaptureRotation::None => frame,
        CaptureRotation::Rotate90 => image::imageops::rotate90(&frame),
        CaptureRotation::Rotate180 => image::imageops::rotate180(&frame),
        CaptureRotation::Rotate270 => image::imageops::rotate270(&frame),
    };

    debug!(
        width = rotated.width(),
        height = rotated.height(),
        rotation = %rotation,
        "Encoding captured frame"
    );

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(&rotated)
        .map_err(|e| format!("JPEG encoding failed: {}", e))?;
    Ok(buf)
}

/// Convert packed YUYV 4:2:2 data to an RGB image.
///
/// YUYV: Y0 U Y1 V - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for the YUV to RGB conversion.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Option<RgbImage> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return None;
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..expected].chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        for y in [y0, y1] {
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            rgb.push(r);
            rgb.push(g);
            rgb.push(b);
        }
    }

    RgbImage::from_raw(width, height, rgb)
}
