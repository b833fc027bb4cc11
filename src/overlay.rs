// SPDX-License-Identifier: GPL-3.0-only

//! Optional preview overlay
//!
//! A caller may supply a reference image to ghost over the live preview
//! (e.g. the previous shot, for re-staging a photo). The core only
//! prepares the image: decode, pre-rotate landscape sources to the
//! portrait preview, and carry the requested opacity. Compositing is the
//! embedding screen's job.

use image::RgbaImage;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Overlay request: source path plus opacity in percent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySpec {
    path: PathBuf,
    alpha_percent: u8,
}

impl OverlaySpec {
    /// Build a spec, clamping the alpha to 0-100. A missing alpha means
    /// fully opaque.
    pub fn new(path: impl Into<PathBuf>, alpha_percent: Option<u32>) -> Self {
        Self {
            path: path.into(),
            alpha_percent: alpha_percent.unwrap_or(100).min(100) as u8,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn alpha_percent(&self) -> u8 {
        self.alpha_percent
    }

    /// Opacity as a 0.0-1.0 factor
    pub fn alpha(&self) -> f32 {
        f32::from(self.alpha_percent) / 100.0
    }
}

/// A decoded overlay ready for the preview compositor
#[derive(Debug, Clone)]
pub struct PreparedOverlay {
    pub image: RgbaImage,
    pub alpha: f32,
}

/// Decode and orient the overlay image.
///
/// Best effort: an unreadable or missing file logs a warning and yields
/// no overlay rather than failing the session. Landscape sources are
/// rotated 90° so they line up with the portrait preview.
pub fn prepare_overlay(spec: &OverlaySpec) -> Option<PreparedOverlay> {
    let image = match image::open(spec.path()) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            warn!(path = %spec.path().display(), error = %e, "Overlay image unusable, skipping");
            return None;
        }
    };

    let image = if image.width() > image.height() {
        debug!(path = %spec.path().display(), "Rotating landscape overlay to portrait");
        image::imageops::rotate90(&image)
    } else {
        image
    };

    Some(PreparedOverlay {
        image,
        alpha: spec.alpha(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_clamped() {
        assert_eq!(OverlaySpec::new("a.png", Some(250)).alpha_percent(), 100);
        assert_eq!(OverlaySpec::new("a.png", Some(40)).alpha_percent(), 40);
        assert_eq!(OverlaySpec::new("a.png", None).alpha_percent(), 100);
        assert!((OverlaySpec::new("a.png", Some(50)).alpha() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_overlay_is_tolerated() {
        let spec = OverlaySpec::new("/nonexistent/overlay.png", Some(80));
        assert!(prepare_overlay(&spec).is_none());
    }

    #[test]
    fn test_landscape_overlay_rotated_to_portrait() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let img = RgbaImage::from_pixel(8, 4, image::Rgba([1, 2, 3, 255]));
        img.save(&path).unwrap();

        let prepared = prepare_overlay(&OverlaySpec::new(&path, Some(60))).unwrap();
        assert_eq!(prepared.image.width(), 4);
        assert_eq!(prepared.image.height(), 8);
        assert!((prepared.alpha - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_portrait_overlay_unrotated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let img = RgbaImage::from_pixel(4, 8, image::Rgba([1, 2, 3, 255]));
        img.save(&path).unwrap();

        let prepared = prepare_overlay(&OverlaySpec::new(&path, None)).unwrap();
        assert_eq!(prepared.image.width(), 4);
        assert_eq!(prepared.image.height(), 8);
    }
}
