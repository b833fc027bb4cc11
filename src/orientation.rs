// SPDX-License-Identifier: GPL-3.0-only

//! Orientation-to-rotation mapping
//!
//! The orientation sensor reports degrees at an unbounded rate while a
//! session is active. This module quantizes those readings into the four
//! 90°-buckets that decide both the on-screen control rotation and the
//! rotation applied to the next captured image.

/// Rotation applied to captured image data, in degrees clockwise.
///
/// The sensor is mounted 90° off the portrait UI, so an upright device
/// needs a 90° capture rotation and a 0° UI rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureRotation {
    /// No rotation
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees
    Rotate180,
    /// 270 degrees clockwise
    Rotate270,
}

impl CaptureRotation {
    /// Create a rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => CaptureRotation::Rotate90,
            180 => CaptureRotation::Rotate180,
            270 => CaptureRotation::Rotate270,
            _ => CaptureRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            CaptureRotation::None => 0,
            CaptureRotation::Rotate90 => 90,
            CaptureRotation::Rotate180 => 180,
            CaptureRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, CaptureRotation::Rotate90 | CaptureRotation::Rotate270)
    }
}

impl std::fmt::Display for CaptureRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// One of the four 90°-quantized physical device orientations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationBucket {
    /// Device upright (portrait)
    Up,
    /// Rotated clockwise (landscape, home side left)
    Right,
    /// Upside down
    Down,
    /// Rotated counter-clockwise (landscape, home side right)
    Left,
}

impl RotationBucket {
    /// Map a raw orientation reading to its bucket.
    ///
    /// The reading is normalised modulo 360 first, so negative and
    /// out-of-range values are valid input. 45 is the inclusive upper
    /// edge of `Up`; the remaining boundaries are half-open.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            0..=45 | 315..=359 => RotationBucket::Up,
            46..=134 => RotationBucket::Right,
            135..=224 => RotationBucket::Down,
            _ => RotationBucket::Left,
        }
    }

    /// Rotation to apply to the next captured image in this orientation
    pub fn capture_rotation(&self) -> CaptureRotation {
        match self {
            RotationBucket::Up => CaptureRotation::Rotate90,
            RotationBucket::Right => CaptureRotation::None,
            RotationBucket::Down => CaptureRotation::Rotate270,
            RotationBucket::Left => CaptureRotation::Rotate180,
        }
    }

    /// Rotation of the on-screen controls in this orientation, in degrees
    pub fn ui_rotation(&self) -> u32 {
        match self {
            RotationBucket::Up => 0,
            RotationBucket::Right => 90,
            RotationBucket::Down => 180,
            RotationBucket::Left => 270,
        }
    }
}

/// The full output of mapping one orientation reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationMapping {
    pub bucket: RotationBucket,
    pub capture_rotation: CaptureRotation,
    pub ui_rotation: u32,
}

/// Map an orientation reading to its bucket and rotation angles.
///
/// Pure and total over all integer input.
pub fn map_orientation(degrees: i32) -> RotationMapping {
    let bucket = RotationBucket::from_degrees(degrees);
    RotationMapping {
        bucket,
        capture_rotation: bucket.capture_rotation(),
        ui_rotation: bucket.ui_rotation(),
    }
}

/// Stateful mapper that suppresses duplicate emissions.
///
/// Readings that stay within the current bucket produce no output, so
/// downstream consumers only see actual orientation changes.
#[derive(Debug, Default)]
pub struct RotationMapper {
    last_emitted: Option<RotationBucket>,
}

impl RotationMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one reading; returns a mapping only when the bucket changed.
    pub fn update(&mut self, degrees: i32) -> Option<RotationMapping> {
        let mapping = map_orientation(degrees);
        if self.last_emitted == Some(mapping.bucket) {
            return None;
        }
        self.last_emitted = Some(mapping.bucket);
        Some(mapping)
    }

    /// The bucket last emitted, if any reading has been seen
    pub fn current(&self) -> Option<RotationBucket> {
        self.last_emitted
    }
}
