// SPDX-License-Identifier: GPL-3.0-only

//! Shutter - a one-shot camera capture session
//!
//! This library drives a single linear capture workflow for an embedding
//! application: own the camera exclusively, keep output and controls
//! correctly rotated while the device moves, capture one still image,
//! let the user retake or confirm it, and hand back exactly one result.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: The session controller state machine and capture pipeline
//! - [`backends`]: Exclusive device access (V4L2 and a virtual test device)
//! - [`orientation`]: Orientation-to-rotation bucket mapping
//! - [`overlay`]: Optional preview overlay preparation
//! - [`storage`]: Writability probing and durable writes
//! - [`config`]: Session request and tuning configuration
//! - [`errors`]: Error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use shutter::backends::camera::virtual_device::VirtualDevice;
//! use shutter::{SessionConfig, SessionController, SessionRequest};
//!
//! # async fn run() -> Result<(), shutter::SessionError> {
//! let request = SessionRequest::new("/tmp/out.jpg");
//! let mut session = SessionController::start(
//!     request,
//!     SessionConfig::default(),
//!     Box::new(|| Box::new(VirtualDevice::new("example"))),
//! )?;
//!
//! session.orientation_changed(10);
//! session.trigger_capture().await?;
//! session.confirm()?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod errors;
pub mod orientation;
pub mod overlay;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use backends::camera::{BackendKind, DeviceHandle, FocusMode};
pub use config::{SessionConfig, SessionRequest};
pub use errors::{AcquireError, CaptureError, SessionError};
pub use orientation::{CaptureRotation, RotationBucket, RotationMapper};
pub use session::{SessionController, SessionOutcome, SessionState, TeardownSignal};
