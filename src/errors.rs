// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture session

use std::fmt;

/// Result type alias for session-level operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Device acquisition errors
#[derive(Debug, Clone)]
pub enum AcquireError {
    /// Device is held by another owner, absent, or access was denied
    DeviceUnavailable(String),
}

/// Capture pipeline errors
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Destination medium is not writable or not mounted
    StorageUnavailable(String),
    /// No capture result arrived within the bounded wait
    CaptureTimeout,
    /// The device dropped its result channel mid-capture
    DeviceLost(String),
    /// I/O fault while persisting the captured bytes
    WriteFailed(String),
}

/// Top-level session errors
#[derive(Debug, Clone)]
pub enum SessionError {
    /// Device acquisition failed
    Acquire(AcquireError),
    /// Capture pipeline failed
    Capture(CaptureError),
    /// An operation was requested from a state that does not allow it
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireError::DeviceUnavailable(msg) => {
                write!(f, "Camera unavailable: {}", msg)
            }
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::StorageUnavailable(msg) => {
                write!(f, "Storage unavailable: {}", msg)
            }
            CaptureError::CaptureTimeout => write!(f, "Capture timed out"),
            CaptureError::DeviceLost(msg) => write!(f, "Camera lost during capture: {}", msg),
            CaptureError::WriteFailed(msg) => write!(f, "Failed to write image: {}", msg),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Acquire(e) => write!(f, "{}", e),
            SessionError::Capture(e) => write!(f, "{}", e),
            SessionError::InvalidTransition { action, state } => {
                write!(f, "Cannot {} while {}", action, state)
            }
        }
    }
}

impl std::error::Error for AcquireError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for SessionError {}

impl From<AcquireError> for SessionError {
    fn from(e: AcquireError) -> Self {
        SessionError::Acquire(e)
    }
}

impl From<CaptureError> for SessionError {
    fn from(e: CaptureError) -> Self {
        SessionError::Capture(e)
    }
}
