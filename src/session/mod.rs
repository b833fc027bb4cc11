// SPDX-License-Identifier: GPL-3.0-only

//! Capture session controller
//!
//! One controller drives one linear workflow:
//!
//! ```text
//! Previewing ──trigger──▶ Capturing ──ok──▶ Reviewing ──confirm──▶ Finished
//!     ▲                       │                  │
//!     └───────── retake ──────┼──────────────────┘
//!                             └──err──▶ Failed
//! ```
//!
//! A teardown signal is valid from every non-terminal state and forces
//! the session into `Abandoned` with the device released; the hardware
//! must never survive past the embedding screen's visible lifetime.
//!
//! All transitions run through `&mut self` methods, so no two can be
//! applied concurrently. The controller is the only holder of the
//! device handle; nothing else can mutate the hardware.

pub mod pipeline;

pub use pipeline::CapturePipeline;

use crate::backends::camera::{CaptureDevice, DeviceHandle};
use crate::config::{SessionConfig, SessionRequest};
use crate::errors::{CaptureError, SessionError, SessionResult};
use crate::orientation::{RotationMapper, RotationMapping};
use crate::overlay::{OverlaySpec, PreparedOverlay, prepare_overlay};
use crate::storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Builds a fresh device for acquire and re-acquire (retake restarts the
/// whole screen, including the hardware)
pub type DeviceFactory = Box<dyn Fn() -> Box<dyn CaptureDevice> + Send>;

/// Workflow state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Live preview running; capture can be triggered
    Previewing,
    /// Capture pipeline in flight
    Capturing,
    /// Captured image on screen; retake or confirm
    Reviewing,
    /// Terminal: caller gets the captured path
    Finished,
    /// Terminal: caller gets a failure reason
    Failed,
    /// Terminal: screen torn down, no result delivered
    Abandoned,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Finished | SessionState::Failed | SessionState::Abandoned
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Previewing => "previewing",
            SessionState::Capturing => "capturing",
            SessionState::Reviewing => "reviewing",
            SessionState::Finished => "finished",
            SessionState::Failed => "failed",
            SessionState::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the caller is told when the session ends. Delivered once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The user confirmed the shot; the image is at `path`
    Confirmed { path: PathBuf },
    /// The session failed; `reason` is human-readable
    Failed { reason: String },
    /// The screen was torn down mid-workflow; no result
    Abandoned,
}

#[derive(Default)]
struct TeardownInner {
    signalled: AtomicBool,
    notify: Notify,
}

/// Clonable lifecycle-teardown signal.
///
/// The embedding screen keeps a clone and fires it from whichever
/// lifecycle hook runs first (hide, stop, destroy); firing it more than
/// once is harmless. The controller observes it between transitions and
/// inside the capture wait.
#[derive(Clone, Default)]
pub struct TeardownSignal {
    inner: Arc<TeardownInner>,
}

impl TeardownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent.
    pub fn signal(&self) {
        if !self.inner.signalled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_signalled(&self) -> bool {
        self.inner.signalled.load(Ordering::Acquire)
    }

    /// Resolve when the signal fires; immediately if it already has
    pub async fn triggered(&self) {
        if self.is_signalled() {
            return;
        }
        let notified = self.inner.notify.notified();
        if self.is_signalled() {
            return;
        }
        notified.await;
    }
}

impl std::fmt::Debug for TeardownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeardownSignal")
            .field("signalled", &self.is_signalled())
            .finish()
    }
}

/// The capture session state machine.
///
/// Exclusively owns the device handle and the current rotation bucket.
/// The capture target is supplied at start and never mutated.
pub struct SessionController {
    state: SessionState,
    config: SessionConfig,
    target: PathBuf,
    overlay: Option<OverlaySpec>,
    device: DeviceHandle,
    factory: DeviceFactory,
    mapper: RotationMapper,
    ui_rotation: u32,
    captured: Option<PathBuf>,
    teardown: TeardownSignal,
    outcome: Option<SessionOutcome>,
}

impl SessionController {
    /// Acquire the device and enter `Previewing`.
    ///
    /// Acquisition failure is surfaced immediately; the embedding screen
    /// shows a failure instead of a preview. An unwritable destination
    /// is only warned about here (the medium may be mounted later); the
    /// capture attempt itself performs the authoritative check.
    pub fn start(
        request: SessionRequest,
        config: SessionConfig,
        factory: DeviceFactory,
    ) -> SessionResult<Self> {
        if let Err(e) = storage::ensure_writable(&request.image_destination) {
            warn!(error = %e, "Capture destination not currently writable");
        }

        let mut device = DeviceHandle::acquire(factory())?;
        device.configure(config.focus_mode, config.display_orientation);

        let overlay = request
            .overlay_image
            .map(|path| OverlaySpec::new(path, request.overlay_alpha_percent));

        info!(
            device = %device.identity(),
            target = %request.image_destination.display(),
            overlay = overlay.is_some(),
            "Session started"
        );

        Ok(Self {
            state: SessionState::Previewing,
            config,
            target: request.image_destination,
            overlay,
            device,
            factory,
            mapper: RotationMapper::new(),
            // Controls start rotated for the landscape-mounted sensor
            // until the first orientation reading arrives.
            ui_rotation: 270,
            captured: None,
            teardown: TeardownSignal::new(),
            outcome: None,
        })
    }

    /// Feed one orientation reading.
    ///
    /// Returns the new mapping when the rotation bucket changed, `None`
    /// for readings inside the current bucket. The device rotation is
    /// updated immediately while previewing; in any other state the
    /// intent is stored and applied on the next `Previewing` entry, so
    /// the hardware is never reconfigured mid-capture.
    pub fn orientation_changed(&mut self, degrees: i32) -> Option<RotationMapping> {
        if self.poll_teardown() || self.state.is_terminal() {
            return None;
        }

        let mapping = self.mapper.update(degrees)?;
        self.ui_rotation = mapping.ui_rotation;

        if self.state == SessionState::Previewing {
            self.device.set_capture_rotation(mapping.capture_rotation);
        }

        info!(
            bucket = ?mapping.bucket,
            ui_rotation = mapping.ui_rotation,
            capture_rotation = %mapping.capture_rotation,
            deferred = self.state != SessionState::Previewing,
            "Orientation changed"
        );
        Some(mapping)
    }

    /// Trigger the capture. Valid from `Previewing` only.
    ///
    /// The wait is bounded by the configured timeout, and a teardown
    /// signal preempts the result: a capture completion that arrives
    /// after teardown is discarded, never applied.
    pub async fn trigger_capture(&mut self) -> SessionResult<SessionState> {
        if self.poll_teardown() {
            return Ok(self.state);
        }
        if self.state != SessionState::Previewing {
            return Err(SessionError::InvalidTransition {
                action: "capture",
                state: self.state.as_str(),
            });
        }

        self.state = SessionState::Capturing;
        info!(target = %self.target.display(), "Capture triggered");

        let timeout = self.config.capture_timeout();
        let teardown = self.teardown.clone();
        let result = {
            let fut = CapturePipeline::run(&mut self.device, &self.target, timeout);
            tokio::select! {
                biased;
                _ = teardown.triggered() => None,
                res = fut => Some(res),
            }
        };

        match result {
            None => {
                info!("Teardown preempted in-flight capture");
                self.abandon();
            }
            Some(Ok(())) => {
                self.captured = Some(self.target.clone());
                self.device.set_streaming(false);
                self.state = SessionState::Reviewing;
                info!(path = %self.target.display(), "Capture complete, awaiting review");
            }
            Some(Err(e)) => {
                error!(error = %e, "Capture failed");
                self.fail(e);
            }
        }
        Ok(self.state)
    }

    /// Discard the captured image and restart the preview with a freshly
    /// acquired device, as if the screen had been relaunched. Valid from
    /// `Reviewing` only.
    pub fn retake(&mut self) -> SessionResult<SessionState> {
        if self.poll_teardown() {
            return Ok(self.state);
        }
        if self.state != SessionState::Reviewing {
            return Err(SessionError::InvalidTransition {
                action: "retake",
                state: self.state.as_str(),
            });
        }

        info!("Retake requested, reinitializing session");
        self.device.release();
        self.captured = None;

        let mut device = match DeviceHandle::acquire((self.factory)()) {
            Ok(device) => device,
            Err(e) => {
                error!(error = %e, "Re-acquire failed during retake");
                self.fail_with_reason(e.to_string());
                return Ok(self.state);
            }
        };
        device.configure(self.config.focus_mode, self.config.display_orientation);
        // Apply the rotation intent accumulated while the preview was down
        if let Some(bucket) = self.mapper.current() {
            device.set_capture_rotation(bucket.capture_rotation());
        }

        self.device = device;
        self.state = SessionState::Previewing;
        Ok(self.state)
    }

    /// Accept the captured image. Valid from `Reviewing` only.
    pub fn confirm(&mut self) -> SessionResult<SessionState> {
        if self.poll_teardown() {
            return Ok(self.state);
        }
        if self.state != SessionState::Reviewing {
            return Err(SessionError::InvalidTransition {
                action: "confirm",
                state: self.state.as_str(),
            });
        }

        self.device.release();
        self.state = SessionState::Finished;
        self.outcome = Some(SessionOutcome::Confirmed {
            path: self.target.clone(),
        });
        info!(path = %self.target.display(), "Session confirmed");
        Ok(self.state)
    }

    /// Lifecycle teardown: release the device and abandon the workflow.
    ///
    /// Valid from every state; on a session that already ended it is a
    /// no-op. Whichever lifecycle hook fires first wins, the rest are
    /// absorbed here.
    pub fn teardown(&mut self) {
        self.teardown.signal();
        self.poll_teardown();
    }

    /// Signal handle for external lifecycle wiring (e.g. Ctrl-C)
    pub fn teardown_signal(&self) -> TeardownSignal {
        self.teardown.clone()
    }

    /// Apply a pending teardown signal, if any. Returns whether the
    /// session is torn down.
    fn poll_teardown(&mut self) -> bool {
        if !self.teardown.is_signalled() {
            return false;
        }
        if !self.state.is_terminal() {
            info!(state = %self.state, "Teardown signal received");
            self.abandon();
        }
        true
    }

    fn abandon(&mut self) {
        self.device.release();
        self.state = SessionState::Abandoned;
        self.outcome.get_or_insert(SessionOutcome::Abandoned);
    }

    fn fail(&mut self, error: CaptureError) {
        self.fail_with_reason(error.to_string());
    }

    fn fail_with_reason(&mut self, reason: String) {
        self.device.release();
        self.state = SessionState::Failed;
        self.outcome.get_or_insert(SessionOutcome::Failed { reason });
    }

    // ===== Read accessors for the embedding screen =====

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Rotation of on-screen controls, in degrees
    pub fn ui_rotation(&self) -> u32 {
        self.ui_rotation
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Path of the captured image while reviewing; cleared by retake
    pub fn captured(&self) -> Option<&Path> {
        self.captured.as_deref()
    }

    /// Whether the destination currently accepts a durable write
    pub fn storage_available(&self) -> bool {
        storage::ensure_writable(&self.target).is_ok()
    }

    pub fn overlay(&self) -> Option<&OverlaySpec> {
        self.overlay.as_ref()
    }

    /// Decode the overlay for the preview compositor. Best effort.
    pub fn prepared_overlay(&self) -> Option<PreparedOverlay> {
        self.overlay.as_ref().and_then(prepare_overlay)
    }

    /// The final outcome, once the session reached a terminal state
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Take the outcome for delivery to the caller. Delivered once:
    /// subsequent calls return `None`.
    pub fn take_outcome(&mut self) -> Option<SessionOutcome> {
        self.outcome.take()
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("target", &self.target)
            .field("ui_rotation", &self.ui_rotation)
            .field("captured", &self.captured)
            .finish()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        // The device handle releases itself on drop as well; this keeps
        // the outcome consistent when the screen vanishes without a
        // proper teardown call.
        if !self.state.is_terminal() {
            warn!(state = %self.state, "Session dropped without teardown");
            self.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::virtual_device::VirtualDevice;

    fn factory(label: &str) -> DeviceFactory {
        let label = label.to_string();
        Box::new(move || Box::new(VirtualDevice::new(&label)))
    }

    fn start(label: &str) -> SessionController {
        let dir = std::env::temp_dir();
        let request = SessionRequest::new(dir.join(format!("shutter-{}.jpg", label)));
        SessionController::start(request, SessionConfig::default(), factory(label)).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let session = start("ctrl-init");
        assert_eq!(session.state(), SessionState::Previewing);
        assert_eq!(session.ui_rotation(), 270);
        assert!(session.captured().is_none());
        assert!(session.outcome().is_none());
    }

    #[test]
    fn test_orientation_updates_ui_rotation() {
        let mut session = start("ctrl-orient");
        let mapping = session.orientation_changed(10).unwrap();
        assert_eq!(mapping.ui_rotation, 0);
        assert_eq!(session.ui_rotation(), 0);
        // Same bucket: suppressed
        assert!(session.orientation_changed(20).is_none());
    }

    #[test]
    fn test_confirm_requires_reviewing() {
        let mut session = start("ctrl-confirm");
        let err = session.confirm().unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
    }

    #[test]
    fn test_teardown_from_previewing() {
        let mut session = start("ctrl-teardown");
        session.teardown();
        assert_eq!(session.state(), SessionState::Abandoned);
        assert_eq!(session.take_outcome(), Some(SessionOutcome::Abandoned));
        // Second teardown is absorbed
        session.teardown();
        assert_eq!(session.state(), SessionState::Abandoned);
    }

    #[tokio::test]
    async fn test_trigger_capture_from_terminal_state_is_rejected() {
        let mut session = start("ctrl-terminal");
        session.teardown();
        // Teardown already applied; the trigger reports the terminal state
        let state = session.trigger_capture().await.unwrap();
        assert_eq!(state, SessionState::Abandoned);
    }
}
