// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for capture sessions
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Running a full capture session end to end

use shutter::backends::camera::v4l2::{self, V4l2Device};
use shutter::backends::camera::virtual_device::VirtualDevice;
use shutter::session::DeviceFactory;
use shutter::{
    BackendKind, SessionConfig, SessionController, SessionOutcome, SessionRequest, SessionState,
};
use std::path::PathBuf;

/// Exit code reported for an abandoned (Ctrl-C) session
const EXIT_ABANDONED: i32 = 130;

/// List all available cameras
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = v4l2::enumerate_devices();

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    for device in devices {
        println!("  [{}] {} ({})", device.index, device.name, device.path.display());
    }
    Ok(())
}

/// Arguments for one capture session
pub struct CaptureArgs {
    pub output: Option<PathBuf>,
    pub device: usize,
    pub backend: BackendKind,
    pub overlay: Option<PathBuf>,
    pub overlay_alpha: Option<u32>,
    pub orientation: Option<i32>,
    pub timeout_secs: u64,
    pub json: bool,
}

/// Run one capture session and report its outcome.
///
/// Returns the process exit code: 0 confirmed, 1 failed, 130 abandoned.
pub fn run_capture(args: CaptureArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let target = args
        .output
        .unwrap_or_else(shutter::storage::default_destination);

    let mut request = SessionRequest::new(target);
    if let Some(overlay) = args.overlay {
        request = request.with_overlay(overlay, args.overlay_alpha);
    }

    let config = SessionConfig {
        capture_timeout_secs: args.timeout_secs,
        ..SessionConfig::default()
    };

    let factory: DeviceFactory = match args.backend {
        BackendKind::V4l2 => {
            let index = args.device;
            Box::new(move || Box::new(V4l2Device::by_index(index)))
        }
        BackendKind::Virtual => Box::new(|| Box::new(VirtualDevice::new("cli"))),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let outcome = runtime.block_on(async {
        let mut session = match SessionController::start(request, config, factory) {
            Ok(session) => session,
            Err(e) => {
                return SessionOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        // Whichever lifecycle signal fires first tears the session down;
        // in a CLI that signal is Ctrl-C.
        let signal = session.teardown_signal();
        if let Err(e) = ctrlc::set_handler(move || signal.signal()) {
            tracing::warn!(error = %e, "Ctrl-C handler unavailable");
        }

        if let Some(degrees) = args.orientation {
            session.orientation_changed(degrees);
        }

        match session.trigger_capture().await {
            Ok(SessionState::Reviewing) => {
                // Headless run: accept the shot immediately
                let _ = session.confirm();
            }
            Ok(_) => {}
            Err(e) => {
                return SessionOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        }

        session.take_outcome().unwrap_or(SessionOutcome::Abandoned)
    });

    let code = match &outcome {
        SessionOutcome::Confirmed { .. } => 0,
        SessionOutcome::Failed { .. } => 1,
        SessionOutcome::Abandoned => EXIT_ABANDONED,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome_document(&outcome))?);
    } else {
        match &outcome {
            SessionOutcome::Confirmed { path } => println!("Saved {}", path.display()),
            SessionOutcome::Failed { reason } => eprintln!("Capture failed: {}", reason),
            SessionOutcome::Abandoned => eprintln!("Capture cancelled."),
        }
    }

    Ok(code)
}

/// Serialize an outcome as the caller-facing result document
fn outcome_document(outcome: &SessionOutcome) -> serde_json::Value {
    match outcome {
        SessionOutcome::Confirmed { path } => serde_json::json!({
            "status": "ok",
            "path": path.display().to_string(),
        }),
        SessionOutcome::Failed { reason } => serde_json::json!({
            "status": "error",
            "reason": reason,
        }),
        SessionOutcome::Abandoned => serde_json::json!({
            "status": "cancelled",
        }),
    }
}
