// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end capture session tests against the virtual device

use shutter::backends::camera::virtual_device::{DeviceProbe, VirtualDevice};
use shutter::session::DeviceFactory;
use shutter::{
    CaptureRotation, SessionConfig, SessionController, SessionOutcome, SessionRequest,
    SessionState,
};
use std::time::Duration;

fn probed_factory(label: &str, probe: &DeviceProbe) -> DeviceFactory {
    let label = label.to_string();
    let probe = probe.clone();
    Box::new(move || Box::new(VirtualDevice::new(&label).with_probe(probe.clone())))
}

#[tokio::test]
async fn test_full_session_reaches_finished() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.jpg");
    let probe = DeviceProbe::new();

    let mut session = SessionController::start(
        SessionRequest::new(&target),
        SessionConfig::default(),
        probed_factory("e2e-ok", &probe),
    )
    .unwrap();

    // Device upright: capture rotation 90, controls unrotated
    let mapping = session.orientation_changed(10).unwrap();
    assert_eq!(mapping.capture_rotation, CaptureRotation::Rotate90);
    assert_eq!(session.ui_rotation(), 0);

    let state = session.trigger_capture().await.unwrap();
    assert_eq!(state, SessionState::Reviewing);
    assert_eq!(session.captured(), Some(target.as_path()));

    let written = std::fs::read(&target).unwrap();
    assert!(!written.is_empty(), "captured file must be non-empty");

    assert_eq!(session.confirm().unwrap(), SessionState::Finished);
    assert_eq!(
        session.take_outcome(),
        Some(SessionOutcome::Confirmed {
            path: target.clone()
        })
    );
    // Outcome is delivered once
    assert_eq!(session.take_outcome(), None);

    // The device saw the staged rotation and was released on finish
    assert_eq!(probe.read(|s| s.capture_rotations.clone()), vec![CaptureRotation::Rotate90]);
    assert_eq!(probe.read(|s| s.closes), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unwritable_destination_fails_session() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();
    let target = dir.path().join("out.jpg");
    let probe = DeviceProbe::new();

    let mut session = SessionController::start(
        SessionRequest::new(&target),
        SessionConfig::default(),
        probed_factory("e2e-storage", &probe),
    )
    .unwrap();
    assert!(!session.storage_available());

    let state = session.trigger_capture().await.unwrap();
    assert_eq!(state, SessionState::Failed);
    assert!(!target.exists(), "no partial file may remain");

    match session.take_outcome() {
        Some(SessionOutcome::Failed { reason }) => {
            assert!(reason.contains("Storage unavailable"), "reason: {}", reason);
        }
        other => panic!("expected failure outcome, got {:?}", other),
    }

    // Handle released, device never triggered
    assert_eq!(probe.read(|s| s.closes), 1);
    assert_eq!(probe.read(|s| s.capture_rotations.len()), 0);

    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
async fn test_capture_timeout_fails_session() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.jpg");

    let mut session = SessionController::start(
        SessionRequest::new(&target),
        SessionConfig {
            capture_timeout_secs: 1,
            ..SessionConfig::default()
        },
        Box::new(|| Box::new(VirtualDevice::new("e2e-timeout").unresponsive())),
    )
    .unwrap();

    let state = session.trigger_capture().await.unwrap();
    assert_eq!(state, SessionState::Failed);
    match session.take_outcome() {
        Some(SessionOutcome::Failed { reason }) => {
            assert!(reason.contains("timed out"), "reason: {}", reason);
        }
        other => panic!("expected failure outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_teardown_during_capture_abandons_and_discards_result() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.jpg");
    let probe = DeviceProbe::new();
    let label = "e2e-teardown";
    let probe_clone = probe.clone();

    let mut session = SessionController::start(
        SessionRequest::new(&target),
        SessionConfig::default(),
        Box::new(move || {
            Box::new(
                VirtualDevice::new(label)
                    .with_capture_delay(Duration::from_millis(300))
                    .with_probe(probe_clone.clone()),
            )
        }),
    )
    .unwrap();

    // The embedding screen goes away while the capture is in flight
    let signal = session.teardown_signal();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal.signal();
    });

    let state = session.trigger_capture().await.unwrap();
    assert_eq!(state, SessionState::Abandoned);
    assert_eq!(session.take_outcome(), Some(SessionOutcome::Abandoned));
    assert_eq!(probe.read(|s| s.closes), 1, "handle must be released");

    // The capture callback eventually fires and must be discarded
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(probe.read(|s| s.discarded_results), 1);
    assert_eq!(probe.read(|s| s.completed_captures), 0);
    assert!(!target.exists(), "discarded capture must not be written");
}

#[tokio::test]
async fn test_retake_restarts_preview_with_fresh_device() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.jpg");
    let probe = DeviceProbe::new();

    let mut session = SessionController::start(
        SessionRequest::new(&target),
        SessionConfig::default(),
        probed_factory("e2e-retake", &probe),
    )
    .unwrap();

    session.orientation_changed(10);
    assert_eq!(session.trigger_capture().await.unwrap(), SessionState::Reviewing);
    assert!(session.captured().is_some());

    // Orientation flips while reviewing; only the intent is stored
    session.orientation_changed(90);

    assert_eq!(session.retake().unwrap(), SessionState::Previewing);
    assert!(session.captured().is_none(), "retake clears the captured reference");
    assert_eq!(probe.read(|s| s.opens), 2, "retake acquires a fresh device");
    assert_eq!(probe.read(|s| s.closes), 1);

    // The deferred rotation is applied on the new preview
    assert_eq!(session.trigger_capture().await.unwrap(), SessionState::Reviewing);
    assert_eq!(
        probe.read(|s| s.capture_rotations.clone()),
        vec![CaptureRotation::Rotate90, CaptureRotation::None]
    );

    assert_eq!(session.confirm().unwrap(), SessionState::Finished);
    assert_eq!(probe.read(|s| s.closes), 2);
}

#[tokio::test]
async fn test_second_session_on_same_device_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let first = SessionController::start(
        SessionRequest::new(dir.path().join("a.jpg")),
        SessionConfig::default(),
        Box::new(|| Box::new(VirtualDevice::new("e2e-exclusive"))),
    )
    .unwrap();

    let second = SessionController::start(
        SessionRequest::new(dir.path().join("b.jpg")),
        SessionConfig::default(),
        Box::new(|| Box::new(VirtualDevice::new("e2e-exclusive"))),
    );
    assert!(second.is_err(), "device must be exclusive while held");

    drop(first);

    // Once the first session is gone the device is free again
    let third = SessionController::start(
        SessionRequest::new(dir.path().join("c.jpg")),
        SessionConfig::default(),
        Box::new(|| Box::new(VirtualDevice::new("e2e-exclusive"))),
    );
    assert!(third.is_ok());
}

#[tokio::test]
async fn test_overlay_passthrough() {
    let dir = tempfile::tempdir().unwrap();
    let overlay_path = dir.path().join("ref.png");
    image::RgbaImage::from_pixel(8, 4, image::Rgba([9, 9, 9, 255]))
        .save(&overlay_path)
        .unwrap();

    let session = SessionController::start(
        SessionRequest::new(dir.path().join("out.jpg"))
            .with_overlay(&overlay_path, Some(40)),
        SessionConfig::default(),
        Box::new(|| Box::new(VirtualDevice::new("e2e-overlay"))),
    )
    .unwrap();

    let spec = session.overlay().expect("overlay spec must pass through");
    assert_eq!(spec.alpha_percent(), 40);

    let prepared = session.prepared_overlay().expect("overlay must decode");
    // Landscape source is pre-rotated to the portrait preview
    assert_eq!(prepared.image.width(), 4);
    assert_eq!(prepared.image.height(), 8);
}
