// Lifecycle tests for the capture session state machine.
//
// These tests use device names that cannot exist, so they exercise the
// failure and idempotency paths without requiring audio hardware.

use std::time::Duration;

use parley::audio::SourceKind;
use parley::{CaptureConfig, CaptureEvent, CaptureSession, CaptureState};

fn unreachable_devices() -> CaptureConfig {
    CaptureConfig {
        microphone_device: Some("no-such-microphone-device".to_string()),
        loopback_device: Some("no-such-loopback-device".to_string()),
        quiescence: Duration::from_millis(10),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_start_fails_when_both_sources_fail() {
    let (session, mut events) = CaptureSession::new(unreachable_devices());

    let result = session.start().await;
    assert!(result.is_err(), "start must fail when no source comes up");
    assert_ne!(session.state(), CaptureState::Running);

    // Each failed source reports a scoped error event.
    let mut source_errors = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CaptureEvent::SourceError { .. }) {
            source_errors += 1;
        }
    }
    assert_eq!(source_errors, 2);
}

#[tokio::test]
async fn test_stop_is_safe_from_any_state() {
    let (session, _events) = CaptureSession::new(unreachable_devices());

    // Stop before start
    session.stop().await;
    assert_eq!(session.state(), CaptureState::Stopped);

    // Redundant stop is a no-op, not an error
    session.stop().await;
    assert_eq!(session.state(), CaptureState::Stopped);

    let active = session.active_sources().await;
    assert!(!active.microphone);
    assert!(!active.system_audio);
}

#[tokio::test]
async fn test_stop_after_failed_start() {
    let (session, _events) = CaptureSession::new(unreachable_devices());

    let _ = session.start().await;
    session.stop().await;

    assert_eq!(session.state(), CaptureState::Stopped);
    assert!(!session.active_sources().await.microphone);
}

#[tokio::test]
async fn test_pause_and_resume_are_noops_outside_running() {
    let (session, _events) = CaptureSession::new(unreachable_devices());

    assert!(session.pause().await.is_ok());
    assert_eq!(session.state(), CaptureState::Idle);

    assert!(session.resume().await.is_ok());
    assert_eq!(session.state(), CaptureState::Idle);
}

#[tokio::test]
async fn test_device_change_notification_reaches_consumer() {
    let (session, mut events) = CaptureSession::new(unreachable_devices());

    session.notify_device_change(SourceKind::Microphone, Some("new-headset".to_string()));

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("watcher should forward the notification")
        .expect("event channel open");

    match event {
        CaptureEvent::DeviceChanged { source, device } => {
            assert_eq!(source, SourceKind::Microphone);
            assert_eq!(device.as_deref(), Some("new-headset"));
        }
        other => panic!("expected DeviceChanged, got {:?}", other),
    }
}

#[tokio::test]
async fn test_device_change_while_idle_does_not_restart() {
    let (session, mut events) = CaptureSession::new(unreachable_devices());

    session.notify_device_change(SourceKind::SystemAudio, None);

    // Let the quiescence window fully elapse.
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(session.state(), CaptureState::Idle);

    // Only the DeviceChanged event itself; no restart attempt, so no
    // source errors and nothing fatal.
    while let Ok(event) = events.try_recv() {
        assert!(
            matches!(event, CaptureEvent::DeviceChanged { .. }),
            "unexpected event while idle: {:?}",
            event
        );
    }
}
