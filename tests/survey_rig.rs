//! End-to-end tests over a fully wired rig: real motors and sequencer over
//! the simulated GPIO bus and mock camera host. Phase delays are zeroed and
//! travel distances shrunk so the full trajectory runs in milliseconds.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use toolscan::config::{CameraSettings, MotionSettings};
use toolscan::controller::SessionController;
use toolscan::error::ScanError;
use toolscan::hardware::gpio::{GpioBus, Level, PinAddressing};
use toolscan::hardware::mock::{MockCameraHost, SimulatedGpio};
use toolscan::motion::{RotaryStepper, StepSequence, VerticalActuator};
use toolscan::survey::bank::CameraBank;
use toolscan::survey::sequencer::{CaptureSequencer, SweepTuning};
use toolscan::survey::session::CaptureJob;

const VERTICAL_PINS: [[u16; 4]; 2] = [[5, 6, 13, 19], [16, 26, 20, 21]];

struct Rig {
    controller: SessionController,
    gpio: Arc<SimulatedGpio>,
}

async fn build_rig(dir: &TempDir, host: &MockCameraHost, vertical_delay: Duration) -> Rig {
    let gpio = Arc::new(SimulatedGpio::new());
    gpio.set_mode(PinAddressing::Bcm).unwrap();

    let stepper = Arc::new(
        RotaryStepper::new(
            gpio.clone(),
            [22, 23, 24, 25],
            StepSequence::full_step(),
            200,
            Duration::ZERO,
        )
        .unwrap(),
    );
    let actuator = Arc::new(
        VerticalActuator::new(
            gpio.clone(),
            VERTICAL_PINS,
            StepSequence::full_step(),
            200,
            20.0 / 12.7,
            vertical_delay,
        )
        .unwrap(),
    );

    let camera_settings = CameraSettings {
        warmup_frames: 1,
        ..CameraSettings::default()
    };
    let bank = Arc::new(CameraBank::initialize(host, &camera_settings, dir.path()).await);

    let sequencer = Arc::new(CaptureSequencer::new(
        actuator.clone(),
        stepper,
        bank,
        SweepTuning {
            home_travel_degrees: 92.0,
            layer_travel_degrees: 20.0,
            sweep_arc_degrees: 180.0,
            settle: Duration::ZERO,
        },
    ));

    let motion = MotionSettings {
        align_travel_degrees: 50.0,
        ..MotionSettings::default()
    };
    Rig {
        controller: SessionController::new(actuator, sequencer, &motion),
        gpio,
    }
}

/// Complete one align-up toggle cycle and accept the position as top.
async fn align(controller: &mut SessionController) {
    controller.align_up().await.unwrap();
    controller.align_up().await.unwrap();
    controller.set_top().unwrap();
}

#[tokio::test]
async fn full_survey_writes_every_expected_file() {
    let dir = tempfile::tempdir().unwrap();
    let host = MockCameraHost::new();
    let mut rig = build_rig(&dir, &host, Duration::ZERO).await;

    align(&mut rig.controller).await;
    let handle = rig
        .controller
        .start_job(CaptureJob::new("7", 4, 2))
        .unwrap();
    let report = handle.join().await.unwrap();

    // 1 homing image + 2 layers x 4 positions x 2 side cameras.
    assert_eq!(report.files.len(), 1 + 2 * 4 * 2);
    assert!(dir.path().join("T7_FL4_OD2").is_dir());
    for file in &report.files {
        assert!(file.exists(), "missing {}", file.display());
        assert!(file
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("T7_FL4_OD2_") && n.ends_with("deg.jpg"))
            .unwrap_or(false));
    }
    assert!(!rig.controller.is_job_active());
}

#[tokio::test]
async fn survey_refused_before_alignment_touches_no_hardware() {
    let dir = tempfile::tempdir().unwrap();
    let host = MockCameraHost::new();
    let mut rig = build_rig(&dir, &host, Duration::ZERO).await;

    let err = rig
        .controller
        .start_job(CaptureJob::new("7", 4, 2))
        .unwrap_err();
    assert!(matches!(err, ScanError::Precondition(_)));
    assert_eq!(rig.gpio.write_count(), 0);
    assert_eq!(host.reads_for(0), 0);
}

#[tokio::test]
async fn rig_rearms_after_a_completed_survey() {
    let dir = tempfile::tempdir().unwrap();
    let host = MockCameraHost::new();
    let mut rig = build_rig(&dir, &host, Duration::ZERO).await;

    align(&mut rig.controller).await;
    let first = rig
        .controller
        .start_job(CaptureJob::new("1", 2, 1))
        .unwrap()
        .join()
        .await
        .unwrap();
    let second = rig
        .controller
        .start_job(CaptureJob::new("2", 2, 1))
        .unwrap()
        .join()
        .await
        .unwrap();

    assert_ne!(first.session_id, second.session_id);
    assert_eq!(first.files.len(), second.files.len());
    assert!(dir.path().join("T1_FL2_OD1").is_dir());
    assert!(dir.path().join("T2_FL2_OD1").is_dir());
}

#[tokio::test]
async fn degraded_camera_bank_completes_with_fewer_files() {
    let dir = tempfile::tempdir().unwrap();
    // Device 2 (side1) is absent; the bank runs with top and side2 only.
    let host = MockCameraHost::new().failing_open(2);
    let mut rig = build_rig(&dir, &host, Duration::ZERO).await;

    align(&mut rig.controller).await;
    let report = rig
        .controller
        .start_job(CaptureJob::new("7", 4, 2))
        .unwrap()
        .join()
        .await
        .unwrap();

    // 1 homing image + 2 layers x 4 positions x 1 remaining side camera.
    assert_eq!(report.files.len(), 1 + 2 * 4);
    assert!(report.files.iter().all(|f| f.exists()));
}

#[tokio::test]
async fn cancellation_stops_survey_and_deenergizes_coils() {
    let dir = tempfile::tempdir().unwrap();
    let host = MockCameraHost::new();
    // Real per-phase pacing so the homing move is still in flight when the
    // cancel lands.
    let mut rig = build_rig(&dir, &host, Duration::from_millis(1)).await;

    align(&mut rig.controller).await;
    let handle = rig
        .controller
        .start_job(CaptureJob::new("7", 4, 2))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    rig.controller.cancel_job();

    let err = handle.join().await.unwrap_err();
    assert!(matches!(err, ScanError::Cancelled));
    assert!(!rig.controller.is_job_active());
    for group in VERTICAL_PINS {
        for pin in group {
            assert_eq!(rig.gpio.level(pin), Some(Level::Low));
        }
    }
}
