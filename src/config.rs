//! Application configuration.
//!
//! Settings are loaded in three layers: built-in defaults (the constants of
//! the physical rig), an optional TOML file, and finally environment
//! variables prefixed with `TOOLSCAN` (e.g. `TOOLSCAN_MOTION__GEAR_RATIO`).
//! Parsing problems surface as [`ScanError::Config`]; values that parse but
//! are logically invalid are caught by [`Settings::validate`] and surface as
//! [`ScanError::Configuration`].

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ScanError};

/// Output pin assignments (BCM numbering) for the two motion groups.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GpioSettings {
    /// Coil pins of the rotational (azimuth) stepper.
    pub rotary_pins: [u16; 4],
    /// Coil pins of the two mechanically-paired vertical steppers. Both
    /// groups always receive the same phase.
    pub vertical_pins: [[u16; 4]; 2],
}

impl Default for GpioSettings {
    fn default() -> Self {
        Self {
            rotary_pins: [22, 23, 24, 25],
            vertical_pins: [[5, 6, 13, 19], [16, 26, 20, 21]],
        }
    }
}

/// Step-conversion constants and motion timing.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MotionSettings {
    /// Full steps per motor revolution (NEMA-23: 1.8° per step).
    pub steps_per_revolution: u32,
    /// Pulley conversion for vertical travel (GT2, 20 teeth / 12.7 mm pitch
    /// diameter). Rotation is direct drive and never uses this.
    pub gear_ratio: f64,
    /// Inter-phase delay for the rotational stepper, in milliseconds.
    pub rotary_phase_delay_ms: u64,
    /// Inter-phase delay for the vertical steppers, in milliseconds.
    pub vertical_phase_delay_ms: u64,
    /// Lower bound of the tracked vertical position (0 = top).
    pub travel_min_degrees: f64,
    /// Upper bound of the tracked vertical position.
    pub travel_max_degrees: f64,
    /// Travel requested by a manual alignment move. Deliberately larger than
    /// the physical range; the operator stops it with the second press.
    pub align_travel_degrees: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            steps_per_revolution: 200,
            gear_ratio: 20.0 / 12.7,
            rotary_phase_delay_ms: 10,
            vertical_phase_delay_ms: 1,
            travel_min_degrees: 0.0,
            travel_max_degrees: 940.0,
            align_travel_degrees: 2000.0,
        }
    }
}

/// Trajectory parameters of the automated survey.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SweepSettings {
    /// Actuator travel of the homing extend, up to the top extreme.
    pub home_travel_degrees: f64,
    /// Total downward travel distributed across the layers of a job.
    pub layer_travel_degrees: f64,
    /// Angular arc swept per layer. The per-position increment is
    /// `sweep_arc_degrees / flute_count`; rounding drift when the division
    /// is not exact is accepted, not corrected.
    pub sweep_arc_degrees: f64,
    /// Stabilization pause between a motion stop and the next capture, in
    /// milliseconds. Frames read while the rig is still settling are not
    /// trustworthy.
    pub settle_ms: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            home_travel_degrees: 920.0,
            layer_travel_degrees: 200.0,
            sweep_arc_degrees: 180.0,
            settle_ms: 300,
        }
    }
}

/// Capture-device set and frame parameters.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CameraSettings {
    /// Device indices to open, in slot order.
    pub indices: Vec<u32>,
    /// Role label per slot, used in output file names.
    pub labels: Vec<String>,
    /// Slot of the camera that shoots the homing reference image. All other
    /// slots are the per-position cameras.
    pub home_slot: usize,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Frames discarded after a mechanical move before the kept read; the
    /// first reads out of a USB camera buffer are stale.
    pub warmup_frames: u32,
    pub pixel_format: String,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            indices: vec![0, 2, 4],
            labels: vec!["top".into(), "side1".into(), "side2".into()],
            home_slot: 0,
            frame_width: 640,
            frame_height: 480,
            warmup_frames: 10,
            pixel_format: "MJPG".into(),
        }
    }
}

/// Output location for captured images.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Root directory; per-job folders are created underneath on demand.
    pub base_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("captures"),
        }
    }
}

/// Top-level application settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub gpio: GpioSettings,
    pub motion: MotionSettings,
    pub sweep: SweepSettings,
    pub cameras: CameraSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Loads settings from defaults, an optional TOML file, and the
    /// environment, then validates them.
    pub fn new(config_path: Option<&str>) -> AppResult<Self> {
        let defaults = Config::try_from(&Settings::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        } else {
            builder = builder.add_source(File::with_name("toolscan").required(false));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix("TOOLSCAN").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Semantic validation, distinct from parse errors.
    pub fn validate(&self) -> AppResult<()> {
        if self.motion.steps_per_revolution == 0 {
            return Err(ScanError::Configuration(
                "motion.steps_per_revolution must be positive".into(),
            ));
        }
        if self.motion.gear_ratio <= 0.0 || !self.motion.gear_ratio.is_finite() {
            return Err(ScanError::Configuration(
                "motion.gear_ratio must be positive and finite".into(),
            ));
        }
        if self.motion.travel_min_degrees >= self.motion.travel_max_degrees {
            return Err(ScanError::Configuration(format!(
                "motion travel range is inverted: [{}, {}]",
                self.motion.travel_min_degrees, self.motion.travel_max_degrees
            )));
        }
        if self.motion.align_travel_degrees <= 0.0 {
            return Err(ScanError::Configuration(
                "motion.align_travel_degrees must be positive".into(),
            ));
        }
        if self.sweep.home_travel_degrees <= 0.0 || self.sweep.layer_travel_degrees <= 0.0 {
            return Err(ScanError::Configuration(
                "sweep travel distances must be positive".into(),
            ));
        }
        if self.sweep.sweep_arc_degrees <= 0.0 || self.sweep.sweep_arc_degrees > 360.0 {
            return Err(ScanError::Configuration(format!(
                "sweep.sweep_arc_degrees out of range (0, 360]: {}",
                self.sweep.sweep_arc_degrees
            )));
        }
        if self.cameras.indices.is_empty() {
            return Err(ScanError::Configuration(
                "cameras.indices must name at least one device".into(),
            ));
        }
        if self.cameras.labels.len() != self.cameras.indices.len() {
            return Err(ScanError::Configuration(format!(
                "cameras.labels ({}) must match cameras.indices ({})",
                self.cameras.labels.len(),
                self.cameras.indices.len()
            )));
        }
        if self.cameras.home_slot >= self.cameras.indices.len() {
            return Err(ScanError::Configuration(format!(
                "cameras.home_slot {} out of range",
                self.cameras.home_slot
            )));
        }
        if self.cameras.frame_width == 0 || self.cameras.frame_height == 0 {
            return Err(ScanError::Configuration(
                "camera frame dimensions must be positive".into(),
            ));
        }
        Ok(())
    }
}
