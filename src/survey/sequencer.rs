//! The capture sequencer: drives actuator, stepper, and camera bank through
//! the full survey trajectory for one job.
//!
//! States: `Idle → Homing → {per layer: Stepping → per position: Capturing →
//! Rotating} → Returning → Done | Failed`, published on a watch channel.
//! Every step is strictly sequential — no motion overlaps a capture, because
//! position must be physically settled before a frame is trustworthy. Any
//! error aborts the remaining sequence and propagates to the caller; there
//! is no retry or partial-job resume. Per-device capture misses are handled
//! inside the bank and do not abort.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::SweepSettings;
use crate::error::{AppResult, ScanError};
use crate::motion::{CancelToken, LinearAxis, RotaryAxis};
use crate::survey::bank::{CameraBank, CameraSelector};
use crate::survey::session::{CaptureJob, SurveyReport, SurveySession};

/// Where the sequencer currently is in the survey trajectory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerPhase {
    Idle,
    Homing,
    Stepping,
    Capturing,
    Rotating,
    Returning,
    Done,
    Failed,
}

/// Trajectory parameters, collapsed from the configured sweep settings. The
/// angle increment is `sweep_arc_degrees / flute_count` — a parameter, not a
/// constant, since rigs disagree on the intended arc.
#[derive(Clone, Debug)]
pub struct SweepTuning {
    pub home_travel_degrees: f64,
    pub layer_travel_degrees: f64,
    pub sweep_arc_degrees: f64,
    pub settle: Duration,
}

impl From<&SweepSettings> for SweepTuning {
    fn from(settings: &SweepSettings) -> Self {
        Self {
            home_travel_degrees: settings.home_travel_degrees,
            layer_travel_degrees: settings.layer_travel_degrees,
            sweep_arc_degrees: settings.sweep_arc_degrees,
            settle: Duration::from_millis(settings.settle_ms),
        }
    }
}

pub struct CaptureSequencer {
    actuator: Arc<dyn LinearAxis>,
    stepper: Arc<dyn RotaryAxis>,
    bank: Arc<CameraBank>,
    tuning: SweepTuning,
    phase_tx: watch::Sender<SequencerPhase>,
}

impl CaptureSequencer {
    pub fn new(
        actuator: Arc<dyn LinearAxis>,
        stepper: Arc<dyn RotaryAxis>,
        bank: Arc<CameraBank>,
        tuning: SweepTuning,
    ) -> Self {
        let (phase_tx, _) = watch::channel(SequencerPhase::Idle);
        Self {
            actuator,
            stepper,
            bank,
            tuning,
            phase_tx,
        }
    }

    /// Observer handle for the current phase.
    pub fn phase_watch(&self) -> watch::Receiver<SequencerPhase> {
        self.phase_tx.subscribe()
    }

    /// Runs one full survey. The cancel token is polled between steps; the
    /// in-flight actuator move is cut by the actuator's own token, which the
    /// session controller sets alongside this one.
    pub async fn run(&self, job: CaptureJob, cancel: CancelToken) -> AppResult<SurveyReport> {
        job.validate()?;
        info!(
            tool = %job.tool_id,
            flutes = job.flute_count,
            layers = job.layer_count,
            "starting survey"
        );

        let result = self.run_inner(job, &cancel).await;
        match &result {
            Ok(report) => {
                self.set_phase(SequencerPhase::Done);
                info!(
                    files = report.files.len(),
                    elapsed_s = report.elapsed.as_secs_f64(),
                    "survey complete"
                );
            }
            Err(err) => {
                self.set_phase(SequencerPhase::Failed);
                error!(%err, "survey aborted");
            }
        }
        result
    }

    async fn run_inner(&self, job: CaptureJob, cancel: &CancelToken) -> AppResult<SurveyReport> {
        let mut session = SurveySession::begin(job);
        let job = session.job.clone();

        // Homing: extend to the top travel extreme and shoot the reference
        // image before any layer work.
        self.checkpoint(cancel)?;
        self.set_phase(SequencerPhase::Homing);
        let mut height = self
            .actuator
            .extend(self.tuning.home_travel_degrees)
            .await
            .map_err(ScanError::motion)?;
        self.settle().await;
        let files = self
            .bank
            .capture(&job, "L0", 0.0, CameraSelector::Home)
            .await?;
        session.record(files);

        let layer_step = self.tuning.layer_travel_degrees / f64::from(job.layer_count);
        let increment = self.tuning.sweep_arc_degrees / f64::from(job.flute_count);

        for layer in 1..=job.layer_count {
            self.checkpoint(cancel)?;
            self.set_phase(SequencerPhase::Stepping);
            height -= self
                .actuator
                .retract(layer_step)
                .await
                .map_err(ScanError::motion)?;
            self.settle().await;

            let label = format!("L{layer}");
            let mut angle = 0.0;
            for _position in 0..job.flute_count {
                self.checkpoint(cancel)?;
                self.set_phase(SequencerPhase::Capturing);
                let files = self
                    .bank
                    .capture(&job, &label, angle, CameraSelector::NonHome)
                    .await?;
                session.record(files);

                self.set_phase(SequencerPhase::Rotating);
                self.stepper
                    .rotate(increment, true)
                    .await
                    .map_err(ScanError::motion)?;
                self.settle().await;
                angle += increment;
            }

            // Unwind the sweep: same number of increments in reverse, which
            // restores the angular reference without absolute sensing.
            for _position in 0..job.flute_count {
                self.checkpoint(cancel)?;
                self.stepper
                    .rotate(increment, false)
                    .await
                    .map_err(ScanError::motion)?;
            }
        }

        // Return leg: the remaining accumulated height back to the pre-home
        // zero reference.
        self.checkpoint(cancel)?;
        self.set_phase(SequencerPhase::Returning);
        if height > 0.0 {
            self.actuator
                .retract(height)
                .await
                .map_err(ScanError::motion)?;
        }

        Ok(session.finalize())
    }

    fn checkpoint(&self, cancel: &CancelToken) -> AppResult<()> {
        if cancel.is_set() {
            return Err(ScanError::Cancelled);
        }
        Ok(())
    }

    fn set_phase(&self, phase: SequencerPhase) {
        self.phase_tx.send_replace(phase);
    }

    async fn settle(&self) {
        if !self.tuning.settle.is_zero() {
            sleep(self.tuning.settle).await;
        }
    }
}
