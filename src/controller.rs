//! Session controller: manual alignment, the zero reference, and survey
//! job lifecycle.
//!
//! Alignment is an explicit three-state machine — `Idle`, `MovingUp`,
//! `MovingDown` — with toggle semantics: the first call starts an
//! unbounded-distance move on a background task, the second call (valid only
//! while moving in the matching direction) sets the cancellation token,
//! joins the task, and only then mutates the Position Reference by the
//! distance actually traveled. The join-then-mutate discipline is what keeps
//! the reference single-writer without a lock.
//!
//! A survey job is refused until at least one align-up cycle has completed;
//! that gate is the sole precondition protecting the automated sequence from
//! running without an established reference.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::MotionSettings;
use crate::error::{AppResult, ScanError};
use crate::motion::{CancelToken, LinearAxis};
use crate::survey::sequencer::CaptureSequencer;
use crate::survey::session::{CaptureJob, SurveyReport};

/// Alignment machine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignState {
    Idle,
    MovingUp,
    MovingDown,
}

/// Single source of truth for the current vertical offset from the
/// user-defined zero (0 = top). Clamped to the configured operating range
/// after every mutation.
#[derive(Debug)]
pub struct PositionReference {
    current: f64,
    bit_top: Option<f64>,
    min: f64,
    max: f64,
}

impl PositionReference {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            current: 0.0,
            bit_top: None,
            min,
            max,
        }
    }

    fn offset_by(&mut self, delta: f64) {
        self.current = (self.current + delta).clamp(self.min, self.max);
    }

    fn set_zero(&mut self) {
        self.current = 0.0_f64.clamp(self.min, self.max);
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn bit_top(&self) -> Option<f64> {
        self.bit_top
    }
}

/// Handle to a survey running on a background task. Awaiting it yields the
/// typed result the task produced.
#[derive(Debug)]
pub struct JobHandle {
    handle: JoinHandle<AppResult<SurveyReport>>,
}

impl JobHandle {
    pub async fn join(self) -> AppResult<SurveyReport> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(ScanError::Task(err.to_string())),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub struct SessionController {
    actuator: Arc<dyn LinearAxis>,
    sequencer: Arc<CaptureSequencer>,
    align_state: AlignState,
    align_task: Option<JoinHandle<anyhow::Result<f64>>>,
    position: PositionReference,
    has_aligned_up: bool,
    align_travel_degrees: f64,
    job_active: Arc<AtomicBool>,
    job_cancel: CancelToken,
}

impl SessionController {
    pub fn new(
        actuator: Arc<dyn LinearAxis>,
        sequencer: Arc<CaptureSequencer>,
        motion: &MotionSettings,
    ) -> Self {
        Self {
            actuator,
            sequencer,
            align_state: AlignState::Idle,
            align_task: None,
            position: PositionReference::new(motion.travel_min_degrees, motion.travel_max_degrees),
            has_aligned_up: false,
            align_travel_degrees: motion.align_travel_degrees,
            job_active: Arc::new(AtomicBool::new(false)),
            job_cancel: CancelToken::new(),
        }
    }

    /// Toggle action: starts an upward alignment move, or stops the one in
    /// flight and folds the traveled distance into the Position Reference.
    /// A completed align-up cycle satisfies the survey precondition.
    pub async fn align_up(&mut self) -> AppResult<()> {
        match self.align_state {
            AlignState::Idle => {
                self.start_align(true)?;
                self.align_state = AlignState::MovingUp;
                info!("align-up started");
                Ok(())
            }
            AlignState::MovingUp => {
                // Idle again even when the join fails, so the machine
                // cannot wedge with no task left to stop.
                let traveled = self.finish_align().await;
                self.align_state = AlignState::Idle;
                let traveled = traveled?;
                self.position.offset_by(-traveled);
                self.has_aligned_up = true;
                info!(traveled, position = self.position.current(), "align-up stopped");
                Ok(())
            }
            AlignState::MovingDown => Err(ScanError::Alignment(
                "cannot toggle align-up while moving down".into(),
            )),
        }
    }

    /// Toggle action mirroring [`align_up`](Self::align_up), moving the tool
    /// holder downward. Does not satisfy the survey precondition.
    pub async fn align_down(&mut self) -> AppResult<()> {
        match self.align_state {
            AlignState::Idle => {
                self.start_align(false)?;
                self.align_state = AlignState::MovingDown;
                info!("align-down started");
                Ok(())
            }
            AlignState::MovingDown => {
                let traveled = self.finish_align().await;
                self.align_state = AlignState::Idle;
                let traveled = traveled?;
                self.position.offset_by(traveled);
                info!(traveled, position = self.position.current(), "align-down stopped");
                Ok(())
            }
            AlignState::MovingUp => Err(ScanError::Alignment(
                "cannot toggle align-down while moving up".into(),
            )),
        }
    }

    fn start_align(&mut self, upward: bool) -> AppResult<()> {
        if self.job_active.load(Ordering::SeqCst) {
            return Err(ScanError::JobInProgress);
        }
        let actuator = Arc::clone(&self.actuator);
        let degrees = self.align_travel_degrees;
        self.align_task = Some(tokio::spawn(async move {
            if upward {
                actuator.extend(degrees).await
            } else {
                actuator.retract(degrees).await
            }
        }));
        Ok(())
    }

    /// Signals the in-flight alignment move and joins its task. The Position
    /// Reference is only touched after the join completes.
    async fn finish_align(&mut self) -> AppResult<f64> {
        self.actuator.cancel_token().set();
        let task = self
            .align_task
            .take()
            .ok_or_else(|| ScanError::Alignment("no alignment move in flight".into()))?;
        match task.await {
            Ok(Ok(traveled)) => Ok(traveled),
            Ok(Err(err)) => Err(ScanError::motion(err)),
            Err(err) => Err(ScanError::Task(err.to_string())),
        }
    }

    /// Declares the current vertical position as the zero reference.
    pub fn set_top(&mut self) -> AppResult<()> {
        self.guard_idle()?;
        self.position.set_zero();
        info!("current position set as top");
        Ok(())
    }

    /// Records the current position as the saved bit-top reference.
    pub fn mark_bit_top(&mut self) -> AppResult<f64> {
        self.guard_idle()?;
        let position = self.position.current();
        self.position.bit_top = Some(position);
        info!(position, "bit-top position saved");
        Ok(position)
    }

    /// Starts the automated survey on a background task.
    ///
    /// Refused — before any hardware write — while an alignment move or
    /// another job is in flight, when no align-up cycle has completed, or
    /// when the job fields are invalid.
    pub fn start_job(&mut self, job: CaptureJob) -> AppResult<JobHandle> {
        self.guard_idle()?;
        if !self.has_aligned_up {
            warn!("survey refused: no completed align-up cycle");
            return Err(ScanError::Precondition(
                "press align-up and establish a reference before starting".into(),
            ));
        }
        job.validate()?;

        self.job_cancel.clear();
        self.job_active.store(true, Ordering::SeqCst);

        let sequencer = Arc::clone(&self.sequencer);
        let active = Arc::clone(&self.job_active);
        let cancel = self.job_cancel.clone();
        let handle = tokio::spawn(async move {
            let result = sequencer.run(job, cancel).await;
            // Re-arm the start control on completion or error alike.
            active.store(false, Ordering::SeqCst);
            result
        });
        Ok(JobHandle { handle })
    }

    /// Requests cooperative cancellation of the running survey: the
    /// sequencer stops at its next checkpoint and the in-flight actuator
    /// move is cut at its next phase-cycle.
    pub fn cancel_job(&self) {
        if self.job_active.load(Ordering::SeqCst) {
            info!("cancelling survey");
            self.job_cancel.set();
            self.actuator.cancel_token().set();
        }
    }

    pub fn is_job_active(&self) -> bool {
        self.job_active.load(Ordering::SeqCst)
    }

    pub fn has_aligned_up(&self) -> bool {
        self.has_aligned_up
    }

    pub fn position(&self) -> f64 {
        self.position.current()
    }

    pub fn bit_top(&self) -> Option<f64> {
        self.position.bit_top()
    }

    pub fn align_state(&self) -> AlignState {
        self.align_state
    }

    fn guard_idle(&self) -> AppResult<()> {
        if self.align_state != AlignState::Idle {
            return Err(ScanError::Precondition(
                "an alignment move is in progress".into(),
            ));
        }
        if self.job_active.load(Ordering::SeqCst) {
            return Err(ScanError::JobInProgress);
        }
        Ok(())
    }
}
