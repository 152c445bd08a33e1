//! Motion layer: coil driving, rotation, and vertical travel.
//!
//! The sequencer and the session controller depend on the seam traits
//! [`LinearAxis`] and [`RotaryAxis`], never on the concrete motors, so test
//! doubles can stand in for real hardware. Cancellation is cooperative: a
//! [`CancelToken`] is polled once per full phase-cycle, never per phase, so
//! the only guaranteed stop granularity is one phase-cycle after the token
//! is set.

pub mod actuator;
pub mod coil;
pub mod stepper;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

pub use actuator::VerticalActuator;
pub use coil::{CoilDriver, StepPhase, StepSequence};
pub use stepper::RotaryStepper;

/// Cooperative stop signal for one actuator.
///
/// Settable from outside the motion loop; the loop polls it between
/// phase-cycles and reports the distance actually traveled when it breaks.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Vertical travel capability.
///
/// `extend` raises the tool holder toward the top reference, `retract`
/// lowers it. Both return the degrees actually moved — equal to the request
/// on an uninterrupted move, smaller when cancelled — which callers use to
/// correct their position estimate.
#[async_trait]
pub trait LinearAxis: Send + Sync {
    async fn extend(&self, degrees: f64) -> Result<f64>;
    async fn retract(&self, degrees: f64) -> Result<f64>;

    /// De-energizes every coil. Idempotent.
    fn stop(&self) -> Result<()>;

    /// Handle to this axis's cancellation flag.
    fn cancel_token(&self) -> CancelToken;
}

/// Rotational capability. Always runs to completion; rotation legs are short
/// and are never the cancellation target.
#[async_trait]
pub trait RotaryAxis: Send + Sync {
    async fn rotate(&self, degrees: f64, clockwise: bool) -> Result<()>;
}
