//! Dual vertical-stepper actuator.
//!
//! Two mechanically-coupled steppers move the tool holder in lockstep; the
//! coil driver writes both pin groups the same phase in the same call.
//! Moves are step-counted and open-loop. The cancellation token is polled
//! once per phase-cycle: when set, the move de-energizes the coils, breaks,
//! and reports the degrees actually issued so the caller can correct its
//! position estimate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;

use crate::hardware::gpio::GpioBus;
use crate::motion::coil::{CoilDriver, StepSequence};
use crate::motion::{CancelToken, LinearAxis};

/// Phase-cycles for a vertical move; the pulley gear ratio applies here and
/// nowhere else.
fn cycles_for(degrees: f64, steps_per_revolution: u32, gear_ratio: f64) -> u64 {
    if degrees <= 0.0 || !degrees.is_finite() {
        return 0;
    }
    (degrees / 360.0 * f64::from(steps_per_revolution) * gear_ratio).round() as u64
}

/// Inverse conversion of completed cycles back to degrees.
///
/// Clamped to the requested magnitude: the forward conversion rounds to the
/// nearest cycle, so an uncancelled move could otherwise report slightly
/// more travel than was asked for.
fn degrees_for(cycles: u64, steps_per_revolution: u32, gear_ratio: f64, requested: f64) -> f64 {
    let raw = cycles as f64 / (f64::from(steps_per_revolution) * gear_ratio) * 360.0;
    raw.min(requested.max(0.0))
}

pub struct VerticalActuator {
    driver: CoilDriver,
    sequence: StepSequence,
    steps_per_revolution: u32,
    gear_ratio: f64,
    phase_delay: Duration,
    token: CancelToken,
}

impl VerticalActuator {
    pub fn new(
        gpio: Arc<dyn GpioBus>,
        pin_groups: [[u16; 4]; 2],
        sequence: StepSequence,
        steps_per_revolution: u32,
        gear_ratio: f64,
        phase_delay: Duration,
    ) -> Result<Self> {
        let driver = CoilDriver::new(gpio, pin_groups.to_vec())?;
        Ok(Self {
            driver,
            sequence,
            steps_per_revolution,
            gear_ratio,
            phase_delay,
            token: CancelToken::new(),
        })
    }

    /// Moves by the requested travel, polling the cancel token between
    /// phase-cycles, and returns the degrees actually moved.
    async fn move_by(&self, degrees: f64, upward: bool) -> Result<f64> {
        let total = cycles_for(degrees, self.steps_per_revolution, self.gear_ratio);
        debug!(degrees, upward, cycles = total, "vertical move");

        let phases = self.sequence.phases(upward);
        let mut completed: u64 = 0;
        for _ in 0..total {
            if self.token.is_set() {
                self.stop()?;
                break;
            }
            for &phase in &phases {
                self.driver.apply(phase)?;
                sleep(self.phase_delay).await;
            }
            completed += 1;
        }

        let moved = degrees_for(completed, self.steps_per_revolution, self.gear_ratio, degrees);
        if completed < total {
            debug!(requested = degrees, moved, "vertical move cancelled");
        }
        Ok(moved)
    }
}

#[async_trait]
impl LinearAxis for VerticalActuator {
    async fn extend(&self, degrees: f64) -> Result<f64> {
        self.token.clear();
        self.move_by(degrees, true).await
    }

    async fn retract(&self, degrees: f64) -> Result<f64> {
        self.token.clear();
        self.move_by(degrees, false).await
    }

    fn stop(&self) -> Result<()> {
        self.driver.release()
    }

    fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::gpio::{Level, PinAddressing};
    use crate::hardware::mock::SimulatedGpio;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SPR: u32 = 200;
    const GEAR: f64 = 20.0 / 12.7;
    const PINS: [[u16; 4]; 2] = [[5, 6, 13, 19], [16, 26, 20, 21]];

    fn actuator(gpio: Arc<dyn GpioBus>) -> VerticalActuator {
        VerticalActuator::new(
            gpio,
            PINS,
            StepSequence::full_step(),
            SPR,
            GEAR,
            Duration::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn forward_conversion_applies_gear_ratio() {
        // 360 degrees -> one revolution times the gear ratio.
        assert_eq!(cycles_for(360.0, SPR, GEAR), 315); // round(200 * 1.5748)
        assert_eq!(cycles_for(0.0, SPR, GEAR), 0);
        assert_eq!(cycles_for(-90.0, SPR, GEAR), 0);
        // Without gear ratio for comparison.
        assert_eq!(cycles_for(360.0, SPR, 1.0), 200);
    }

    #[test]
    fn inverse_conversion_is_monotone_and_clamped() {
        let requested = 90.0;
        let mut last = -1.0;
        for cycles in 0..=cycles_for(requested, SPR, GEAR) {
            let moved = degrees_for(cycles, SPR, GEAR, requested);
            assert!(moved >= last, "not monotone at cycle {cycles}");
            assert!(moved <= requested, "exceeded request at cycle {cycles}");
            last = moved;
        }
        // Rounded-up cycle counts still cannot report more than requested.
        let odd_request = 55.0;
        let cycles = cycles_for(odd_request, SPR, 1.0 / 36.0);
        assert!(degrees_for(cycles, SPR, 1.0 / 36.0, odd_request) <= odd_request);
    }

    #[tokio::test]
    async fn zero_degree_move_writes_nothing() {
        let gpio = Arc::new(SimulatedGpio::new());
        let actuator = actuator(gpio.clone());
        let moved = actuator.extend(0.0).await.unwrap();
        assert_eq!(moved, 0.0);
        assert_eq!(gpio.write_count(), 0);
    }

    #[tokio::test]
    async fn full_move_reports_requested_distance() {
        let gpio = Arc::new(SimulatedGpio::new());
        let actuator = actuator(gpio.clone());
        let moved = actuator.retract(45.0).await.unwrap();
        assert!(moved > 0.0 && moved <= 45.0);
    }

    #[tokio::test]
    async fn stop_deenergizes_and_is_idempotent() {
        let gpio = Arc::new(SimulatedGpio::new());
        let actuator = actuator(gpio.clone());
        actuator.extend(10.0).await.unwrap();

        actuator.stop().unwrap();
        let first = gpio.snapshot();
        actuator.stop().unwrap();
        assert_eq!(first, gpio.snapshot());
        for group in PINS {
            for pin in group {
                assert_eq!(gpio.level(pin), Some(Level::Low));
            }
        }
    }

    /// GPIO wrapper that fires a cancel token after a fixed number of pin
    /// writes, making mid-move cancellation deterministic.
    struct CancelAfter {
        inner: SimulatedGpio,
        token: CancelToken,
        remaining: AtomicUsize,
    }

    impl CancelAfter {
        fn new(token: CancelToken, writes: usize) -> Self {
            Self {
                inner: SimulatedGpio::new(),
                token,
                remaining: AtomicUsize::new(writes),
            }
        }
    }

    impl GpioBus for CancelAfter {
        fn set_mode(&self, addressing: PinAddressing) -> Result<()> {
            self.inner.set_mode(addressing)
        }
        fn configure_outputs(&self, pins: &[u16]) -> Result<()> {
            self.inner.configure_outputs(pins)
        }
        fn write(&self, pin: u16, level: Level) -> Result<()> {
            if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.token.set();
            }
            self.inner.write(pin, level)
        }
        fn read(&self, pin: u16) -> Result<Level> {
            self.inner.read(pin)
        }
        fn release_all(&self) -> Result<()> {
            self.inner.release_all()
        }
    }

    #[tokio::test]
    async fn cancellation_reports_partial_monotone_travel() {
        // One phase-cycle = 4 phases x 8 pins = 32 writes.
        let requested = 90.0;
        let mut previous = 0.0;
        for cycles_before_cancel in [1usize, 3, 8, 20] {
            let token = CancelToken::new();
            let gpio = Arc::new(CancelAfter::new(token.clone(), cycles_before_cancel * 32));
            let actuator = VerticalActuator {
                driver: CoilDriver::new(gpio, PINS.to_vec()).unwrap(),
                sequence: StepSequence::full_step(),
                steps_per_revolution: SPR,
                gear_ratio: GEAR,
                phase_delay: Duration::ZERO,
                token,
            };

            let moved = actuator.move_by(requested, true).await.unwrap();
            assert!(moved > 0.0, "no travel before cancellation");
            assert!(moved < requested, "cancelled move reported full travel");
            assert!(moved >= previous, "travel not monotone in cancel point");
            previous = moved;
        }
    }

    #[tokio::test]
    async fn token_set_before_move_stops_at_first_cycle() {
        let gpio = Arc::new(SimulatedGpio::new());
        let actuator = actuator(gpio.clone());
        actuator.cancel_token().set();

        // move_by does not clear the token; extend/retract do.
        let moved = actuator.move_by(90.0, true).await.unwrap();
        assert_eq!(moved, 0.0);

        // extend clears the flag and runs normally.
        let moved = actuator.extend(5.0).await.unwrap();
        assert!(moved > 0.0);
    }
}
