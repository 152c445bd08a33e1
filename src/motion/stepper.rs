//! Rotational (azimuth) stepper.
//!
//! Direct drive: no gear ratio in the step conversion. Rotation legs are
//! short, so the move is synchronous for the caller and carries no
//! cancellation support.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;

use crate::hardware::gpio::GpioBus;
use crate::motion::coil::{CoilDriver, StepSequence};
use crate::motion::RotaryAxis;

pub struct RotaryStepper {
    driver: CoilDriver,
    sequence: StepSequence,
    steps_per_revolution: u32,
    phase_delay: Duration,
}

impl RotaryStepper {
    pub fn new(
        gpio: Arc<dyn GpioBus>,
        pins: [u16; 4],
        sequence: StepSequence,
        steps_per_revolution: u32,
        phase_delay: Duration,
    ) -> Result<Self> {
        let driver = CoilDriver::new(gpio, vec![pins])?;
        Ok(Self {
            driver,
            sequence,
            steps_per_revolution,
            phase_delay,
        })
    }

    /// Phase-cycles needed for the requested angle. Zero or negative
    /// degrees perform no motion.
    fn cycles_for(&self, degrees: f64) -> u64 {
        if degrees <= 0.0 || !degrees.is_finite() {
            return 0;
        }
        (degrees / 360.0 * f64::from(self.steps_per_revolution)).round() as u64
    }
}

#[async_trait]
impl RotaryAxis for RotaryStepper {
    async fn rotate(&self, degrees: f64, clockwise: bool) -> Result<()> {
        let cycles = self.cycles_for(degrees);
        debug!(degrees, clockwise, cycles, "rotating");

        let phases = self.sequence.phases(clockwise);
        for _ in 0..cycles {
            for &phase in &phases {
                self.driver.apply(phase)?;
                sleep(self.phase_delay).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::SimulatedGpio;

    fn stepper(gpio: Arc<SimulatedGpio>, spr: u32) -> RotaryStepper {
        RotaryStepper::new(
            gpio,
            [22, 23, 24, 25],
            StepSequence::full_step(),
            spr,
            Duration::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn cycle_count_has_no_gear_ratio() {
        let gpio = Arc::new(SimulatedGpio::new());
        let stepper = stepper(gpio, 200);
        assert_eq!(stepper.cycles_for(360.0), 200);
        assert_eq!(stepper.cycles_for(90.0), 50);
        assert_eq!(stepper.cycles_for(45.0), 25);
        // Nearest-integer rounding, not truncation.
        assert_eq!(stepper.cycles_for(1.0), 1);
    }

    #[tokio::test]
    async fn zero_or_negative_degrees_issue_no_writes() {
        let gpio = Arc::new(SimulatedGpio::new());
        let stepper = stepper(gpio.clone(), 200);
        let baseline = gpio.write_count();

        stepper.rotate(0.0, true).await.unwrap();
        stepper.rotate(-15.0, false).await.unwrap();
        assert_eq!(gpio.write_count(), baseline);
    }

    #[tokio::test]
    async fn rotation_issues_full_cycles() {
        let gpio = Arc::new(SimulatedGpio::new());
        let stepper = stepper(gpio.clone(), 200);
        let baseline = gpio.write_count();

        // 9 degrees at 200 steps/rev = 5 cycles of 4 phases x 4 pins.
        stepper.rotate(9.0, true).await.unwrap();
        assert_eq!(gpio.write_count() - baseline, 5 * 4 * 4);
    }

    #[tokio::test]
    async fn counter_clockwise_uses_reversed_order() {
        let gpio = Arc::new(SimulatedGpio::new());
        let stepper = stepper(gpio.clone(), 200);

        // Same write volume either direction; direction only reorders phases.
        stepper.rotate(9.0, false).await.unwrap();
        assert_eq!(gpio.write_count(), 5 * 4 * 4);
    }
}
