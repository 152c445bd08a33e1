//! 4-phase coil driving.
//!
//! A [`StepPhase`] is one row of the drive table: four coil-energization
//! bits. A [`StepSequence`] is the ordered, non-empty list of phases applied
//! cyclically; traversing it reversed reverses the direction of travel. The
//! [`CoilDriver`] turns a phase into ordered pin writes on one or more
//! 4-pin groups — the vertical actuator drives two motor groups with the
//! same phase and they must never diverge.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::hardware::gpio::{GpioBus, Level};

/// One step of the drive table: four coil-energization states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepPhase(pub [bool; 4]);

impl StepPhase {
    pub fn bit(&self, coil: usize) -> bool {
        self.0[coil]
    }
}

/// Ordered list of phases, cyclically applied. Non-empty and constant for
/// the device's lifetime.
#[derive(Clone, Debug)]
pub struct StepSequence(Vec<StepPhase>);

impl StepSequence {
    /// Full-step drive table used by both rig motors (L298N wiring).
    pub fn full_step() -> Self {
        Self(vec![
            StepPhase([true, false, true, false]),
            StepPhase([false, true, true, false]),
            StepPhase([false, true, false, true]),
            StepPhase([true, false, false, true]),
        ])
    }

    pub fn new(phases: Vec<StepPhase>) -> Result<Self> {
        if phases.is_empty() {
            bail!("step sequence must not be empty");
        }
        Ok(Self(phases))
    }

    /// Number of phases in one full cycle.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false // enforced non-empty at construction
    }

    /// Phases in drive order for the requested direction.
    pub fn phases(&self, forward: bool) -> Vec<StepPhase> {
        if forward {
            self.0.clone()
        } else {
            self.0.iter().rev().copied().collect()
        }
    }
}

impl Default for StepSequence {
    fn default() -> Self {
        Self::full_step()
    }
}

/// Writes step phases to one or more 4-pin output groups.
pub struct CoilDriver {
    gpio: Arc<dyn GpioBus>,
    groups: Vec<[u16; 4]>,
}

impl CoilDriver {
    /// Claims the pins of every group as outputs (driven low).
    pub fn new(gpio: Arc<dyn GpioBus>, groups: Vec<[u16; 4]>) -> Result<Self> {
        if groups.is_empty() {
            bail!("coil driver needs at least one pin group");
        }
        let pins: Vec<u16> = groups.iter().flatten().copied().collect();
        gpio.configure_outputs(&pins)?;
        Ok(Self { gpio, groups })
    }

    /// Writes the four phase bits to every group. Groups receive identical
    /// levels in the same call so paired motors cannot diverge.
    pub fn apply(&self, phase: StepPhase) -> Result<()> {
        for group in &self.groups {
            for (coil, &pin) in group.iter().enumerate() {
                self.gpio.write(pin, Level::from(phase.bit(coil)))?;
            }
        }
        Ok(())
    }

    /// Drives every pin of every group low. Idempotent.
    pub fn release(&self) -> Result<()> {
        for group in &self.groups {
            for &pin in group {
                self.gpio.write(pin, Level::Low)?;
            }
        }
        Ok(())
    }
}
