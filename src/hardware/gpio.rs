//! Digital-output boundary.
//!
//! The motion layer touches hardware exclusively through [`GpioBus`]. The
//! trait is synchronous: coil writes happen at sub-10ms cadence inside the
//! phase loops and must not queue behind an executor.

use anyhow::Result;

/// Logic level of a digital output line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Pin numbering scheme of the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinAddressing {
    /// Broadcom channel numbers.
    Bcm,
    /// Physical header positions.
    Board,
}

/// Capability interface over the digital-output hardware.
///
/// Exactly these five operations are available to the core; a simulated
/// implementation must be substitutable without changing sequencer logic.
pub trait GpioBus: Send + Sync {
    /// Selects the pin numbering scheme. Called once before any other use.
    fn set_mode(&self, addressing: PinAddressing) -> Result<()>;

    /// Declares the given pins as outputs and drives them low. Low is the
    /// de-energized state for both motor drivers.
    fn configure_outputs(&self, pins: &[u16]) -> Result<()>;

    /// Writes one level to one output line.
    fn write(&self, pin: u16, level: Level) -> Result<()>;

    /// Reads back the current level of a line.
    fn read(&self, pin: u16) -> Result<Level>;

    /// Releases every claimed line, leaving the bus in its unconfigured
    /// state.
    fn release_all(&self) -> Result<()>;
}
