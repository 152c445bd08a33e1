//! Motorized imaging rig for cutting-tool inspection.
//!
//! A rotational stepper spins the tool under a fixed camera bank while a
//! pair of mechanically-coupled vertical steppers moves the tool holder
//! through height layers. The crate is layered bottom-up:
//!
//! - [`hardware`]: GPIO bus and camera traits, plus in-memory doubles.
//! - [`motion`]: 4-phase coil driver, rotational stepper, vertical actuator.
//! - [`survey`]: camera bank, session bookkeeping, capture sequencer.
//! - [`controller`]: manual alignment and job lifecycle on top of it all.

pub mod config;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod motion;
pub mod survey;

pub use config::Settings;
pub use error::{AppResult, ScanError};
