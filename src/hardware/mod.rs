//! Hardware boundary interfaces and simulated implementations.
//!
//! The rig core depends only on the capability traits defined here: a
//! five-operation GPIO bus ([`gpio::GpioBus`]) and a camera host/device pair
//! ([`camera::CameraHost`], [`camera::FrameSource`]). Simulated
//! implementations in [`mock`] substitute for the real hardware without any
//! change to motion or sequencing logic.

pub mod camera;
pub mod gpio;
pub mod mock;

pub use camera::{CameraHost, Frame, FrameSettings, FrameSource};
pub use gpio::{GpioBus, Level, PinAddressing};
pub use mock::{MockCameraHost, SimulatedGpio};
