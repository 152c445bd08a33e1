//! Capture-device boundary.
//!
//! A [`CameraHost`] opens devices by index; each open device is a
//! [`FrameSource`] that can be configured, read, and released. The camera
//! bank treats every failure from these traits as recoverable: a device that
//! fails to open is dropped, a frame that fails to read is skipped.

use anyhow::Result;
use async_trait::async_trait;

/// One raw frame read from a device, already encoded in the device's
/// configured pixel format.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Acquisition parameters applied to a device after opening.
#[derive(Clone, Debug)]
pub struct FrameSettings {
    pub width: u32,
    pub height: u32,
    /// Autofocus must be off: the optics are fixed and a hunting focus ruins
    /// frame-to-frame comparability across positions.
    pub disable_autofocus: bool,
    /// FourCC-style encoding name (e.g. "MJPG").
    pub pixel_format: String,
}

/// An open capture device.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Applies resolution, focus, and encoding settings.
    async fn configure(&mut self, settings: &FrameSettings) -> Result<()>;

    /// Reads a single frame. Errors here are per-read; the device stays
    /// usable for later attempts.
    async fn read_frame(&mut self) -> Result<Frame>;

    /// Releases the device handle.
    async fn release(&mut self) -> Result<()>;
}

/// Factory boundary that opens capture devices by index.
#[async_trait]
pub trait CameraHost: Send + Sync {
    async fn open_device(&self, index: u32) -> Result<Box<dyn FrameSource>>;
}
