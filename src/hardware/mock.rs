//! Simulated hardware implementations.
//!
//! Substitutes for the GPIO bus and the camera host in non-hardware
//! environments and in tests. The simulated GPIO keeps a full pin-state map
//! and a write counter so tests can assert properties like "this refused
//! operation issued zero hardware writes" or "stop de-energizes every coil".
//! The mock camera host can be configured to fail opening or reading on
//! chosen device indices to exercise the degraded paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rand::RngCore;

use crate::hardware::camera::{CameraHost, Frame, FrameSettings, FrameSource};
use crate::hardware::gpio::{GpioBus, Level, PinAddressing};

// =============================================================================
// SimulatedGpio
// =============================================================================

#[derive(Default)]
struct GpioState {
    addressing: Option<PinAddressing>,
    levels: HashMap<u16, Level>,
}

/// In-memory GPIO bus.
///
/// Pins must be configured as outputs before they can be written or read;
/// configuration drives them low, matching the real board setup where high
/// coils would hold the motors energized.
#[derive(Default)]
pub struct SimulatedGpio {
    state: Mutex<GpioState>,
    writes: AtomicUsize,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `write` calls issued so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current level of a configured pin, if any.
    pub fn level(&self, pin: u16) -> Option<Level> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.levels.get(&pin).copied())
    }

    /// Snapshot of the full pin-state map.
    pub fn snapshot(&self) -> HashMap<u16, Level> {
        self.state
            .lock()
            .map(|state| state.levels.clone())
            .unwrap_or_default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, GpioState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("simulated GPIO state poisoned"))
    }
}

impl GpioBus for SimulatedGpio {
    fn set_mode(&self, addressing: PinAddressing) -> Result<()> {
        self.locked()?.addressing = Some(addressing);
        Ok(())
    }

    fn configure_outputs(&self, pins: &[u16]) -> Result<()> {
        let mut state = self.locked()?;
        for &pin in pins {
            state.levels.insert(pin, Level::Low);
        }
        Ok(())
    }

    fn write(&self, pin: u16, level: Level) -> Result<()> {
        let mut state = self.locked()?;
        match state.levels.get_mut(&pin) {
            Some(slot) => {
                *slot = level;
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => bail!("write to unconfigured pin {pin}"),
        }
    }

    fn read(&self, pin: u16) -> Result<Level> {
        self.locked()?
            .levels
            .get(&pin)
            .copied()
            .ok_or_else(|| anyhow!("read of unconfigured pin {pin}"))
    }

    fn release_all(&self) -> Result<()> {
        let mut state = self.locked()?;
        state.levels.clear();
        state.addressing = None;
        Ok(())
    }
}

// =============================================================================
// MockCameraHost
// =============================================================================

/// Mock camera factory with scriptable failures.
///
/// Devices not listed in either failure set open and read normally,
/// producing synthetic frames of random bytes.
#[derive(Default)]
pub struct MockCameraHost {
    fail_open: HashSet<u32>,
    fail_reads: HashSet<u32>,
    reads: Arc<Mutex<HashMap<u32, usize>>>,
}

impl MockCameraHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a device index as absent: `open_device` fails for it.
    pub fn failing_open(mut self, index: u32) -> Self {
        self.fail_open.insert(index);
        self
    }

    /// Marks a device index as unreadable: every `read_frame` fails.
    pub fn failing_reads(mut self, index: u32) -> Self {
        self.fail_reads.insert(index);
        self
    }

    /// Number of frame reads issued against a device (including warm-up
    /// discards and failed reads).
    pub fn reads_for(&self, index: u32) -> usize {
        self.reads
            .lock()
            .ok()
            .and_then(|reads| reads.get(&index).copied())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CameraHost for MockCameraHost {
    async fn open_device(&self, index: u32) -> Result<Box<dyn FrameSource>> {
        if self.fail_open.contains(&index) {
            bail!("no capture device at index {index}");
        }
        Ok(Box::new(MockFrameSource {
            index,
            settings: None,
            released: false,
            fail_reads: self.fail_reads.contains(&index),
            reads: Arc::clone(&self.reads),
        }))
    }
}

struct MockFrameSource {
    index: u32,
    settings: Option<FrameSettings>,
    released: bool,
    fail_reads: bool,
    reads: Arc<Mutex<HashMap<u32, usize>>>,
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn configure(&mut self, settings: &FrameSettings) -> Result<()> {
        if self.released {
            bail!("device {} already released", self.index);
        }
        self.settings = Some(settings.clone());
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        if self.released {
            bail!("device {} already released", self.index);
        }
        if let Ok(mut reads) = self.reads.lock() {
            *reads.entry(self.index).or_insert(0) += 1;
        }
        if self.fail_reads {
            bail!("device {} returned no frame", self.index);
        }

        let (width, height) = self
            .settings
            .as_ref()
            .map(|s| (s.width, s.height))
            .unwrap_or((640, 480));
        // Synthetic payload, much smaller than a real frame.
        let mut data = vec![0u8; (width as usize * height as usize) / 64];
        rand::thread_rng().fill_bytes(&mut data);
        Ok(Frame {
            width,
            height,
            data,
        })
    }

    async fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
