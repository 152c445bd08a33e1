//! Camera bank: a fixed set of capture devices with atomic, labeled
//! capture.
//!
//! Initialization is degraded-but-running: any device that fails to open or
//! configure is dropped with a warning and the bank proceeds with whichever
//! succeeded. A capture call reads every selected device in slot order,
//! discarding warm-up frames first — the first reads after a mechanical move
//! come out of a stale buffer — and skips (never aborts on) a device whose
//! read fails.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::CameraSettings;
use crate::error::AppResult;
use crate::hardware::camera::{CameraHost, FrameSettings, FrameSource};
use crate::survey::session::CaptureJob;

/// Which of the bank's open cameras a capture call addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraSelector {
    All,
    /// Only the camera in the configured home slot (the top view used for
    /// the homing reference image).
    Home,
    /// Every camera except the home slot (the per-position side views).
    NonHome,
}

impl CameraSelector {
    fn matches(self, slot: usize, home_slot: usize) -> bool {
        match self {
            CameraSelector::All => true,
            CameraSelector::Home => slot == home_slot,
            CameraSelector::NonHome => slot != home_slot,
        }
    }
}

struct BankCamera {
    index: u32,
    slot: usize,
    label: String,
    source: Mutex<Box<dyn FrameSource>>,
}

pub struct CameraBank {
    cameras: Vec<BankCamera>,
    home_slot: usize,
    warmup_frames: u32,
    base_dir: PathBuf,
}

impl CameraBank {
    /// Opens and configures every configured device. Failures are dropped
    /// with a warning; an empty bank is valid and captures return empty
    /// lists.
    pub async fn initialize(
        host: &dyn CameraHost,
        settings: &CameraSettings,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        let frame_settings = FrameSettings {
            width: settings.frame_width,
            height: settings.frame_height,
            disable_autofocus: true,
            pixel_format: settings.pixel_format.clone(),
        };

        let mut cameras = Vec::new();
        for (slot, (&index, label)) in settings
            .indices
            .iter()
            .zip(settings.labels.iter())
            .enumerate()
        {
            let mut source = match host.open_device(index).await {
                Ok(source) => source,
                Err(err) => {
                    warn!(index, %err, "camera failed to open, continuing without it");
                    continue;
                }
            };
            if let Err(err) = source.configure(&frame_settings).await {
                warn!(index, %err, "camera failed to configure, continuing without it");
                continue;
            }
            info!(index, label = %label, "camera initialized");
            cameras.push(BankCamera {
                index,
                slot,
                label: label.clone(),
                source: Mutex::new(source),
            });
        }

        if cameras.len() != settings.indices.len() {
            warn!(
                opened = cameras.len(),
                configured = settings.indices.len(),
                "not all cameras were initialized"
            );
        }

        Self {
            cameras,
            home_slot: settings.home_slot,
            warmup_frames: settings.warmup_frames,
            base_dir: base_dir.into(),
        }
    }

    /// Number of devices that opened successfully.
    pub fn open_count(&self) -> usize {
        self.cameras.len()
    }

    /// Captures one labeled image set for the current position.
    ///
    /// Returns the files actually written, which may be fewer than the
    /// selected cameras when individual reads fail. Filesystem errors are
    /// fatal; read misses are not.
    pub async fn capture(
        &self,
        job: &CaptureJob,
        height_label: &str,
        angle_degrees: f64,
        selector: CameraSelector,
    ) -> AppResult<Vec<PathBuf>> {
        let folder = self.base_dir.join(job.folder_name());
        tokio::fs::create_dir_all(&folder).await?;

        let mut written = Vec::new();
        for camera in self
            .cameras
            .iter()
            .filter(|camera| selector.matches(camera.slot, self.home_slot))
        {
            let mut source = camera.source.lock().await;

            // Buffer flush: frames queued before the rig settled.
            for _ in 0..self.warmup_frames {
                if let Err(err) = source.read_frame().await {
                    debug!(index = camera.index, %err, "warm-up read failed");
                }
            }

            let frame = match source.read_frame().await {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(
                        index = camera.index,
                        label = %camera.label,
                        %err,
                        "frame read failed, skipping device for this position"
                    );
                    continue;
                }
            };

            let path = folder.join(image_file_name(
                job,
                height_label,
                &camera.label,
                angle_degrees,
            ));
            tokio::fs::write(&path, &frame.data).await?;
            debug!(path = %path.display(), "image captured");
            written.push(path);
        }
        Ok(written)
    }

    /// Releases every device. Safe to call repeatedly; a drained bank is a
    /// no-op.
    pub async fn close(&mut self) {
        for camera in self.cameras.drain(..) {
            let mut source = camera.source.lock().await;
            if let Err(err) = source.release().await {
                warn!(index = camera.index, %err, "camera release failed");
            }
        }
        info!("all cameras released");
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

/// Deterministic output name:
/// `T{tool}_FL{flutes}_OD{layers}_{label}_{angle}deg.jpg`, where the label
/// slot composes the height label with the camera role so positions at
/// different heights never collide.
fn image_file_name(job: &CaptureJob, height_label: &str, role: &str, angle_degrees: f64) -> String {
    format!(
        "T{}_FL{}_OD{}_{}_{}_{}deg.jpg",
        job.tool_id,
        job.flute_count,
        job.layer_count,
        height_label,
        role,
        angle_degrees.round() as i64
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockCameraHost;

    fn job() -> CaptureJob {
        CaptureJob::new("1", 4, 2)
    }

    fn settings() -> CameraSettings {
        CameraSettings {
            warmup_frames: 3,
            ..CameraSettings::default()
        }
    }

    #[test]
    fn file_name_encodes_position() {
        let name = image_file_name(&job(), "L2", "side1", 135.2);
        assert_eq!(name, "T1_FL4_OD2_L2_side1_135deg.jpg");
    }

    #[tokio::test]
    async fn initialize_drops_failed_devices() {
        let host = MockCameraHost::new().failing_open(2);
        let dir = tempfile::tempdir().unwrap();
        let bank = CameraBank::initialize(&host, &settings(), dir.path()).await;
        assert_eq!(bank.open_count(), 2);
    }

    #[tokio::test]
    async fn all_devices_failing_yields_empty_bank() {
        let host = MockCameraHost::new()
            .failing_open(0)
            .failing_open(2)
            .failing_open(4);
        let dir = tempfile::tempdir().unwrap();
        let bank = CameraBank::initialize(&host, &settings(), dir.path()).await;
        assert_eq!(bank.open_count(), 0);

        // Degraded bank still answers captures, with nothing written.
        let files = bank
            .capture(&job(), "L0", 0.0, CameraSelector::All)
            .await
            .unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn capture_writes_selected_cameras() {
        let host = MockCameraHost::new();
        let dir = tempfile::tempdir().unwrap();
        let bank = CameraBank::initialize(&host, &settings(), dir.path()).await;

        let files = bank
            .capture(&job(), "L1", 45.0, CameraSelector::NonHome)
            .await
            .unwrap();
        assert_eq!(files.len(), 2); // side1 + side2, home slot excluded
        for file in &files {
            assert!(file.exists());
            assert!(file
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("T1_FL4_OD2_L1_side"))
                .unwrap_or(false));
        }

        let home = bank
            .capture(&job(), "L0", 0.0, CameraSelector::Home)
            .await
            .unwrap();
        assert_eq!(home.len(), 1);
    }

    #[tokio::test]
    async fn read_failure_skips_device_without_aborting() {
        let host = MockCameraHost::new().failing_reads(2);
        let dir = tempfile::tempdir().unwrap();
        let bank = CameraBank::initialize(&host, &settings(), dir.path()).await;

        let files = bank
            .capture(&job(), "L1", 90.0, CameraSelector::All)
            .await
            .unwrap();
        assert_eq!(files.len(), 2); // device 2 skipped, 0 and 4 written
    }

    #[tokio::test]
    async fn capture_discards_warmup_frames() {
        let host = MockCameraHost::new();
        let dir = tempfile::tempdir().unwrap();
        let bank = CameraBank::initialize(&host, &settings(), dir.path()).await;

        bank.capture(&job(), "L0", 0.0, CameraSelector::Home)
            .await
            .unwrap();
        // 3 warm-up reads plus the kept frame.
        assert_eq!(host.reads_for(0), 4);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let host = MockCameraHost::new();
        let dir = tempfile::tempdir().unwrap();
        let mut bank = CameraBank::initialize(&host, &settings(), dir.path()).await;
        bank.close().await;
        assert_eq!(bank.open_count(), 0);
        bank.close().await; // drained bank, no-op
    }
}
