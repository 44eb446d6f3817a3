// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folder bridge — replays image files as camera frames and stores saved photos
// as content-addressed PNG files.
//
// Lets the whole scanning pipeline run off-device: the "camera" is a directory
// of still images delivered at a fixed rate from a background thread, and the
// "photo library" is an output directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use cardscan_core::config::CaptureConfig;
use cardscan_core::error::{CardscanError, Result};
use cardscan_core::{Frame, FrameSink, FrameSubmission};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::traits::*;

/// Extensions recognised as replayable frames.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Pause before re-offering a frame when late frames are not discarded.
const REDELIVERY_PAUSE: Duration = Duration::from_millis(2);

/// Bridge backed by plain directories.
pub struct FolderBridge {
    input_dir: Option<PathBuf>,
    output_dir: PathBuf,
    worker: Mutex<Option<CaptureWorker>>,
    delivered: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    frame_size: Arc<OnceLock<(u32, u32)>>,
}

struct CaptureWorker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl FolderBridge {
    /// `input_dir` holds the frames to replay; `None` behaves like a device
    /// without a camera. Saved photos go to `output_dir`, created on demand.
    pub fn new(input_dir: Option<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir,
            output_dir: output_dir.into(),
            worker: Mutex::new(None),
            delivered: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            frame_size: Arc::new(OnceLock::new()),
        }
    }

    /// Frames the sink accepted so far.
    pub fn frames_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Frames the sink turned away as late.
    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Pixel dimensions of the first frame replayed.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame_size.get().copied()
    }

    /// Block until the replay thread has delivered every file (or was stopped).
    pub fn wait_for_replay(&self) {
        let worker = self.lock_worker().take();
        if let Some(worker) = worker
            && worker.handle.join().is_err()
        {
            warn!("frame replay thread panicked");
        }
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<CaptureWorker>> {
        // The guarded value is a plain handle; a poisoned lock is still usable.
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlatformBridge for FolderBridge {
    fn platform_name(&self) -> &str {
        "Folder replay"
    }
}

impl NativeCamera for FolderBridge {
    #[instrument(skip(self, sink), fields(fps = config.frames_per_second))]
    fn start_capture(&self, config: &CaptureConfig, sink: Arc<dyn FrameSink>) -> Result<()> {
        let Some(dir) = &self.input_dir else {
            return Err(CardscanError::NoCamera("no input directory configured".into()));
        };
        let files = list_frame_files(dir)?;
        if files.is_empty() {
            return Err(CardscanError::NoCamera(format!(
                "no frame images in {}",
                dir.display()
            )));
        }

        let mut worker = self.lock_worker();
        if worker.is_some() {
            return Err(CardscanError::CameraOutput("capture already running".into()));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let interval = Duration::from_secs_f64(1.0 / config.frames_per_second.max(1) as f64);
        let replay = Replay {
            files,
            interval,
            discard_late: config.discard_late_frames,
            stop: Arc::clone(&stop),
            delivered: Arc::clone(&self.delivered),
            dropped: Arc::clone(&self.dropped),
            frame_size: Arc::clone(&self.frame_size),
        };

        let handle = std::thread::Builder::new()
            .name("camera_frame_replay".into())
            .spawn(move || replay.run(sink.as_ref()))?;

        info!(path = %dir.display(), "folder capture started");
        *worker = Some(CaptureWorker { stop, handle });
        Ok(())
    }

    fn stop_capture(&self) -> Result<()> {
        let worker = self.lock_worker().take();
        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::Release);
            if worker.handle.join().is_err() {
                return Err(CardscanError::Bridge("frame replay thread panicked".into()));
            }
            info!("folder capture stopped");
        }
        Ok(())
    }
}

impl NativePhotoLibrary for FolderBridge {
    #[instrument(skip_all, fields(bytes = png.len()))]
    fn save_image(&self, png: &[u8]) -> Result<String> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.png", hash_bytes(png)));

        if !path.exists() {
            std::fs::write(&path, png).map_err(|e| {
                CardscanError::Storage(format!("write {}: {e}", path.display()))
            })?;
        }

        info!(path = %path.display(), "photo saved");
        Ok(path.display().to_string())
    }
}

/// State moved onto the replay thread.
struct Replay {
    files: Vec<PathBuf>,
    interval: Duration,
    discard_late: bool,
    stop: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    frame_size: Arc<OnceLock<(u32, u32)>>,
}

impl Replay {
    fn run(self, sink: &dyn FrameSink) {
        for path in &self.files {
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            let frame = match load_frame(path) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable frame");
                    continue;
                }
            };
            let _ = self.frame_size.set((frame.width(), frame.height()));
            if !self.deliver(sink, frame) {
                debug!("frame sink closed; ending replay");
                break;
            }
            std::thread::sleep(self.interval);
        }
        debug!("frame replay finished");
    }

    /// Offer one frame. Returns `false` once the sink has closed.
    fn deliver(&self, sink: &dyn FrameSink, frame: Frame) -> bool {
        loop {
            match sink.push_frame(frame.clone()) {
                FrameSubmission::Accepted => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                FrameSubmission::DroppedLate if self.discard_late => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                FrameSubmission::DroppedLate => {
                    if self.stop.load(Ordering::Acquire) {
                        return true;
                    }
                    std::thread::sleep(REDELIVERY_PAUSE);
                }
                FrameSubmission::Closed => return false,
            }
        }
    }
}

/// Image files in `dir`, sorted by name.
fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Decode an image file into a BGRA frame.
fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path).map_err(|err| {
        CardscanError::ImageError(format!("failed to open {}: {}", path.display(), err))
    })?;
    let rgba = image.to_rgba8();
    Frame::from_rgba(rgba.width(), rgba.height(), rgba.as_raw())
}

/// Lowercase hex SHA-256 of `data`.
fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
