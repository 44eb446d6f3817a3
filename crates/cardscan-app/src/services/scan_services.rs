// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan services — loads the persisted scanner configuration and wires a
// camera bridge, the vision collaborators, and a scanner session together.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cardscan_bridge::{FolderBridge, NativeCamera, NativePhotoLibrary, PlatformBridge, platform_bridge};
use cardscan_core::error::{CardscanError, Result};
use cardscan_core::{FrameSink, ScannerConfig, SurfaceSize};
use cardscan_session::{
    CaptureReceipt, Collaborators, ScanSnapshot, ScannerHandle, ScannerSession, SessionStats,
};
use cardscan_vision::frame::encode_png;
use cardscan_vision::{HoughQuadDetector, OverlaySurface, ProjectionCorrector, RasterOverlay};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::data_dir;

/// Preview surface used until the real frame size is known.
const DEFAULT_SURFACE: (u32, u32) = (1080, 1920);

/// How long to wait for detections still running when the camera stops.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

const PREVIEW_FILE: &str = "overlay_preview.png";

/// Outcome of one scanning run, printed by the binary.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub platform: String,
    pub capture: Option<CaptureReceipt>,
    /// Final overlay rendered as an image, when one was written.
    pub preview: Option<PathBuf>,
    pub stats: SessionStats,
}

pub struct ScanServices {
    data_dir: PathBuf,
    config: ScannerConfig,
}

impl ScanServices {
    /// Resolve the data directory and load the persisted config, writing
    /// the defaults on first run.
    pub fn init() -> Result<Self> {
        let dir = data_dir::data_dir();
        info!(path = %dir.display(), "initialising scan services");

        let config = match load_config(&dir) {
            Some(config) => config,
            None => {
                let config = ScannerConfig::default();
                persist_config(&dir, &config)?;
                config
            }
        };
        Ok(Self::with_config(dir, config))
    }

    /// Defaults in the temp directory, with nothing read from disk.
    pub fn fallback() -> Self {
        Self::with_config(std::env::temp_dir().join("cardscan"), ScannerConfig::default())
    }

    pub fn with_config(data_dir: PathBuf, config: ScannerConfig) -> Self {
        Self { data_dir, config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Update and persist the config.
    pub fn save_config(&mut self, config: ScannerConfig) -> Result<()> {
        persist_config(&self.data_dir, &config)?;
        self.config = config;
        Ok(())
    }

    /// Default destination for captured photos.
    pub fn captures_dir(&self) -> PathBuf {
        self.data_dir.join("captures")
    }

    /// Replay the images in `input` as camera frames, then capture the
    /// retained card into `output` alongside an overlay preview.
    #[instrument(skip(self), fields(input = %input.display(), output = %output.display()))]
    pub async fn scan_folder(&self, input: &Path, output: &Path) -> Result<ScanReport> {
        let bridge = Arc::new(FolderBridge::new(Some(input.to_path_buf()), output));
        let (handle, task) = self.start_session(bridge.clone())?;

        let sink: Arc<dyn FrameSink> = Arc::new(handle.clone());
        if let Err(e) = bridge.start_capture(&self.config.capture, sink) {
            let _ = handle.shutdown().await;
            return Err(e);
        }

        let replay = Arc::clone(&bridge);
        tokio::task::spawn_blocking(move || replay.wait_for_replay())
            .await
            .map_err(|e| CardscanError::Bridge(format!("frame replay wait failed: {e}")))?;

        let delivered = bridge.frames_delivered();
        info!(delivered, dropped = bridge.frames_dropped(), "frame replay finished");
        settle(&handle, delivered).await;

        if let Some((width, height)) = bridge.frame_size() {
            handle
                .resize_surface(SurfaceSize::from_pixels(width, height)?)
                .await?;
        }

        let preview = output.join(PREVIEW_FILE);
        write_preview(&handle.snapshot().await?, self, &preview)?;

        let capture = capture_retained(&handle).await?;
        let stats = finish(handle, task).await?;
        Ok(ScanReport {
            platform: bridge.platform_name().to_string(),
            capture,
            preview: Some(preview),
            stats,
        })
    }

    /// Scan with the platform camera until Ctrl-C, then capture.
    #[instrument(skip(self))]
    pub async fn scan_live(&self) -> Result<ScanReport> {
        let bridge: Arc<dyn PlatformBridge> = Arc::from(platform_bridge());
        let (handle, task) = self.start_session(Arc::new(BridgePhotos(Arc::clone(&bridge))))?;

        if let Err(e) = bridge.start_capture(&self.config.capture, Arc::new(handle.clone())) {
            let _ = handle.shutdown().await;
            return Err(e);
        }
        info!(platform = bridge.platform_name(), "scanning; press Ctrl-C to capture");
        tokio::signal::ctrl_c().await?;

        let capture = capture_retained(&handle).await;
        bridge.stop_capture()?;
        let stats = finish(handle, task).await?;
        Ok(ScanReport {
            platform: bridge.platform_name().to_string(),
            capture: capture?,
            preview: None,
            stats,
        })
    }

    fn start_session(
        &self,
        photos: Arc<dyn NativePhotoLibrary + Send + Sync>,
    ) -> Result<(ScannerHandle, JoinHandle<()>)> {
        let (width, height) = DEFAULT_SURFACE;
        let surface = SurfaceSize::from_pixels(width, height)?;
        let parts = Collaborators {
            detector: Arc::new(HoughQuadDetector::new(self.config.detection.clone())),
            corrector: Arc::new(ProjectionCorrector::new()),
            photos,
            overlay: Box::new(RasterOverlay::new(surface, self.config.overlay.clone())),
        };
        Ok(ScannerSession::spawn(self.config.clone(), parts))
    }
}

/// Photo library half of a boxed platform bridge.
struct BridgePhotos(Arc<dyn PlatformBridge>);

impl NativePhotoLibrary for BridgePhotos {
    fn save_image(&self, png: &[u8]) -> Result<String> {
        self.0.save_image(png)
    }
}

/// Wait until every delivered frame has been taken in and no detection is
/// outstanding.
async fn settle(handle: &ScannerHandle, delivered: u64) {
    let mut rx = handle.subscribe();
    let settled = tokio::time::timeout(SETTLE_TIMEOUT, async move {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if !snapshot.busy && snapshot.stats.frames_received >= delivered {
                    return;
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await;

    if settled.is_err() {
        warn!("detections did not settle in time; capturing what is retained");
    }
}

/// Capture the retained card. No detection is a normal outcome here.
async fn capture_retained(handle: &ScannerHandle) -> Result<Option<CaptureReceipt>> {
    match handle.capture().await {
        Ok(receipt) => Ok(Some(receipt)),
        Err(CardscanError::NothingToCapture) => {
            warn!("no card detected; nothing captured");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Shut the session down and return its final counters.
async fn finish(handle: ScannerHandle, task: JoinHandle<()>) -> Result<SessionStats> {
    let stats = handle.snapshot().await?.stats;
    handle.shutdown().await?;
    task.await
        .map_err(|e| CardscanError::Bridge(format!("scanner session task failed: {e}")))?;
    info!(?stats, "scan finished");
    Ok(stats)
}

/// Render the snapshot's outline on a transparent canvas and save it as PNG.
fn write_preview(snapshot: &ScanSnapshot, svc: &ScanServices, path: &Path) -> Result<()> {
    let mut overlay = RasterOverlay::new(snapshot.surface, svc.config.overlay.clone());
    if let Some(quad) = &snapshot.overlay {
        overlay.draw_quad(quad);
    }
    let png = encode_png(overlay.canvas())?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, png)
        .map_err(|e| CardscanError::Storage(format!("write {}: {e}", path.display())))?;
    info!(path = %path.display(), outlined = snapshot.overlay.is_some(), "overlay preview written");
    Ok(())
}

// -- Config file persistence -------------------------------------------------

const CONFIG_FILE: &str = "config.json";

fn load_config(data_dir: &Path) -> Option<ScannerConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&data).ok()
}

fn persist_config(data_dir: &Path, config: &ScannerConfig) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
