// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner session — a single task that owns all scanning state.
//
// Frames arrive from the camera's thread through a one-slot channel and are
// dropped when the slot is full. Detection runs on the blocking pool under a
// cancellation ticket and reports back to the session task, which is the only
// place retention, overlay, and statistics are mutated. Capture, resize, and
// snapshot requests are commands with oneshot replies.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use cardscan_bridge::NativePhotoLibrary;
use cardscan_core::config::{ScannerConfig, SupersedePolicy};
use cardscan_core::error::{CardscanError, Result};
use cardscan_core::{
    Frame, FrameId, FrameSink, FrameSubmission, NormalizedQuad, SurfaceSize, ViewQuad,
    map_to_surface,
};
use cardscan_vision::{OverlaySurface, PerspectiveCorrector, QuadDetector, TicketIssuer};

use crate::capture::{CaptureReceipt, run_capture};
use crate::retention::{MissOutcome, Retention};

/// The external collaborators a session drives.
pub struct Collaborators {
    pub detector: Arc<dyn QuadDetector>,
    pub corrector: Arc<dyn PerspectiveCorrector>,
    pub photos: Arc<dyn NativePhotoLibrary + Send + Sync>,
    pub overlay: Box<dyn OverlaySurface>,
}

/// Running counters, published with every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Frames taken off the intake channel.
    pub frames_received: u64,
    /// Frames turned away because the intake slot was full, or replaced
    /// while waiting for an in-flight detection.
    pub frames_dropped: u64,
    pub detections: u64,
    pub misses: u64,
    pub detection_errors: u64,
    /// Detections abandoned because a newer frame arrived.
    pub superseded: u64,
    pub captures: u64,
}

/// What the preview should currently show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSnapshot {
    pub surface: SurfaceSize,
    /// Outline on the overlay, mapped against `surface`.
    pub overlay: Option<ViewQuad>,
    /// Frame the retained quad came from.
    pub retained_frame: Option<FrameId>,
    /// A detection is running or a frame is waiting for one.
    pub busy: bool,
    pub stats: SessionStats,
}

enum Command {
    Capture {
        reply: oneshot::Sender<Result<CaptureReceipt>>,
    },
    Resize {
        size: SurfaceSize,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<ScanSnapshot>,
    },
    Shutdown,
}

/// The detection whose result will be applied.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    generation: u64,
    started: Instant,
}

struct DetectionOutcome {
    generation: u64,
    frame: Frame,
    result: Result<Option<NormalizedQuad>>,
}

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct ScannerHandle {
    frames: mpsc::Sender<Frame>,
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<ScanSnapshot>,
    dropped_at_intake: Arc<AtomicU64>,
}

impl ScannerHandle {
    /// Offer a frame without waiting. A full intake slot drops the frame.
    pub fn submit_frame(&self, frame: Frame) -> FrameSubmission {
        match self.frames.try_send(frame) {
            Ok(()) => FrameSubmission::Accepted,
            Err(TrySendError::Full(_)) => {
                self.dropped_at_intake.fetch_add(1, Ordering::Relaxed);
                FrameSubmission::DroppedLate
            }
            Err(TrySendError::Closed(_)) => FrameSubmission::Closed,
        }
    }

    /// Perspective-correct and save the retained detection.
    ///
    /// Fails with `NothingToCapture` when no detection is retained; the
    /// corrector is not called in that case.
    pub async fn capture(&self) -> Result<CaptureReceipt> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Capture { reply }).await?;
        rx.await.map_err(|_| CardscanError::SessionClosed)?
    }

    /// Tell the session the preview surface changed size.
    pub async fn resize_surface(&self, size: SurfaceSize) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Resize { size, reply }).await?;
        rx.await.map_err(|_| CardscanError::SessionClosed)
    }

    /// Current state, after every command queued before this one.
    pub async fn snapshot(&self) -> Result<ScanSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| CardscanError::SessionClosed)
    }

    /// Watch channel updated after every frame, detection, and command.
    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the session. In-flight detections are cancelled.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CardscanError::SessionClosed)
    }
}

impl FrameSink for ScannerHandle {
    fn push_frame(&self, frame: Frame) -> FrameSubmission {
        self.submit_frame(frame)
    }
}

/// The session task's state. Only ever touched from that task.
pub struct ScannerSession {
    config: ScannerConfig,
    detector: Arc<dyn QuadDetector>,
    corrector: Arc<dyn PerspectiveCorrector>,
    photos: Arc<dyn NativePhotoLibrary + Send + Sync>,
    overlay: Box<dyn OverlaySurface>,
    retention: Retention,
    issuer: TicketIssuer,
    in_flight: Option<InFlight>,
    /// Newest frame waiting for the in-flight detection to finish.
    pending: Option<Frame>,
    stats: SessionStats,
    dropped_at_intake: Arc<AtomicU64>,
    outcomes: mpsc::UnboundedSender<DetectionOutcome>,
    snapshots: watch::Sender<ScanSnapshot>,
}

impl ScannerSession {
    /// Start a session on the current tokio runtime.
    pub fn spawn(config: ScannerConfig, parts: Collaborators) -> (ScannerHandle, JoinHandle<()>) {
        let (frame_tx, frame_rx) = mpsc::channel(1);
        let (command_tx, command_rx) = mpsc::channel(config.session.command_buffer.max(1));
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let initial = ScanSnapshot {
            surface: parts.overlay.size(),
            overlay: None,
            retained_frame: None,
            busy: false,
            stats: SessionStats::default(),
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let dropped_at_intake = Arc::new(AtomicU64::new(0));

        let session = Self {
            retention: Retention::new(config.retention.clone()),
            config,
            detector: parts.detector,
            corrector: parts.corrector,
            photos: parts.photos,
            overlay: parts.overlay,
            issuer: TicketIssuer::new(),
            in_flight: None,
            pending: None,
            stats: SessionStats::default(),
            dropped_at_intake: Arc::clone(&dropped_at_intake),
            outcomes: outcome_tx,
            snapshots: snapshot_tx,
        };

        let handle = ScannerHandle {
            frames: frame_tx,
            commands: command_tx,
            snapshots: snapshot_rx,
            dropped_at_intake,
        };
        let task = tokio::spawn(session.run(frame_rx, command_rx, outcome_rx));
        (handle, task)
    }

    async fn run(
        mut self,
        mut frames: mpsc::Receiver<Frame>,
        mut commands: mpsc::Receiver<Command>,
        mut outcomes: mpsc::UnboundedReceiver<DetectionOutcome>,
    ) {
        info!(supersede = ?self.config.session.supersede, "scanner session started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },

                frame = frames.recv() => match frame {
                    Some(frame) => self.on_frame(frame),
                    None => break,
                },

                // The session holds a sender, so this never yields `None`.
                Some(outcome) = outcomes.recv() => self.on_outcome(outcome),
            }
            self.publish();
        }

        self.issuer.cancel();
        info!(stats = ?self.stats(), "scanner session stopped");
    }

    // -- Frames and detections ------------------------------------------------

    fn on_frame(&mut self, frame: Frame) {
        self.stats.frames_received += 1;

        let Some(running) = self.in_flight else {
            self.start_detection(frame);
            return;
        };

        let budget = Duration::from_millis(self.config.session.cancel_after_ms);
        let cancel = match self.config.session.supersede {
            SupersedePolicy::CancelInFlight => running.started.elapsed() >= budget,
            SupersedePolicy::FinishInFlight => false,
        };

        if cancel {
            self.stats.superseded += 1;
            debug!(frame = %frame.id(), "newer frame supersedes overdue detection");
            // The older waiting frame, if any, is stale too.
            if self.pending.take().is_some() {
                self.stats.frames_dropped += 1;
            }
            self.start_detection(frame);
        } else if let Some(replaced) = self.pending.replace(frame) {
            self.stats.frames_dropped += 1;
            debug!(frame = %replaced.id(), "waiting frame replaced by a newer one");
        }
    }

    fn start_detection(&mut self, frame: Frame) {
        // Issuing a ticket cancels every earlier one.
        let ticket = self.issuer.issue();
        let generation = ticket.generation();
        self.in_flight = Some(InFlight {
            generation,
            started: Instant::now(),
        });

        let detector = Arc::clone(&self.detector);
        let outcomes = self.outcomes.clone();
        let worker_frame = frame.clone();

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                detector.detect(&worker_frame, &ticket)
            })
            .await
            .unwrap_or_else(|e| Err(CardscanError::Detection(format!("detector task failed: {e}"))));

            // The session may already be gone; nothing to report to then.
            let _ = outcomes.send(DetectionOutcome {
                generation,
                frame,
                result,
            });
        });
    }

    #[instrument(skip_all, fields(frame = %outcome.frame.id(), generation = outcome.generation))]
    fn on_outcome(&mut self, outcome: DetectionOutcome) {
        let expected = self.in_flight.map(|running| running.generation);
        if expected != Some(outcome.generation) || !self.issuer.is_current(outcome.generation) {
            debug!("discarding superseded detection result");
            return;
        }
        self.in_flight = None;

        match outcome.result {
            Ok(Some(quad)) => {
                self.stats.detections += 1;
                self.retention.record_detection(outcome.frame, quad);
                self.redraw_overlay();
            }
            Ok(None) => {
                self.stats.misses += 1;
                self.on_miss();
            }
            Err(e) => {
                self.stats.detection_errors += 1;
                warn!(error = %e, "detection failed; treating as no detection");
                self.on_miss();
            }
        }

        if let Some(next) = self.pending.take() {
            self.start_detection(next);
        }
    }

    fn on_miss(&mut self) {
        if self.retention.record_miss() == MissOutcome::Expired {
            info!("retained quad expired; clearing overlay");
            self.overlay.clear();
        }
    }

    /// Draw the retained quad against the overlay's current size.
    fn redraw_overlay(&mut self) {
        match self.retention.current() {
            Some(retained) => {
                let view = map_to_surface(&retained.quad, self.overlay.size());
                self.overlay.draw_quad(&view);
            }
            None => self.overlay.clear(),
        }
    }

    // -- Commands -------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Capture { reply } => self.capture(reply),
            Command::Resize { size, reply } => {
                debug!(width = size.width(), height = size.height(), "preview surface resized");
                self.overlay.resize(size);
                self.redraw_overlay();
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn capture(&mut self, reply: oneshot::Sender<Result<CaptureReceipt>>) {
        let Some(retained) = self.retention.take() else {
            warn!("capture requested before any card was detected");
            let _ = reply.send(Err(CardscanError::NothingToCapture));
            return;
        };
        self.overlay.clear();
        self.stats.captures += 1;

        let corrector = Arc::clone(&self.corrector);
        let photos = Arc::clone(&self.photos);
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                run_capture(retained, corrector.as_ref(), photos.as_ref())
            })
            .await
            .unwrap_or_else(|e| Err(CardscanError::Correction(format!("capture task failed: {e}"))));

            if let Err(e) = &result {
                error!(error = %e, "capture failed");
            }
            let _ = reply.send(result);
        });
    }

    // -- Snapshots ------------------------------------------------------------

    fn stats(&self) -> SessionStats {
        SessionStats {
            frames_dropped: self.stats.frames_dropped
                + self.dropped_at_intake.load(Ordering::Relaxed),
            ..self.stats
        }
    }

    fn snapshot(&self) -> ScanSnapshot {
        let surface = self.overlay.size();
        let retained = self.retention.current();
        ScanSnapshot {
            surface,
            overlay: retained.map(|r| map_to_surface(&r.quad, surface)),
            retained_frame: retained.map(|r| r.frame.id()),
            busy: self.in_flight.is_some() || self.pending.is_some(),
            stats: self.stats(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}
