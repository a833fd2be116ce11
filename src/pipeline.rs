//! Frame-level driver.
//!
//! `Pipeline` ties a [`DetectionWorker`] to a [`MorphEngine`]. Captured frames
//! are decimated to every Nth frame, offered to the worker (and dropped when it
//! is busy), and finished snapshots are folded into the engine before each
//! render tick.

use anyhow::Result;

use crate::config::EngineConfig;
use crate::detect::DetectorBackend;
use crate::engine::MorphEngine;
use crate::frame::Frame;
use crate::render::RenderFrame;
use crate::tracker::TrackerSnapshot;
use crate::worker::{DetectionOutcome, DetectionWorker};
use crate::Millis;

/// Frame accounting since the pipeline started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_seen: u64,
    /// Skipped by `process_every_nth_frame`.
    pub frames_decimated: u64,
    pub frames_dispatched: u64,
    /// Offered while a detection job was still in flight.
    pub frames_dropped_busy: u64,
    pub detections_completed: u64,
    pub detections_failed: u64,
}

pub struct Pipeline {
    engine: MorphEngine,
    worker: DetectionWorker,
    every_nth: u64,
    stats: PipelineStats,
    latest: Option<TrackerSnapshot>,
}

impl Pipeline {
    pub fn new(
        config: EngineConfig,
        backend: Box<dyn DetectorBackend>,
        now: Millis,
    ) -> Result<Self> {
        config.validate()?;
        let every_nth = u64::from(config.detection.process_every_nth_frame);
        let worker = DetectionWorker::spawn(backend, config.tracker.clone())?;
        let engine = MorphEngine::new(config, now)?;
        Ok(Self {
            engine,
            worker,
            every_nth,
            stats: PipelineStats::default(),
            latest: None,
        })
    }

    /// Offer a captured frame. Returns `Ok(true)` when it was handed to the
    /// detection worker.
    pub fn submit_frame(&mut self, frame: Frame) -> Result<bool> {
        self.drain();
        self.stats.frames_seen += 1;
        let index = self.stats.frames_seen;

        // Frames N, 2N, 3N... reach the detector.
        if index % self.every_nth != 0 {
            self.stats.frames_decimated += 1;
            return Ok(false);
        }
        if self.worker.try_dispatch(frame)? {
            self.stats.frames_dispatched += 1;
            Ok(true)
        } else {
            log::trace!("detection busy, dropped frame {}", index);
            self.stats.frames_dropped_busy += 1;
            Ok(false)
        }
    }

    /// Fold any finished detection into the engine and render one frame.
    pub fn tick(&mut self, now: Millis) -> RenderFrame {
        self.drain();
        self.engine.tick(now)
    }

    /// Block until the in-flight detection (if any) has been applied.
    pub fn flush(&mut self) {
        if let Some(outcome) = self.worker.wait() {
            self.apply(outcome);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.engine.resize(width, height)
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn engine(&self) -> &MorphEngine {
        &self.engine
    }

    /// Most recent tracker snapshot applied to the engine.
    pub fn latest_snapshot(&self) -> Option<&TrackerSnapshot> {
        self.latest.as_ref()
    }

    pub fn detection_busy(&self) -> bool {
        self.worker.is_busy()
    }

    /// Stop the detection worker and join its thread.
    pub fn shutdown(self) -> Result<()> {
        log::info!("pipeline shutting down: {:?}", self.stats);
        self.worker.shutdown()
    }

    fn drain(&mut self) {
        if let Some(outcome) = self.worker.poll() {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: DetectionOutcome) {
        if outcome.failed {
            self.stats.detections_failed += 1;
        } else {
            self.stats.detections_completed += 1;
        }
        self.engine.apply_snapshot(&outcome.snapshot);
        self.latest = Some(outcome.snapshot);
    }
}
