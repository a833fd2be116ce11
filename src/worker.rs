//! Detection worker thread.
//!
//! The worker owns the detector backend and the `PersonTracker`. The render
//! thread hands it frames one at a time and receives immutable
//! [`TrackerSnapshot`]s back; tracker state is never shared. At most one job is
//! in flight: a frame offered while the worker is busy is refused, never queued.

use anyhow::{anyhow, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use crate::config::TrackerSettings;
use crate::detect::DetectorBackend;
use crate::frame::Frame;
use crate::tracker::{PersonTracker, TrackerSnapshot};

/// Result of one detection job.
#[derive(Clone, Debug)]
pub struct DetectionOutcome {
    pub snapshot: TrackerSnapshot,
    /// The backend errored or panicked; the snapshot reflects an empty
    /// detection set.
    pub failed: bool,
}

pub struct DetectionWorker {
    backend_name: &'static str,
    jobs: Option<Sender<Frame>>,
    results: Receiver<DetectionOutcome>,
    busy: bool,
    join: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    pub fn spawn(backend: Box<dyn DetectorBackend>, settings: TrackerSettings) -> Result<Self> {
        let backend_name = backend.name();
        let (job_tx, job_rx) = mpsc::channel::<Frame>();
        let (result_tx, result_rx) = mpsc::channel::<DetectionOutcome>();
        let tracker = PersonTracker::new(settings);

        let join = std::thread::Builder::new()
            .name("detection-worker".to_string())
            .spawn(move || run_worker(backend, tracker, job_rx, result_tx))?;
        log::info!("detection worker started (backend: {})", backend_name);

        Ok(Self {
            backend_name,
            jobs: Some(job_tx),
            results: result_rx,
            busy: false,
            join: Some(join),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// True while a dispatched frame has not produced an outcome yet.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Hand `frame` to the worker. Returns `Ok(false)` and drops the frame when
    /// a job is already in flight.
    pub fn try_dispatch(&mut self, frame: Frame) -> Result<bool> {
        if self.busy {
            return Ok(false);
        }
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("detection worker is shut down"))?;
        jobs.send(frame)
            .map_err(|_| anyhow!("detection worker thread has exited"))?;
        self.busy = true;
        Ok(true)
    }

    /// Collect the in-flight job's outcome without blocking.
    pub fn poll(&mut self) -> Option<DetectionOutcome> {
        if !self.busy {
            return None;
        }
        match self.results.try_recv() {
            Ok(outcome) => {
                self.busy = false;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("detection worker exited with a job in flight");
                self.busy = false;
                None
            }
        }
    }

    /// Block until the in-flight job (if any) finishes.
    pub fn wait(&mut self) -> Option<DetectionOutcome> {
        if !self.busy {
            return None;
        }
        self.busy = false;
        match self.results.recv() {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                log::error!("detection worker exited with a job in flight");
                None
            }
        }
    }

    /// Close the job channel and join the thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.jobs.take();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("detection worker thread panicked"))?;
            log::info!("detection worker stopped");
        }
        Ok(())
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("{}", err);
        }
    }
}

fn run_worker(
    mut backend: Box<dyn DetectorBackend>,
    mut tracker: PersonTracker,
    jobs: Receiver<Frame>,
    results: Sender<DetectionOutcome>,
) {
    if let Err(err) = backend.warm_up() {
        log::warn!("detector {} warm-up failed: {}", backend.name(), err);
    }

    while let Ok(frame) = jobs.recv() {
        let now = frame.captured_at_ms;
        let (detections, failed) =
            match panic::catch_unwind(AssertUnwindSafe(|| backend.detect(&frame))) {
                Ok(Ok(detections)) => (detections, false),
                Ok(Err(err)) => {
                    log::warn!(
                        "detector {} failed on frame {}: {}",
                        backend.name(),
                        frame.sequence,
                        err
                    );
                    (Vec::new(), true)
                }
                Err(_) => {
                    log::warn!(
                        "detector {} panicked on frame {}",
                        backend.name(),
                        frame.sequence
                    );
                    (Vec::new(), true)
                }
            };

        let aggregate = tracker.update(&detections, now);
        let snapshot =
            TrackerSnapshot::new(aggregate, tracker.persons().to_vec(), now, frame.sequence);
        if results.send(DetectionOutcome { snapshot, failed }).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::detect::{RawDetection, ScriptedBackend};
    use crate::Vec2;

    fn frame(seq: u64, at: u64) -> Frame {
        Frame::new(vec![0; 12], 2, 2, at, seq)
    }

    fn settings() -> TrackerSettings {
        EngineConfig::default().tracker
    }

    #[test]
    fn busy_worker_refuses_frames() {
        let (gate_tx, gate_rx) = mpsc::channel();
        let backend = ScriptedBackend::default()
            .then_detect(vec![RawDetection::person(Vec2::new(0.5, 0.5), 0.2, 0.4, 0.9)])
            .with_gate(gate_rx);
        let mut worker = DetectionWorker::spawn(Box::new(backend), settings()).unwrap();

        assert!(worker.try_dispatch(frame(1, 100)).unwrap());
        assert!(worker.is_busy());
        assert!(!worker.try_dispatch(frame(2, 133)).unwrap());
        assert!(worker.poll().is_none());

        gate_tx.send(()).unwrap();
        let outcome = worker.wait().unwrap();
        assert!(!outcome.failed);
        assert_eq!(outcome.snapshot.frame_sequence, 1);
        assert!(outcome.snapshot.aggregate.person_detected);
        assert!(!worker.is_busy());

        drop(gate_tx);
        worker.shutdown().unwrap();
    }

    #[test]
    fn backend_failure_yields_empty_update() {
        let backend = ScriptedBackend::default()
            .then_detect(vec![RawDetection::person(Vec2::new(0.5, 0.5), 0.2, 0.4, 0.9)])
            .then_fail("inference error");
        let mut worker = DetectionWorker::spawn(Box::new(backend), settings()).unwrap();

        worker.try_dispatch(frame(1, 0)).unwrap();
        let first = worker.wait().unwrap();
        assert_eq!(first.snapshot.persons().len(), 1);

        worker.try_dispatch(frame(2, 100)).unwrap();
        let second = worker.wait().unwrap();
        assert!(second.failed);
        // The identity survives until it expires.
        assert_eq!(second.snapshot.persons().len(), 1);
        assert_eq!(second.snapshot.frame_time_ms, 100);

        worker.shutdown().unwrap();
    }

    struct PanicsOnFirstCall {
        calls: u32,
    }

    impl DetectorBackend for PanicsOnFirstCall {
        fn name(&self) -> &'static str {
            "panics-on-first-call"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
            self.calls += 1;
            if self.calls == 1 {
                panic!("detector blew up");
            }
            Ok(vec![RawDetection::person(Vec2::new(0.5, 0.5), 0.2, 0.4, 0.9)])
        }
    }

    #[test]
    fn backend_panic_yields_failed_outcome_and_worker_survives() {
        let backend = PanicsOnFirstCall { calls: 0 };
        let mut worker = DetectionWorker::spawn(Box::new(backend), settings()).unwrap();

        assert!(worker.try_dispatch(frame(1, 0)).unwrap());
        let first = worker.wait().unwrap();
        assert!(first.failed);
        assert!(!first.snapshot.aggregate.person_detected);

        assert!(worker.try_dispatch(frame(2, 100)).unwrap());
        let second = worker.wait().unwrap();
        assert!(!second.failed);
        assert!(second.snapshot.aggregate.person_detected);

        worker.shutdown().unwrap();
    }

    #[test]
    fn poll_without_job_returns_none() {
        let mut worker =
            DetectionWorker::spawn(Box::new(ScriptedBackend::default()), settings()).unwrap();
        assert!(worker.poll().is_none());
        assert!(worker.wait().is_none());
        assert_eq!(worker.backend_name(), "scripted");
    }
}
