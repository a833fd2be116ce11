use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::mpsc::Receiver;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

enum Step {
    Detections(Vec<RawDetection>),
    Failure(String),
}

/// Backend that replays a queued script, one step per `detect` call.
///
/// Once the script is exhausted every call returns no detections. An optional
/// gate makes each call wait for a release signal, which lets tests hold a job
/// in flight deterministically.
pub struct ScriptedBackend {
    steps: VecDeque<Step>,
    gate: Option<Receiver<()>>,
    calls: u64,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            steps: VecDeque::new(),
            gate: None,
            calls: 0,
        }
    }

    /// Queue the detections returned by the next unscripted call.
    pub fn then_detect(mut self, detections: Vec<RawDetection>) -> Self {
        self.steps.push_back(Step::Detections(detections));
        self
    }

    /// Queue a failing call.
    pub fn then_fail(mut self, message: &str) -> Self {
        self.steps.push_back(Step::Failure(message.to_string()));
        self
    }

    /// Block every call until a `()` arrives on `gate`. A disconnected gate
    /// releases all further calls.
    pub fn with_gate(mut self, gate: Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        self.calls += 1;
        match self.steps.pop_front() {
            Some(Step::Detections(detections)) => Ok(detections),
            Some(Step::Failure(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}
