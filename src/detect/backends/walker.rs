use anyhow::{anyhow, Result};
use std::str::FromStr;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, RawDetection};
use crate::frame::Frame;
use crate::{Millis, Vec2};

const WALK_CYCLE_MS: Millis = 20_000;
const WALK_ENTER_MS: Millis = 4_000;
const WALK_EXIT_MS: Millis = 12_000;
const WALK_STRIDES: Millis = 10;
const WALK_STRIDE_LEN: f32 = 0.06;
const FLICKER_PERIOD_MS: Millis = 300;

/// Synthetic scene played by [`WalkerBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// A person crosses the frame for eight seconds out of every twenty.
    Walk,
    /// Only non-person objects are ever reported.
    Empty,
    /// A standing person whose confidence drops below threshold every
    /// other period.
    Flicker,
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "walk" => Ok(Scenario::Walk),
            "empty" => Ok(Scenario::Empty),
            "flicker" => Ok(Scenario::Flicker),
            other => Err(anyhow!(
                "unknown scenario '{}' (expected walk, empty or flicker)",
                other
            )),
        }
    }
}

/// Time-driven synthetic detector used by the daemon.
///
/// Output depends only on the frame's capture time, so a run is reproducible
/// for a given clock.
pub struct WalkerBackend {
    scenario: Scenario,
}

impl WalkerBackend {
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario }
    }

    fn furniture() -> RawDetection {
        RawDetection::new("chair", 0.8, BoundingBox::new(0.05, 0.7, 0.15, 0.25))
    }

    fn walk(now: Millis) -> Vec<RawDetection> {
        let phase = now % WALK_CYCLE_MS;
        let mut detections = vec![Self::furniture()];
        if (WALK_ENTER_MS..WALK_EXIT_MS).contains(&phase) {
            // Discrete strides: each one clears the tracker's jitter threshold
            // without breaking association.
            let elapsed = phase - WALK_ENTER_MS;
            let stride = (elapsed * WALK_STRIDES / (WALK_EXIT_MS - WALK_ENTER_MS)) as f32;
            let x = 0.2 + WALK_STRIDE_LEN * stride;
            detections.push(RawDetection::person(Vec2::new(x, 0.55), 0.2, 0.5, 0.9));
        }
        detections
    }

    fn flicker(now: Millis) -> Vec<RawDetection> {
        let confident = (now / FLICKER_PERIOD_MS) % 2 == 0;
        let confidence = if confident { 0.9 } else { 0.2 };
        vec![RawDetection::person(
            Vec2::new(0.5, 0.5),
            0.25,
            0.6,
            confidence,
        )]
    }
}

impl DetectorBackend for WalkerBackend {
    fn name(&self) -> &'static str {
        "walker"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let now = frame.captured_at_ms;
        Ok(match self.scenario {
            Scenario::Walk => Self::walk(now),
            Scenario::Empty => vec![Self::furniture()],
            Scenario::Flicker => Self::flicker(now),
        })
    }
}
