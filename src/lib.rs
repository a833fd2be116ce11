//! Detection-driven grid morph engine.
//!
//! This crate implements the core of an interactive installation that renders a
//! camera feed through an animated grid of cells reacting to people in view.
//!
//! # Architecture
//!
//! Data flows one way per cycle:
//!
//! 1. **Detection**: a `DetectorBackend` produces raw boxes for a frame on the
//!    detection worker thread.
//! 2. **Tracking**: the worker-owned `PersonTracker` turns boxes into persistent
//!    identities and publishes an immutable `TrackerSnapshot`.
//! 3. **Transition**: the `TransitionStateMachine` debounces "person present"
//!    into an eased ramp value.
//! 4. **Grid**: the `GridMorpher` resizes, merges and jitters cells in step with
//!    the ramp.
//! 5. **Focus**: the `FocusController` smooths the look-at point toward the
//!    dominant person.
//!
//! # Module Structure
//!
//! - `frame`, `ingest`: frame container and synthetic frame source
//! - `detect`: raw detections and detector backends
//! - `tracker`, `transition`, `grid`, `focus`: the engine components
//! - `render`: per-frame output consumed by an external renderer
//! - `engine`: render-thread orchestration of the components
//! - `worker`, `pipeline`: detection worker and the frame-level driver

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

pub mod config;
pub mod detect;
pub mod engine;
pub mod focus;
pub mod frame;
pub mod grid;
pub mod ingest;
pub mod pipeline;
pub mod render;
pub mod tracker;
pub mod transition;
pub mod worker;

pub use config::{EngineConfig, OverlapPolicy, ShapeCap};
pub use detect::{
    BoundingBox, DetectorBackend, RawDetection, Scenario, ScriptedBackend, WalkerBackend,
    PERSON_LABEL,
};
pub use engine::MorphEngine;
pub use focus::FocusController;
pub use frame::Frame;
pub use grid::{CellSpan, Grid, GridMorpher, GridState};
pub use ingest::{SourceStats, SyntheticSource};
pub use pipeline::{Pipeline, PipelineStats};
pub use render::{CellRender, Rect, RenderFrame};
pub use tracker::{AggregateDetectionState, PersonTracker, TrackedPerson, TrackerSnapshot};
pub use transition::{Direction, Phase, TransitionEvent, TransitionStateMachine, TransitionTick};
pub use worker::{DetectionOutcome, DetectionWorker};

/// Milliseconds on the engine's monotonic clock.
pub type Millis = u64;

// -------------------- Geometry --------------------

/// 2D point or vector in normalized (0..1) detection space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const CENTER: Vec2 = Vec2 { x: 0.5, y: 0.5 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(self, target: Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: lerp(self.x, target.x, t),
            y: lerp(self.y, target.y, t),
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Linear interpolation from `a` to `b`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
