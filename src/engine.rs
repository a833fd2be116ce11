//! Render-thread orchestration.
//!
//! `MorphEngine` owns the transition state machine, the grid morpher, the
//! focus controller and the random generator. It never touches tracker state;
//! it only consumes the aggregate published in a [`TrackerSnapshot`].

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::EngineConfig;
use crate::focus::FocusController;
use crate::grid::{GridMorpher, GridState};
use crate::render::{layout_cells, RenderFrame};
use crate::tracker::{AggregateDetectionState, TrackerSnapshot};
use crate::transition::{Direction, TransitionEvent, TransitionStateMachine};
use crate::{Millis, Vec2};

pub struct MorphEngine {
    config: EngineConfig,
    rng: StdRng,
    transition: TransitionStateMachine,
    grid: GridMorpher,
    focus: FocusController,
    detection: AggregateDetectionState,
}

impl MorphEngine {
    /// Build an engine seeded from `config.seed`, or from the OS when unset.
    ///
    /// Fails fast on a configuration the engine cannot run with.
    pub fn new(config: EngineConfig, now: Millis) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng, now)
    }

    /// Build an engine around an explicit generator.
    pub fn with_rng(config: EngineConfig, mut rng: StdRng, now: Millis) -> Result<Self> {
        config.validate()?;
        let grid = GridMorpher::new(&config, &mut rng, now)?;
        Ok(Self {
            transition: TransitionStateMachine::new(config.transition.clone()),
            focus: FocusController::new(&config.focus),
            grid,
            rng,
            config,
            detection: AggregateDetectionState::default(),
        })
    }

    /// Adopt the aggregate from the latest worker snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &TrackerSnapshot) {
        self.detection = snapshot.aggregate;
    }

    pub fn set_detection(&mut self, detection: AggregateDetectionState) {
        self.detection = detection;
    }

    pub fn detection(&self) -> &AggregateDetectionState {
        &self.detection
    }

    pub fn grid(&self) -> &GridState {
        self.grid.state()
    }

    pub fn transition(&self) -> &TransitionStateMachine {
        &self.transition
    }

    pub fn focus(&self) -> Vec2 {
        self.focus.current()
    }

    /// Output surface changed size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.grid.resize(width, height)?;
        self.config.output.width = width;
        self.config.output.height = height;
        Ok(())
    }

    /// Advance one frame.
    pub fn tick(&mut self, now: Millis) -> RenderFrame {
        let detected = self.detection.person_detected;
        let transition = self.transition.observe(detected, now);

        for event in &transition.events {
            match event {
                TransitionEvent::RampStart(Direction::Enter) => {
                    self.grid.on_enter_ramp_start(&mut self.rng);
                }
                TransitionEvent::RampComplete(Direction::Exit) => {
                    self.grid.on_exit_ramp_complete();
                }
                TransitionEvent::RampStart(Direction::Exit)
                | TransitionEvent::RampComplete(Direction::Enter) => {}
            }
        }

        if self.transition.is_idle() && !self.transition.committed() && self.grid.refresh_due(now)
        {
            if let Err(err) = self.grid.regenerate(&mut self.rng, now) {
                log::error!("grid regeneration failed: {}", err);
            }
        }

        let focus = self
            .focus
            .tick(detected, self.detection.dominant_position);

        let state = self.grid.state();
        RenderFrame {
            rows: state.rows,
            cols: state.cols,
            cell_width: state.cell_width,
            cell_height: state.cell_height,
            phase: transition.phase,
            progress: transition.progress,
            ramp_value: transition.ramp_value,
            focus,
            person_detected: detected,
            active_person_count: self.detection.active_person_count,
            cells: layout_cells(state, transition.ramp_value, focus, &self.config.render),
        }
    }
}
