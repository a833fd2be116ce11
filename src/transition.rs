//! Transition state machine.
//!
//! Debounces the tracker's "person present" flag into a ramp value in
//! [0, 1]. The ramp is always computed from elapsed time since the ramp
//! started, never from accumulated frame deltas.
//!
//! ```text
//! Idle ──edge──▶ PendingEnter / PendingExit ──debounce elapsed──▶ Ramping ──progress >= 1──▶ Idle
//!                      │
//!                      └──opposite edge──▶ Idle
//! ```

use crate::config::TransitionSettings;
use crate::{lerp, Millis};

/// Direction of a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Toward the "detected" visual state.
    Enter,
    /// Toward the "undetected" visual state.
    Exit,
}

impl Direction {
    /// The committed detection state once a ramp in this direction completes.
    pub fn target(self) -> bool {
        matches!(self, Direction::Enter)
    }

    fn from_target(detected: bool) -> Self {
        if detected {
            Direction::Enter
        } else {
            Direction::Exit
        }
    }
}

/// Externally visible phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PendingEnter,
    PendingExit,
    Ramping,
}

/// Side-channel triggers emitted by [`TransitionStateMachine::observe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionEvent {
    /// First tick of a ramp. Fired exactly once per ramp.
    RampStart(Direction),
    RampComplete(Direction),
}

/// Result of one observation.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionTick {
    pub phase: Phase,
    pub progress: f32,
    pub ramp_value: f32,
    pub events: Vec<TransitionEvent>,
}

#[derive(Clone, Copy, Debug)]
enum State {
    Idle,
    Pending { direction: Direction, since: Millis },
    Ramping { direction: Direction, start: Millis },
}

pub struct TransitionStateMachine {
    settings: TransitionSettings,
    state: State,
    committed: bool,
    progress: f32,
}

impl TransitionStateMachine {
    pub fn new(settings: TransitionSettings) -> Self {
        Self {
            settings,
            state: State::Idle,
            committed: false,
            progress: 0.0,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Pending {
                direction: Direction::Enter,
                ..
            } => Phase::PendingEnter,
            State::Pending {
                direction: Direction::Exit,
                ..
            } => Phase::PendingExit,
            State::Ramping { .. } => Phase::Ramping,
        }
    }

    /// Last committed detection state.
    pub fn committed(&self) -> bool {
        self.committed
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Eased output: 0 = undetected visual state, 1 = detected.
    pub fn ramp_value(&self) -> f32 {
        match self.state {
            State::Ramping {
                direction: Direction::Enter,
                ..
            } => lerp(0.0, 1.0, self.progress),
            State::Ramping {
                direction: Direction::Exit,
                ..
            } => lerp(1.0, 0.0, self.progress),
            _ => {
                if self.committed {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// True while nothing is pending or ramping.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    fn debounce_ms(&self, direction: Direction) -> Millis {
        match direction {
            Direction::Enter => self.settings.enter_debounce_ms,
            Direction::Exit => self.settings.exit_debounce_ms,
        }
    }

    fn duration_ms(&self, direction: Direction) -> Millis {
        match direction {
            Direction::Enter => self.settings.enter_duration_ms,
            Direction::Exit => self.settings.exit_duration_ms,
        }
    }

    /// Feed the current detection flag.
    pub fn observe(&mut self, person_detected: bool, now: Millis) -> TransitionTick {
        let mut events = Vec::new();

        match self.state {
            State::Idle => {
                if person_detected != self.committed {
                    let direction = Direction::from_target(person_detected);
                    log::debug!("transition: pending {:?} at {}ms", direction, now);
                    self.state = State::Pending {
                        direction,
                        since: now,
                    };
                }
            }
            State::Pending { direction, since } => {
                if person_detected != direction.target() {
                    log::debug!("transition: pending {:?} cancelled at {}ms", direction, now);
                    self.state = State::Idle;
                } else if now.saturating_sub(since) > self.debounce_ms(direction) {
                    log::info!("transition: ramp {:?} started at {}ms", direction, now);
                    self.state = State::Ramping {
                        direction,
                        start: now,
                    };
                    self.progress = 0.0;
                    events.push(TransitionEvent::RampStart(direction));
                }
            }
            State::Ramping { .. } => {}
        }

        if let State::Ramping { direction, start } = self.state {
            self.progress = ramp_progress(now.saturating_sub(start), self.duration_ms(direction));
            if self.progress >= 1.0 {
                self.committed = direction.target();
                self.state = State::Idle;
                events.push(TransitionEvent::RampComplete(direction));
                log::info!("transition: ramp {:?} complete at {}ms", direction, now);
            }
        }

        TransitionTick {
            phase: self.phase(),
            progress: self.progress,
            ramp_value: self.ramp_value(),
            events,
        }
    }
}

fn ramp_progress(elapsed_ms: Millis, duration_ms: Millis) -> f32 {
    if duration_ms == 0 {
        return 1.0;
    }
    (elapsed_ms as f32 / duration_ms as f32).clamp(0.0, 1.0)
}
