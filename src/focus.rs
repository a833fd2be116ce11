use crate::config::FocusSettings;
use crate::Vec2;

/// First-order lag toward the dominant person.
///
/// Starts at the frame centre and only moves while a person is detected, so
/// an empty room leaves the focus where the last person was.
pub struct FocusController {
    current: Vec2,
    follow_speed: f32,
}

impl FocusController {
    pub fn new(settings: &FocusSettings) -> Self {
        Self {
            current: Vec2::CENTER,
            follow_speed: settings.follow_speed.clamp(0.0, 1.0),
        }
    }

    pub fn current(&self) -> Vec2 {
        self.current
    }

    /// Advance one frame. `target` is ignored unless `person_detected`.
    pub fn tick(&mut self, person_detected: bool, target: Option<Vec2>) -> Vec2 {
        if let (true, Some(target)) = (person_detected, target) {
            if target.is_finite() {
                self.current = self.current.lerp(target, self.follow_speed);
            }
        }
        self.current
    }
}
