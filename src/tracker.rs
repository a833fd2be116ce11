//! Person tracker.
//!
//! Turns per-frame person boxes into persistent identities. The tracker is
//! owned by the detection worker; the render thread only ever sees the
//! immutable [`TrackerSnapshot`] it publishes.
//!
//! Association is first-match: a detection binds to the first identity (in
//! insertion order) closer than `max_movement`, even when a later identity is
//! closer. This can swap identities for people standing close together and is
//! kept as a known limitation.

use crate::config::TrackerSettings;
use crate::detect::RawDetection;
use crate::{Millis, Vec2};

/// One detected person candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedPerson {
    pub id: u64,
    /// Box centre, normalized.
    pub position: Vec2,
    /// Normalized box area, used for dominance.
    pub size: f32,
    /// Last time a matching detection moved this identity.
    pub last_move_ms: Millis,
    pub is_active: bool,
}

/// Aggregate presence derived from the active identities.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AggregateDetectionState {
    pub person_detected: bool,
    pub active_person_count: usize,
    /// Position of the largest active person. `None` when nobody is active.
    pub dominant_position: Option<Vec2>,
}

/// Immutable tracker output handed from the worker to the render thread.
#[derive(Clone, Debug, Default)]
pub struct TrackerSnapshot {
    pub aggregate: AggregateDetectionState,
    persons: Vec<TrackedPerson>,
    /// Capture time of the frame this snapshot was computed from.
    pub frame_time_ms: Millis,
    pub frame_sequence: u64,
}

impl TrackerSnapshot {
    pub fn new(
        aggregate: AggregateDetectionState,
        persons: Vec<TrackedPerson>,
        frame_time_ms: Millis,
        frame_sequence: u64,
    ) -> Self {
        Self {
            aggregate,
            persons,
            frame_time_ms,
            frame_sequence,
        }
    }

    /// Every retained identity, active or not.
    pub fn persons(&self) -> &[TrackedPerson] {
        &self.persons
    }
}

pub struct PersonTracker {
    settings: TrackerSettings,
    persons: Vec<TrackedPerson>,
    next_id: u64,
}

impl PersonTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            persons: Vec::new(),
            next_id: 1,
        }
    }

    pub fn persons(&self) -> &[TrackedPerson] {
        &self.persons
    }

    /// Fold one frame's detections into the tracked set.
    pub fn update(&mut self, detections: &[RawDetection], now: Millis) -> AggregateDetectionState {
        let settings = &self.settings;
        for detection in detections.iter().filter(|d| accepts(settings, d)) {
            let candidate = detection.bbox.center();
            let size = detection.bbox.area();

            let matched = self
                .persons
                .iter_mut()
                .find(|p| p.position.distance(candidate) < settings.max_movement);

            match matched {
                Some(person) => {
                    let movement = person.position.distance(candidate);
                    person.position = candidate;
                    person.size = size;
                    if movement > settings.min_movement {
                        person.last_move_ms = now;
                    }
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    log::debug!(
                        "tracker: new person #{} at ({:.3}, {:.3})",
                        id,
                        candidate.x,
                        candidate.y
                    );
                    self.persons.push(TrackedPerson {
                        id,
                        position: candidate,
                        size,
                        last_move_ms: now,
                        is_active: true,
                    });
                }
            }
        }

        let expiry = self.settings.expiry_ms;
        self.persons.retain(|p| {
            let keep = now.saturating_sub(p.last_move_ms) <= expiry;
            if !keep {
                log::debug!("tracker: person #{} expired", p.id);
            }
            keep
        });

        let inactive_timeout = self.settings.inactive_timeout_ms;
        for person in &mut self.persons {
            person.is_active = now.saturating_sub(person.last_move_ms) < inactive_timeout;
        }

        self.aggregate()
    }

    fn aggregate(&self) -> AggregateDetectionState {
        let mut active_person_count = 0;
        let mut dominant: Option<&TrackedPerson> = None;
        for person in self.persons.iter().filter(|p| p.is_active) {
            active_person_count += 1;
            if dominant.map_or(true, |d| person.size > d.size) {
                dominant = Some(person);
            }
        }
        AggregateDetectionState {
            person_detected: active_person_count > 0,
            active_person_count,
            dominant_position: dominant.map(|p| p.position),
        }
    }
}

fn accepts(settings: &TrackerSettings, detection: &RawDetection) -> bool {
    detection.is_person()
        && detection.is_well_formed()
        && detection.confidence >= settings.min_confidence
        && detection.bbox.area() >= settings.min_box_area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::detect::BoundingBox;

    fn settings() -> TrackerSettings {
        let mut s = EngineConfig::default().tracker;
        s.inactive_timeout_ms = 5_000;
        s.expiry_ms = 10_000;
        s.max_movement = 0.1;
        s.min_movement = 0.05;
        s.min_confidence = 0.5;
        s
    }

    fn person_at(x: f32, y: f32) -> RawDetection {
        RawDetection::person(Vec2::new(x, y), 0.2, 0.4, 0.9)
    }

    #[test]
    fn new_detection_creates_active_identity() {
        let mut tracker = PersonTracker::new(settings());
        let agg = tracker.update(&[person_at(0.5, 0.5)], 0);

        assert!(agg.person_detected);
        assert_eq!(agg.active_person_count, 1);
        assert_eq!(agg.dominant_position, Some(Vec2::new(0.5, 0.5)));
        assert_eq!(tracker.persons().len(), 1);
    }

    #[test]
    fn rejected_detections_never_create_or_refresh() {
        let mut tracker = PersonTracker::new(settings());
        let low_conf = RawDetection::person(Vec2::CENTER, 0.2, 0.4, 0.3);
        let chair = RawDetection::new("chair", 0.9, BoundingBox::new(0.4, 0.4, 0.2, 0.2));
        let degenerate = RawDetection::new("person", 0.9, BoundingBox::new(0.4, 0.4, 0.0, 0.2));
        let tiny = RawDetection::person(Vec2::CENTER, 0.001, 0.001, 0.9);

        let agg = tracker.update(&[low_conf, chair, degenerate, tiny], 0);
        assert!(!agg.person_detected);
        assert!(tracker.persons().is_empty());
    }

    #[test]
    fn mixed_batch_assigns_ids_only_to_accepted_detections() {
        let mut tracker = PersonTracker::new(settings());
        let low_conf = RawDetection::person(Vec2::new(0.5, 0.5), 0.25, 0.25, 0.1);
        let agg = tracker.update(
            &[
                person_at(0.25, 0.5),
                low_conf,
                person_at(0.75, 0.5),
                person_at(0.27, 0.5),
            ],
            0,
        );

        assert_eq!(agg.active_person_count, 2);
        let ids: Vec<u64> = tracker.persons().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn jitter_below_min_movement_does_not_refresh() {
        let mut tracker = PersonTracker::new(settings());
        tracker.update(&[person_at(0.5, 0.5)], 0);
        tracker.update(&[person_at(0.52, 0.5)], 3_000);

        let person = &tracker.persons()[0];
        assert_eq!(person.last_move_ms, 0);
        assert_eq!(person.position, Vec2::new(0.52, 0.5));
    }

    #[test]
    fn real_movement_refreshes_last_move() {
        let mut tracker = PersonTracker::new(settings());
        tracker.update(&[person_at(0.5, 0.5)], 0);
        tracker.update(&[person_at(0.57, 0.5)], 3_000);

        assert_eq!(tracker.persons().len(), 1);
        assert_eq!(tracker.persons()[0].last_move_ms, 3_000);
    }

    #[test]
    fn jump_beyond_max_movement_creates_second_identity() {
        let mut tracker = PersonTracker::new(settings());
        tracker.update(&[person_at(0.2, 0.5)], 0);
        let agg = tracker.update(&[person_at(0.8, 0.5)], 100);

        assert_eq!(tracker.persons().len(), 2);
        assert_eq!(agg.active_person_count, 2);
    }

    #[test]
    fn first_match_binds_to_earlier_identity_not_nearest() {
        let mut tracker = PersonTracker::new(settings());
        tracker.update(&[person_at(0.40, 0.5), person_at(0.55, 0.5)], 0);
        assert_eq!(tracker.persons().len(), 2);

        // 0.48 is 0.08 from the first identity and 0.07 from the second.
        tracker.update(&[person_at(0.48, 0.5)], 1_000);
        let first = &tracker.persons()[0];
        let second = &tracker.persons()[1];
        assert_eq!(first.position, Vec2::new(0.48, 0.5));
        assert_eq!(second.position, Vec2::new(0.55, 0.5));
    }

    #[test]
    fn inactive_before_expiry_and_removed_after() {
        let mut tracker = PersonTracker::new(settings());
        tracker.update(&[person_at(0.5, 0.5)], 0);

        let agg = tracker.update(&[], 5_001);
        assert!(!agg.person_detected);
        assert_eq!(tracker.persons().len(), 1);
        assert!(!tracker.persons()[0].is_active);

        tracker.update(&[], 10_000);
        assert_eq!(tracker.persons().len(), 1);

        tracker.update(&[], 10_001);
        assert!(tracker.persons().is_empty());
    }

    #[test]
    fn inactive_identity_is_still_matchable() {
        let mut tracker = PersonTracker::new(settings());
        tracker.update(&[person_at(0.5, 0.5)], 0);
        tracker.update(&[], 6_000);

        let agg = tracker.update(&[person_at(0.57, 0.5)], 7_000);
        assert_eq!(tracker.persons().len(), 1);
        assert_eq!(tracker.persons()[0].id, 1);
        assert!(agg.person_detected);
    }

    #[test]
    fn dominant_is_largest_active_with_first_on_tie() {
        let mut tracker = PersonTracker::new(settings());
        let small = RawDetection::person(Vec2::new(0.25, 0.5), 0.125, 0.25, 0.9);
        let big = RawDetection::person(Vec2::new(0.75, 0.5), 0.25, 0.5, 0.9);
        let agg = tracker.update(&[small, big], 0);
        assert_eq!(agg.dominant_position, Some(Vec2::new(0.75, 0.5)));

        let mut tracker = PersonTracker::new(settings());
        let a = RawDetection::person(Vec2::new(0.25, 0.5), 0.25, 0.25, 0.9);
        let b = RawDetection::person(Vec2::new(0.75, 0.5), 0.25, 0.25, 0.9);
        let agg = tracker.update(&[a, b], 0);
        assert_eq!(agg.dominant_position, Some(Vec2::new(0.25, 0.5)));
    }
}
