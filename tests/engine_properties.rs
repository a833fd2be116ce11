//! Behavioural properties of the tracker, transition machine, grid morpher
//! and focus controller, exercised through the public API.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use grid_morph::{
    AggregateDetectionState, CellSpan, EngineConfig, GridMorpher, MorphEngine, PersonTracker,
    Phase, RawDetection, ShapeCap, TrackerSnapshot, Vec2,
};

const FRAME_MS: u64 = 16;

fn small_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.seed = Some(2024);
    cfg.output.width = 800;
    cfg.output.height = 600;
    cfg.grid.min_rows = 3;
    cfg.grid.max_rows = 24;
    cfg.grid.min_cols = 3;
    cfg.grid.max_cols = 24;
    cfg
}

fn detected(position: Vec2) -> AggregateDetectionState {
    AggregateDetectionState {
        person_detected: true,
        active_person_count: 1,
        dominant_position: Some(position),
    }
}

#[test]
fn active_count_never_exceeds_detections_inside_inactivity_window() {
    let cfg = EngineConfig::default();
    let inactive = cfg.tracker.inactive_timeout_ms;
    let mut tracker = PersonTracker::new(cfg.tracker.clone());
    let mut rng = StdRng::seed_from_u64(5);
    let mut window: VecDeque<(u64, usize)> = VecDeque::new();

    for step in 0..2_000u64 {
        let now = step * 50;
        let count = rng.gen_range(0..=3usize);
        let detections: Vec<RawDetection> = (0..count)
            .map(|_| {
                let center = Vec2::new(rng.gen_range(0.1..0.9), rng.gen_range(0.1..0.9));
                RawDetection::person(center, 0.1, 0.2, rng.gen_range(0.5..=1.0))
            })
            .collect();

        let aggregate = tracker.update(&detections, now);

        window.push_back((now, detections.len()));
        while let Some(&(t, _)) = window.front() {
            if now - t >= inactive {
                window.pop_front();
            } else {
                break;
            }
        }
        let observed: usize = window.iter().map(|(_, n)| n).sum();
        assert!(
            aggregate.active_person_count <= observed,
            "{} active identities from {} detections at {}ms",
            aggregate.active_person_count,
            observed,
            now
        );
    }
}

#[test]
fn regenerate_with_identical_seed_yields_identical_dimensions() {
    let cfg = small_config();
    let dims = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut morpher = GridMorpher::new(&cfg, &mut rng, 0).unwrap();
        let mut seen = Vec::new();
        for step in 1..=20 {
            morpher.regenerate(&mut rng, step * 3_000).unwrap();
            seen.push((morpher.state().rows, morpher.state().cols));
        }
        seen
    };
    assert_eq!(dims(9), dims(9));
    assert_ne!(dims(9), dims(10));
}

#[test]
fn enter_ramp_progress_is_monotonic_and_completes_on_time() {
    let mut cfg = small_config();
    cfg.transition.enter_debounce_ms = 200;
    cfg.transition.enter_duration_ms = 1_000;
    let mut engine = MorphEngine::new(cfg, 0).unwrap();
    engine.set_detection(detected(Vec2::new(0.4, 0.4)));

    let mut ramp_start = None;
    let mut last_progress = 0.0;
    let mut now = 0;
    loop {
        let frame = engine.tick(now);
        if frame.phase == Phase::Ramping {
            let start = *ramp_start.get_or_insert(now);
            assert!(frame.progress >= last_progress);
            assert!(now - start < 1_000);
            last_progress = frame.progress;
        } else if ramp_start.is_some() {
            assert_eq!(frame.progress, 1.0);
            assert_eq!(frame.ramp_value, 1.0);
            let elapsed = now - ramp_start.unwrap();
            assert!((1_000..1_000 + FRAME_MS).contains(&elapsed));
            break;
        }
        now += FRAME_MS;
        assert!(now < 10_000, "ramp never completed");
    }
}

#[test]
fn flicker_shorter_than_debounce_never_ramps() {
    let mut cfg = small_config();
    cfg.transition.enter_debounce_ms = 200;
    cfg.transition.exit_debounce_ms = 200;
    let mut engine = MorphEngine::new(cfg, 0).unwrap();
    let person = detected(Vec2::CENTER);

    let script = [(0, true), (20, false), (40, true), (50, false)];
    for (at, present) in script {
        engine.set_detection(if present {
            person
        } else {
            AggregateDetectionState::default()
        });
        assert_ne!(engine.tick(at).phase, Phase::Ramping);
    }
    for now in (60..2_000).step_by(FRAME_MS as usize) {
        let frame = engine.tick(now);
        assert_ne!(frame.phase, Phase::Ramping);
        assert_eq!(frame.ramp_value, 0.0);
    }
}

#[test]
fn identity_goes_inactive_before_it_expires() {
    let mut cfg = EngineConfig::default();
    cfg.tracker.inactive_timeout_ms = 5_000;
    cfg.tracker.expiry_ms = 10_000;
    let mut tracker = PersonTracker::new(cfg.tracker);
    let person = RawDetection::person(Vec2::new(0.3, 0.3), 0.1, 0.2, 0.9);

    tracker.update(&[person], 0);
    assert!(tracker.update(&[], 4_999).person_detected);

    let at_5001 = tracker.update(&[], 5_001);
    assert!(!at_5001.person_detected);
    assert_eq!(tracker.persons().len(), 1);
    assert!(!tracker.persons()[0].is_active);

    assert_eq!(tracker.update(&[], 10_000).active_person_count, 0);
    assert_eq!(tracker.persons().len(), 1);
    tracker.update(&[], 10_001);
    assert!(tracker.persons().is_empty());
}

#[test]
fn merges_stay_inside_grid_and_respect_shape_caps() {
    let mut cfg = small_config();
    cfg.merge.max_merges = 40;
    cfg.merge.default_shape_cap = 3;
    cfg.merge.shape_caps = vec![ShapeCap {
        rows: 2,
        cols: 2,
        max: 1,
    }];

    for seed in 0..100 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut morpher = GridMorpher::new(&cfg, &mut rng, 0).unwrap();
        morpher.on_enter_ramp_start(&mut rng);
        let grid = morpher.state();

        let mut per_shape: HashMap<(u32, u32), u32> = HashMap::new();
        for (row, col, span) in grid.spans.iter() {
            if let CellSpan::Origin { rows, cols } = *span {
                assert!(row as u32 + rows <= grid.rows);
                assert!(col as u32 + cols <= grid.cols);
                *per_shape.entry((rows, cols)).or_insert(0) += 1;
            }
        }
        for ((rows, cols), count) in per_shape {
            assert!(count <= cfg.merge.cap_for(rows, cols), "seed {}", seed);
        }
        grid.check_topology().unwrap();
    }
}

#[test]
fn full_exit_ramp_restores_single_cells_and_zero_jitter() {
    let mut cfg = small_config();
    cfg.transition.enter_debounce_ms = 100;
    cfg.transition.exit_debounce_ms = 100;
    cfg.transition.enter_duration_ms = 300;
    cfg.transition.exit_duration_ms = 300;
    let mut engine = MorphEngine::new(cfg, 0).unwrap();

    engine.set_detection(detected(Vec2::new(0.7, 0.2)));
    let mut now = 0;
    while !engine.transition().committed() {
        engine.tick(now);
        now += FRAME_MS;
    }

    engine.set_detection(AggregateDetectionState::default());
    let mut exit_done = false;
    while !exit_done {
        let frame = engine.tick(now);
        exit_done = frame.phase == Phase::Idle && !engine.transition().committed();
        now += FRAME_MS;
    }

    let grid = engine.grid();
    assert!(grid.spans.iter().all(|(_, _, span)| *span == CellSpan::Single));
    assert!(grid.offsets.iter().all(|(_, _, offset)| *offset == Vec2::ZERO));
    assert_eq!(grid.merge_count(), 0);
}

fn converge_on(target: Vec2) -> MorphEngine {
    let mut cfg = EngineConfig::default();
    cfg.seed = Some(1);
    cfg.grid.min_rows = 4;
    cfg.grid.max_rows = 4;
    cfg.grid.min_cols = 4;
    cfg.grid.max_cols = 4;
    let sustain = cfg.transition.enter_debounce_ms + cfg.transition.enter_duration_ms;
    let inactive = cfg.tracker.inactive_timeout_ms;
    let mut tracker = PersonTracker::new(cfg.tracker.clone());
    let mut engine = MorphEngine::new(cfg, 0).unwrap();
    let detection = RawDetection::person(target, 0.2, 0.4, 0.95);

    let mut last_distance = engine.focus().distance(target);
    let mut now = 0;
    // A motionless person goes inactive after the inactivity timeout.
    while now < inactive.min(sustain + 500) {
        let aggregate = tracker.update(&[detection.clone()], now);
        engine.apply_snapshot(&TrackerSnapshot::new(
            aggregate,
            tracker.persons().to_vec(),
            now,
            now / FRAME_MS,
        ));
        let frame = engine.tick(now);
        assert_eq!((frame.rows, frame.cols), (4, 4));

        let distance = frame.focus.distance(target);
        assert!(distance <= last_distance + 1e-6);
        last_distance = distance;
        now += FRAME_MS;
    }
    assert!(engine.transition().committed());
    engine
}

#[test]
fn focus_converges_on_sustained_centre_detection() {
    let target = Vec2::new(0.5, 0.5);
    let engine = converge_on(target);
    assert!(engine.focus().distance(target) < 1e-4);
}

#[test]
fn focus_converges_on_sustained_off_centre_detection() {
    let target = Vec2::new(0.2, 0.7);
    let engine = converge_on(target);
    assert!(engine.focus().distance(target) < 1e-4);
}
