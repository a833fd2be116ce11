//! gridmorphd - headless grid morph engine daemon
//!
//! This daemon:
//! 1. Loads the engine configuration (file, then environment overrides)
//! 2. Captures frames from the synthetic source at the requested rate
//! 3. Runs detection on a worker thread, every Nth frame, never queueing
//! 4. Ticks the morph engine once per frame and logs phase changes
//! 5. Stops cleanly on Ctrl-C or after a fixed number of frames

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use grid_morph::{EngineConfig, Phase, Pipeline, Scenario, SyntheticSource, WalkerBackend};

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 360;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Engine config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "GRIDMORPH_CONFIG")]
    config: Option<PathBuf>,
    /// Deterministic seed; overrides the config file.
    #[arg(long)]
    seed: Option<u64>,
    /// Render ticks per second.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Stop after this many frames. 0 runs until Ctrl-C.
    #[arg(long, default_value_t = 0)]
    frames: u64,
    /// Synthetic scene: walk, empty or flicker.
    #[arg(long, default_value = "walk")]
    scenario: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    let scenario: Scenario = args.scenario.parse()?;

    let mut config = EngineConfig::load_with(args.config.clone())?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    log::info!(
        "gridmorphd {} starting: output {}x{}, grid rows {}..={} cols {}..={}, seed {:?}",
        env!("CARGO_PKG_VERSION"),
        config.output.width,
        config.output.height,
        config.grid.min_rows,
        config.grid.max_rows,
        config.grid.min_cols,
        config.grid.max_cols,
        config.seed
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::SeqCst);
    })
    .map_err(|err| anyhow!("error setting Ctrl-C handler: {}", err))?;

    let mut source = SyntheticSource::new(CAPTURE_WIDTH, CAPTURE_HEIGHT)?;
    let backend = WalkerBackend::new(scenario);
    let start = Instant::now();
    let mut pipeline = Pipeline::new(config, Box::new(backend), 0)?;

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(args.fps));
    let mut last_health_log = Instant::now();
    let mut last_phase = Phase::Idle;
    let mut rendered = 0u64;

    log::info!(
        "gridmorphd running: scenario {:?} at {} fps (Ctrl-C to stop)",
        scenario,
        args.fps
    );

    while running.load(Ordering::SeqCst) {
        if args.frames != 0 && rendered >= args.frames {
            break;
        }
        let tick_start = Instant::now();
        let now = start.elapsed().as_millis() as u64;

        let frame = source.next_frame(now)?;
        pipeline.submit_frame(frame)?;
        let render = pipeline.tick(now);
        rendered += 1;

        if render.phase != last_phase {
            log::info!(
                "phase {:?} -> {:?} at {}ms (grid {}x{}, {} cells, persons {})",
                last_phase,
                render.phase,
                now,
                render.rows,
                render.cols,
                render.cells.len(),
                render.active_person_count
            );
            last_phase = render.phase;
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = pipeline.stats();
            log::info!(
                "health frames={} dispatched={} dropped_busy={} decimated={} completed={} failed={} persons={} phase={:?} focus=({:.3}, {:.3})",
                stats.frames_seen,
                stats.frames_dispatched,
                stats.frames_dropped_busy,
                stats.frames_decimated,
                stats.detections_completed,
                stats.detections_failed,
                render.active_person_count,
                render.phase,
                render.focus.x,
                render.focus.y
            );
            last_health_log = Instant::now();
        }

        if let Some(rest) = frame_interval.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    log::info!(
        "stopping after {} frames ({} captured)",
        rendered,
        source.stats().frames_captured
    );
    pipeline.shutdown()?;
    Ok(())
}
