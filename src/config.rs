use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Millis;

const DEFAULT_OUTPUT_WIDTH: u32 = 1920;
const DEFAULT_OUTPUT_HEIGHT: u32 = 1080;

const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
const DEFAULT_MIN_BOX_AREA: f32 = 0.001;
const DEFAULT_MAX_MOVEMENT: f32 = 0.1;
const DEFAULT_MIN_MOVEMENT: f32 = 0.05;
const DEFAULT_INACTIVE_TIMEOUT_MS: Millis = 5_000;
const DEFAULT_EXPIRY_MS: Millis = 10_000;

const DEFAULT_ENTER_DEBOUNCE_MS: Millis = 2_000;
const DEFAULT_EXIT_DEBOUNCE_MS: Millis = 1_000;
const DEFAULT_ENTER_DURATION_MS: Millis = 2_000;
const DEFAULT_EXIT_DURATION_MS: Millis = 2_000;

/// Upper bound on grid rows and columns.
pub const MAX_GRID_DIM: u32 = 256;

const DEFAULT_GRID_MIN: u32 = 1;
const DEFAULT_GRID_MAX: u32 = MAX_GRID_DIM;
const DEFAULT_MAX_GRID_PROBABILITY: f32 = 0.2;
const DEFAULT_REFRESH_MEDIAN_MS: Millis = 3_000;
const DEFAULT_REFRESH_UNCERTAINTY_MS: Millis = 500;

const DEFAULT_MAX_MERGES: u32 = 10;
const DEFAULT_SPAN_SCALE: u32 = 1;
const DEFAULT_SHAPE_CAP: u32 = 4;

const DEFAULT_MAX_OFFSET: f32 = 0.5;
const DEFAULT_FOLLOW_SPEED: f32 = 0.1;
const DEFAULT_BASE_ZOOM: f32 = 1.5;
const DEFAULT_MERGED_ZOOM: f32 = 2.5;
const DEFAULT_PROCESS_EVERY_NTH_FRAME: u32 = 3;

// -------------------- File format --------------------

#[derive(Debug, Deserialize, Default)]
struct EngineConfigFile {
    seed: Option<u64>,
    output: Option<OutputConfigFile>,
    tracker: Option<TrackerConfigFile>,
    transition: Option<TransitionConfigFile>,
    grid: Option<GridConfigFile>,
    merge: Option<MergeConfigFile>,
    jitter: Option<JitterConfigFile>,
    focus: Option<FocusConfigFile>,
    render: Option<RenderConfigFile>,
    detection: Option<DetectionConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    min_confidence: Option<f32>,
    min_box_area: Option<f32>,
    max_movement: Option<f32>,
    min_movement: Option<f32>,
    inactive_timeout_ms: Option<Millis>,
    expiry_ms: Option<Millis>,
}

#[derive(Debug, Deserialize, Default)]
struct TransitionConfigFile {
    enter_debounce_ms: Option<Millis>,
    exit_debounce_ms: Option<Millis>,
    enter_duration_ms: Option<Millis>,
    exit_duration_ms: Option<Millis>,
}

#[derive(Debug, Deserialize, Default)]
struct GridConfigFile {
    min_rows: Option<u32>,
    max_rows: Option<u32>,
    min_cols: Option<u32>,
    max_cols: Option<u32>,
    max_grid_probability: Option<f32>,
    refresh_median_ms: Option<Millis>,
    refresh_uncertainty_ms: Option<Millis>,
}

#[derive(Debug, Deserialize, Default)]
struct MergeConfigFile {
    max_merges: Option<u32>,
    span_scale: Option<u32>,
    default_shape_cap: Option<u32>,
    shape_caps: Option<Vec<ShapeCap>>,
    overlap: Option<OverlapPolicy>,
}

#[derive(Debug, Deserialize, Default)]
struct JitterConfigFile {
    max_offset_x: Option<f32>,
    max_offset_y: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct FocusConfigFile {
    follow_speed: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    base_zoom: Option<f32>,
    merged_zoom: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    process_every_nth_frame: Option<u32>,
}

// -------------------- Settings --------------------

/// How merge placement treats spans that would cover an already merged cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Reject a merge whose rectangle touches any origin or absorbed cell.
    #[default]
    Reject,
    /// Only grid bounds are checked; later merges may overwrite earlier ones.
    Permissive,
}

/// Per-shape limit on how many merges of a given span may be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct ShapeCap {
    pub rows: u32,
    pub cols: u32,
    pub max: u32,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seed for every random draw. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub output: OutputSettings,
    pub tracker: TrackerSettings,
    pub transition: TransitionSettings,
    pub grid: GridSettings,
    pub merge: MergeSettings,
    pub jitter: JitterSettings,
    pub focus: FocusSettings,
    pub render: RenderSettings,
    pub detection: DetectionSettings,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub min_confidence: f32,
    /// Minimum normalized box area (w * h).
    pub min_box_area: f32,
    /// Distance under which a detection binds to an existing identity.
    pub max_movement: f32,
    /// Distance a bound identity must move for the update to count as movement.
    pub min_movement: f32,
    pub inactive_timeout_ms: Millis,
    pub expiry_ms: Millis,
}

#[derive(Debug, Clone)]
pub struct TransitionSettings {
    pub enter_debounce_ms: Millis,
    pub exit_debounce_ms: Millis,
    pub enter_duration_ms: Millis,
    pub exit_duration_ms: Millis,
}

#[derive(Debug, Clone)]
pub struct GridSettings {
    pub min_rows: u32,
    pub max_rows: u32,
    pub min_cols: u32,
    pub max_cols: u32,
    pub max_grid_probability: f32,
    pub refresh_median_ms: Millis,
    pub refresh_uncertainty_ms: Millis,
}

#[derive(Debug, Clone)]
pub struct MergeSettings {
    pub max_merges: u32,
    /// Multiplier applied to the 1..=2 base span on each axis.
    pub span_scale: u32,
    pub default_shape_cap: u32,
    pub shape_caps: Vec<ShapeCap>,
    pub overlap: OverlapPolicy,
}

impl MergeSettings {
    /// Cap for a merge shape, falling back to `default_shape_cap`.
    pub fn cap_for(&self, rows: u32, cols: u32) -> u32 {
        self.shape_caps
            .iter()
            .find(|cap| cap.rows == rows && cap.cols == cols)
            .map(|cap| cap.max)
            .unwrap_or(self.default_shape_cap)
    }
}

/// Jitter bounds as a fraction of the cell size.
#[derive(Debug, Clone)]
pub struct JitterSettings {
    pub max_offset_x: f32,
    pub max_offset_y: f32,
}

#[derive(Debug, Clone)]
pub struct FocusSettings {
    pub follow_speed: f32,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub base_zoom: f32,
    pub merged_zoom: f32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub process_every_nth_frame: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_file(EngineConfigFile::default())
    }
}

impl EngineConfig {
    /// Load from `GRIDMORPH_CONFIG` (if set), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`EngineConfig::load`], but an explicit path wins over `GRIDMORPH_CONFIG`.
    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path =
            config_path.or_else(|| std::env::var("GRIDMORPH_CONFIG").ok().map(PathBuf::from));
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a single file without consulting the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let cfg = Self::from_file(read_config_file(path)?);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EngineConfigFile) -> Self {
        let output = file.output.unwrap_or_default();
        let tracker = file.tracker.unwrap_or_default();
        let transition = file.transition.unwrap_or_default();
        let grid = file.grid.unwrap_or_default();
        let merge = file.merge.unwrap_or_default();
        let jitter = file.jitter.unwrap_or_default();
        let focus = file.focus.unwrap_or_default();
        let render = file.render.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();

        Self {
            seed: file.seed,
            output: OutputSettings {
                width: output.width.unwrap_or(DEFAULT_OUTPUT_WIDTH),
                height: output.height.unwrap_or(DEFAULT_OUTPUT_HEIGHT),
            },
            tracker: TrackerSettings {
                min_confidence: tracker.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
                min_box_area: tracker.min_box_area.unwrap_or(DEFAULT_MIN_BOX_AREA),
                max_movement: tracker.max_movement.unwrap_or(DEFAULT_MAX_MOVEMENT),
                min_movement: tracker.min_movement.unwrap_or(DEFAULT_MIN_MOVEMENT),
                inactive_timeout_ms: tracker
                    .inactive_timeout_ms
                    .unwrap_or(DEFAULT_INACTIVE_TIMEOUT_MS),
                expiry_ms: tracker.expiry_ms.unwrap_or(DEFAULT_EXPIRY_MS),
            },
            transition: TransitionSettings {
                enter_debounce_ms: transition
                    .enter_debounce_ms
                    .unwrap_or(DEFAULT_ENTER_DEBOUNCE_MS),
                exit_debounce_ms: transition
                    .exit_debounce_ms
                    .unwrap_or(DEFAULT_EXIT_DEBOUNCE_MS),
                enter_duration_ms: transition
                    .enter_duration_ms
                    .unwrap_or(DEFAULT_ENTER_DURATION_MS),
                exit_duration_ms: transition
                    .exit_duration_ms
                    .unwrap_or(DEFAULT_EXIT_DURATION_MS),
            },
            grid: GridSettings {
                min_rows: grid.min_rows.unwrap_or(DEFAULT_GRID_MIN),
                max_rows: grid.max_rows.unwrap_or(DEFAULT_GRID_MAX),
                min_cols: grid.min_cols.unwrap_or(DEFAULT_GRID_MIN),
                max_cols: grid.max_cols.unwrap_or(DEFAULT_GRID_MAX),
                max_grid_probability: grid
                    .max_grid_probability
                    .unwrap_or(DEFAULT_MAX_GRID_PROBABILITY),
                refresh_median_ms: grid.refresh_median_ms.unwrap_or(DEFAULT_REFRESH_MEDIAN_MS),
                refresh_uncertainty_ms: grid
                    .refresh_uncertainty_ms
                    .unwrap_or(DEFAULT_REFRESH_UNCERTAINTY_MS),
            },
            merge: MergeSettings {
                max_merges: merge.max_merges.unwrap_or(DEFAULT_MAX_MERGES),
                span_scale: merge.span_scale.unwrap_or(DEFAULT_SPAN_SCALE),
                default_shape_cap: merge.default_shape_cap.unwrap_or(DEFAULT_SHAPE_CAP),
                shape_caps: merge.shape_caps.unwrap_or_default(),
                overlap: merge.overlap.unwrap_or_default(),
            },
            jitter: JitterSettings {
                max_offset_x: jitter.max_offset_x.unwrap_or(DEFAULT_MAX_OFFSET),
                max_offset_y: jitter.max_offset_y.unwrap_or(DEFAULT_MAX_OFFSET),
            },
            focus: FocusSettings {
                follow_speed: focus.follow_speed.unwrap_or(DEFAULT_FOLLOW_SPEED),
            },
            render: RenderSettings {
                base_zoom: render.base_zoom.unwrap_or(DEFAULT_BASE_ZOOM),
                merged_zoom: render.merged_zoom.unwrap_or(DEFAULT_MERGED_ZOOM),
            },
            detection: DetectionSettings {
                process_every_nth_frame: detection
                    .process_every_nth_frame
                    .unwrap_or(DEFAULT_PROCESS_EVERY_NTH_FRAME),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(width) = parse_env::<u32>("GRIDMORPH_OUTPUT_WIDTH")? {
            self.output.width = width;
        }
        if let Some(height) = parse_env::<u32>("GRIDMORPH_OUTPUT_HEIGHT")? {
            self.output.height = height;
        }
        if let Some(seed) = parse_env::<u64>("GRIDMORPH_SEED")? {
            self.seed = Some(seed);
        }
        if let Some(max) = parse_env::<u32>("GRIDMORPH_GRID_MAX")? {
            self.grid.max_rows = max;
            self.grid.max_cols = max;
        }
        if let Some(speed) = parse_env::<f32>("GRIDMORPH_FOLLOW_SPEED")? {
            self.focus.follow_speed = speed;
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// Every later stage assumes at least one row and one column.
    pub fn validate(&self) -> Result<()> {
        if self.output.width == 0 || self.output.height == 0 {
            return Err(anyhow!(
                "output size must be non-zero (got {}x{})",
                self.output.width,
                self.output.height
            ));
        }

        let grid = &self.grid;
        if grid.min_rows == 0 || grid.min_cols == 0 {
            return Err(anyhow!("grid minimum rows and cols must be at least 1"));
        }
        if grid.min_rows > grid.max_rows {
            return Err(anyhow!(
                "grid min_rows {} exceeds max_rows {}",
                grid.min_rows,
                grid.max_rows
            ));
        }
        if grid.min_cols > grid.max_cols {
            return Err(anyhow!(
                "grid min_cols {} exceeds max_cols {}",
                grid.min_cols,
                grid.max_cols
            ));
        }
        if grid.max_rows > MAX_GRID_DIM || grid.max_cols > MAX_GRID_DIM {
            return Err(anyhow!(
                "grid max {}x{} exceeds the {}x{} limit",
                grid.max_rows,
                grid.max_cols,
                MAX_GRID_DIM,
                MAX_GRID_DIM
            ));
        }
        if !(0.0..=1.0).contains(&grid.max_grid_probability) {
            return Err(anyhow!("max_grid_probability must be within [0, 1]"));
        }

        let tracker = &self.tracker;
        if !(0.0..=1.0).contains(&tracker.min_confidence) {
            return Err(anyhow!("tracker min_confidence must be within [0, 1]"));
        }
        if !(tracker.min_box_area >= 0.0) {
            return Err(anyhow!("tracker min_box_area must be non-negative"));
        }
        if !(tracker.max_movement > 0.0) {
            return Err(anyhow!("tracker max_movement must be positive"));
        }
        if !(tracker.min_movement >= 0.0) || tracker.min_movement >= tracker.max_movement {
            return Err(anyhow!(
                "tracker min_movement {} must be non-negative and below max_movement {}",
                tracker.min_movement,
                tracker.max_movement
            ));
        }
        if tracker.inactive_timeout_ms > tracker.expiry_ms {
            return Err(anyhow!(
                "inactive_timeout_ms {} must not exceed expiry_ms {}",
                tracker.inactive_timeout_ms,
                tracker.expiry_ms
            ));
        }

        if self.merge.span_scale == 0 || self.merge.span_scale > MAX_GRID_DIM / 2 {
            return Err(anyhow!(
                "merge span_scale must be within 1..={} (got {})",
                MAX_GRID_DIM / 2,
                self.merge.span_scale
            ));
        }
        let jitter_ok = |offset: f32| offset >= 0.0 && offset.is_finite();
        if !jitter_ok(self.jitter.max_offset_x) || !jitter_ok(self.jitter.max_offset_y) {
            return Err(anyhow!("jitter offsets must be finite and non-negative"));
        }
        if !(self.focus.follow_speed > 0.0 && self.focus.follow_speed <= 1.0) {
            return Err(anyhow!("focus follow_speed must be within (0, 1]"));
        }
        let zoom_ok = |zoom: f32| zoom >= 1.0 && zoom.is_finite();
        if !zoom_ok(self.render.base_zoom) || !zoom_ok(self.render.merged_zoom) {
            return Err(anyhow!("render zoom factors must be finite and at least 1.0"));
        }
        if self.detection.process_every_nth_frame == 0 {
            return Err(anyhow!("process_every_nth_frame must be at least 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<EngineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    let Ok(value) = std::env::var(key) else {
        return Ok(None);
    };
    if value.trim().is_empty() {
        return Ok(None);
    }
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| anyhow!("{} has an invalid value: {}", key, value))
}
