//! Grid morph engine.
//!
//! Owns grid dimensionality, cell merge topology and per-cell jitter. The
//! grid is regenerated on a randomised timer while nothing is happening,
//! merged and jittered once per enter ramp, and flattened again when an exit
//! ramp completes.
//!
//! All randomness comes from the caller's generator so runs are reproducible
//! under a fixed seed.

use anyhow::{anyhow, Result};
use rand::Rng;
use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use crate::config::{EngineConfig, GridSettings, JitterSettings, MergeSettings, OverlapPolicy};
use crate::{Millis, Vec2};

// ----------------------------------------------------------------------------
// Grid<T>: row-major 2D container
// ----------------------------------------------------------------------------

/// Dynamically sized row-major 2D container.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn new(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            rows,
            cols,
            cells: vec![fill; rows * cols],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.cells.iter_mut().for_each(|cell| *cell = value.clone());
    }
}

impl<T> Grid<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// Cells in row-major order with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (i / cols, i % cols, cell))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.cells.iter_mut()
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(row < self.rows && col < self.cols, "grid index out of bounds");
        &self.cells[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(row < self.rows && col < self.cols, "grid index out of bounds");
        &mut self.cells[row * self.cols + col]
    }
}

// ----------------------------------------------------------------------------
// CellSpan / GridState
// ----------------------------------------------------------------------------

/// Merge role of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellSpan {
    /// Ordinary 1x1 cell.
    Single,
    /// Top-left cell of a merged rectangle.
    Origin { rows: u32, cols: u32 },
    /// Covered by a neighbouring origin; never drawn on its own.
    Absorbed,
}

impl CellSpan {
    /// `(rows, cols)` drawn from this cell, `None` for absorbed cells.
    pub fn dims(self) -> Option<(u32, u32)> {
        match self {
            CellSpan::Single => Some((1, 1)),
            CellSpan::Origin { rows, cols } => Some((rows, cols)),
            CellSpan::Absorbed => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GridState {
    pub rows: u32,
    pub cols: u32,
    pub cell_width: f32,
    pub cell_height: f32,
    pub spans: Grid<CellSpan>,
    /// Jitter as a fraction of the cell size.
    pub offsets: Grid<Vec2>,
}

impl GridState {
    pub fn new(rows: u32, cols: u32, output_width: u32, output_height: u32) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(anyhow!("grid must have at least one row and column"));
        }
        if output_width == 0 || output_height == 0 {
            return Err(anyhow!("output size must be non-zero"));
        }
        Ok(Self {
            rows,
            cols,
            cell_width: output_width as f32 / cols as f32,
            cell_height: output_height as f32 / rows as f32,
            spans: Grid::new(rows as usize, cols as usize, CellSpan::Single),
            offsets: Grid::new(rows as usize, cols as usize, Vec2::ZERO),
        })
    }

    pub fn resize_output(&mut self, output_width: u32, output_height: u32) -> Result<()> {
        if output_width == 0 || output_height == 0 {
            return Err(anyhow!(
                "output size must be non-zero (got {}x{})",
                output_width,
                output_height
            ));
        }
        self.cell_width = output_width as f32 / self.cols as f32;
        self.cell_height = output_height as f32 / self.rows as f32;
        Ok(())
    }

    /// Every span back to 1x1, every jitter back to zero.
    pub fn reset(&mut self) {
        self.spans.fill(CellSpan::Single);
        self.offsets.fill(Vec2::ZERO);
    }

    pub fn merge_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|(_, _, span)| matches!(span, CellSpan::Origin { .. }))
            .count()
    }

    /// Check span topology: origins stay inside the grid and every absorbed
    /// cell is covered by exactly one origin.
    pub fn check_topology(&self) -> Result<()> {
        let mut coverage: Grid<u32> = Grid::new(self.spans.rows(), self.spans.cols(), 0);
        for (row, col, span) in self.spans.iter() {
            let CellSpan::Origin { rows, cols } = *span else {
                continue;
            };
            let (end_row, end_col) = (row + rows as usize, col + cols as usize);
            if end_row > self.spans.rows() || end_col > self.spans.cols() {
                return Err(anyhow!(
                    "merge at ({}, {}) spanning {}x{} exceeds {}x{} grid",
                    row,
                    col,
                    rows,
                    cols,
                    self.rows,
                    self.cols
                ));
            }
            for r in row..end_row {
                for c in col..end_col {
                    if (r, c) != (row, col) {
                        coverage[(r, c)] += 1;
                    }
                }
            }
        }
        for (row, col, span) in self.spans.iter() {
            let covered = coverage[(row, col)];
            match span {
                CellSpan::Absorbed if covered != 1 => {
                    return Err(anyhow!(
                        "absorbed cell ({}, {}) covered by {} origins",
                        row,
                        col,
                        covered
                    ));
                }
                CellSpan::Absorbed => {}
                _ if covered != 0 => {
                    return Err(anyhow!(
                        "cell ({}, {}) lies inside a merge but is not absorbed",
                        row,
                        col
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// GridMorpher
// ----------------------------------------------------------------------------

pub struct GridMorpher {
    grid_settings: GridSettings,
    merge_settings: MergeSettings,
    jitter_settings: JitterSettings,
    output_width: u32,
    output_height: u32,
    state: GridState,
    next_refresh_ms: Millis,
}

impl GridMorpher {
    /// Build the first grid and schedule its refresh.
    pub fn new(cfg: &EngineConfig, rng: &mut impl Rng, now: Millis) -> Result<Self> {
        cfg.validate()?;
        let state = GridState::new(
            cfg.grid.min_rows,
            cfg.grid.min_cols,
            cfg.output.width,
            cfg.output.height,
        )?;
        let mut morpher = Self {
            grid_settings: cfg.grid.clone(),
            merge_settings: cfg.merge.clone(),
            jitter_settings: cfg.jitter.clone(),
            output_width: cfg.output.width,
            output_height: cfg.output.height,
            state,
            next_refresh_ms: now,
        };
        morpher.regenerate(rng, now)?;
        Ok(morpher)
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    pub fn next_refresh_ms(&self) -> Millis {
        self.next_refresh_ms
    }

    pub fn refresh_due(&self, now: Millis) -> bool {
        now >= self.next_refresh_ms
    }

    /// Pick new grid dimensions and reschedule the refresh timer.
    ///
    /// Callers must only do this while no transition is pending or ramping.
    pub fn regenerate(&mut self, rng: &mut impl Rng, now: Millis) -> Result<()> {
        let g = &self.grid_settings;
        let (rows, cols) = if rng.gen_bool(g.max_grid_probability as f64) {
            (g.max_rows, g.max_cols)
        } else {
            (
                rng.gen_range(g.min_rows..=g.max_rows),
                rng.gen_range(g.min_cols..=g.max_cols),
            )
        };
        self.state = GridState::new(rows, cols, self.output_width, self.output_height)?;
        self.schedule_refresh(rng, now);
        log::debug!(
            "grid: regenerated {}x{} (cell {:.1}x{:.1}), next refresh at {}ms",
            rows,
            cols,
            self.state.cell_width,
            self.state.cell_height,
            self.next_refresh_ms
        );
        Ok(())
    }

    fn schedule_refresh(&mut self, rng: &mut impl Rng, now: Millis) {
        let median = self.grid_settings.refresh_median_ms;
        let spread = self.grid_settings.refresh_uncertainty_ms;
        let jitter = if spread == 0 {
            0
        } else {
            rng.gen_range(-(spread as i64)..=spread as i64)
        };
        let interval = (median as i64 + jitter).max(0) as Millis;
        self.next_refresh_ms = now.saturating_add(interval);
    }

    /// Recompute cell sizes for a new output surface. Topology is untouched.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.state.resize_output(width, height)?;
        self.output_width = width;
        self.output_height = height;
        Ok(())
    }

    /// Ramp toward "detected" began: place random merges and jitter every cell.
    ///
    /// Returns the number of merges placed.
    pub fn on_enter_ramp_start(&mut self, rng: &mut impl Rng) -> usize {
        self.state.reset();
        let placed = self.place_merges(rng);
        self.assign_jitter(rng);
        log::debug!(
            "grid: {} merges placed on {}x{} grid",
            placed,
            self.state.rows,
            self.state.cols
        );
        placed
    }

    /// Ramp toward "undetected" completed: clear merges and jitter.
    pub fn on_exit_ramp_complete(&mut self) {
        self.state.reset();
    }

    fn place_merges(&mut self, rng: &mut impl Rng) -> usize {
        let attempts = rng.gen_range(0..=self.merge_settings.max_merges);
        let scale = self.merge_settings.span_scale;
        let (rows, cols) = (self.state.rows, self.state.cols);
        let mut shape_counts: HashMap<(u32, u32), u32> = HashMap::new();
        let mut placed = 0;

        for _ in 0..attempts {
            let row = rng.gen_range(0..rows);
            let col = rng.gen_range(0..cols);
            let span_rows = rng.gen_range(1..=2u32).saturating_mul(scale);
            let span_cols = rng.gen_range(1..=2u32).saturating_mul(scale);

            if span_rows == 1 && span_cols == 1 {
                continue;
            }
            if row.saturating_add(span_rows) > rows || col.saturating_add(span_cols) > cols {
                continue;
            }
            let count = shape_counts.entry((span_rows, span_cols)).or_insert(0);
            if *count >= self.merge_settings.cap_for(span_rows, span_cols) {
                continue;
            }
            if self.merge_settings.overlap == OverlapPolicy::Reject
                && !self.region_is_free(row, col, span_rows, span_cols)
            {
                continue;
            }

            *count += 1;
            placed += 1;
            self.mark_merge(row, col, span_rows, span_cols);
        }
        placed
    }

    fn region_is_free(&self, row: u32, col: u32, span_rows: u32, span_cols: u32) -> bool {
        (row..row + span_rows).all(|r| {
            (col..col + span_cols)
                .all(|c| self.state.spans[(r as usize, c as usize)] == CellSpan::Single)
        })
    }

    fn mark_merge(&mut self, row: u32, col: u32, span_rows: u32, span_cols: u32) {
        for r in row..row + span_rows {
            for c in col..col + span_cols {
                self.state.spans[(r as usize, c as usize)] = if (r, c) == (row, col) {
                    CellSpan::Origin {
                        rows: span_rows,
                        cols: span_cols,
                    }
                } else {
                    CellSpan::Absorbed
                };
            }
        }
    }

    fn assign_jitter(&mut self, rng: &mut impl Rng) {
        let max_x = self.jitter_settings.max_offset_x;
        let max_y = self.jitter_settings.max_offset_y;
        for offset in self.state.offsets.iter_mut() {
            *offset = Vec2::new(symmetric(rng, max_x), symmetric(rng, max_y));
        }
    }
}

fn symmetric(rng: &mut impl Rng, bound: f32) -> f32 {
    if bound > 0.0 {
        rng.gen_range(-bound..=bound)
    } else {
        0.0
    }
}
