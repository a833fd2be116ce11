//! Per-frame output for the external renderer.
//!
//! A `RenderFrame` carries everything needed to draw the grid without touching
//! tracking state: for every drawable cell the destination rectangle in output
//! pixels and the source crop in normalized frame coordinates.
//!
//! Crop geometry: at ramp 0 each cell samples exactly its own region of the
//! frame. As the ramp rises the whole grid samples a window shrunk by
//! `base_zoom` and centred on the focus point; merge origins zoom further
//! toward `merged_zoom`, and each cell's jitter displaces its crop.

use crate::config::RenderSettings;
use crate::grid::{CellSpan, GridState};
use crate::transition::Phase;
use crate::{lerp, Vec2};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Shift (never resize) so the rect lies inside the unit square.
    fn clamp_to_unit(self) -> Rect {
        let w = self.w.min(1.0);
        let h = self.h.min(1.0);
        Rect {
            x: self.x.clamp(0.0, 1.0 - w),
            y: self.y.clamp(0.0, 1.0 - h),
            w,
            h,
        }
    }

    fn scaled_about_center(self, factor: f32) -> Rect {
        let c = self.center();
        let w = self.w * factor;
        let h = self.h * factor;
        Rect::new(c.x - w / 2.0, c.y - h / 2.0, w, h)
    }
}

/// One drawable cell. Absorbed cells never appear.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellRender {
    pub row: u32,
    pub col: u32,
    pub span: CellSpan,
    /// Jitter as a fraction of the cell size.
    pub offset: Vec2,
    /// Destination in output pixels.
    pub draw: Rect,
    /// Source crop in normalized frame coordinates.
    pub crop: Rect,
}

#[derive(Clone, Debug)]
pub struct RenderFrame {
    pub rows: u32,
    pub cols: u32,
    pub cell_width: f32,
    pub cell_height: f32,
    pub phase: Phase,
    pub progress: f32,
    pub ramp_value: f32,
    pub focus: Vec2,
    pub person_detected: bool,
    pub active_person_count: usize,
    pub cells: Vec<CellRender>,
}

/// Lay out every drawable cell of `grid` for the given ramp and focus.
pub fn layout_cells(
    grid: &GridState,
    ramp: f32,
    focus: Vec2,
    settings: &RenderSettings,
) -> Vec<CellRender> {
    let ramp = if ramp.is_finite() {
        ramp.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let focus = if focus.is_finite() {
        focus
    } else {
        Vec2::CENTER
    };
    let base_zoom = settings.base_zoom.max(1.0);
    let merged_extra = (settings.merged_zoom / base_zoom).max(1.0);

    let window_size = 1.0 / lerp(1.0, base_zoom, ramp);
    let window_center = Vec2::CENTER.lerp(focus, ramp);
    let window = Rect::new(
        window_center.x - window_size / 2.0,
        window_center.y - window_size / 2.0,
        window_size,
        window_size,
    )
    .clamp_to_unit();

    let rows = grid.rows as f32;
    let cols = grid.cols as f32;
    let mut cells = Vec::with_capacity(grid.spans.rows() * grid.spans.cols());

    for (row, col, span) in grid.spans.iter() {
        let Some((span_rows, span_cols)) = span.dims() else {
            continue;
        };
        let offset = grid.offsets[(row, col)];
        let (r, c) = (row as f32, col as f32);
        let (sr, sc) = (span_rows as f32, span_cols as f32);

        let draw = Rect::new(
            c * grid.cell_width,
            r * grid.cell_height,
            sc * grid.cell_width,
            sr * grid.cell_height,
        );

        let mut crop = Rect::new(
            window.x + (c / cols) * window.w,
            window.y + (r / rows) * window.h,
            (sc / cols) * window.w,
            (sr / rows) * window.h,
        );
        if matches!(span, CellSpan::Origin { .. }) {
            crop = crop.scaled_about_center(1.0 / lerp(1.0, merged_extra, ramp));
        }
        crop.x += offset.x * crop.w * ramp;
        crop.y += offset.y * crop.h * ramp;

        cells.push(CellRender {
            row: row as u32,
            col: col as u32,
            span: *span,
            offset,
            draw,
            crop: crop.clamp_to_unit(),
        });
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RenderSettings {
        RenderSettings {
            base_zoom: 2.0,
            merged_zoom: 4.0,
        }
    }

    fn approx(a: Rect, b: Rect) -> bool {
        (a.x - b.x).abs() < 1e-5
            && (a.y - b.y).abs() < 1e-5
            && (a.w - b.w).abs() < 1e-5
            && (a.h - b.h).abs() < 1e-5
    }

    #[test]
    fn ramp_zero_crops_each_cell_to_its_own_region() {
        let mut grid = GridState::new(2, 4, 400, 200).unwrap();
        grid.offsets[(1, 1)] = Vec2::new(0.4, 0.4);
        let cells = layout_cells(&grid, 0.0, Vec2::new(0.9, 0.1), &settings());

        assert_eq!(cells.len(), 8);
        let cell = cells.iter().find(|c| (c.row, c.col) == (1, 1)).unwrap();
        assert!(approx(cell.draw, Rect::new(100.0, 100.0, 100.0, 100.0)));
        assert!(approx(cell.crop, Rect::new(0.25, 0.5, 0.25, 0.5)));
    }

    #[test]
    fn absorbed_cells_are_skipped_and_origins_span() {
        let mut grid = GridState::new(2, 2, 200, 200).unwrap();
        grid.spans[(0, 0)] = CellSpan::Origin { rows: 2, cols: 1 };
        grid.spans[(1, 0)] = CellSpan::Absorbed;
        let cells = layout_cells(&grid, 0.0, Vec2::CENTER, &settings());

        assert_eq!(cells.len(), 3);
        let origin = cells.iter().find(|c| (c.row, c.col) == (0, 0)).unwrap();
        assert!(approx(origin.draw, Rect::new(0.0, 0.0, 100.0, 200.0)));
    }

    #[test]
    fn full_ramp_zooms_toward_focus_and_stays_in_frame() {
        let grid = GridState::new(1, 1, 100, 100).unwrap();
        let centred = layout_cells(&grid, 1.0, Vec2::CENTER, &settings());
        assert!(approx(centred[0].crop, Rect::new(0.25, 0.25, 0.5, 0.5)));

        let corner = layout_cells(&grid, 1.0, Vec2::new(1.0, 1.0), &settings());
        assert!(approx(corner[0].crop, Rect::new(0.5, 0.5, 0.5, 0.5)));
    }

    #[test]
    fn non_finite_inputs_fall_back_to_neutral() {
        let grid = GridState::new(1, 1, 100, 100).unwrap();
        let cells = layout_cells(&grid, f32::NAN, Vec2::new(f32::NAN, 0.0), &settings());
        assert!(approx(cells[0].crop, Rect::new(0.0, 0.0, 1.0, 1.0)));
    }
}
