// THEORY:
// The `LineScanner` is the measuring engine. It walks a binarized grid one scan
// line at a time - every row for the horizontal axis, every column for the
// vertical axis - and reports each stretch of void pixels that is bounded by
// material as a "run" with a length in pixels.
//
// Key architectural principles:
// 1.  **One Routine, Two Axes**: Both axes share a single traversal. The axis
//     only decides which coordinate is "outer" (the line being scanned) and which
//     is "inner" (the position along it), and supplies a transposed accessor.
// 2.  **Streaming, O(1) State**: A line is described completely by its opening
//     boundary (the previous material pixel, or the virtual position -1 before
//     the first pixel) and its closing boundary (the next material pixel, or the
//     far edge). Nothing else is buffered.
// 3.  **Independent Lines**: All state resets at the start of every outer line.
//     The only thing that survives across lines - and across axes - is the
//     numbering of detected lines, which lives with the caller.
// 4.  **Border Policy**: A run that opens at -1 or closes at the far edge touches
//     the image border. Whether such runs count is the caller's choice
//     (`ignore_border_lines`). A run spanning an entire line never counts: it
//     means no material was found to bound it.
// 5.  **Pixel Units Only**: Calibration is applied later. The scanner knows
//     nothing about micrometres.

use crate::core_modules::pixel_grid::pixel_grid::{Intensity, PixelGrid};
use crate::core_modules::scan_parameters::ScanParameters;
use crate::error::MeasureError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;

/// Intensity of solid material (black).
pub const MATERIAL_COLOR: Intensity = 0;
/// Intensity of voids, pores and cracks (white).
pub const VOID_COLOR: Intensity = 255;

/// The direction along which lines are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanAxis {
    /// Scan every row from left to right.
    Horizontal,
    /// Scan every column from top to bottom.
    Vertical,
}

impl ScanAxis {
    /// Number of scan lines: rows for horizontal, columns for vertical.
    pub fn outer_len(self, grid: &PixelGrid) -> usize {
        match self {
            ScanAxis::Horizontal => grid.height(),
            ScanAxis::Vertical => grid.width(),
        }
    }

    /// Number of pixels along one scan line.
    pub fn inner_len(self, grid: &PixelGrid) -> usize {
        match self {
            ScanAxis::Horizontal => grid.width(),
            ScanAxis::Vertical => grid.height(),
        }
    }

    #[inline]
    fn pixel(self, grid: &PixelGrid, outer: usize, inner: usize) -> Intensity {
        match self {
            ScanAxis::Horizontal => grid.pixel(inner, outer),
            ScanAxis::Vertical => grid.pixel(outer, inner),
        }
    }
}

impl fmt::Display for ScanAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanAxis::Horizontal => write!(f, "horizontal"),
            ScanAxis::Vertical => write!(f, "vertical"),
        }
    }
}

/// A qualifying run found on one scan line, still in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRun {
    pub axis: ScanAxis,
    /// Row (horizontal) or column (vertical) the run was found on.
    pub outer: usize,
    /// Inner coordinate of the closing boundary.
    pub end: usize,
    /// Distance between the opening and closing boundary.
    pub pixel_length: usize,
    /// True when the run opens at the virtual start or closes at the far edge.
    pub touches_border: bool,
}

impl LineRun {
    /// Inner coordinate of the opening boundary; -1 for the virtual start.
    pub fn start(&self) -> isize {
        self.end as isize - self.pixel_length as isize
    }
}

/// Progress of a scan, reported once per finished outer line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub axis: ScanAxis,
    pub lines_done: usize,
    pub lines_total: usize,
}

/// Receives progress during a scan and may stop it.
pub trait ScanObserver {
    fn outer_line_done(&mut self, progress: ScanProgress) -> ControlFlow<()>;
}

impl<F> ScanObserver for F
where
    F: FnMut(ScanProgress) -> ControlFlow<()>,
{
    fn outer_line_done(&mut self, progress: ScanProgress) -> ControlFlow<()> {
        self(progress)
    }
}

/// Observer that never interrupts.
pub struct Unobserved;

impl ScanObserver for Unobserved {
    fn outer_line_done(&mut self, _progress: ScanProgress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Stateless run-length scanner over binarized grids.
#[derive(Debug, Clone)]
pub struct LineScanner {
    parameters: ScanParameters,
}

impl LineScanner {
    pub fn new(parameters: ScanParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &ScanParameters {
        &self.parameters
    }

    /// Scans every line of `axis` and returns the qualifying runs in detection order.
    pub fn scan(&self, grid: &PixelGrid, axis: ScanAxis) -> Vec<LineRun> {
        let inner_len = axis.inner_len(grid);
        let mut runs = Vec::new();
        for outer in 0..axis.outer_len(grid) {
            self.scan_line(axis, outer, inner_len, |inner| axis.pixel(grid, outer, inner), &mut runs);
        }
        runs
    }

    /// Like [`scan`](Self::scan), but checks `observer` after every outer line.
    pub fn scan_with_observer<O: ScanObserver>(
        &self,
        grid: &PixelGrid,
        axis: ScanAxis,
        observer: &mut O,
    ) -> Result<Vec<LineRun>, MeasureError> {
        let lines_total = axis.outer_len(grid);
        let inner_len = axis.inner_len(grid);
        let mut runs = Vec::new();

        for outer in 0..lines_total {
            self.scan_line(axis, outer, inner_len, |inner| axis.pixel(grid, outer, inner), &mut runs);

            let progress = ScanProgress {
                axis,
                lines_done: outer + 1,
                lines_total,
            };
            if observer.outer_line_done(progress).is_break() {
                return Err(MeasureError::Interrupted {
                    axis,
                    lines_done: outer + 1,
                });
            }
        }
        Ok(runs)
    }

    /// Scans one outer line. `pixel_at` maps an inner coordinate to an intensity.
    fn scan_line<F>(&self, axis: ScanAxis, outer: usize, inner_len: usize, pixel_at: F, runs: &mut Vec<LineRun>)
    where
        F: Fn(usize) -> Intensity,
    {
        let mut last_boundary: isize = -1;
        let mut last_value: Option<Intensity> = None;

        for inner in 0..inner_len {
            let value = pixel_at(inner);
            let border_reached = inner + 1 == inner_len;

            if value == MATERIAL_COLOR {
                // Material right after void closes a run; material after material
                // only moves the opening boundary forward.
                if last_value.is_some_and(|previous| previous != MATERIAL_COLOR) {
                    let touches_border = last_boundary < 0;
                    self.close_run(axis, outer, inner, last_boundary, inner_len, touches_border, runs);
                }
                last_boundary = inner as isize;
            } else if border_reached {
                self.close_run(axis, outer, inner, last_boundary, inner_len, true, runs);
            }

            last_value = Some(value);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn close_run(
        &self,
        axis: ScanAxis,
        outer: usize,
        end: usize,
        opened_at: isize,
        inner_len: usize,
        touches_border: bool,
        runs: &mut Vec<LineRun>,
    ) {
        if touches_border && self.parameters.ignore_border_lines {
            return;
        }
        let pixel_length = (end as isize - opened_at) as usize;
        // A run as long as the whole line had no boundary at all.
        if pixel_length == inner_len || pixel_length <= self.parameters.min_line_length {
            return;
        }
        runs.push(LineRun {
            axis,
            outer,
            end,
            pixel_length,
            touches_border,
        });
    }
}
