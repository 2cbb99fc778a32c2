// THEORY:
// The `LineReport` is the final product handed back to whoever asked for a
// measurement. It turns the scanner's pixel-unit runs into numbered,
// calibrated `DetectedLine`s and knows how to present them.
//
// Key architectural principles:
// 1.  **Global Numbering**: Line numbers start at 1 and increase by one per
//     detection across the whole measurement - horizontal lines first, then
//     vertical ones. The counter is threaded through `number_runs` by value
//     rather than kept in shared state.
// 2.  **Fixed Presentation**: The table format is what downstream spreadsheets
//     expect: a `Line-Nr.` / `length [<unit>]` header, tab separated, lengths
//     with four decimals.
// 3.  **Sink Agnostic**: Consumers that want to render rows themselves (a GUI
//     table, a results window) implement `ReportSink` and receive exactly the
//     (index, length) pairs.

use crate::core_modules::calibration::Calibration;
use crate::core_modules::line_scanner::{LineRun, ScanAxis};
use serde::{Deserialize, Serialize};
use std::io;

/// Decimal places used for physical lengths in tables.
pub const LENGTH_DECIMALS: usize = 4;

/// One measured line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLine {
    /// 1-based, global across both axes.
    pub index: usize,
    pub axis: ScanAxis,
    /// Row or column the line was found on.
    pub outer: usize,
    /// Inner coordinate of the closing boundary.
    pub end: usize,
    pub pixel_length: usize,
    /// `pixel_length` scaled by the calibration of `axis`.
    pub length: f64,
}

/// Numbers `runs` starting at `next_index` and returns the index for the next line.
pub fn number_runs(
    runs: Vec<LineRun>,
    next_index: usize,
    calibration: &Calibration,
) -> (Vec<DetectedLine>, usize) {
    let mut index = next_index;
    let lines = runs
        .into_iter()
        .map(|run| {
            let line = DetectedLine {
                index,
                axis: run.axis,
                outer: run.outer,
                end: run.end,
                pixel_length: run.pixel_length,
                length: calibration.to_physical(run.axis, run.pixel_length),
            };
            index += 1;
            line
        })
        .collect();
    (lines, index)
}

/// Receives a report row by row.
pub trait ReportSink {
    /// Called once before the first row with the calibration unit.
    fn begin(&mut self, unit: &str);
    fn accept(&mut self, index: usize, length: f64);
}

/// Collects rows as formatted table lines.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TableSink {
    pub rows: Vec<String>,
}

impl ReportSink for TableSink {
    fn begin(&mut self, unit: &str) {
        self.rows.push(table_header(unit));
    }

    fn accept(&mut self, index: usize, length: f64) {
        self.rows.push(format!("{index}\t{length:.prec$}", prec = LENGTH_DECIMALS));
    }
}

pub fn table_header(unit: &str) -> String {
    format!("Line-Nr.\tlength [{unit}]")
}

/// All lines measured on one grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineReport {
    pub unit: String,
    pub lines: Vec<DetectedLine>,
}

impl LineReport {
    pub fn new(unit: impl Into<String>, lines: Vec<DetectedLine>) -> Self {
        Self {
            unit: unit.into(),
            lines,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn count_on(&self, axis: ScanAxis) -> usize {
        self.lines.iter().filter(|line| line.axis == axis).count()
    }

    pub fn total_length(&self) -> f64 {
        self.lines.iter().map(|line| line.length).sum()
    }

    pub fn mean_length(&self) -> Option<f64> {
        if self.lines.is_empty() {
            return None;
        }
        Some(self.total_length() / self.lines.len() as f64)
    }

    pub fn emit<S: ReportSink + ?Sized>(&self, sink: &mut S) {
        sink.begin(&self.unit);
        for line in &self.lines {
            sink.accept(line.index, line.length);
        }
    }

    /// The report as a tab-separated table, one row per line.
    pub fn table(&self) -> String {
        let mut sink = TableSink::default();
        self.emit(&mut sink);
        sink.rows.join("\n")
    }

    pub fn write_table<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{}", self.table())
    }
}
