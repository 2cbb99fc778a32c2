// THEORY:
// This file is the entry point for the `line_length_counter` library crate.
// It defines the public API exposed to front ends such as the `line_tester`
// command-line tool or an image-analysis host plugin.
//
// The high-level interface is the `MeasurementPipeline` (one grid in, one
// `LineReport` out) and its batch counterpart, the `ParallelPipeline`. The
// building blocks in `core_modules` - the grid, the scanner, calibration and
// reporting - stay public for callers that need finer control, e.g. scanning a
// single axis with a progress observer.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
