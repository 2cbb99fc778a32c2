// THEORY:
// The `pipeline` module is the top-level API of the measurement engine. It wraps
// the full stack - axis selection, run-length scanning, line numbering and
// calibration - behind a single call: give it a grid, get back a `LineReport`.
//
// Stages of one measurement:
// 1.  **Axis Selection**: `ScanParameters::axes` decides which passes run,
//     always horizontal before vertical.
// 2.  **Scanning**: The `LineScanner` produces pixel-unit runs per axis.
// 3.  **Numbering & Calibration**: Runs are numbered globally (the counter is
//     threaded from one pass into the next) and scaled to physical units.
//
// The pipeline holds no per-image state, so one instance can measure any number
// of grids, and measuring the same grid twice gives the same report.

use crate::core_modules::line_report::number_runs;
use crate::core_modules::line_scanner::{LineRun, LineScanner};
use crate::core_modules::pixel_grid::pixel_grid::PixelGrid;
use crate::error::MeasureError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

// Re-export key data structures for the public API.
pub use crate::core_modules::calibration::Calibration;
pub use crate::core_modules::histogram::LengthHistogram;
pub use crate::core_modules::line_report::{DetectedLine, LineReport, ReportSink, TableSink};
pub use crate::core_modules::line_scanner::{
    MATERIAL_COLOR, ScanAxis, ScanObserver, ScanProgress, Unobserved, VOID_COLOR,
};
pub use crate::core_modules::scan_parameters::ScanParameters;
pub use crate::core_modules::sem_metadata::SemMetadata;

/// Configuration for the MeasurementPipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub parameters: ScanParameters,
    pub calibration: Calibration,
}

/// Measures void lines on binarized grids.
#[derive(Debug, Clone)]
pub struct MeasurementPipeline {
    scanner: LineScanner,
    config: PipelineConfig,
}

impl MeasurementPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, MeasureError> {
        config.calibration.validate()?;
        Ok(Self {
            scanner: LineScanner::new(config.parameters),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn generate_report(&self, grid: &PixelGrid) -> LineReport {
        let Ok(report) = self.measure::<Infallible, _>(grid, &self.config.calibration, |axis| {
            Ok(self.scanner.scan(grid, axis))
        });
        report
    }

    /// Like `generate_report`, but scales with `calibration` instead of the
    /// configured one, e.g. a calibration read from the image's own metadata.
    pub fn generate_report_calibrated(
        &self,
        grid: &PixelGrid,
        calibration: &Calibration,
    ) -> Result<LineReport, MeasureError> {
        calibration.validate()?;
        self.measure(grid, calibration, |axis| Ok(self.scanner.scan(grid, axis)))
    }

    /// Like `generate_report`, but `observer` is consulted after every scan line
    /// and may abort the measurement.
    pub fn generate_report_with_observer<O: ScanObserver>(
        &self,
        grid: &PixelGrid,
        observer: &mut O,
    ) -> Result<LineReport, MeasureError> {
        self.measure(grid, &self.config.calibration, |axis| {
            self.scanner.scan_with_observer(grid, axis, &mut *observer)
        })
    }

    fn measure<E, F>(&self, grid: &PixelGrid, calibration: &Calibration, mut scan_axis: F) -> Result<LineReport, E>
    where
        F: FnMut(ScanAxis) -> Result<Vec<LineRun>, E>,
    {
        if !grid.is_binary() {
            warn!(
                "{}x{} grid holds intensities other than {} and {}; they are treated as void",
                grid.width(),
                grid.height(),
                MATERIAL_COLOR,
                VOID_COLOR
            );
        }

        let mut lines = Vec::new();
        let mut next_index = 1;

        for axis in self.config.parameters.axes() {
            let runs = scan_axis(axis)?;
            debug!(
                "{axis} pass over {} lines found {} runs",
                axis.outer_len(grid),
                runs.len()
            );
            let (numbered, following) = number_runs(runs, next_index, calibration);
            lines.extend(numbered);
            next_index = following;
        }

        Ok(LineReport::new(calibration.unit.clone(), lines))
    }
}

impl Default for MeasurementPipeline {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self {
            scanner: LineScanner::new(config.parameters),
            config,
        }
    }
}
