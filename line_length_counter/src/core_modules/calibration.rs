// THEORY:
// A `Calibration` ties the pixel grid to the physical world: how many physical
// units one pixel spans horizontally and vertically, and what those units are
// called. Pixels need not be square, so the two axes carry separate factors and
// a detected line is scaled by the factor of the axis it was found on.

use crate::core_modules::line_scanner::ScanAxis;
use crate::error::MeasureError;
use serde::{Deserialize, Serialize};

/// Unit label of an uncalibrated image.
pub const PIXEL_UNIT: &str = "pixel";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Physical units per pixel along x.
    pub pixel_width: f64,
    /// Physical units per pixel along y.
    pub pixel_height: f64,
    pub unit: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixel_width: 1.0,
            pixel_height: 1.0,
            unit: PIXEL_UNIT.to_string(),
        }
    }
}

impl Calibration {
    pub fn new(pixel_width: f64, pixel_height: f64, unit: impl Into<String>) -> Result<Self, MeasureError> {
        let calibration = Self {
            pixel_width,
            pixel_height,
            unit: unit.into(),
        };
        calibration.validate()?;
        Ok(calibration)
    }

    /// Square pixels of `pixel_size` units.
    pub fn isotropic(pixel_size: f64, unit: impl Into<String>) -> Result<Self, MeasureError> {
        Self::new(pixel_size, pixel_size, unit)
    }

    pub fn validate(&self) -> Result<(), MeasureError> {
        for (name, value) in [("pixel_width", self.pixel_width), ("pixel_height", self.pixel_height)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MeasureError::InvalidCalibration(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// True when this differs from the identity "1 pixel = 1 pixel".
    pub fn scaled(&self) -> bool {
        self.pixel_width != 1.0 || self.pixel_height != 1.0 || self.unit != PIXEL_UNIT
    }

    pub fn pixel_size(&self, axis: ScanAxis) -> f64 {
        match axis {
            ScanAxis::Horizontal => self.pixel_width,
            ScanAxis::Vertical => self.pixel_height,
        }
    }

    pub fn to_physical(&self, axis: ScanAxis, pixel_length: usize) -> f64 {
        self.pixel_size(axis) * pixel_length as f64
    }
}
