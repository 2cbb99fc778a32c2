// THEORY:
// The measurement core itself cannot fail: a well-formed grid always scans to
// completion. Everything that *can* go wrong happens at the edges of the
// library: a buffer of the wrong size, an image file that cannot be read or
// decoded, a nonsensical calibration or options string, histograms that do not
// line up, a caller asking the scan to stop, or the worker pool going away
// underneath a request.
// `MeasureError` collects those cases in one flat enum so callers can match on
// them or just bubble them up with `?`.

use crate::core_modules::line_scanner::ScanAxis;
use std::fmt;

#[derive(Debug)]
pub enum MeasureError {
    /// A pixel buffer does not match the declared dimensions.
    SizeMismatch { expected: usize, actual: usize },
    /// Pixel sizes must be finite and strictly positive.
    InvalidCalibration(String),
    /// A macro-options string could not be turned into scan parameters.
    InvalidOptions(String),
    /// The scan observer asked to stop before the axis was finished.
    Interrupted { axis: ScanAxis, lines_done: usize },
    /// Histograms built over different bucket edges cannot be merged.
    BucketMismatch,
    /// The image could not be opened or decoded.
    Image(image::ImageError),
    /// An image file could not be read for its metadata.
    Io(std::io::Error),
    /// The worker pool dropped a task or its reply.
    WorkerUnavailable,
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected} pixels, got {actual}")
            }
            Self::InvalidCalibration(reason) => write!(f, "invalid calibration: {reason}"),
            Self::InvalidOptions(reason) => write!(f, "invalid scan options: {reason}"),
            Self::Interrupted { axis, lines_done } => {
                write!(f, "{axis} scan interrupted after {lines_done} lines")
            }
            Self::BucketMismatch => write!(f, "histograms use different bucket edges"),
            Self::Image(err) => write!(f, "image error: {err}"),
            Self::Io(err) => write!(f, "i/o error: {err}"),
            Self::WorkerUnavailable => write!(f, "measurement worker pool is unavailable"),
        }
    }
}

impl std::error::Error for MeasureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<image::ImageError> for MeasureError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err)
    }
}

impl From<std::io::Error> for MeasureError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
