// THEORY:
// `ScanParameters` is the complete set of user choices for one measurement:
// which axes to scan, whether runs touching the image border count, and how
// short a run may be before it is discarded. It is built once - from CLI flags,
// a JSON config, or a host macro-options string - and then never changes while
// a scan is running.
//
// The macro-options form follows the usual convention of image-analysis hosts:
// whitespace-separated keywords, where a checkbox keyword that is present means
// "on" and an absent one means "off", plus `key=value` pairs for numbers:
//
//     horizontal vertical ignore min=3

use crate::core_modules::line_scanner::ScanAxis;
use crate::error::MeasureError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The minimum run length used when none is given.
pub const DEFAULT_MIN_LINE_LENGTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParameters {
    /// Scan every row.
    pub process_horizontal: bool,
    /// Scan every column.
    pub process_vertical: bool,
    /// Drop runs that open at the start or close at the end of a scan line.
    pub ignore_border_lines: bool,
    /// Runs must be strictly longer than this many pixels.
    pub min_line_length: usize,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            process_horizontal: true,
            process_vertical: true,
            ignore_border_lines: true,
            min_line_length: DEFAULT_MIN_LINE_LENGTH,
        }
    }
}

impl ScanParameters {
    /// The enabled axes in scan order: horizontal before vertical.
    pub fn axes(&self) -> impl Iterator<Item = ScanAxis> {
        [
            (self.process_horizontal, ScanAxis::Horizontal),
            (self.process_vertical, ScanAxis::Vertical),
        ]
        .into_iter()
        .filter_map(|(enabled, axis)| enabled.then_some(axis))
    }

    /// Parses a macro-options string. See the module docs for the format.
    pub fn from_macro_options(options: &str) -> Result<Self, MeasureError> {
        let mut parameters = Self {
            process_horizontal: false,
            process_vertical: false,
            ignore_border_lines: false,
            min_line_length: DEFAULT_MIN_LINE_LENGTH,
        };

        for token in options.split_whitespace() {
            match token.split_once('=') {
                None => match token {
                    "horizontal" => parameters.process_horizontal = true,
                    "vertical" => parameters.process_vertical = true,
                    "ignore" => parameters.ignore_border_lines = true,
                    other => {
                        return Err(MeasureError::InvalidOptions(format!("unknown keyword `{other}`")));
                    }
                },
                Some(("min", value)) => {
                    parameters.min_line_length = value.parse().map_err(|_| {
                        MeasureError::InvalidOptions(format!(
                            "`min` expects a non-negative integer, got `{value}`"
                        ))
                    })?;
                }
                Some((key, _)) => {
                    return Err(MeasureError::InvalidOptions(format!("unknown key `{key}`")));
                }
            }
        }

        Ok(parameters)
    }
}

impl FromStr for ScanParameters {
    type Err = MeasureError;

    fn from_str(options: &str) -> Result<Self, Self::Err> {
        Self::from_macro_options(options)
    }
}

impl fmt::Display for ScanParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.process_horizontal {
            write!(f, "horizontal ")?;
        }
        if self.process_vertical {
            write!(f, "vertical ")?;
        }
        if self.ignore_border_lines {
            write!(f, "ignore ")?;
        }
        write!(f, "min={}", self.min_line_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_checkboxes_are_off() {
        let parameters: ScanParameters = "vertical min=7".parse().expect("valid options");
        assert_eq!(
            parameters,
            ScanParameters {
                process_horizontal: false,
                process_vertical: true,
                ignore_border_lines: false,
                min_line_length: 7,
            }
        );
    }

    #[test]
    fn missing_minimum_falls_back_to_default() {
        let parameters = ScanParameters::from_macro_options("horizontal ignore").expect("valid options");
        assert_eq!(parameters.min_line_length, DEFAULT_MIN_LINE_LENGTH);
        assert!(parameters.ignore_border_lines);
    }

    #[test]
    fn rejects_bad_minimum_and_unknown_keys() {
        for options in ["min=abc", "min=-1", "diagonal", "max=4"] {
            assert!(
                matches!(ScanParameters::from_macro_options(options), Err(MeasureError::InvalidOptions(_))),
                "{options} should be rejected"
            );
        }
    }

    #[test]
    fn display_reads_back_to_the_same_parameters() {
        let parameters = ScanParameters {
            process_horizontal: true,
            process_vertical: false,
            ignore_border_lines: true,
            min_line_length: 12,
        };
        assert_eq!(parameters.to_string(), "horizontal ignore min=12");
        assert_eq!(parameters.to_string().parse::<ScanParameters>().ok(), Some(parameters));
    }

    #[test]
    fn axes_are_ordered_horizontal_first() {
        let both = ScanParameters::default();
        assert_eq!(both.axes().collect::<Vec<_>>(), vec![ScanAxis::Horizontal, ScanAxis::Vertical]);

        let none = ScanParameters {
            process_horizontal: false,
            process_vertical: false,
            ..ScanParameters::default()
        };
        assert_eq!(none.axes().count(), 0);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let parameters: ScanParameters =
            serde_json::from_str(r#"{ "process_vertical": false, "min_line_length": 0 }"#).expect("valid json");
        assert!(parameters.process_horizontal);
        assert!(!parameters.process_vertical);
        assert!(parameters.ignore_border_lines);
        assert_eq!(parameters.min_line_length, 0);
    }
}
