// Builds the pipeline configuration from its sources, weakest first:
// built-in defaults, the image's own SEM metadata (calibration only), a JSON
// config file, a macro-options string, individual command-line flags.

use anyhow::{Context, Result};
use line_length_counter::pipeline::{Calibration, PipelineConfig, ScanParameters, SemMetadata};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Command-line overrides. `None` / `false` leaves the lower layer untouched.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub options: Option<String>,
    pub no_horizontal: bool,
    pub no_vertical: bool,
    pub include_border: bool,
    pub min_length: Option<usize>,
    pub pixel_width: Option<f64>,
    pub pixel_height: Option<f64>,
    pub unit: Option<String>,
    pub ignore_metadata: bool,
}

/// Contents of a JSON config file. A missing `calibration` section leaves the
/// calibration to the image metadata.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub parameters: ScanParameters,
    pub calibration: Option<Calibration>,
}

/// Resolved scan parameters plus what is needed to calibrate each image.
#[derive(Debug, Clone)]
pub struct Settings {
    pub parameters: ScanParameters,
    file_calibration: Option<Calibration>,
    overrides: Overrides,
}

pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse config {}", path.display()))
}

pub fn resolve(config_path: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let file = match config_path {
        Some(path) => load_config(path)?,
        None => ConfigFile::default(),
    };
    let mut parameters = file.parameters;

    if let Some(options) = &overrides.options {
        parameters = options
            .parse::<ScanParameters>()
            .with_context(|| format!("bad --options `{options}`"))?;
    }
    if overrides.no_horizontal {
        parameters.process_horizontal = false;
    }
    if overrides.no_vertical {
        parameters.process_vertical = false;
    }
    if overrides.include_border {
        parameters.ignore_border_lines = false;
    }
    if let Some(min_length) = overrides.min_length {
        parameters.min_line_length = min_length;
    }

    let settings = Settings {
        parameters,
        file_calibration: file.calibration,
        overrides: overrides.clone(),
    };
    // Fail on bad flags before any image is touched.
    settings.calibration(None)?;
    Ok(settings)
}

impl Settings {
    pub fn uses_metadata(&self) -> bool {
        !self.overrides.ignore_metadata
    }

    /// Calibration for one image. `metadata` only counts when neither the
    /// config file nor `--ignore-metadata` says otherwise.
    pub fn calibration(&self, metadata: Option<&SemMetadata>) -> Result<Calibration> {
        let from_metadata = metadata
            .filter(|_| self.uses_metadata())
            .and_then(SemMetadata::calibration);
        let mut calibration = self
            .file_calibration
            .clone()
            .or(from_metadata)
            .unwrap_or_default();

        if let Some(pixel_width) = self.overrides.pixel_width {
            calibration.pixel_width = pixel_width;
        }
        if let Some(pixel_height) = self.overrides.pixel_height {
            calibration.pixel_height = pixel_height;
        }
        if let Some(unit) = &self.overrides.unit {
            calibration.unit = unit.clone();
        }
        calibration.validate().context("bad calibration")?;
        Ok(calibration)
    }

    /// Configuration for images without usable metadata.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            parameters: self.parameters,
            calibration: self.calibration(None)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("line_tester_{name}_{}.json", std::process::id()));
        let mut file = fs::File::create(&path).expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        path
    }

    fn sem_metadata() -> SemMetadata {
        SemMetadata::parse(b"[Scan]\r\nPixelWidth=5e-009\r\n[Image]\r\nResolutionY=700\r\n")
    }

    #[test]
    fn flags_override_options_string() {
        let overrides = Overrides {
            options: Some("horizontal vertical ignore min=5".to_string()),
            no_vertical: true,
            include_border: true,
            pixel_width: Some(2.5),
            unit: Some("nm".to_string()),
            ..Overrides::default()
        };
        let config = resolve(None, &overrides)
            .and_then(|settings| settings.pipeline_config())
            .expect("valid overrides");

        assert!(config.parameters.process_horizontal);
        assert!(!config.parameters.process_vertical);
        assert!(!config.parameters.ignore_border_lines);
        assert_eq!(config.parameters.min_line_length, 5);
        assert_eq!(config.calibration.pixel_width, 2.5);
        assert_eq!(config.calibration.pixel_height, 1.0);
        assert_eq!(config.calibration.unit, "nm");
    }

    #[test]
    fn defaults_without_any_source() {
        let config = resolve(None, &Overrides::default())
            .and_then(|settings| settings.pipeline_config())
            .expect("defaults");
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn json_file_is_the_base_layer() {
        let path = write_temp_config(
            "base",
            r#"{ "parameters": { "min_line_length": 9 }, "calibration": { "pixel_width": 4.0, "pixel_height": 4.0, "unit": "µm" } }"#,
        );
        let overrides = Overrides {
            min_length: Some(1),
            ..Overrides::default()
        };
        let config = resolve(Some(&path), &overrides)
            .and_then(|settings| settings.pipeline_config())
            .expect("valid config");
        let _ = fs::remove_file(&path);

        assert_eq!(config.parameters.min_line_length, 1);
        assert_eq!(config.calibration.unit, "µm");
        assert_eq!(config.calibration.pixel_height, 4.0);
    }

    #[test]
    fn metadata_sits_between_defaults_and_config_file() {
        let metadata = sem_metadata();

        let settings = resolve(None, &Overrides::default()).expect("defaults");
        let calibration = settings.calibration(Some(&metadata)).expect("valid");
        assert_eq!(calibration.unit, "nm");
        assert!((calibration.pixel_width - 5.0).abs() < 1e-9);

        let path = write_temp_config("metadata", r#"{ "calibration": { "pixel_width": 2.0, "pixel_height": 2.0, "unit": "µm" } }"#);
        let settings = resolve(Some(&path), &Overrides::default()).expect("valid config");
        let _ = fs::remove_file(&path);
        assert_eq!(settings.calibration(Some(&metadata)).expect("valid").unit, "µm");

        let overrides = Overrides {
            pixel_width: Some(7.0),
            ..Overrides::default()
        };
        let settings = resolve(None, &overrides).expect("valid flags");
        let calibration = settings.calibration(Some(&metadata)).expect("valid");
        assert_eq!(calibration.pixel_width, 7.0);
        assert_eq!(calibration.unit, "nm");
    }

    #[test]
    fn metadata_can_be_ignored() {
        let overrides = Overrides {
            ignore_metadata: true,
            ..Overrides::default()
        };
        let settings = resolve(None, &overrides).expect("valid flags");
        assert!(!settings.uses_metadata());
        assert_eq!(
            settings.calibration(Some(&sem_metadata())).expect("valid"),
            Calibration::default()
        );
    }

    #[test]
    fn rejects_bad_options_and_calibration() {
        let bad_options = Overrides {
            options: Some("min=x".to_string()),
            ..Overrides::default()
        };
        assert!(resolve(None, &bad_options).is_err());

        let bad_calibration = Overrides {
            pixel_height: Some(0.0),
            ..Overrides::default()
        };
        assert!(resolve(None, &bad_calibration).is_err());
    }
}
