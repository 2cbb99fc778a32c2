// THEORY:
// Scanning electron microscopes write their acquisition settings as plain
// `Key=Value` text lines into the image file itself (a private TIFF tag on FEI
// and Thermo instruments). Two of those keys matter for measuring lines:
//
// 1.  **PixelWidth**: The edge length of one pixel in metres. Scaled to
//     nanometres it becomes the calibration of the image.
// 2.  **ResolutionY**: The height of the scanned content in pixels. The stored
//     image is usually taller, because the instrument appends an info bar
//     (scale bar, magnification, detector) below the content. Everything below
//     `ResolutionY` rows is not sample and must not be scanned.
//
// The file is searched as raw bytes, so the lookup does not depend on the
// container format or on the image decoder exposing private tags.

use crate::core_modules::calibration::Calibration;
use crate::error::MeasureError;
use std::fs;
use std::path::Path;

const PIXEL_WIDTH_KEY: &[u8] = b"PixelWidth";
const RESOLUTION_Y_KEY: &[u8] = b"ResolutionY";
const METRES_TO_NANOMETRES: f64 = 1e9;
const NANOMETRE_UNIT: &str = "nm";

/// Acquisition settings found in an image file. Missing or unparsable keys stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SemMetadata {
    /// Pixel edge length in metres.
    pub pixel_width: Option<f64>,
    /// Height of the image content in pixels, without the info bar.
    pub content_height: Option<usize>,
}

impl SemMetadata {
    pub fn parse(bytes: &[u8]) -> Self {
        let pixel_width = value_of(bytes, PIXEL_WIDTH_KEY)
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|width| width.is_finite() && *width > 0.0);
        let content_height = value_of(bytes, RESOLUTION_Y_KEY)
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|height| height.is_finite() && *height >= 1.0)
            .map(|height| height as usize);
        Self {
            pixel_width,
            content_height,
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, MeasureError> {
        Ok(Self::parse(&fs::read(path)?))
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_width.is_none() && self.content_height.is_none()
    }

    /// Square pixels of `PixelWidth` expressed in nanometres.
    pub fn calibration(&self) -> Option<Calibration> {
        let pixel_width = self.pixel_width?;
        Calibration::isotropic(pixel_width * METRES_TO_NANOMETRES, NANOMETRE_UNIT).ok()
    }

    /// Rows of info bar below the content of an image `image_height` rows tall.
    pub fn info_bar_height(&self, image_height: usize) -> Option<usize> {
        self.content_height
            .filter(|&content| content < image_height)
            .map(|content| image_height - content)
    }
}

/// Text after `key=` on the first line holding `key`, trimmed.
fn value_of<'a>(bytes: &'a [u8], key: &[u8]) -> Option<&'a str> {
    let start = bytes.windows(key.len()).position(|window| window == key)?;
    let line = &bytes[start + key.len()..];
    let line_end = line
        .iter()
        .position(|&byte| matches!(byte, b'\r' | b'\n' | b'\0'))
        .unwrap_or(line.len());
    let line = &line[..line_end];
    let value = &line[line.iter().position(|&byte| byte == b'=')? + 1..];
    std::str::from_utf8(value).ok().map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_tiff(metadata: &str) -> Vec<u8> {
        let mut bytes = b"II*\0\x08\0\0\0\xff\x00\x17".to_vec();
        bytes.extend_from_slice(metadata.as_bytes());
        bytes.extend_from_slice(b"\0\0\x01\x02");
        bytes
    }

    #[test]
    fn reads_pixel_width_and_content_height() {
        let bytes = fake_tiff("[Scan]\r\nPixelWidth=2.5e-009\r\nPixelHeight=2.5e-009\r\n[Image]\r\nResolutionX=1024\r\nResolutionY=884\r\n");
        let metadata = SemMetadata::parse(&bytes);
        assert_eq!(metadata.content_height, Some(884));

        let calibration = metadata.calibration().expect("pixel width present");
        assert_eq!(calibration.unit, "nm");
        assert!((calibration.pixel_width - 2.5).abs() < 1e-9);
        assert_eq!(calibration.pixel_width, calibration.pixel_height);

        assert_eq!(metadata.info_bar_height(960), Some(76));
        assert_eq!(metadata.info_bar_height(884), None);
    }

    #[test]
    fn files_without_metadata_yield_nothing() {
        let metadata = SemMetadata::parse(&fake_tiff("no acquisition settings here"));
        assert!(metadata.is_empty());
        assert_eq!(metadata.calibration(), None);
        assert_eq!(metadata.info_bar_height(100), None);
    }

    #[test]
    fn malformed_values_are_ignored() {
        let metadata = SemMetadata::parse(&fake_tiff("PixelWidth=abc\nResolutionY=0\n"));
        assert!(metadata.is_empty());

        let metadata = SemMetadata::parse(&fake_tiff("PixelWidth=-1e-9\nResolutionY\n"));
        assert!(metadata.is_empty());
    }

    #[test]
    fn value_stops_at_line_end() {
        let metadata = SemMetadata::parse(b"ResolutionY = 512 \nResolutionX=768");
        assert_eq!(metadata.content_height, Some(512));
    }

    #[test]
    fn reads_from_file() {
        let path = std::env::temp_dir().join(format!("sem_metadata_{}.tif", std::process::id()));
        fs::write(&path, fake_tiff("PixelWidth=1e-008\r\n")).expect("write temp image");
        let metadata = SemMetadata::read(&path).expect("readable file");
        let _ = fs::remove_file(&path);

        let calibration = metadata.calibration().expect("pixel width present");
        assert!((calibration.pixel_width - 10.0).abs() < 1e-9);
        assert!(SemMetadata::read(std::env::temp_dir().join("missing_sem_image.tif")).is_err());
    }
}
