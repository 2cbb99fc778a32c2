// THEORY:
// The `PixelGrid` is the input of the whole measurement engine: a width x height
// raster of 8-bit intensities stored row-major. It is deliberately a "dumb" data
// container - it knows how to hand out pixels, rows and columns, but nothing
// about lines, borders or calibration.
//
// Key architectural principles:
// 1.  **Immutable Input**: Once built, a grid is never modified. The scanner only
//     borrows it, so the same grid can be scanned along both axes (or by several
//     workers) without copies.
// 2.  **Many Doors In**: Images arrive as decoded files, as `image::GrayImage`s,
//     or as raw RGBA frame buffers from a capture pipeline. Each constructor
//     funnels into the same validated row-major layout.
// 3.  **No Binarization**: The grid is expected to already be two-level (0 and
//     255). `is_binary` lets callers check that, but the grid never thresholds.

pub mod pixel_grid {
    use crate::error::MeasureError;
    use image::GrayImage;
    use std::path::Path;

    pub type Intensity = u8;

    const RGBA_CHANNELS: usize = 4;

    /// A row-major raster of 8-bit intensities.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PixelGrid {
        /// Number of columns.
        width: usize,
        /// Number of rows.
        height: usize,
        /// `width * height` intensities, row after row.
        pixels: Vec<Intensity>,
    }

    /// `width * height * channels`, or `SizeMismatch` when it overflows `usize`.
    fn checked_area(width: usize, height: usize, channels: usize) -> Result<usize, MeasureError> {
        width
            .checked_mul(height)
            .and_then(|area| area.checked_mul(channels))
            .ok_or(MeasureError::SizeMismatch {
                expected: usize::MAX,
                actual: 0,
            })
    }

    impl PixelGrid {
        pub fn new(width: usize, height: usize, pixels: Vec<Intensity>) -> Result<Self, MeasureError> {
            let expected = checked_area(width, height, 1)?;
            if pixels.len() != expected {
                return Err(MeasureError::SizeMismatch {
                    expected,
                    actual: pixels.len(),
                });
            }
            Ok(Self {
                width,
                height,
                pixels,
            })
        }

        /// A grid where every pixel has the same intensity.
        pub fn filled(width: usize, height: usize, value: Intensity) -> Result<Self, MeasureError> {
            let len = checked_area(width, height, 1)?;
            Ok(Self {
                width,
                height,
                pixels: vec![value; len],
            })
        }

        pub fn from_gray_image(image: &GrayImage) -> Self {
            Self {
                width: image.width() as usize,
                height: image.height() as usize,
                pixels: image.as_raw().clone(),
            }
        }

        /// Builds a grid from an RGBA frame buffer (4 bytes per pixel).
        /// Each pixel is reduced to its Rec. 601 luma; alpha is ignored.
        pub fn from_rgba(width: usize, height: usize, frame_buffer: &[u8]) -> Result<Self, MeasureError> {
            let expected = checked_area(width, height, RGBA_CHANNELS)?;
            if frame_buffer.len() != expected {
                return Err(MeasureError::SizeMismatch {
                    expected,
                    actual: frame_buffer.len(),
                });
            }

            let pixels = frame_buffer
                .chunks_exact(RGBA_CHANNELS)
                .map(|bytes| {
                    let luma = 0.299f32 * bytes[0] as f32
                        + 0.587f32 * bytes[1] as f32
                        + 0.114f32 * bytes[2] as f32;
                    luma.round().clamp(0.0, 255.0) as Intensity
                })
                .collect();

            Ok(Self {
                width,
                height,
                pixels,
            })
        }

        /// Decodes an image file and converts it to 8-bit luma.
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MeasureError> {
            let decoded = image::open(path)?;
            Ok(Self::from_gray_image(&decoded.to_luma8()))
        }

        pub fn width(&self) -> usize {
            self.width
        }

        pub fn height(&self) -> usize {
            self.height
        }

        pub fn is_empty(&self) -> bool {
            self.pixels.is_empty()
        }

        pub fn pixels(&self) -> &[Intensity] {
            &self.pixels
        }

        pub fn get(&self, x: usize, y: usize) -> Option<Intensity> {
            if x >= self.width || y >= self.height {
                return None;
            }
            Some(self.pixels[y * self.width + x])
        }

        /// Unchecked-by-contract accessor used by the scanner's inner loop.
        /// Panics if `(x, y)` lies outside the grid.
        #[inline]
        pub(crate) fn pixel(&self, x: usize, y: usize) -> Intensity {
            self.pixels[y * self.width + x]
        }

        pub fn row(&self, y: usize) -> &[Intensity] {
            assert!(y < self.height, "row index out of bounds");
            let start = y * self.width;
            &self.pixels[start..start + self.width]
        }

        pub fn column(&self, x: usize) -> impl Iterator<Item = Intensity> + '_ {
            assert!(x < self.width, "column index out of bounds");
            self.pixels.iter().skip(x).step_by(self.width.max(1)).copied()
        }

        /// Keeps the top `height` rows and drops the rest, e.g. an instrument
        /// info bar below the image content. A larger `height` keeps everything.
        pub fn crop_to_height(mut self, height: usize) -> Self {
            if height < self.height {
                self.pixels.truncate(height * self.width);
                self.height = height;
            }
            self
        }

        /// True when every pixel is either 0 or 255.
        pub fn is_binary(&self) -> bool {
            self.pixels.iter().all(|&value| value == 0 || value == 255)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel_grid::*;
    use crate::error::MeasureError;

    #[test]
    fn rejects_buffer_of_wrong_length() {
        let err = PixelGrid::new(3, 2, vec![0; 5]).unwrap_err();
        assert!(matches!(
            err,
            MeasureError::SizeMismatch {
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn rows_and_columns_follow_row_major_layout() {
        let grid = PixelGrid::new(3, 2, vec![1, 2, 3, 4, 5, 6]).expect("valid grid");
        assert_eq!(grid.row(1), &[4, 5, 6]);
        assert_eq!(grid.column(2).collect::<Vec<_>>(), vec![3, 6]);
        assert_eq!(grid.get(0, 1), Some(4));
        assert_eq!(grid.get(3, 0), None);
    }

    #[test]
    fn rgba_frames_are_reduced_to_luma() {
        let frame = vec![
            255, 255, 255, 255, //
            0, 0, 0, 255, //
            255, 255, 255, 0, //
            0, 0, 0, 0,
        ];
        let grid = PixelGrid::from_rgba(2, 2, &frame).expect("valid frame");
        assert_eq!(grid.pixels(), &[255, 0, 255, 0]);
        assert!(grid.is_binary());
    }

    #[test]
    fn gray_image_keeps_dimensions() {
        let image = image::GrayImage::from_fn(4, 3, |x, _| image::Luma([if x == 1 { 0 } else { 255 }]));
        let grid = PixelGrid::from_gray_image(&image);
        assert_eq!((grid.width(), grid.height()), (4, 3));
        assert_eq!(grid.row(2), &[255, 0, 255, 255]);
    }

    #[test]
    fn detects_non_binary_content() {
        let grid = PixelGrid::new(2, 1, vec![0, 128]).expect("valid grid");
        assert!(!grid.is_binary());
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        assert!(matches!(
            PixelGrid::filled(usize::MAX, 2, 0),
            Err(MeasureError::SizeMismatch { .. })
        ));
        assert!(matches!(
            PixelGrid::from_rgba(usize::MAX / 2, 1, &[0; 8]),
            Err(MeasureError::SizeMismatch { .. })
        ));
        assert!(PixelGrid::new(usize::MAX, usize::MAX, Vec::new()).is_err());
    }

    #[test]
    fn cropping_keeps_the_top_rows() {
        let grid = PixelGrid::new(2, 3, vec![1, 2, 3, 4, 5, 6]).expect("valid grid");
        let cropped = grid.clone().crop_to_height(2);
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert_eq!(cropped.pixels(), &[1, 2, 3, 4]);
        assert_eq!(grid.clone().crop_to_height(10), grid);
    }

    #[test]
    fn zero_area_grid_is_valid() {
        let grid = PixelGrid::new(0, 5, Vec::new()).expect("empty grid");
        assert!(grid.is_empty());
    }
}
