//! Deterministic image transforms for synthesizing difficult test variants:
//! lighting changes, downscaling, recompression and cropping. Same input,
//! same bytes out.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// JPEG quality used for the artifact-heavy compressed variant.
pub const COMPRESSED_QUALITY: u8 = 20;

/// Multiplies every channel by `factor`, clamping to the valid range.
pub fn brightness(image: &RgbImage, factor: f64) -> RgbImage {
    map_pixels(image, |value| f64::from(value) * factor)
}

/// Interpolates each channel toward the image's mean luminance. A factor
/// below 1.0 flattens contrast, above 1.0 exaggerates it.
///
/// The per-pixel luminance and the grand mean both use integer arithmetic so
/// the pivot matches what common imaging toolchains compute.
pub fn contrast(image: &RgbImage, factor: f64) -> RgbImage {
    let (width, height) = image.dimensions();
    let pixel_count = u64::from(width) * u64::from(height);
    if pixel_count == 0 {
        return image.clone();
    }

    let luma_sum: u64 = image
        .pixels()
        .map(|pixel| {
            let [r, g, b] = pixel.0;
            (u64::from(r) * 299 + u64::from(g) * 587 + u64::from(b) * 114) / 1000
        })
        .sum();
    let mean = luma_sum as f64 / pixel_count as f64;
    let pivot = (mean + 0.5).floor();

    map_pixels(image, |value| pivot + (f64::from(value) - pivot) * factor)
}

/// Darkens the frame toward the edges while brightening a rim, simulating a
/// subject photographed against a strong light source.
pub fn backlight(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let center_x = f64::from(width / 2);
    let center_y = f64::from(height / 2);
    let max_distance = (center_x * center_x + center_y * center_y).sqrt().max(1.0);

    RgbImage::from_fn(width, height, |x, y| {
        let dx = f64::from(x) - center_x;
        let dy = f64::from(y) - center_y;
        let falloff = ((dx * dx + dy * dy).sqrt() / max_distance).powf(1.5);
        let shadow = 0.3 + 0.4 * falloff;
        let rim = 30.0 * falloff;
        let pixel = image.get_pixel(x, y);
        Rgb(pixel.0.map(|value| clamp_channel(f64::from(value) * shadow + rim)))
    })
}

/// Underexposed variant: strong darkening with slightly flattened contrast.
pub fn low_light(image: &RgbImage) -> RgbImage {
    contrast(&brightness(image, 0.4), 0.85)
}

/// Overexposed variant: blown-out highlights with washed-out contrast.
pub fn bright(image: &RgbImage) -> RgbImage {
    contrast(&brightness(image, 1.8), 0.6)
}

/// Applies a horizontal lighting gradient, bright on the left fading to deep
/// shadow on the right.
pub fn directional_shadow(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let factor = if width <= 1 {
            1.2
        } else {
            1.2 - f64::from(x) / f64::from(width - 1)
        };
        let pixel = image.get_pixel(x, y);
        Rgb(pixel.0.map(|value| clamp_channel(f64::from(value) * factor)))
    })
}

/// Shrinks the image to fit within 200x200 (never enlarging) and centers it
/// on a light gray 800x800 canvas, mimicking a low-resolution source pasted
/// into a larger frame.
pub fn small_with_canvas(image: &RgbImage) -> RgbImage {
    let thumbnail = shrink_to_fit(image, 200, 200);
    let mut canvas = RgbImage::from_pixel(800, 800, Rgb([240, 240, 240]));
    let (thumb_width, thumb_height) = thumbnail.dimensions();
    let left = i64::from((800 - thumb_width) / 2);
    let top = i64::from((800 - thumb_height) / 2);
    imageops::overlay(&mut canvas, &thumbnail, left, top);
    canvas
}

/// Removes the top 30% of the frame, typically clipping the forehead.
pub fn cropped(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let top = (f64::from(height) * 0.3) as u32;
    imageops::crop_imm(image, 0, top, width, height - top).to_image()
}

/// Encodes `image` as JPEG at the given quality.
pub fn save_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<(), VariationError> {
    let file = File::create(path).map_err(|source| VariationError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(writer, quality)
        .encode_image(image)
        .map_err(|source| VariationError::Encode {
            source,
            path: path.to_path_buf(),
        })
}

fn shrink_to_fit(image: &RgbImage, max_width: u32, max_height: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width <= max_width && height <= max_height {
        return image.clone();
    }
    let ratio = (f64::from(max_width) / f64::from(width))
        .min(f64::from(max_height) / f64::from(height));
    let new_width = ((f64::from(width) * ratio) as u32).max(1);
    let new_height = ((f64::from(height) * ratio) as u32).max(1);
    imageops::resize(image, new_width, new_height, FilterType::Lanczos3)
}

fn map_pixels(image: &RgbImage, transform: impl Fn(u8) -> f64) -> RgbImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel.0 = pixel.0.map(|value| clamp_channel(transform(value)));
    }
    output
}

fn clamp_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[derive(Debug)]
pub enum VariationError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Encode {
        source: image::ImageError,
        path: PathBuf,
    },
}

impl Display for VariationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => write!(f, "io error for {}: {}", path.display(), source),
            Self::Encode { source, path } => {
                write!(f, "failed to encode {}: {}", path.display(), source)
            }
        }
    }
}

impl Error for VariationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn flat(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    #[test]
    fn brightness_scales_and_clamps() {
        let doubled = brightness(&flat(4, 4, 100), 2.0);
        assert_eq!(doubled.get_pixel(0, 0).0, [200, 200, 200]);
        let blown = brightness(&flat(4, 4, 200), 2.0);
        assert_eq!(blown.get_pixel(0, 0).0, [255, 255, 255]);
        let darkened = brightness(&flat(4, 4, 100), 0.4);
        assert_eq!(darkened.get_pixel(0, 0).0, [40, 40, 40]);
    }

    #[test]
    fn contrast_pulls_toward_the_mean() {
        // Half 50, half 150: integer luma mean is 100.
        let mut image = flat(2, 1, 50);
        image.put_pixel(1, 0, Rgb([150, 150, 150]));
        let flattened = contrast(&image, 0.5);
        assert_eq!(flattened.get_pixel(0, 0).0, [75, 75, 75]);
        assert_eq!(flattened.get_pixel(1, 0).0, [125, 125, 125]);

        // Factor 1.0 is the identity.
        let unchanged = contrast(&image, 1.0);
        assert_eq!(unchanged.get_pixel(0, 0).0, [50, 50, 50]);
        assert_eq!(unchanged.get_pixel(1, 0).0, [150, 150, 150]);
    }

    #[test]
    fn directional_shadow_runs_bright_to_dark() {
        let shaded = directional_shadow(&flat(11, 3, 100));
        // Left edge: factor 1.2. Right edge: factor 0.2.
        assert_eq!(shaded.get_pixel(0, 1).0, [120, 120, 120]);
        assert_eq!(shaded.get_pixel(10, 1).0, [20, 20, 20]);
    }

    #[test]
    fn backlight_is_deterministic_and_darkest_in_corners() {
        let image = flat(60, 60, 200);
        let first = backlight(&image);
        let second = backlight(&image);
        assert_eq!(first.as_raw(), second.as_raw());
        // The center keeps the 0.3 base shadow, the corners sit deeper.
        let center = first.get_pixel(30, 30).0[0];
        let corner = first.get_pixel(0, 0).0[0];
        assert!(center == 60);
        assert!(corner > center);
    }

    #[test]
    fn small_with_canvas_centers_on_gray() {
        let framed = small_with_canvas(&flat(400, 300, 10));
        assert_eq!(framed.dimensions(), (800, 800));
        assert_eq!(framed.get_pixel(0, 0).0, [240, 240, 240]);
        assert_eq!(framed.get_pixel(799, 799).0, [240, 240, 240]);
        // A 400x300 source shrinks to 200x150, so the center is source data.
        assert_eq!(framed.get_pixel(400, 400).0, [10, 10, 10]);
    }

    #[test]
    fn small_source_is_not_enlarged() {
        let framed = small_with_canvas(&flat(100, 80, 10));
        assert_eq!(framed.get_pixel(400, 400).0, [10, 10, 10]);
        // Just outside the 100x80 pasted region the canvas shows through.
        assert_eq!(framed.get_pixel(340, 400).0, [240, 240, 240]);
    }

    #[test]
    fn crop_removes_the_top_third() {
        let trimmed = cropped(&flat(100, 100, 50));
        assert_eq!(trimmed.dimensions(), (100, 70));
        let odd = cropped(&flat(10, 7, 50));
        // floor(7 * 0.3) = 2 rows removed.
        assert_eq!(odd.dimensions(), (10, 5));
    }

    #[test]
    fn small_with_canvas_is_byte_stable_across_runs() {
        let dir = tempdir().unwrap();
        let source = flat(400, 300, 128);
        let first_path = dir.path().join("a.jpg");
        let second_path = dir.path().join("b.jpg");
        save_jpeg(&small_with_canvas(&source), &first_path, 90).unwrap();
        save_jpeg(&small_with_canvas(&source), &second_path, 90).unwrap();
        let first = std::fs::read(&first_path).unwrap();
        let second = std::fs::read(&second_path).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
