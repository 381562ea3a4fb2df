//! Fit-within resizing

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Resampling filter used for every downscale
pub const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Largest size that fits `width`x`height` into the box without enlarging
///
/// Images already inside the box keep their size. Otherwise the constrained
/// axis is pinned to the box edge and the other axis is rounded down or up,
/// whichever keeps the aspect ratio closest to the original; never below 1px.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
        return (width, height);
    }

    let aspect = f64::from(width) / f64::from(height);
    let box_width = f64::from(max_width);
    let box_height = f64::from(max_height);

    if box_width / box_height >= aspect {
        let new_width = round_aspect(box_height * aspect, |n| (aspect - n / box_height).abs());
        (new_width, max_height)
    } else {
        let new_height = round_aspect(box_width / aspect, |n| {
            if n == 0.0 {
                0.0
            } else {
                (aspect - box_width / n).abs()
            }
        });
        (max_width, new_height)
    }
}

// Ties go to the floor
fn round_aspect(value: f64, error: impl Fn(f64) -> f64) -> u32 {
    let (low, high) = (value.floor(), value.ceil());
    let best = if error(high) < error(low) { high } else { low };
    (best as u32).max(1)
}

/// Downscale `image` to fit the box, preserving aspect ratio
pub fn fit_within(image: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = fit_dimensions(image.width(), image.height(), max_width, max_height);

    if width == image.width() && height == image.height() {
        debug!("No resize needed for {}x{}", width, height);
        return image.clone();
    }

    debug!(
        "Resizing {}x{} -> {}x{} using {:?}",
        image.width(),
        image.height(),
        width,
        height,
        RESIZE_FILTER
    );

    image.resize_exact(width, height, RESIZE_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_landscape_fits_width() {
        assert_eq!(fit_dimensions(1000, 800, 500, 500), (500, 400));
        assert_eq!(fit_dimensions(600, 400, 500, 500), (500, 333));
    }

    #[test]
    fn test_portrait_fits_height() {
        assert_eq!(fit_dimensions(800, 1000, 500, 500), (400, 500));
        assert_eq!(fit_dimensions(400, 600, 500, 500), (333, 500));
    }

    #[test]
    fn test_never_upscales() {
        assert_eq!(fit_dimensions(120, 80, 500, 500), (120, 80));
        assert_eq!(fit_dimensions(500, 500, 500, 500), (500, 500));
        assert_eq!(fit_dimensions(500, 20, 500, 500), (500, 20));
    }

    #[test]
    fn test_extreme_aspect_keeps_one_pixel() {
        assert_eq!(fit_dimensions(100_000, 1, 500, 500), (500, 1));
        assert_eq!(fit_dimensions(1, 100_000, 500, 500), (1, 500));
    }

    #[test]
    fn test_square_overflow() {
        assert_eq!(fit_dimensions(2048, 2048, 500, 500), (500, 500));
    }

    #[test]
    fn test_fit_within_resizes_pixels() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1000, 250, Rgb([10, 20, 30])));
        let resized = fit_within(&image, 500, 500);
        assert_eq!((resized.width(), resized.height()), (500, 125));
    }

    #[test]
    fn test_fit_within_small_image_untouched() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([1, 2, 3])));
        let resized = fit_within(&image, 500, 500);
        assert_eq!(resized.as_bytes(), image.as_bytes());
    }
}
