//! Fixed black canvas and centered compositing

use image::{imageops, DynamicImage, Rgb, Rgba, RgbImage, RgbaImage};

use crate::processing::resize::fit_within;

/// Canvas width in pixels
pub const CANVAS_WIDTH: u32 = 500;
/// Canvas height in pixels
pub const CANVAS_HEIGHT: u32 = 500;
/// Fit-box width in pixels
pub const FIT_BOX_WIDTH: u32 = 500;
/// Fit-box height in pixels
pub const FIT_BOX_HEIGHT: u32 = 500;
/// Canvas background
pub const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// Top-left offset that centers a `width`x`height` image on the canvas
///
/// Floor division, so odd remainders leave the extra pixel on the right/bottom.
pub fn center_offset(width: u32, height: u32) -> (i64, i64) {
    let x = (i64::from(CANVAS_WIDTH) - i64::from(width)).div_euclid(2);
    let y = (i64::from(CANVAS_HEIGHT) - i64::from(height)).div_euclid(2);
    (x, y)
}

/// Paste `image` centered on an opaque black canvas
///
/// Alpha is blended against the background, so the result is plain RGB.
pub fn compose_on_canvas(image: &DynamicImage) -> RgbImage {
    let [r, g, b] = BACKGROUND.0;
    let mut canvas = RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, Rgba([r, g, b, 255]));

    let (x, y) = center_offset(image.width(), image.height());
    imageops::overlay(&mut canvas, &image.to_rgba8(), x, y);

    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Fit `image` into the fit-box and center it on the canvas
pub fn letterbox(image: &DynamicImage) -> RgbImage {
    let resized = fit_within(image, FIT_BOX_WIDTH, FIT_BOX_HEIGHT);
    compose_on_canvas(&resized)
}
