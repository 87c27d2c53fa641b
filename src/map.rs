use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use ndarray::{Array2, Array3};

pub(crate) type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

const NORM_EPS: f32 = 1e-6;

/// Coerces a decoded image to the (H, W, 3) float tensor the pipeline reads,
/// with channel intensities in 0-255, row-major, origin at top-left.
pub fn image_to_array(image: &DynamicImage) -> Array3<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut out = Array3::zeros((height as usize, width as usize, 3));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (r, c) = (y as usize, x as usize);
        out[[r, c, 0]] = pixel[0] as f32;
        out[[r, c, 1]] = pixel[1] as f32;
        out[[r, c, 2]] = pixel[2] as f32;
    }
    out
}

/// Luminance plane of an (H, W, 3) image tensor, on the same intensity scale
/// as the input channels.
pub fn luminance(image: &Array3<f32>) -> Array2<f32> {
    let (height, width, channels) = image.dim();
    assert!(channels == 3, "image tensor must have 3 channels");
    Array2::from_shape_fn((height, width), |(r, c)| {
        0.299 * image[[r, c, 0]] + 0.587 * image[[r, c, 1]] + 0.114 * image[[r, c, 2]]
    })
}

/// Grayscale byte image for the detector backends.
///
/// Tolerates tensors already scaled to 0-1 by rescaling them to 0-255 before
/// quantizing.
pub fn to_gray_bytes(image: &Array3<f32>) -> GrayImage {
    let gray = luminance(image);
    let (height, width) = gray.dim();
    let max = gray.iter().copied().fold(0.0f32, f32::max);
    let scale = if max <= 1.0 { 255.0 } else { 1.0 };
    let bytes: Vec<u8> = gray
        .iter()
        .map(|&v| (v * scale).clamp(0.0, 255.0) as u8)
        .collect();
    GrayImage::from_raw(width as u32, height as u32, bytes)
        .expect("buffer length matches dimensions")
}

/// Min-max normalization to [0, 1].
///
/// A flat map (range below epsilon) normalizes to all-zero instead of
/// dividing by a near-zero range.
pub fn normalize_unit(map: &Array2<f32>) -> Array2<f32> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in map.iter() {
        min = min.min(v);
        max = max.max(v);
    }
    if !(max - min >= NORM_EPS) {
        return Array2::zeros(map.raw_dim());
    }
    let range = max - min;
    map.mapv(|v| ((v - min) / range).clamp(0.0, 1.0))
}

pub fn clamp01(map: &Array2<f32>) -> Array2<f32> {
    map.mapv(|v| v.clamp(0.0, 1.0))
}

pub(crate) fn array_to_gray_f32(map: &Array2<f32>) -> GrayF32 {
    let (height, width) = map.dim();
    let raw: Vec<f32> = map.iter().copied().collect();
    ImageBuffer::from_raw(width as u32, height as u32, raw)
        .expect("buffer length matches dimensions")
}

pub(crate) fn gray_f32_to_array(image: &GrayF32) -> Array2<f32> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        image.get_pixel(c as u32, r as u32)[0]
    })
}

pub(crate) fn gray_u8_to_array(image: &GrayImage) -> Array2<f32> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        image.get_pixel(c as u32, r as u32)[0] as f32
    })
}
