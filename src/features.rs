use imageproc::filter::filter3x3;
use ndarray::{Array2, Array3};

use crate::map::{array_to_gray_f32, luminance, normalize_unit};

const K_SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const K_SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

/// The fixed set of low-level cues fused into the attention map
///
/// Each variant is a pure function of the image tensor: no shared state, no
/// side effects, and an output map of exactly the image's height and width.
/// All variants return finite values for any valid input size, including 1x1,
/// normalized into [0, 1] so contribution scores stay comparable across cues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feature {
    /// Static prior growing with proximity to the geometric center.
    CenterBias,
    /// Local intensity variance of the luminance plane.
    Contrast,
    /// Locally averaged Sobel gradient magnitude.
    EdgeDensity,
    /// Difference of a small local mean against a larger surrounding mean.
    CenterSurround,
}

impl Feature {
    /// Canonical fusion order.
    pub const ALL: [Feature; 4] = [
        Feature::CenterBias,
        Feature::Contrast,
        Feature::EdgeDensity,
        Feature::CenterSurround,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::CenterBias => "center_bias",
            Feature::Contrast => "contrast",
            Feature::EdgeDensity => "edge_density",
            Feature::CenterSurround => "center_surround",
        }
    }

    /// Computes this cue's score map for an (H, W, 3) image tensor.
    pub fn compute(self, image: &Array3<f32>) -> Array2<f32> {
        let (height, width, _) = image.dim();
        if height == 0 || width == 0 {
            return Array2::zeros((height, width));
        }
        match self {
            Feature::CenterBias => center_bias(height, width),
            Feature::Contrast => contrast(image),
            Feature::EdgeDensity => edge_density(image),
            Feature::CenterSurround => center_surround(image),
        }
    }
}

/// Uniform weight vector over the canonical feature set.
pub fn uniform_weights() -> Vec<f32> {
    vec![1.0 / Feature::ALL.len() as f32; Feature::ALL.len()]
}

fn center_bias(height: usize, width: usize) -> Array2<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    Array2::from_shape_fn((height, width), |(r, c)| {
        let dx = (c as f32 - cx) / width as f32;
        let dy = (r as f32 - cy) / height as f32;
        let distance = (dx * dx + dy * dy).sqrt();
        1.0 - distance.min(1.0)
    })
}

fn contrast(image: &Array3<f32>) -> Array2<f32> {
    let gray = luminance(image);
    let (height, width) = gray.dim();
    let radius = window_radius(height, width);
    let mean = box_mean(&gray, radius);
    let mean_sq = box_mean(&gray.mapv(|v| v * v), radius);
    let variance =
        Array2::from_shape_fn((height, width), |(r, c)| {
            (mean_sq[[r, c]] - mean[[r, c]] * mean[[r, c]]).max(0.0)
        });
    normalize_unit(&variance)
}

fn edge_density(image: &Array3<f32>) -> Array2<f32> {
    let gray = luminance(image).mapv(|v| v / 255.0);
    let magnitude = sobel_magnitude(&gray);
    let (height, width) = magnitude.dim();
    let density = box_mean(&magnitude, window_radius(height, width));
    normalize_unit(&density)
}

fn center_surround(image: &Array3<f32>) -> Array2<f32> {
    let gray = luminance(image);
    let (height, width) = gray.dim();
    let center_radius = window_radius(height, width);
    let surround_radius = center_radius * 4;
    let center = box_mean(&gray, center_radius);
    let surround = box_mean(&gray, surround_radius);
    let difference = Array2::from_shape_fn((height, width), |(r, c)| {
        (center[[r, c]] - surround[[r, c]]).abs()
    });
    normalize_unit(&difference)
}

/// Sobel gradient magnitude of a single-channel map.
pub(crate) fn sobel_magnitude(gray: &Array2<f32>) -> Array2<f32> {
    let (height, width) = gray.dim();
    let buffer = array_to_gray_f32(gray);
    let gx: Vec<f32> = filter3x3(&buffer, &K_SOBEL_X).into_raw();
    let gy: Vec<f32> = filter3x3(&buffer, &K_SOBEL_Y).into_raw();
    Array2::from_shape_fn((height, width), |(r, c)| {
        let i = r * width + c;
        (gx[i] * gx[i] + gy[i] * gy[i]).sqrt()
    })
}

fn window_radius(height: usize, width: usize) -> usize {
    (height.min(width) / 32).max(1)
}

/// Mean over a border-clamped square window of the given radius, computed
/// with a summed-area table. Windows are truncated at the image borders and
/// divided by the pixel count actually covered.
fn box_mean(map: &Array2<f32>, radius: usize) -> Array2<f32> {
    let (height, width) = map.dim();
    let mut integral = Array2::<f64>::zeros((height + 1, width + 1));
    for r in 0..height {
        let mut row_sum = 0f64;
        for c in 0..width {
            row_sum += map[[r, c]] as f64;
            integral[[r + 1, c + 1]] = integral[[r, c + 1]] + row_sum;
        }
    }
    Array2::from_shape_fn((height, width), |(r, c)| {
        let r0 = r.saturating_sub(radius);
        let c0 = c.saturating_sub(radius);
        let r1 = (r + radius + 1).min(height);
        let c1 = (c + radius + 1).min(width);
        let sum = integral[[r1, c1]] - integral[[r0, c1]] - integral[[r1, c0]]
            + integral[[r0, c0]];
        (sum / ((r1 - r0) * (c1 - c0)) as f64) as f32
    })
}
