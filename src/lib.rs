//! Deterministic, rule-based visual attention maps for still images.
//!
//! The pipeline scores every pixel of an image in [0, 1] by how strongly it
//! is expected to draw a viewer's gaze, using only low-level image
//! statistics: a center-bias prior, local contrast, edge density, and a
//! center-surround difference, fused with per-feature contribution
//! accounting. An optional second stage re-weights the fused map with soft
//! face and text priors obtained from external detectors.
//!
//! The core is synchronous and pure: the same image and configuration always
//! produce bit-identical output, and no stage mutates another's maps.
//! Rendering the maps as heatmaps or overlays is a downstream concern and is
//! not part of this crate.

mod config;
mod detect;
mod error;
mod features;
mod fusion;
mod hints;
mod map;
mod modulate;
mod region;

use std::collections::BTreeMap;

use image::DynamicImage;
use ndarray::Array2;

pub use config::{DetectorConfig, HintConfig, TEXT_MODEL_ENV};
pub use detect::{FaceDetector, SeetaFaceDetector, TextDetector};
pub use error::{Error, Result};
pub use features::{uniform_weights, Feature};
pub use fusion::{fuse, fuse_maps, score_features};
#[cfg(feature = "neural-text")]
pub use hints::EastTextDetector;
pub use hints::{GradientTextDetector, HintEngine, HintRunResult, HintSource};
pub use map::{clamp01, image_to_array, luminance, normalize_unit, to_gray_bytes};
pub use modulate::modulate_attention;
pub use region::{non_max_suppression, Region};

/// Result of one attention run
///
/// Bundles the fused attention map with a snapshot of each feature's
/// normalized contribution to it. Produced once per run and owned by the
/// caller; nothing in the pipeline mutates it afterwards.
///
/// # Fields
/// * `attention_map: Array2<f32>` - Fused per-pixel attention scores at the
///   image's height and width
/// * `feature_scores: BTreeMap<String, f32>` - Normalized contribution per
///   feature name, summing to 1.0 (or all zero when nothing contributed)
#[derive(Debug, Clone)]
pub struct AttentionResult {
    pub attention_map: Array2<f32>,
    pub feature_scores: BTreeMap<String, f32>,
}

/// Runs the core visual attention pipeline on a decoded image with uniform
/// feature weights.
///
/// # Parameters
/// * `image: &DynamicImage` - The source image; any supported pixel format is
///   coerced to 3-channel RGB before analysis
///
/// # Returns
/// * `Result<AttentionResult>` - The fused attention map and per-feature
///   contribution scores
///
/// # Example
/// ```rust
/// use image::{DynamicImage, RgbImage};
///
/// let image = DynamicImage::ImageRgb8(RgbImage::new(64, 48));
/// let result = gaze_map::run_attention(&image)?;
/// assert_eq!(result.attention_map.dim(), (48, 64));
/// # Ok::<(), gaze_map::Error>(())
/// ```
pub fn run_attention(image: &DynamicImage) -> Result<AttentionResult> {
    run_attention_with_weights(image, &uniform_weights())
}

/// Runs the core visual attention pipeline with caller-chosen feature
/// weights.
///
/// Weights follow [`Feature::ALL`] order and must be non-negative with one
/// entry per feature; a mismatched count fails fast rather than truncating.
///
/// # Parameters
/// * `image: &DynamicImage` - The source image
/// * `weights: &[f32]` - One non-negative fusion weight per feature, in
///   [`Feature::ALL`] order
///
/// # Returns
/// * `Result<AttentionResult>` - The fused attention map and per-feature
///   contribution scores
///
/// # Example
/// ```rust
/// use image::{DynamicImage, RgbImage};
///
/// let image = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
/// // Lean on edges twice as hard as on the other cues.
/// let result = gaze_map::run_attention_with_weights(&image, &[0.2, 0.2, 0.4, 0.2])?;
/// assert_eq!(result.feature_scores.len(), 4);
/// # Ok::<(), gaze_map::Error>(())
/// ```
pub fn run_attention_with_weights(
    image: &DynamicImage,
    weights: &[f32],
) -> Result<AttentionResult> {
    let array = image_to_array(image);
    let maps: Vec<Array2<f32>> = Feature::ALL.iter().map(|f| f.compute(&array)).collect();
    let names: Vec<&str> = Feature::ALL.iter().map(|f| f.name()).collect();

    let attention_map = fuse_maps(&maps, weights)?;
    let feature_scores = score_features(&names, &maps, weights)?;

    Ok(AttentionResult {
        attention_map,
        feature_scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn test_image() -> DynamicImage {
        let rgb = RgbImage::from_fn(48, 36, |x, y| {
            Rgb([
                ((x * 5) % 256) as u8,
                ((y * 7) % 256) as u8,
                ((x + y) % 256) as u8,
            ])
        });
        DynamicImage::ImageRgb8(rgb)
    }

    #[test]
    fn attention_map_matches_the_image_shape() {
        let result = run_attention(&test_image()).unwrap();
        assert_eq!(result.attention_map.dim(), (36, 48));
        assert!(result.attention_map.iter().all(|v| v.is_finite()));
        assert_eq!(result.feature_scores.len(), Feature::ALL.len());
    }

    #[test]
    fn reruns_are_bit_identical() {
        let image = test_image();
        let first = run_attention(&image).unwrap();
        let second = run_attention(&image).unwrap();
        assert_eq!(first.attention_map, second.attention_map);
        assert_eq!(first.feature_scores, second.feature_scores);
    }

    #[test]
    fn default_run_equals_uniform_weights() {
        let image = test_image();
        let default = run_attention(&image).unwrap();
        let uniform = run_attention_with_weights(&image, &uniform_weights()).unwrap();
        assert_eq!(default.attention_map, uniform.attention_map);
    }

    #[test]
    fn one_by_one_images_run_end_to_end() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([200, 10, 10])));
        let result = run_attention(&image).unwrap();
        assert_eq!(result.attention_map.dim(), (1, 1));
        assert!(result.attention_map[[0, 0]].is_finite());
    }

    #[test]
    fn wrong_weight_count_is_rejected() {
        let err = run_attention_with_weights(&test_image(), &[1.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }
}
