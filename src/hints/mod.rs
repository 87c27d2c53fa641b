//! Soft spatial priors ("hints") built from external detectors.
//!
//! Every hint variant shares one construction path: detector boxes are
//! rasterized into a binary mask, softened with a size-scaled Gaussian blur,
//! and min-max normalized into [0, 1]. No detections produce the all-zero
//! mask, which is a valid result rather than an error.

mod face;
mod object;
mod text;

use std::collections::BTreeMap;

use image::DynamicImage;
use imageproc::filter::gaussian_blur_f32;
use ndarray::{s, Array2};
use tracing::warn;

use crate::config::{DetectorConfig, HintConfig};
use crate::detect::{FaceDetector, SeetaFaceDetector, TextDetector};
use crate::error::{Error, Result};
use crate::map::{array_to_gray_f32, clamp01, gray_f32_to_array, image_to_array, normalize_unit};
use crate::modulate::modulate_attention;
use crate::region::Region;

pub use text::GradientTextDetector;
#[cfg(feature = "neural-text")]
pub use text::EastTextDetector;

/// Which strategy produced a hint map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintSource {
    /// Face cascade detector.
    Cascade,
    /// Neural box-regression text detector.
    Neural,
    /// Classical gradient/contour text heuristic.
    Heuristic,
    /// The cue's detector capability was absent; the cue was skipped.
    Unavailable,
}

/// Output of a hint-modulation run.
#[derive(Debug)]
pub struct HintRunResult {
    /// The modulated attention map.
    pub attention_map: Array2<f32>,
    /// Raw hint maps by cue name ("face", "text"), present only for cues
    /// whose detector was available.
    pub hint_maps: BTreeMap<String, Array2<f32>>,
    pub face_source: HintSource,
    pub text_source: HintSource,
}

/// Detector strategies resolved once at startup
///
/// Holds one backend per cue behind the [`FaceDetector`] / [`TextDetector`]
/// traits so any implementation satisfying the box-list contract can be
/// swapped in. Backends load their model assets lazily and exactly once for
/// the engine's lifetime; create the engine once per process to get
/// initialize-once, read-many behavior for the assets.
pub struct HintEngine {
    face: Box<dyn FaceDetector>,
    text_primary: Option<Box<dyn TextDetector>>,
    text_fallback: Box<dyn TextDetector>,
}

impl HintEngine {
    /// Resolves the default backends: the Seeta face cascade, the neural
    /// text detector when its model asset resolves, and the gradient
    /// heuristic as the always-available text fallback.
    pub fn new(config: DetectorConfig) -> Self {
        #[cfg(feature = "neural-text")]
        let text_primary: Option<Box<dyn TextDetector>> = config
            .resolved_text_model()
            .map(|path| Box::new(EastTextDetector::new(path)) as Box<dyn TextDetector>);
        #[cfg(not(feature = "neural-text"))]
        let text_primary: Option<Box<dyn TextDetector>> = None;

        Self {
            face: Box::new(SeetaFaceDetector::new(config)),
            text_primary,
            text_fallback: Box::new(GradientTextDetector),
        }
    }

    /// Builds an engine from explicit detector strategies.
    pub fn with_detectors(
        face: Box<dyn FaceDetector>,
        text_primary: Option<Box<dyn TextDetector>>,
        text_fallback: Box<dyn TextDetector>,
    ) -> Self {
        Self {
            face,
            text_primary,
            text_fallback,
        }
    }

    /// Soft face-prior mask in [0, 1] with the image's shape.
    pub fn face_hint(&self, image: &DynamicImage) -> Result<Array2<f32>> {
        face::build_face_hint(self.face.as_ref(), &image_to_array(image))
    }

    /// Soft text-prior mask in [0, 1] with the image's shape, along with the
    /// strategy that produced it.
    pub fn text_hint(&self, image: &DynamicImage) -> Result<(Array2<f32>, HintSource)> {
        text::build_text_hint(
            self.text_primary.as_deref(),
            self.text_fallback.as_ref(),
            &image_to_array(image),
        )
    }

    /// Placeholder object-prior mask; always all-zero until an object
    /// detector backend lands.
    pub fn object_hint(&self, image: &DynamicImage) -> Result<Array2<f32>> {
        Ok(object::build_object_hint(&image_to_array(image)))
    }

    /// Runs the full hint pass: builds face and text hints, combines them as
    /// `clip(alpha * face + beta * text, 0, 1)`, and modulates the base
    /// attention map with the combined hint at full strength and the
    /// configured blend.
    ///
    /// A cue whose detector capability is unavailable is skipped and
    /// reported as [`HintSource::Unavailable`]; with both cues unavailable
    /// the base map passes through unchanged. All other errors propagate.
    pub fn run(
        &self,
        image: &DynamicImage,
        attention_map: &Array2<f32>,
        config: &HintConfig,
    ) -> Result<HintRunResult> {
        let array = image_to_array(image);
        let (height, width, _) = array.dim();
        if attention_map.dim() != (height, width) {
            return Err(Error::InvalidData(format!(
                "attention map shape {:?} does not match image shape {:?}",
                attention_map.dim(),
                (height, width)
            )));
        }

        let alpha = config.alpha.max(0.0);
        let beta = config.beta.max(0.0);

        let (face_hint, face_source) = match face::build_face_hint(self.face.as_ref(), &array) {
            Ok(map) => (Some(map), HintSource::Cascade),
            Err(Error::DetectorUnavailable(reason)) => {
                warn!(%reason, "face hints unavailable; continuing without the face cue");
                (None, HintSource::Unavailable)
            }
            Err(err) => return Err(err),
        };

        let (text_hint, text_source) = match text::build_text_hint(
            self.text_primary.as_deref(),
            self.text_fallback.as_ref(),
            &array,
        ) {
            Ok((map, source)) => (Some(map), source),
            Err(Error::DetectorUnavailable(reason)) => {
                warn!(%reason, "text hints unavailable; continuing without the text cue");
                (None, HintSource::Unavailable)
            }
            Err(err) => return Err(err),
        };

        let combined = combine_hints(face_hint.as_ref(), text_hint.as_ref(), alpha, beta);
        let modulated = modulate_attention(attention_map, combined.as_ref(), 1.0, config.blend)?;

        let mut hint_maps = BTreeMap::new();
        if let Some(map) = face_hint {
            hint_maps.insert("face".to_string(), map);
        }
        if let Some(map) = text_hint {
            hint_maps.insert("text".to_string(), map);
        }

        Ok(HintRunResult {
            attention_map: modulated,
            hint_maps,
            face_source,
            text_source,
        })
    }
}

/// `clip(alpha * face + beta * text, 0, 1)` over whichever cues are present;
/// `None` when neither is.
pub(crate) fn combine_hints(
    face: Option<&Array2<f32>>,
    text: Option<&Array2<f32>>,
    alpha: f32,
    beta: f32,
) -> Option<Array2<f32>> {
    let shape = face.or(text)?.raw_dim();
    let mut combined = Array2::zeros(shape);
    if let Some(map) = face {
        combined.scaled_add(alpha, map);
    }
    if let Some(map) = text {
        combined.scaled_add(beta, map);
    }
    combined.mapv_inplace(|v| v.clamp(0.0, 1.0));
    Some(combined)
}

/// Rasterizes detector regions into a binary mask, then softens it.
pub(crate) fn regions_to_hint(regions: &[Region], height: usize, width: usize) -> Array2<f32> {
    if regions.is_empty() {
        return Array2::zeros((height, width));
    }
    let mask = rasterize_regions(regions, height, width);
    soften_mask(&mask)
}

/// Binary mask with 1.0 inside every clipped region. Overlaps are idempotent.
pub(crate) fn rasterize_regions(regions: &[Region], height: usize, width: usize) -> Array2<f32> {
    let mut mask = Array2::zeros((height, width));
    for region in regions {
        let Some(clipped) = region.clip(width as u32, height as u32) else {
            continue;
        };
        mask.slice_mut(s![
            clipped.y0 as usize..clipped.y1 as usize,
            clipped.x0 as usize..clipped.x1 as usize
        ])
        .fill(1.0);
    }
    mask
}

/// Clamp, blur with a spread proportional to the image size, and normalize.
///
/// The sigma floor keeps tiny images from degenerating to a no-op blur, and
/// the flat-mask case normalizes to all-zero.
pub(crate) fn soften_mask(mask: &Array2<f32>) -> Array2<f32> {
    let (height, width) = mask.dim();
    if height == 0 || width == 0 {
        return mask.clone();
    }
    let clamped = clamp01(mask);
    let sigma = (0.02 * height.min(width) as f32).max(1.0);
    let blurred = gaussian_blur_f32(&array_to_gray_f32(&clamped), sigma);
    normalize_unit(&gray_f32_to_array(&blurred))
}
