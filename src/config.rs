use std::path::PathBuf;

/// Environment variable consulted when no text model path is configured.
pub const TEXT_MODEL_ENV: &str = "EAST_TEXT_MODEL_PATH";

/// Configuration options for the detector backends
///
/// This struct encapsulates the parameters used to resolve and tune the
/// external detectors that back the face and text hints.
#[derive(Clone, Debug)]
pub struct DetectorConfig {
    /// Path to the face detection model file
    ///
    /// Example: "./assets/models/seeta_fd_v1.bin"
    pub face_model_path: String,

    /// Minimum size in pixels for face detection
    ///
    /// Faces smaller than this size will not be detected.
    /// Larger values improve performance but might miss smaller faces.
    pub min_face_size: u32,

    /// Confidence threshold for face detection
    ///
    /// Higher values reduce false positives but might increase false negatives.
    /// Range is typically 0-5, with 2-3 being a good balance.
    pub score_thresh: f64,

    /// Scale factor for the detection pyramid
    ///
    /// Controls how aggressively the image is resized between detection scales.
    /// Lower values (closer to 0) are more thorough but slower,
    /// higher values (closer to 1) are faster but might miss faces.
    pub pyramid_scale_factor: f32,

    /// Horizontal step size for the sliding window
    pub slide_window_step_x: u32,

    /// Vertical step size for the sliding window
    pub slide_window_step_y: u32,

    /// Path to the neural text detection model, if any
    ///
    /// When unset, the `EAST_TEXT_MODEL_PATH` environment variable is
    /// consulted. A path that does not point at an existing file is treated
    /// as absent and text detection falls back to the gradient heuristic.
    pub text_model_path: Option<PathBuf>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            face_model_path: "./assets/models/seeta_fd_v1.bin".to_string(),
            min_face_size: 40,
            score_thresh: 3.0,
            pyramid_scale_factor: 0.7,
            slide_window_step_x: 4,
            slide_window_step_y: 4,
            text_model_path: None,
        }
    }
}

impl DetectorConfig {
    // Create a new instance
    pub fn new() -> Self {
        Self::default()
    }

    // Set face model path
    pub fn set_face_model_path(mut self, path: impl Into<String>) -> Self {
        self.face_model_path = path.into();
        self
    }

    // Set minimum face size
    pub fn set_min_face_size(mut self, size: u32) -> Self {
        self.min_face_size = size;
        self
    }

    // Set score threshold
    pub fn set_score_thresh(mut self, thresh: f64) -> Self {
        self.score_thresh = thresh;
        self
    }

    // Set pyramid scale factor
    pub fn set_pyramid_scale_factor(mut self, factor: f32) -> Self {
        self.pyramid_scale_factor = factor;
        self
    }

    // Set slide window step sizes
    pub fn set_slide_window_step(mut self, x: u32, y: u32) -> Self {
        self.slide_window_step_x = x;
        self.slide_window_step_y = y;
        self
    }

    // Set text model path
    pub fn set_text_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.text_model_path = Some(path.into());
        self
    }

    /// Resolves the text model asset, preferring the configured path over the
    /// `EAST_TEXT_MODEL_PATH` environment variable. Returns `None` when
    /// neither points at an existing file.
    pub fn resolved_text_model(&self) -> Option<PathBuf> {
        if let Some(path) = &self.text_model_path {
            if path.is_file() {
                return Some(path.clone());
            }
        }
        if let Ok(env_path) = std::env::var(TEXT_MODEL_ENV) {
            let path = PathBuf::from(env_path);
            if path.is_file() {
                return Some(path);
            }
        }
        None
    }
}

/// Strengths and mixing factor for the hint-modulation stage
///
/// `alpha` scales the face hint, `beta` scales the text hint, and `blend`
/// interpolates between the unmodulated attention map (0.0) and the fully
/// modulated one (1.0). Out-of-range values are coerced at use, not rejected.
#[derive(Clone, Copy, Debug)]
pub struct HintConfig {
    pub alpha: f32,
    pub beta: f32,
    pub blend: f32,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta: 0.6,
            blend: 1.0,
        }
    }
}

impl HintConfig {
    // Create a new instance
    pub fn new() -> Self {
        Self::default()
    }

    // Set face hint strength
    pub fn set_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    // Set text hint strength
    pub fn set_beta(mut self, beta: f32) -> Self {
        self.beta = beta;
        self
    }

    // Set the core-to-hints mix
    pub fn set_blend(mut self, blend: f32) -> Self {
        self.blend = blend;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_defaults_match_the_documented_values() {
        let config = HintConfig::default();
        assert_eq!(config.alpha, 0.6);
        assert_eq!(config.beta, 0.6);
        assert_eq!(config.blend, 1.0);
    }

    #[test]
    fn builders_override_single_fields() {
        let config = DetectorConfig::new()
            .set_min_face_size(24)
            .set_slide_window_step(2, 3);
        assert_eq!(config.min_face_size, 24);
        assert_eq!(config.slide_window_step_x, 2);
        assert_eq!(config.slide_window_step_y, 3);
        assert_eq!(config.score_thresh, 3.0);
    }

    #[test]
    fn configured_path_must_exist_to_resolve() {
        let config = DetectorConfig::new().set_text_model_path("/nonexistent/detector.onnx");
        // The configured path does not exist, so it never wins resolution.
        if let Some(resolved) = config.resolved_text_model() {
            assert_ne!(resolved, PathBuf::from("/nonexistent/detector.onnx"));
        }
    }
}
