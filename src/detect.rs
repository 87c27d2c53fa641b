use image::GrayImage;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rustface::Detector;
use tracing::debug;

use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::region::Region;

/// A face detection backend.
///
/// Implementations take a grayscale byte image and return zero or more face
/// regions. A backend whose capability is absent at the deployment boundary
/// (missing model asset, unloadable model) must report
/// [`Error::DetectorUnavailable`] instead of fabricating detections.
pub trait FaceDetector {
    fn detect_faces(&self, gray: &GrayImage) -> Result<Vec<Region>>;
}

/// A text detection backend.
///
/// Implementations take a grayscale byte image and return zero or more text
/// regions, converging on the same box-list contract as [`FaceDetector`].
pub trait TextDetector {
    fn detect_text(&self, gray: &GrayImage) -> Result<Vec<Region>>;
}

/// Face detection via the SeetaFace funnel cascade
///
/// Wraps a [`rustface`] detector configured from [`DetectorConfig`]. The
/// model asset is loaded lazily on first use and kept for the lifetime of
/// the value; the guarded one-time initialization means a detector created
/// once per process reads the asset exactly once.
pub struct SeetaFaceDetector {
    config: DetectorConfig,
    detector: OnceCell<Mutex<Box<dyn Detector>>>,
}

impl SeetaFaceDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            detector: OnceCell::new(),
        }
    }

    fn detector(&self) -> Result<&Mutex<Box<dyn Detector>>> {
        self.detector.get_or_try_init(|| {
            let mut detector =
                rustface::create_detector(&self.config.face_model_path).map_err(|e| {
                    Error::DetectorUnavailable(format!(
                        "failed to load face model from {}: {}",
                        self.config.face_model_path, e
                    ))
                })?;
            detector.set_min_face_size(self.config.min_face_size);
            detector.set_score_thresh(self.config.score_thresh);
            detector.set_pyramid_scale_factor(self.config.pyramid_scale_factor);
            detector.set_slide_window_step(
                self.config.slide_window_step_x,
                self.config.slide_window_step_y,
            );
            debug!(path = %self.config.face_model_path, "loaded face detection model");
            Ok(Mutex::new(detector))
        })
    }
}

impl FaceDetector for SeetaFaceDetector {
    fn detect_faces(&self, gray: &GrayImage) -> Result<Vec<Region>> {
        let detector = self.detector()?;
        let (width, height) = gray.dimensions();
        let data = rustface::ImageData::new(gray.as_raw(), width, height);
        let faces = detector.lock().detect(&data);
        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Region::from_xywh(
                    bbox.x(),
                    bbox.y(),
                    bbox.width() as i32,
                    bbox.height() as i32,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_face_model_surfaces_as_capability_unavailable() {
        let config = DetectorConfig::new().set_face_model_path("/nonexistent/seeta.bin");
        let detector = SeetaFaceDetector::new(config);
        let gray = GrayImage::new(32, 32);
        let err = detector.detect_faces(&gray).unwrap_err();
        assert!(matches!(err, Error::DetectorUnavailable(_)));
        // And it keeps failing the same way on subsequent calls.
        let err = detector.detect_faces(&gray).unwrap_err();
        assert!(matches!(err, Error::DetectorUnavailable(_)));
    }
}
