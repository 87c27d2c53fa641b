use ndarray::{Array2, Array3};

use crate::detect::FaceDetector;
use crate::error::Result;
use crate::hints::regions_to_hint;
use crate::map::to_gray_bytes;

/// Builds a soft face-prior mask in [0, 1] with shape (H, W).
///
/// Detector failures propagate; a detector that finds nothing yields the
/// all-zero mask.
pub(crate) fn build_face_hint(
    detector: &dyn FaceDetector,
    image: &Array3<f32>,
) -> Result<Array2<f32>> {
    let (height, width, _) = image.dim();
    if height == 0 || width == 0 {
        return Ok(Array2::zeros((height, width)));
    }

    let gray = to_gray_bytes(image);
    let faces = detector.detect_faces(&gray)?;
    Ok(regions_to_hint(&faces, height, width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;

    struct OneFace;

    impl FaceDetector for OneFace {
        fn detect_faces(&self, _gray: &image::GrayImage) -> Result<Vec<Region>> {
            Ok(vec![Region::from_xywh(10, 10, 20, 20)])
        }
    }

    #[test]
    fn hint_matches_the_image_shape_and_range() {
        let image = Array3::from_elem((48, 64, 3), 128.0);
        let hint = build_face_hint(&OneFace, &image).unwrap();
        assert_eq!(hint.dim(), (48, 64));
        assert!(hint.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(hint[[20, 20]] > hint[[45, 60]]);
    }

    #[test]
    fn zero_area_images_short_circuit_to_an_empty_mask() {
        let image = Array3::zeros((0, 0, 3));
        let hint = build_face_hint(&OneFace, &image).unwrap();
        assert_eq!(hint.dim(), (0, 0));
    }

    #[test]
    fn faces_fully_outside_the_image_contribute_nothing() {
        struct OutsideFace;
        impl FaceDetector for OutsideFace {
            fn detect_faces(&self, _gray: &image::GrayImage) -> Result<Vec<Region>> {
                Ok(vec![Region::from_xywh(-50, -50, 20, 20)])
            }
        }
        let image = Array3::from_elem((16, 16, 3), 128.0);
        let hint = build_face_hint(&OutsideFace, &image).unwrap();
        assert!(hint.iter().all(|&v| v == 0.0));
    }
}
