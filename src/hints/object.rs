use ndarray::{Array2, Array3};

/// Placeholder object-prior mask, all-zero at the image's shape.
///
/// Kept as a third hint variant so wiring in a real detector later needs no
/// orchestrator changes.
pub(crate) fn build_object_hint(image: &Array3<f32>) -> Array2<f32> {
    let (height, width, _) = image.dim();
    // TODO: back this with an object detector and feed its boxes through the
    // same rasterize-and-soften path used by the face and text hints.
    Array2::zeros((height, width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_returns_zeros_at_the_image_shape() {
        let image = Array3::from_elem((12, 9, 3), 200.0);
        let hint = build_object_hint(&image);
        assert_eq!(hint.dim(), (12, 9));
        assert!(hint.iter().all(|&v| v == 0.0));
    }
}
