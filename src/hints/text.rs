use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate};
use ndarray::{Array2, Array3};
use tracing::warn;

use crate::detect::TextDetector;
use crate::error::Result;
use crate::features::sobel_magnitude;
use crate::hints::{regions_to_hint, HintSource};
use crate::map::{gray_u8_to_array, normalize_unit, to_gray_bytes};
use crate::region::Region;

/// Contours smaller than this never count as text, regardless of image size.
const MIN_CONTOUR_AREA: i64 = 50;
/// Acceptable width/height ratio for a text region candidate.
const ASPECT_RANGE: (f32, f32) = (0.5, 15.0);

/// Builds a soft text-prior mask in [0, 1] with shape (H, W).
///
/// Tries the primary (neural) strategy first when one is configured; any
/// failure there falls back to the classical heuristic, and the returned
/// [`HintSource`] reports which strategy actually produced the mask.
pub(crate) fn build_text_hint(
    primary: Option<&dyn TextDetector>,
    fallback: &dyn TextDetector,
    image: &Array3<f32>,
) -> Result<(Array2<f32>, HintSource)> {
    let (height, width, _) = image.dim();
    if height == 0 || width == 0 {
        return Ok((Array2::zeros((height, width)), HintSource::Heuristic));
    }

    let gray = to_gray_bytes(image);

    if let Some(primary) = primary {
        match primary.detect_text(&gray) {
            Ok(regions) => {
                return Ok((regions_to_hint(&regions, height, width), HintSource::Neural))
            }
            Err(err) => {
                warn!(error = %err, "neural text detection failed; falling back to gradient heuristic");
            }
        }
    }

    let regions = fallback.detect_text(&gray)?;
    Ok((regions_to_hint(&regions, height, width), HintSource::Heuristic))
}

/// Classical text-region heuristic
///
/// Gradient magnitude is thresholded with Otsu's method, closed and dilated
/// with a size-scaled structuring element so glyphs merge into line-shaped
/// blobs, and the outer contours are filtered by area and aspect ratio.
/// Requires no model asset, so it is always available as the fallback
/// strategy.
pub struct GradientTextDetector;

impl TextDetector for GradientTextDetector {
    fn detect_text(&self, gray: &GrayImage) -> Result<Vec<Region>> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let blurred = gaussian_blur_f32(gray, 0.8);
        let magnitude = sobel_magnitude(&gray_u8_to_array(&blurred));
        let Some(magnitude_bytes) = magnitude_to_bytes(&magnitude) else {
            // Flat gradient response: nothing resembling text anywhere.
            return Ok(Vec::new());
        };

        let level = otsu_level(&magnitude_bytes);
        let binary = threshold(&magnitude_bytes, level, ThresholdType::Binary);

        let k = ((width.min(height) / 80).clamp(1, 255)) as u8;
        let closed = close(&binary, Norm::LInf, k);
        let dilated = dilate(&closed, Norm::LInf, k);

        let min_area = ((height as i64 * width as i64) / 1000).max(MIN_CONTOUR_AREA);
        let mut regions = Vec::new();
        for contour in find_contours::<i32>(&dilated) {
            if contour.border_type != BorderType::Outer {
                continue;
            }
            let Some(bbox) = contour_bbox(&contour.points) else {
                continue;
            };
            if bbox.area() < min_area {
                continue;
            }
            let aspect = bbox.width() as f32 / bbox.height().max(1) as f32;
            if aspect < ASPECT_RANGE.0 || aspect > ASPECT_RANGE.1 {
                continue;
            }
            regions.push(bbox);
        }
        Ok(regions)
    }
}

/// Min-max scales a gradient map to bytes; `None` when the map is flat.
fn magnitude_to_bytes(magnitude: &Array2<f32>) -> Option<GrayImage> {
    let normalized = normalize_unit(magnitude);
    if normalized.iter().all(|&v| v == 0.0) {
        return None;
    }
    let (height, width) = normalized.dim();
    let bytes: Vec<u8> = normalized.iter().map(|&v| (v * 255.0) as u8).collect();
    GrayImage::from_raw(width as u32, height as u32, bytes)
}

fn contour_bbox(points: &[imageproc::point::Point<i32>]) -> Option<Region> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    // Contour coordinates are inclusive; regions are exclusive on the far edge.
    Some(Region::new(min_x, min_y, max_x + 1, max_y + 1))
}

#[cfg(feature = "neural-text")]
pub use east::EastTextDetector;

#[cfg(feature = "neural-text")]
mod east {
    use std::path::PathBuf;

    use image::imageops::{self, FilterType};
    use image::GrayImage;
    use once_cell::sync::OnceCell;
    use ort::session::Session;
    use parking_lot::Mutex;
    use tracing::debug;

    use crate::error::{Error, Result};
    use crate::region::{non_max_suppression, Region};

    const SCORE_THRESHOLD: f32 = 0.5;
    const NMS_IOU_THRESHOLD: f32 = 0.4;
    /// Longest side fed to the network; smaller images are not upscaled.
    const TARGET_MAX_SIDE: f32 = 320.0;
    /// Per-channel means removed before inference.
    const CHANNEL_MEAN: [f32; 3] = [123.68, 116.78, 103.94];

    /// Neural text detection via an EAST-style box-regression model
    ///
    /// Runs an ONNX model whose outputs are a confidence plane and a
    /// five-plane box geometry at quarter resolution. The session is
    /// created lazily on first use and kept for the detector's lifetime.
    pub struct EastTextDetector {
        model_path: PathBuf,
        session: OnceCell<Mutex<Session>>,
    }

    impl EastTextDetector {
        pub fn new(model_path: PathBuf) -> Self {
            Self {
                model_path,
                session: OnceCell::new(),
            }
        }

        fn session(&self) -> Result<&Mutex<Session>> {
            self.session.get_or_try_init(|| {
                let session = Session::builder()
                    .map_err(|e| {
                        Error::ModelLoad(format!("failed to create session builder: {}", e))
                    })?
                    .commit_from_file(&self.model_path)
                    .map_err(|e| {
                        Error::ModelLoad(format!(
                            "failed to load text model from {}: {}",
                            self.model_path.display(),
                            e
                        ))
                    })?;
                debug!(path = %self.model_path.display(), "loaded text detection model");
                Ok(Mutex::new(session))
            })
        }
    }

    impl super::TextDetector for EastTextDetector {
        fn detect_text(&self, gray: &GrayImage) -> Result<Vec<Region>> {
            let (width, height) = gray.dimensions();

            // Resize preserving aspect ratio, dimensions snapped down to a
            // multiple of 32 with a floor of 32.
            let scale = (TARGET_MAX_SIDE / width.max(height) as f32).min(1.0);
            let new_w = (((width as f32 * scale) as u32).max(32) / 32) * 32;
            let new_h = (((height as f32 * scale) as u32).max(32) / 32) * 32;
            let resized = imageops::resize(gray, new_w, new_h, FilterType::Triangle);

            // NCHW blob with the gray plane replicated across three channels.
            let plane = (new_w * new_h) as usize;
            let mut blob = vec![0f32; 3 * plane];
            for (i, px) in resized.as_raw().iter().enumerate() {
                let v = *px as f32;
                for (channel, mean) in CHANNEL_MEAN.iter().enumerate() {
                    blob[channel * plane + i] = v - mean;
                }
            }

            let mut session = self.session()?.lock();
            let input_name = session
                .inputs()
                .first()
                .map(|input| input.name().to_string())
                .ok_or_else(|| {
                    Error::DetectorUnavailable("text model declares no inputs".to_string())
                })?;
            let output_names: Vec<String> = session
                .outputs()
                .iter()
                .map(|output| output.name().to_string())
                .collect();

            let shape = vec![1i64, 3, new_h as i64, new_w as i64];
            let tensor = ort::value::Tensor::from_array((shape, blob)).map_err(|e| {
                Error::DetectorUnavailable(format!("failed to build input tensor: {}", e))
            })?;
            let outputs = session
                .run(ort::inputs![input_name.as_str() => tensor])
                .map_err(|e| {
                    Error::DetectorUnavailable(format!("text model inference failed: {}", e))
                })?;

            let mut planes: Vec<(Vec<usize>, Vec<f32>)> = Vec::new();
            for name in &output_names {
                if let Some(value) = outputs.get(name.as_str()) {
                    if let Ok((dims, data)) = value.try_extract_tensor::<f32>() {
                        planes.push((dims.iter().map(|&d| d as usize).collect(), data.to_vec()));
                    }
                }
            }

            let scores = planes.iter().find(|(dims, _)| dims.len() == 4 && dims[1] == 1);
            let geometry = planes.iter().find(|(dims, _)| dims.len() == 4 && dims[1] == 5);
            let (Some((score_dims, score_data)), Some((geometry_dims, geometry_data))) =
                (scores, geometry)
            else {
                return Err(Error::DetectorUnavailable(
                    "text model outputs lack score and geometry planes".to_string(),
                ));
            };

            let rows = score_dims[2];
            let cols = score_dims[3];
            if geometry_dims[2] != rows || geometry_dims[3] != cols {
                return Err(Error::DetectorUnavailable(
                    "text model score and geometry resolutions disagree".to_string(),
                ));
            }

            let cell_count = rows * cols;
            let mut candidates: Vec<(Region, f32)> = Vec::new();
            for y in 0..rows {
                for x in 0..cols {
                    let index = y * cols + x;
                    let score = score_data[index];
                    if score < SCORE_THRESHOLD {
                        continue;
                    }
                    let top = geometry_data[index];
                    let right = geometry_data[cell_count + index];
                    let bottom = geometry_data[2 * cell_count + index];
                    let left = geometry_data[3 * cell_count + index];
                    let angle = geometry_data[4 * cell_count + index];

                    let (sin, cos) = angle.sin_cos();
                    let box_h = top + bottom;
                    let box_w = right + left;
                    let offset_x = x as f32 * 4.0;
                    let offset_y = y as f32 * 4.0;
                    let end_x = offset_x + cos * right + sin * bottom;
                    let end_y = offset_y - sin * right + cos * bottom;

                    candidates.push((
                        Region::new(
                            (end_x - box_w) as i32,
                            (end_y - box_h) as i32,
                            end_x as i32,
                            end_y as i32,
                        ),
                        score,
                    ));
                }
            }

            let kept = non_max_suppression(candidates, NMS_IOU_THRESHOLD);

            // Back to source coordinates.
            let scale_x = width as f32 / new_w as f32;
            let scale_y = height as f32 / new_h as f32;
            Ok(kept
                .into_iter()
                .map(|region| {
                    Region::new(
                        (region.x0 as f32 * scale_x) as i32,
                        (region.y0 as f32 * scale_y) as i32,
                        (region.x1 as f32 * scale_x) as i32,
                        (region.y1 as f32 * scale_y) as i32,
                    )
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn text_like_image(width: u32, height: u32) -> GrayImage {
        // A band of alternating vertical strokes, shaped like a text line.
        GrayImage::from_fn(width, height, |x, y| {
            let in_band = (40..56).contains(&y) && (20..width - 20).contains(&x);
            if in_band && x % 2 == 0 {
                image::Luma([255])
            } else {
                image::Luma([0])
            }
        })
    }

    #[test]
    fn heuristic_finds_a_text_like_band() {
        let gray = text_like_image(200, 100);
        let regions = GradientTextDetector.detect_text(&gray).unwrap();
        assert!(!regions.is_empty());
        let band = Region::new(20, 40, 180, 56);
        assert!(
            regions.iter().any(|r| r.iou(&band) > 0.2),
            "no detected region overlaps the band: {:?}",
            regions
        );
    }

    #[test]
    fn heuristic_returns_nothing_on_a_flat_image() {
        let gray = GrayImage::from_pixel(120, 80, image::Luma([0]));
        assert!(GradientTextDetector.detect_text(&gray).unwrap().is_empty());

        let gray = GrayImage::from_pixel(120, 80, image::Luma([200]));
        assert!(GradientTextDetector.detect_text(&gray).unwrap().is_empty());
    }

    #[test]
    fn heuristic_tolerates_degenerate_sizes() {
        for (w, h) in [(1, 1), (2, 2), (1, 50)] {
            let gray = GrayImage::new(w, h);
            assert!(GradientTextDetector.detect_text(&gray).unwrap().is_empty());
        }
    }

    #[test]
    fn contour_bbox_spans_the_points_inclusively() {
        use imageproc::point::Point;
        let points = vec![Point::new(3, 4), Point::new(10, 4), Point::new(10, 9)];
        let bbox = contour_bbox(&points).unwrap();
        assert_eq!(bbox, Region::new(3, 4, 11, 10));
        assert!(contour_bbox(&[]).is_none());
    }

    #[test]
    fn failing_primary_falls_back_to_the_heuristic_observably() {
        struct BrokenDetector;
        impl TextDetector for BrokenDetector {
            fn detect_text(&self, _gray: &GrayImage) -> Result<Vec<Region>> {
                Err(Error::ModelLoad("corrupt model".to_string()))
            }
        }

        let image = Array3::from_elem((40, 40, 3), 60.0);
        let (hint, source) =
            build_text_hint(Some(&BrokenDetector), &GradientTextDetector, &image).unwrap();
        assert_eq!(source, HintSource::Heuristic);
        assert_eq!(hint.dim(), (40, 40));
    }

    #[test]
    fn working_primary_reports_the_neural_source() {
        struct CannedDetector;
        impl TextDetector for CannedDetector {
            fn detect_text(&self, _gray: &GrayImage) -> Result<Vec<Region>> {
                Ok(vec![Region::new(5, 5, 25, 12)])
            }
        }

        let image = Array3::from_elem((32, 32, 3), 60.0);
        let (hint, source) =
            build_text_hint(Some(&CannedDetector), &GradientTextDetector, &image).unwrap();
        assert_eq!(source, HintSource::Neural);
        assert!(hint[[8, 15]] > 0.0);
    }
}
