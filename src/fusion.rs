use std::collections::BTreeMap;

use ndarray::{Array2, Array3};

use crate::error::{Error, Result};
use crate::features::Feature;

/// Combines feature maps into one attention map by weighted sum.
///
/// Weights map one-to-one onto `maps`; a length mismatch, a negative or
/// non-finite weight, or maps of differing shapes are contract violations.
/// All-zero weights produce the zero map without any special-casing by the
/// caller, and increasing one weight while holding the others fixed never
/// decreases that feature's share of the output.
pub fn fuse_maps(maps: &[Array2<f32>], weights: &[f32]) -> Result<Array2<f32>> {
    if maps.is_empty() {
        return Err(Error::InvalidData(
            "at least one feature map is required for fusion".to_string(),
        ));
    }
    validate_weights(maps.len(), weights)?;

    let dim = maps[0].raw_dim();
    for (i, map) in maps.iter().enumerate() {
        if map.raw_dim() != dim {
            return Err(Error::InvalidData(format!(
                "feature map {} has shape {:?}, expected {:?}",
                i,
                map.dim(),
                maps[0].dim()
            )));
        }
    }

    let mut fused = Array2::zeros(dim);
    for (map, &weight) in maps.iter().zip(weights) {
        fused.scaled_add(weight, map);
    }
    Ok(fused)
}

/// Computes the four canonical feature maps and fuses them.
pub fn fuse(image: &Array3<f32>, weights: &[f32]) -> Result<Array2<f32>> {
    let maps: Vec<Array2<f32>> = Feature::ALL.iter().map(|f| f.compute(image)).collect();
    fuse_maps(&maps, weights)
}

/// Normalized per-feature contribution scores.
///
/// Each feature contributes the spatial mean of its raw map times its weight;
/// contributions are then normalized to sum to 1. A non-positive total (all
/// maps zero, or all weights zero) yields exactly 0.0 for every feature
/// rather than a division by zero.
pub fn score_features(
    feature_names: &[&str],
    maps: &[Array2<f32>],
    weights: &[f32],
) -> Result<BTreeMap<String, f32>> {
    if feature_names.len() != maps.len() {
        return Err(Error::InvalidData(format!(
            "{} feature names for {} maps",
            feature_names.len(),
            maps.len()
        )));
    }
    validate_weights(maps.len(), weights)?;

    let contributions: Vec<f32> = maps
        .iter()
        .zip(weights)
        .map(|(map, &weight)| map.mean().unwrap_or(0.0) * weight)
        .collect();

    let total: f32 = contributions.iter().sum();
    if total <= 0.0 {
        return Ok(feature_names
            .iter()
            .map(|name| (name.to_string(), 0.0))
            .collect());
    }

    Ok(feature_names
        .iter()
        .zip(contributions)
        .map(|(name, value)| (name.to_string(), value / total))
        .collect())
}

fn validate_weights(expected: usize, weights: &[f32]) -> Result<()> {
    if weights.len() != expected {
        return Err(Error::InvalidData(format!(
            "{} weights supplied for {} features",
            weights.len(),
            expected
        )));
    }
    if let Some(weight) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(Error::InvalidData(format!(
            "weights must be finite and non-negative, got {}",
            weight
        )));
    }
    Ok(())
}
