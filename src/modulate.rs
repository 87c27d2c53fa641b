use ndarray::Array2;

use crate::error::{Error, Result};
use crate::map::{clamp01, normalize_unit};

/// Applies a soft spatial prior to an attention map.
///
/// With no hint the input map is returned unchanged, element for element.
/// Otherwise both maps are clamped to [0, 1], the attention map is scaled by
/// `1 + alpha * hint`, clipped to [0, 1 + alpha], min-max renormalized, and
/// finally blended back toward the clamped original: `blend = 1.0` keeps the
/// fully modulated map, `blend = 0.0` the original. A negative `alpha` is
/// coerced to zero and `blend` is clamped into [0, 1] rather than rejected.
///
/// A hint whose shape differs from the attention map is a contract violation.
pub fn modulate_attention(
    attention_map: &Array2<f32>,
    hint_map: Option<&Array2<f32>>,
    alpha: f32,
    blend: f32,
) -> Result<Array2<f32>> {
    let Some(hint_map) = hint_map else {
        return Ok(attention_map.clone());
    };

    if hint_map.dim() != attention_map.dim() {
        return Err(Error::InvalidData(format!(
            "hint map shape {:?} does not match attention map shape {:?}",
            hint_map.dim(),
            attention_map.dim()
        )));
    }

    let alpha = alpha.max(0.0);
    let blend = blend.clamp(0.0, 1.0);

    let base = clamp01(attention_map);
    let hint = clamp01(hint_map);

    let ceiling = 1.0 + alpha;
    let mut modulated = &base * &hint.mapv(|h| 1.0 + alpha * h);
    modulated.mapv_inplace(|v| v.clamp(0.0, ceiling));

    let normalized = normalize_unit(&modulated);
    if blend >= 1.0 {
        return Ok(normalized);
    }

    Ok(&base * (1.0 - blend) + &normalized * blend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn no_hint_is_an_exact_passthrough() {
        let base = array![[0.1, 0.5], [0.2, 0.9]];
        let output = modulate_attention(&base, None, 0.6, 1.0).unwrap();
        assert_eq!(base, output);

        // Even out-of-range values pass through untouched.
        let unclamped = array![[1.5, -0.2]];
        let output = modulate_attention(&unclamped, None, 2.0, 0.3).unwrap();
        assert_eq!(unclamped, output);
    }

    #[test]
    fn hinted_cell_strictly_exceeds_unhinted_cell() {
        let base = array![[0.2, 0.2], [0.2, 0.2]];
        let hint = array![[1.0, 0.0], [0.0, 0.0]];
        let output = modulate_attention(&base, Some(&hint), 1.0, 1.0).unwrap();
        assert!(output[[0, 0]] > output[[0, 1]]);
    }

    #[test]
    fn output_stays_in_the_unit_interval() {
        let base = array![[0.3, 0.9, 0.04], [0.75, 0.11, 0.6]];
        let hint = array![[1.0, 0.0, 1.0], [0.0, 1.0, 0.0]];
        let output = modulate_attention(&base, Some(&hint), 1.5, 0.8).unwrap();
        assert!(output.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn zero_blend_returns_the_clamped_base() {
        let base = array![[1.4, 0.5], [-0.3, 0.8]];
        let hint = array![[1.0, 0.0], [1.0, 0.0]];
        let output = modulate_attention(&base, Some(&hint), 1.0, 0.0).unwrap();
        assert_eq!(output, array![[1.0, 0.5], [0.0, 0.8]]);
    }

    #[test]
    fn out_of_range_blend_and_alpha_are_coerced() {
        let base = array![[0.2, 0.4]];
        let hint = array![[1.0, 0.0]];
        let clamped_high = modulate_attention(&base, Some(&hint), 1.0, 7.0).unwrap();
        let exact_one = modulate_attention(&base, Some(&hint), 1.0, 1.0).unwrap();
        assert_eq!(clamped_high, exact_one);

        let negative_alpha = modulate_attention(&base, Some(&hint), -3.0, 1.0).unwrap();
        let zero_alpha = modulate_attention(&base, Some(&hint), 0.0, 1.0).unwrap();
        assert_eq!(negative_alpha, zero_alpha);
    }

    #[test]
    fn flat_modulated_map_normalizes_to_zeros() {
        // A flat base with a flat hint stays flat after scaling, so the
        // renormalization step must zero it out, not divide by zero.
        let base = array![[0.5, 0.5], [0.5, 0.5]];
        let hint = array![[1.0, 1.0], [1.0, 1.0]];
        let output = modulate_attention(&base, Some(&hint), 1.0, 1.0).unwrap();
        assert!(output.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn shape_mismatch_is_a_contract_violation() {
        let base = array![[0.2, 0.2], [0.2, 0.2]];
        let hint = array![[1.0, 0.0]];
        let err = modulate_attention(&base, Some(&hint), 1.0, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }
}
