//! Banding and total-score arithmetic
//!
//! Sub-scores arrive on a 0-90 scale and are bucketed into six coarse bands
//! that mirror human rubric levels. The buckets are deliberately non-linear.

/// Maximum score on the continuous scale
pub const MAX_SCORE: f64 = 90.0;
/// Highest band
pub const MAX_BAND: u8 = 5;

/// Criterion weights for the total (content, pronunciation, fluency)
pub const CONTENT_WEIGHT: f64 = 0.4;
pub const PRONUNCIATION_WEIGHT: f64 = 0.3;
pub const FLUENCY_WEIGHT: f64 = 0.3;

/// Convert a 0-90 sub-score to a 0-5 band
///
/// Cutoffs: 0 -> 0, 1-20 -> 1, 21-40 -> 2, 41-60 -> 3, 61-80 -> 4, 81-90 -> 5.
/// Fractional inputs are rounded first; out-of-range inputs saturate.
pub fn to_band(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    let rounded = score.round();
    if rounded <= 0.0 {
        0
    } else if rounded <= 20.0 {
        1
    } else if rounded <= 40.0 {
        2
    } else if rounded <= 60.0 {
        3
    } else if rounded <= 80.0 {
        4
    } else {
        MAX_BAND
    }
}

/// Weighted 0-90 total from three 0-5 band values
///
/// `round(content/5*90*0.4 + pronunciation/5*90*0.3 + fluency/5*90*0.3)`,
/// clamped to `[0, 90]` even when the inputs are out of range.
pub fn compute_total(content: f64, pronunciation: f64, fluency: f64) -> u8 {
    let scale = MAX_SCORE / f64::from(MAX_BAND);
    let total = content * scale * CONTENT_WEIGHT
        + pronunciation * scale * PRONUNCIATION_WEIGHT
        + fluency * scale * FLUENCY_WEIGHT;

    if !total.is_finite() {
        return 0;
    }
    total.round().clamp(0.0, MAX_SCORE) as u8
}

/// Clamp a raw sub-score to the continuous scale
pub fn clamp_to_90(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, MAX_SCORE)
    } else {
        0.0
    }
}

/// Human-readable descriptor for a 0-90 total
pub fn descriptor(total: u8) -> &'static str {
    match total {
        85..=u8::MAX => "Expert",
        76..=84 => "Very Good",
        65..=75 => "Good",
        50..=64 => "Competent",
        36..=49 => "Modest",
        10..=35 => "Limited",
        _ => "Extremely Limited",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_cutoffs() {
        assert_eq!(to_band(0.0), 0);
        assert_eq!(to_band(1.0), 1);
        assert_eq!(to_band(20.0), 1);
        assert_eq!(to_band(21.0), 2);
        assert_eq!(to_band(40.0), 2);
        assert_eq!(to_band(41.0), 3);
        assert_eq!(to_band(60.0), 3);
        assert_eq!(to_band(61.0), 4);
        assert_eq!(to_band(80.0), 4);
        assert_eq!(to_band(81.0), 5);
        assert_eq!(to_band(90.0), 5);
    }

    #[test]
    fn test_band_is_a_step_function_over_61_to_80() {
        for score in 61..=80 {
            assert_eq!(to_band(f64::from(score)), 4, "score {}", score);
        }
    }

    #[test]
    fn test_band_saturates_and_rounds() {
        assert_eq!(to_band(-12.0), 0);
        assert_eq!(to_band(150.0), 5);
        assert_eq!(to_band(0.4), 0);
        assert_eq!(to_band(60.4), 3);
        assert_eq!(to_band(60.5), 4);
        assert_eq!(to_band(f64::NAN), 0);
    }

    #[test]
    fn test_total_formula() {
        assert_eq!(compute_total(0.0, 0.0, 0.0), 0);
        assert_eq!(compute_total(5.0, 5.0, 5.0), 90);
        assert_eq!(compute_total(3.0, 3.0, 3.0), 54);
        // 4/5*90*0.4 + 2/5*90*0.3 + 3/5*90*0.3 = 28.8 + 10.8 + 16.2 = 55.8
        assert_eq!(compute_total(4.0, 2.0, 3.0), 56);
    }

    #[test]
    fn test_total_clamped_for_out_of_range_inputs() {
        assert_eq!(compute_total(10.0, 10.0, 10.0), 90);
        assert_eq!(compute_total(-3.0, -1.0, 0.0), 0);
        assert_eq!(compute_total(f64::INFINITY, 0.0, 0.0), 0);
    }

    #[test]
    fn test_descriptor_boundaries() {
        assert_eq!(descriptor(90), "Expert");
        assert_eq!(descriptor(85), "Expert");
        assert_eq!(descriptor(84), "Very Good");
        assert_eq!(descriptor(65), "Good");
        assert_eq!(descriptor(50), "Competent");
        assert_eq!(descriptor(36), "Modest");
        assert_eq!(descriptor(10), "Limited");
        assert_eq!(descriptor(9), "Extremely Limited");
    }
}
