//! Confidence scoring for validation results.
//!
//! Containment alone over-accepts: a fix that barely clips a widened
//! radius with 90 m of noise should not clock someone in. Every result
//! therefore carries a 0..=1 confidence, and acceptance requires clearing
//! a threshold on top of containment.

/// Accuracy above which the quality penalty steepens.
const QUALITY_KNEE_METERS: f64 = 20.0;

/// Quality lost per meter of accuracy below the knee.
const GENTLE_SLOPE: f64 = 0.005;

/// Quality lost per meter of accuracy above the knee.
const STEEP_SLOPE: f64 = 0.01;

/// GPS-quality score for a fix accuracy.
///
/// 1.0 for a perfect fix, sloping to 0.9 at 20 m, then falling twice as
/// fast; 0.0 from 110 m on. Continuous across the knee.
pub fn quality_score(accuracy_meters: f64) -> f64 {
    let score = if accuracy_meters <= QUALITY_KNEE_METERS {
        1.0 - GENTLE_SLOPE * accuracy_meters
    } else {
        1.0 - GENTLE_SLOPE * QUALITY_KNEE_METERS
            - STEEP_SLOPE * (accuracy_meters - QUALITY_KNEE_METERS)
    };
    score.clamp(0.0, 1.0)
}

/// Blend fix quality with the margin to the acceptance radius.
///
/// `quality_weight` splits the blend between the two terms; the margin
/// term is 1.0 at the fence center and 0.0 at the radius edge.
pub fn blended_confidence(
    quality: f64,
    distance_meters: f64,
    applied_radius_meters: f64,
    quality_weight: f64,
) -> f64 {
    let margin = if applied_radius_meters > 0.0 {
        (1.0 - distance_meters / applied_radius_meters).clamp(0.0, 1.0)
    } else {
        0.0
    };
    quality_weight * quality + (1.0 - quality_weight) * margin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_anchors() {
        assert_eq!(quality_score(0.0), 1.0);
        assert!((quality_score(10.0) - 0.95).abs() < 1e-12);
        assert!((quality_score(20.0) - 0.9).abs() < 1e-12);
        assert!((quality_score(30.0) - 0.8).abs() < 1e-12);
        assert_eq!(quality_score(110.0), 0.0);
        assert_eq!(quality_score(500.0), 0.0);
    }

    #[test]
    fn test_quality_penalty_steepens_past_knee() {
        let below = quality_score(10.0) - quality_score(15.0);
        let above = quality_score(25.0) - quality_score(30.0);
        assert!(above > below * 1.5, "Slope should double past 20 m");
    }

    #[test]
    fn test_quality_never_increases_with_accuracy() {
        let mut previous = f64::INFINITY;
        for accuracy in 0..200 {
            let score = quality_score(f64::from(accuracy));
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn test_blend_at_center_and_edge() {
        // Center: full margin term
        let center = blended_confidence(0.9, 0.0, 50.0, 0.6);
        assert!((center - (0.6 * 0.9 + 0.4)).abs() < 1e-12);

        // Edge: margin term vanishes
        let edge = blended_confidence(0.9, 50.0, 50.0, 0.6);
        assert!((edge - 0.6 * 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_blend_clamps_margin_for_degenerate_inputs() {
        // Distance beyond the radius or a zero radius must not go negative
        assert_eq!(blended_confidence(1.0, 80.0, 50.0, 0.6), 0.6);
        assert_eq!(blended_confidence(1.0, 10.0, 0.0, 0.6), 0.6);
    }
}
