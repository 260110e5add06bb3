use crate::{
    config::GraderConfig,
    types::{HoldFeatures, HoldType},
};

/// Maps hold features and type to an integer difficulty grade.
#[derive(Debug, Clone, Default)]
pub struct HoldGrader {
    pub config: GraderConfig,
}

impl HoldGrader {
    pub fn new(config: GraderConfig) -> Self {
        Self { config }
    }

    /// Smaller holds are harder; the area term saturates at the ceiling.
    pub fn area_score(&self, area_cm2: f64) -> f64 {
        let c = &self.config;
        let span = c.expected_area_max_cm2 - c.expected_area_min_cm2;
        ((c.expected_area_max_cm2 - area_cm2) / span * c.area_scale).clamp(0.0, c.area_score_ceiling)
    }

    /// Unclamped weighted score before rounding.
    pub fn raw_score(&self, features: &HoldFeatures, hold_type: HoldType) -> f64 {
        let c = &self.config;
        let circ_score = (1.0 - features.circularity) * c.circularity_weight;
        let conv_score = (1.0 - features.convexity) * c.convexity_weight;
        let ar_score = (features.aspect_ratio - 1.0).abs() * c.aspect_ratio_weight;
        let modifier = match hold_type {
            HoldType::Foothold => c.foothold_modifier,
            HoldType::Handhold => c.handhold_modifier,
        };
        (self.area_score(features.area_cm2) + circ_score + conv_score + ar_score) * modifier
    }

    pub fn grade(&self, features: &HoldFeatures, hold_type: HoldType) -> u8 {
        let min = self.config.min_grade as f64;
        let max = self.config.max_grade as f64;
        let total = self.raw_score(features, hold_type);
        if total.is_nan() {
            return self.config.min_grade;
        }
        total.clamp(min, max).round_ties_even() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(area_cm2: f64, circularity: f64, convexity: f64, aspect_ratio: f64) -> HoldFeatures {
        HoldFeatures {
            area_cm2,
            perimeter_cm: 0.0,
            circularity,
            convexity,
            aspect_ratio,
        }
    }

    #[test]
    fn test_area_score_saturates() {
        let grader = HoldGrader::default();
        assert_eq!(grader.area_score(6.76), 6.0);
        assert_eq!(grader.area_score(40.0), 6.0);
        assert!((grader.area_score(50.0) - 119.0 / 162.24 * 8.0).abs() < 1e-9);
        assert!(grader.area_score(50.0) < 6.0);
        assert_eq!(grader.area_score(169.0), 0.0);
        assert_eq!(grader.area_score(500.0), 0.0);
        let mid = grader.area_score(120.0);
        assert!((mid - (49.0 / 162.24 * 8.0)).abs() < 1e-9);
    }

    #[test]
    fn test_known_grade() {
        let grader = HoldGrader::default();
        // area 6, circ 1.2, conv 1.2, aspect 1.0
        let f = features(10.0, 0.6, 0.6, 1.5);
        let raw = grader.raw_score(&f, HoldType::Handhold);
        assert!((raw - 9.4 * 1.2).abs() < 1e-9);
        assert_eq!(grader.grade(&f, HoldType::Handhold), 10);

        let easy = features(160.0, 0.9, 0.95, 1.0);
        // area 8*9/162.24, circ 0.3, conv 0.15
        let expected = (72.0 / 162.24 + 0.3 + 0.15) * 1.5;
        assert!((grader.raw_score(&easy, HoldType::Foothold) - expected).abs() < 1e-9);
        assert_eq!(grader.grade(&easy, HoldType::Foothold), 1);
    }

    #[test]
    fn test_half_scores_round_to_even() {
        let grader = HoldGrader::default();
        // area 0.0, circ 2.0, conv 0.0, aspect 1.0
        let f = features(200.0, 0.0, 1.0, 1.0);
        assert!((grader.raw_score(&f, HoldType::Foothold) - 4.5).abs() < 1e-9);
        assert_eq!(grader.grade(&f, HoldType::Foothold), 4);

        let unweighted = HoldGrader::new(GraderConfig {
            foothold_modifier: 1.0,
            ..GraderConfig::default()
        });
        // circ 3.0, conv 1.5, aspect 1.0
        let g = features(200.0, 0.0, 0.5, 1.5);
        assert_eq!(unweighted.raw_score(&g, HoldType::Foothold), 5.5);
        assert_eq!(unweighted.grade(&g, HoldType::Foothold), 6);
    }

    #[test]
    fn test_grade_always_within_range() {
        let grader = HoldGrader::default();
        for area in [0.0, 3.0, 15.0, 80.0, 169.0, 1000.0] {
            for circ in [0.0, 0.3, 0.785, 1.0] {
                for conv in [0.0, 0.5, 1.0] {
                    for ar in [1.0, 1.5, 4.0, 20.0] {
                        for kind in [HoldType::Handhold, HoldType::Foothold] {
                            let g = grader.grade(&features(area, circ, conv, ar), kind);
                            assert!((1..=10).contains(&g), "grade {g}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_foothold_modifier_is_heavier() {
        let grader = HoldGrader::default();
        let f = features(100.0, 0.7, 0.8, 1.2);
        assert!(grader.raw_score(&f, HoldType::Foothold) > grader.raw_score(&f, HoldType::Handhold));
    }
}
