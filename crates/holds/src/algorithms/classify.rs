use crate::{
    config::ClassifierConfig,
    types::{HoldFeatures, HoldType},
};

/// Rule-based handhold / foothold decision. Small, round, concave and
/// squat holds score towards footholds.
#[derive(Debug, Clone, Default)]
pub struct HoldClassifier {
    pub config: ClassifierConfig,
}

impl HoldClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, features: &HoldFeatures) -> i32 {
        let c = &self.config;
        let mut score = if features.area_cm2 < c.small_area_cm2 {
            c.small_area_score
        } else {
            c.large_area_score
        };
        if features.circularity > c.circularity_above {
            score += 1;
        }
        if features.convexity < c.convexity_below {
            score += 1;
        }
        if (c.aspect_ratio_min..=c.aspect_ratio_max).contains(&features.aspect_ratio) {
            score += 1;
        }
        score
    }

    pub fn classify(&self, features: &HoldFeatures) -> HoldType {
        if self.score(features) >= self.config.foothold_min_score {
            HoldType::Foothold
        } else {
            HoldType::Handhold
        }
    }
}
