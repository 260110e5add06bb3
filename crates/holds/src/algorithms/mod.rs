pub mod normalize;
pub mod masking;
pub mod morphology;
pub mod extraction;
pub mod features;
pub mod classify;
pub mod grading;

pub use normalize::*;
pub use masking::*;
pub use morphology::*;
pub use extraction::*;
pub use features::*;
pub use classify::*;
pub use grading::*;

use image::RgbImage;

use crate::{
    config::HoldsConfig,
    types::{HoldClassification, HoldFeatures},
};

/// Result of measuring, classifying and grading one hold crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldAssessment {
    pub features: HoldFeatures,
    pub classification: HoldClassification,
}

/// Feature extraction, classification and grading of a single crop
#[derive(Debug, Clone, Default)]
pub struct HoldAnalyzer {
    pub extractor: HoldFeatureExtractor,
    pub classifier: HoldClassifier,
    pub grader: HoldGrader,
}

impl HoldAnalyzer {
    pub fn from_config(config: &HoldsConfig) -> Self {
        Self {
            extractor: HoldFeatureExtractor::new(config.scale),
            classifier: HoldClassifier::new(config.classifier.clone()),
            grader: HoldGrader::new(config.grader.clone()),
        }
    }

    pub fn assess_features(&self, features: HoldFeatures) -> HoldAssessment {
        let hold_type = self.classifier.classify(&features);
        let grade = self.grader.grade(&features, hold_type);
        HoldAssessment {
            features,
            classification: HoldClassification { hold_type, grade },
        }
    }

    /// `None` when the crop holds no contour.
    pub fn analyze(&self, crop: &RgbImage) -> Option<HoldAssessment> {
        self.extractor.extract(crop).map(|features| self.assess_features(features))
    }
}
