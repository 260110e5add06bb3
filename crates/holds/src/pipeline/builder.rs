use crate::{
    algorithms::{ClaheNormalizer, ContourRegionExtractor, DualSpaceMaskBuilder, MorphologicalRefiner},
    config::HoldsConfig,
    pipeline::DetectionPipeline,
    traits::{ImageNormalizer, MaskBuilder, MaskRefiner, RegionExtractor},
};

/// Builder for detection pipelines with a fluent API
pub struct DetectionPipelineBuilder {
    normalizer: Option<Box<dyn ImageNormalizer>>,
    mask_builder: Option<Box<dyn MaskBuilder>>,
    refiner: Option<Box<dyn MaskRefiner>>,
    extractor: Option<Box<dyn RegionExtractor>>,
}

impl DetectionPipelineBuilder {
    pub fn new() -> Self {
        Self {
            normalizer: None,
            mask_builder: None,
            refiner: None,
            extractor: None,
        }
    }

    /// Builder preloaded with the default stages parameterized by `config`
    pub fn from_config(config: &HoldsConfig) -> Self {
        Self::new()
            .set_normalizer(ClaheNormalizer::from(&config.normalization))
            .set_mask_builder(DualSpaceMaskBuilder::from(&config.color))
            .set_refiner(MorphologicalRefiner::from(&config.morphology))
            .set_extractor(ContourRegionExtractor { area: config.area })
    }

    /// Set the lightness normalizer (replaces any existing one)
    pub fn set_normalizer<N>(mut self, normalizer: N) -> Self
    where
        N: ImageNormalizer + 'static,
    {
        self.normalizer = Some(Box::new(normalizer));
        self
    }

    /// Set the mask builder (replaces any existing one)
    pub fn set_mask_builder<M>(mut self, mask_builder: M) -> Self
    where
        M: MaskBuilder + 'static,
    {
        self.mask_builder = Some(Box::new(mask_builder));
        self
    }

    /// Set the mask refiner (replaces any existing one)
    pub fn set_refiner<R>(mut self, refiner: R) -> Self
    where
        R: MaskRefiner + 'static,
    {
        self.refiner = Some(Box::new(refiner));
        self
    }

    /// Set the region extractor (replaces any existing one)
    pub fn set_extractor<E>(mut self, extractor: E) -> Self
    where
        E: RegionExtractor + 'static,
    {
        self.extractor = Some(Box::new(extractor));
        self
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> DetectionPipeline {
        DetectionPipeline::new(
            self.normalizer.unwrap_or_else(|| Box::new(ClaheNormalizer::default())),
            self.mask_builder.unwrap_or_else(|| Box::new(DualSpaceMaskBuilder::default())),
            self.refiner.unwrap_or_else(|| Box::new(MorphologicalRefiner::default())),
            self.extractor.unwrap_or_else(|| Box::new(ContourRegionExtractor::default())),
        )
    }
}

impl Default for DetectionPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
