use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, dilate};

use crate::{
    config::MorphologyConfig,
    error::Result,
    traits::MaskRefiner,
    types::Mask,
};

/// One close followed by a fixed number of dilations with a square
/// structuring element. The pass count decides which fragments merge into
/// one blob, so it is part of the detection contract.
#[derive(Debug, Clone)]
pub struct MorphologicalRefiner {
    /// Side of the square kernel (odd)
    pub kernel_size: u8,
    pub dilate_iterations: u32,
}

impl Default for MorphologicalRefiner {
    fn default() -> Self {
        Self::from(&MorphologyConfig::default())
    }
}

impl From<&MorphologyConfig> for MorphologicalRefiner {
    fn from(config: &MorphologyConfig) -> Self {
        Self {
            kernel_size: config.kernel_size,
            dilate_iterations: config.dilate_iterations,
        }
    }
}

impl MorphologicalRefiner {
    /// Chessboard radius of the kernel: a 7x7 square is radius 3 under L∞.
    fn radius(&self) -> u8 {
        self.kernel_size / 2
    }
}

impl MaskRefiner for MorphologicalRefiner {
    fn refine(&self, mask: &Mask) -> Result<Mask> {
        let k = self.radius();
        let mut refined = close(mask, Norm::LInf, k);
        for _ in 0..self.dilate_iterations {
            refined = dilate(&refined, Norm::LInf, k);
        }
        Ok(refined)
    }
}
