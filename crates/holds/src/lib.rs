//! # Climbing Hold Detection and Grading
//!
//! Finds the holds of one route on a photograph of a climbing wall, grades
//! every hold and derives a V-grade for the route.
//!
//! Work happens in three passes with an explicit hand-off between them:
//!
//! - **Detection**: lightness equalization, a color mask matched in LAB and
//!   HSV, morphological clean-up and contour extraction. Holds are exported
//!   as isolated crops plus metadata.
//! - **Hold grading**: each crop is measured in centimetres, classified as
//!   handhold or foothold and graded 1 to 10.
//! - **Route grading**: holds are ordered, moves between them scored and
//!   the total mapped onto a V-grade bucket.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use holds::{Band, DetectionPipeline, ExportBundle, HoldsConfig, reference_from_click};
//!
//! let config = HoldsConfig::default();
//! let image = image::open("wall.jpg")?.to_rgb8();
//! let reference = reference_from_click(&image, 420, 310)?;
//!
//! let detection = DetectionPipeline::from_config(&config)
//!     .detect(&image, reference, Band::new(300, 700))?;
//!
//! let mut bundle = ExportBundle::default();
//! detection.export(&image, &mut bundle, &config.export)?;
//! bundle.save("bundle.json")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Pipeline
//!
//! ```rust,no_run
//! use holds::{DetectionPipeline, algorithms::*};
//!
//! let pipeline = DetectionPipeline::builder()
//!     .set_normalizer(ClaheNormalizer { clip_limit: 2.0, tile_grid: 8 })
//!     .set_refiner(MorphologicalRefiner { kernel_size: 5, dilate_iterations: 2 })
//!     .build();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod config;
pub mod color;
pub mod geometry;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod route;
pub mod pipeline;
pub mod io;

pub use error::{HoldError, Result};
pub use config::HoldsConfig;
pub use color::{ColorSample, ColorSpace};
pub use types::*;
pub use traits::*;
pub use algorithms::{HoldAnalyzer, HoldAssessment};
pub use route::{RouteAssembler, RouteRequest};
pub use pipeline::{
    builder::DetectionPipelineBuilder, grade_bundle, grade_bundle_concurrent, Detection,
    DetectionPipeline, DetectionSummary, RouteGradingService, RouteReport,
};
pub use io::*;
