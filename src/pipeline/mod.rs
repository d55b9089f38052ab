// Acquisition pipeline: location resolution, normalization, orchestration

pub mod acquisition;
pub mod normalize;
pub mod resolver;

pub use acquisition::AcquisitionPipeline;
pub use normalize::NormalizationEngine;
pub use resolver::LocationResolver;
