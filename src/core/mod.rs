//! Pipeline orchestration

pub mod bands;
pub mod coherence;
pub mod date;
pub mod guards;
pub mod intensity;
pub mod stage;
pub mod tracker;

// Re-export main types
pub use bands::{BandCatalogEntry, BandResolver, CoherenceBand, HeuristicBandResolver, IntensityBands};
pub use coherence::CoherencePipeline;
pub use date::{extract_acquisition_date, extract_date, scene_date};
pub use guards::validate_entry;
pub use intensity::{IntensityOutputs, IntensityPipeline};
pub use stage::{StageRunner, StageSpec};
pub use tracker::{ProductId, ReleaseReport, ResourceTracker};
