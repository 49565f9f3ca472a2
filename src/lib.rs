//! sarflow: Sentinel-1 intensity and coherence pipelines
//!
//! Drives an external SAR transform engine (ESA SNAP's `gpt` by default)
//! through the processing chains that turn SLC acquisitions into
//! terrain-corrected products:
//!
//! - per-scene beta-naught intensity maps, `{date}_vv.tif` and `{date}_vh.tif`
//! - a master/slave coherence map, `{masterDate}_{slaveDate}_coherence.tif`
//!
//! The crate owns the orchestration: stage order and parameters, band
//! resolution on the engine's band catalog, acquisition dates, pre-flight
//! checks, and the release of every intermediate product.

pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod types;

// Re-export main types and functions for easier access
pub use config::{GptSettings, PipelineConfig, ProjectPaths};
pub use crate::core::{
    CoherencePipeline, HeuristicBandResolver, IntensityOutputs, IntensityPipeline, ProductId,
    ReleaseReport, ResourceTracker,
};
pub use io::{EngineError, GptEngine, Product, StageInputs, TransformEngine};
pub use logging::{init_logging, RunLogger};
pub use types::{
    OutputArtifact, ParamValue, PipelineError, PipelineResult, Polarization, SceneRole, Stage,
    StageParams,
};
