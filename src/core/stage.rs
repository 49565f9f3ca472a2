use crate::core::tracker::{ProductId, ReleaseReport, ResourceTracker};
use crate::io::engine::{EngineError, Product, StageInputs, TransformEngine};
use crate::logging::RunLogger;
use crate::types::{OutputArtifact, ParamValue, PipelineError, PipelineResult, SceneRole, Stage, StageParams};
use std::path::Path;
use std::time::Instant;

/// Engine operator names
pub mod operators {
    pub const TOPSAR_SPLIT: &str = "TOPSAR-Split";
    pub const APPLY_ORBIT_FILE: &str = "Apply-Orbit-File";
    pub const THERMAL_NOISE_REMOVAL: &str = "ThermalNoiseRemoval";
    pub const CALIBRATION: &str = "Calibration";
    pub const TOPSAR_DEBURST: &str = "TOPSAR-Deburst";
    pub const SPECKLE_FILTER: &str = "Speckle-Filter";
    pub const TERRAIN_CORRECTION: &str = "Terrain-Correction";
    pub const BACK_GEOCODING: &str = "Back-Geocoding";
    pub const INTERFEROGRAM: &str = "Interferogram";
    pub const BAND_SELECT: &str = "BandSelect";
}

/// One operator application: stage, operator, parameters and inputs
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub stage: Stage,
    pub scene: Option<SceneRole>,
    pub operator: &'static str,
    pub params: StageParams,
    pub inputs: StageInputs<ProductId>,
}

impl StageSpec {
    pub fn new(stage: Stage, operator: &'static str, input: ProductId) -> Self {
        Self {
            stage,
            scene: None,
            operator,
            params: StageParams::new(),
            inputs: StageInputs::Single(input),
        }
    }

    pub fn named(stage: Stage, operator: &'static str, inputs: Vec<(&'static str, ProductId)>) -> Self {
        Self {
            stage,
            scene: None,
            operator,
            params: StageParams::new(),
            inputs: StageInputs::Named(inputs),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn scene(mut self, scene: SceneRole) -> Self {
        self.scene = Some(scene);
        self
    }
}

/// Drives one run's stages against the engine.
///
/// Every product the engine hands back is registered with the run's
/// [`ResourceTracker`] before it is used; engine failures come back as
/// [`PipelineError::Stage`] naming the stage. A lazy engine may only fail
/// when a later stage forces execution; when it traces the failure to a node,
/// the error names the stage that created that node instead.
pub struct StageRunner<'e, E: TransformEngine> {
    engine: &'e E,
    tracker: ResourceTracker<E::Product>,
    /// Stage and scene of each registered product, indexed by `ProductId`
    origins: Vec<(Stage, Option<SceneRole>)>,
    log: RunLogger,
}

impl<'e, E: TransformEngine> StageRunner<'e, E> {
    pub fn new(engine: &'e E, log: RunLogger) -> Self {
        Self {
            engine,
            tracker: ResourceTracker::new(log.clone()),
            origins: Vec::new(),
            log,
        }
    }

    fn register(&mut self, product: E::Product, stage: Stage, scene: Option<SceneRole>) -> ProductId {
        let id = self.tracker.register(product);
        self.origins.push((stage, scene));
        id
    }

    /// Stage that created the node an engine error was traced to
    fn origin_of(&self, cause: &EngineError) -> Option<(Stage, Option<SceneRole>)> {
        let node = cause.node()?;
        let id = self.tracker.find(|product| product.node_id() == Some(node))?;
        self.origins.get(id.index()).copied()
    }

    fn stage_error(&self, stage: Stage, scene: Option<SceneRole>, cause: EngineError) -> PipelineError {
        let (stage, scene) = self.origin_of(&cause).unwrap_or((stage, scene));
        PipelineError::Stage { stage, scene, cause }
    }

    pub fn read(&mut self, scene: Option<SceneRole>, path: &Path) -> PipelineResult<ProductId> {
        self.log
            .debug(format_args!("Reading product: {}", path.display()));
        let product = self
            .engine
            .read_product(path)
            .map_err(|cause| PipelineError::Stage { stage: Stage::Read, scene, cause })?;
        Ok(self.register(product, Stage::Read, scene))
    }

    pub fn apply(&mut self, spec: StageSpec) -> PipelineResult<ProductId> {
        let StageSpec { stage, scene, operator, params, inputs } = spec;
        match scene {
            Some(role) => self
                .log
                .debug(format_args!("{} ({}) -> {}", stage, role, operator)),
            None => self.log.debug(format_args!("{} -> {}", stage, operator)),
        }

        let start = Instant::now();
        let tracker = &self.tracker;
        let inputs = inputs.try_map(|id| tracker.get(id))?;
        let product = self
            .engine
            .apply(operator, &params, inputs)
            .map_err(|cause| self.stage_error(stage, scene, cause))?;
        self.log.debug(format_args!(
            "{} complete in {:.2}s",
            operator,
            start.elapsed().as_secs_f64()
        ));

        Ok(self.register(product, stage, scene))
    }

    pub fn band_names(&self, stage: Stage, id: ProductId) -> PipelineResult<Vec<String>> {
        let product = self.tracker.get(id)?;
        let names = self
            .engine
            .band_names(product)
            .map_err(|cause| self.stage_error(stage, None, cause))?;
        self.log.debug(format_args!("Bands available: {:?}", names));
        Ok(names)
    }

    pub fn write(&self, id: ProductId, artifact: &OutputArtifact) -> PipelineResult<()> {
        let product = self.tracker.get(id)?;
        self.engine
            .write_product(product, &artifact.path, &artifact.format)
            .map_err(|cause| match self.origin_of(&cause) {
                Some((stage, scene)) => PipelineError::Stage { stage, scene, cause },
                None => PipelineError::OutputWrite {
                    path: artifact.path.clone(),
                    cause,
                },
            })?;
        self.log.info(format_args!(
            "Created {} ({}): {}",
            artifact.bands.join(","),
            artifact.format,
            artifact.path.display()
        ));
        Ok(())
    }

    pub fn release_all(&mut self) -> ReleaseReport {
        self.tracker.release_all()
    }
}
