use crate::config::PipelineConfig;
use crate::core::bands::{BandResolver, HeuristicBandResolver};
use crate::core::date;
use crate::core::guards;
use crate::core::stage::{operators, StageRunner, StageSpec};
use crate::core::tracker::ProductId;
use crate::io::engine::TransformEngine;
use crate::logging::RunLogger;
use crate::types::{OutputArtifact, PipelineResult, SceneRole, Stage};
use std::path::{Path, PathBuf};

/// Two-scene InSAR chain producing a terrain-corrected coherence map.
///
/// Master and slave are each split and orbit-corrected, coregistered by
/// back-geocoding, turned into an interferogram, reduced to the coherence
/// band, debursted and terrain corrected.
pub struct CoherencePipeline<'a, E: TransformEngine> {
    engine: &'a E,
    config: &'a PipelineConfig,
    resolver: Box<dyn BandResolver + 'a>,
    log: RunLogger,
}

impl<'a, E: TransformEngine> CoherencePipeline<'a, E> {
    pub fn new(engine: &'a E, config: &'a PipelineConfig, log: RunLogger) -> Self {
        log.info(format_args!("Coherence pipeline initialized"));
        Self {
            engine,
            config,
            resolver: Box::new(HeuristicBandResolver),
            log,
        }
    }

    pub fn with_resolver(mut self, resolver: impl BandResolver + 'a) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Generate `{masterDate}_{slaveDate}_coherence.tif` in `output_dir`.
    pub fn generate(&self, master: &Path, slave: &Path, output_dir: &Path) -> PipelineResult<PathBuf> {
        guards::validate_entry(&self.log, &[master, slave, output_dir])?;
        let master_date = date::scene_date(master)?;
        let slave_date = date::scene_date(slave)?;

        let log = self.log.for_scene(format!("{}/{}", master_date, slave_date));
        log.info(format_args!("Starting coherence map generation (InSAR)"));

        let output = output_dir.join(format!("{}_{}_coherence.tif", master_date, slave_date));
        let mut runner = StageRunner::new(self.engine, log.clone());
        let result = self.run_chain(&mut runner, &log, master, slave, output);
        runner.release_all();

        if let Err(e) = &result {
            log.error(format_args!("Coherence map generation failed: {}", e));
        }
        result
    }

    fn run_chain(
        &self,
        runner: &mut StageRunner<'_, E>,
        log: &RunLogger,
        master_path: &Path,
        slave_path: &Path,
        output: PathBuf,
    ) -> PipelineResult<PathBuf> {
        let config = self.config;

        let mut master = runner.read(Some(SceneRole::Master), master_path)?;
        let mut slave = runner.read(Some(SceneRole::Slave), slave_path)?;

        master = runner.apply(self.split(master, SceneRole::Master))?;
        slave = runner.apply(self.split(slave, SceneRole::Slave))?;

        master = runner.apply(Self::orbit_correct(master, SceneRole::Master))?;
        slave = runner.apply(Self::orbit_correct(slave, SceneRole::Slave))?;

        log.debug(format_args!("Applying back-geocoding"));
        let mut product = runner.apply(
            StageSpec::named(
                Stage::Coregister,
                operators::BACK_GEOCODING,
                vec![
                    (SceneRole::Master.source_key(), master),
                    (SceneRole::Slave.source_key(), slave),
                ],
            )
            .param("demName", config.dem_name.as_str()),
        )?;

        product = runner.apply(StageSpec::new(
            Stage::Interferogram,
            operators::INTERFEROGRAM,
            product,
        ))?;

        let catalog = runner.band_names(Stage::ResolveCoherenceBand, product)?;
        let coherence = self.resolver.resolve_coherence(&catalog)?;
        if !coherence.ignored.is_empty() {
            log.warn(format_args!(
                "Several coherence bands found, using '{}' and ignoring {:?}",
                coherence.name, coherence.ignored
            ));
        }
        log.debug(format_args!("Selected coherence band: {}", coherence.name));

        product = runner.apply(
            StageSpec::new(Stage::SelectBand, operators::BAND_SELECT, product)
                .param("sourceBands", vec![coherence.name.clone()]),
        )?;

        log.info(format_args!("Debursting"));
        product = runner.apply(StageSpec::new(
            Stage::Deburst,
            operators::TOPSAR_DEBURST,
            product,
        ))?;

        log.info(format_args!("Applying terrain correction ({})", config.utm_projection));
        product = runner.apply(
            StageSpec::new(Stage::TerrainCorrect, operators::TERRAIN_CORRECTION, product)
                .param("demName", config.dem_name.as_str())
                .param("mapProjection", config.utm_projection.as_str()),
        )?;

        let artifact = OutputArtifact::single_band(output, &coherence.name, &config.output_format);
        runner.write(product, &artifact)?;
        Ok(artifact.path)
    }

    fn split(&self, input: ProductId, scene: SceneRole) -> StageSpec {
        StageSpec::new(Stage::Split, operators::TOPSAR_SPLIT, input)
            .scene(scene)
            .param("subswath", self.config.subswath.as_str())
            .param("selectedPolarisations", self.config.coherence_polarization.as_str())
    }

    fn orbit_correct(input: ProductId, scene: SceneRole) -> StageSpec {
        StageSpec::new(Stage::OrbitCorrect, operators::APPLY_ORBIT_FILE, input).scene(scene)
    }
}
