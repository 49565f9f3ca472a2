use crate::config::PipelineConfig;
use crate::core::bands::{BandResolver, HeuristicBandResolver};
use crate::core::date;
use crate::core::guards;
use crate::core::stage::{operators, StageRunner, StageSpec};
use crate::core::tracker::ProductId;
use crate::io::engine::TransformEngine;
use crate::logging::RunLogger;
use crate::types::{OutputArtifact, PipelineResult, Stage};
use std::path::{Path, PathBuf};

/// Paths of the two rasters an intensity run produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityOutputs {
    pub vv: PathBuf,
    pub vh: PathBuf,
}

/// Single-scene chain producing beta-naught VV and VH intensity maps.
///
/// Read -> TOPSAR-Split -> Apply-Orbit-File -> ThermalNoiseRemoval ->
/// Calibration -> TOPSAR-Deburst -> Speckle-Filter -> Terrain-Correction,
/// then one band subset and write per polarization.
pub struct IntensityPipeline<'a, E: TransformEngine> {
    engine: &'a E,
    config: &'a PipelineConfig,
    resolver: Box<dyn BandResolver + 'a>,
    log: RunLogger,
}

impl<'a, E: TransformEngine> IntensityPipeline<'a, E> {
    pub fn new(engine: &'a E, config: &'a PipelineConfig, log: RunLogger) -> Self {
        log.info(format_args!("Intensity pipeline initialized"));
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

    /// Generate `{date}_vv.tif` and `{date}_vh.tif` in `output_dir` from an SLC scene.
    ///
    /// Every product created along the way is released before returning,
    /// whether the run succeeds or not.
    pub fn generate(&self, input: &Path, output_dir: &Path) -> PipelineResult<IntensityOutputs> {
        guards::validate_entry(&self.log, &[input, output_dir])?;
        let date = date::scene_date(input)?;

        let scene_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| date.clone());
        let log = self.log.for_scene(scene_name);
        log.info(format_args!("Starting intensity map generation"));

        let mut runner = StageRunner::new(self.engine, log.clone());
        let result = self.run_chain(&mut runner, &log, input, output_dir, &date);
        runner.release_all();

        if let Err(e) = &result {
            log.error(format_args!("Intensity map generation failed: {}", e));
        }
        result
    }

    fn run_chain(
        &self,
        runner: &mut StageRunner<'_, E>,
        log: &RunLogger,
        input: &Path,
        output_dir: &Path,
        date: &str,
    ) -> PipelineResult<IntensityOutputs> {
        let config = self.config;

        let mut product = runner.read(None, input)?;

        product = runner.apply(
            StageSpec::new(Stage::Split, operators::TOPSAR_SPLIT, product)
                .param("subswath", config.subswath.as_str())
                .param("selectedPolarisations", config.polarization_list()),
        )?;
        product = runner.apply(StageSpec::new(
            Stage::OrbitCorrect,
            operators::APPLY_ORBIT_FILE,
            product,
        ))?;
        product = runner.apply(StageSpec::new(
            Stage::ThermalNoiseRemove,
            operators::THERMAL_NOISE_REMOVAL,
            product,
        ))?;
        product = runner.apply(
            StageSpec::new(Stage::Calibrate, operators::CALIBRATION, product)
                .param("outputBetaBand", true),
        )?;
        product = runner.apply(StageSpec::new(
            Stage::Deburst,
            operators::TOPSAR_DEBURST,
            product,
        ))?;

        log.info(format_args!("Applying {} speckle filter", config.speckle_filter));
        product = runner.apply(
            StageSpec::new(Stage::SpeckleFilter, operators::SPECKLE_FILTER, product)
                .param("filter", config.speckle_filter.as_str())
                .param("filterSizeX", config.speckle_window)
                .param("filterSizeY", config.speckle_window),
        )?;

        log.info(format_args!("Applying terrain correction ({})", config.utm_projection));
        product = runner.apply(
            StageSpec::new(Stage::TerrainCorrect, operators::TERRAIN_CORRECTION, product)
                .param("demName", config.dem_name.as_str())
                .param("mapProjection", config.utm_projection.as_str())
                .param("pixelSpacingInMeter", config.pixel_spacing),
        )?;

        let catalog = runner.band_names(Stage::ResolveBands, product)?;
        let bands = self.resolver.resolve_intensity(&catalog)?;
        log.debug(format_args!("Found bands: VV='{}', VH='{}'", bands.vv, bands.vh));

        let vv = OutputArtifact::single_band(
            output_dir.join(format!("{}_vv.tif", date)),
            &bands.vv,
            &config.output_format,
        );
        Self::write_band(runner, Stage::WriteVv, product, &vv)?;

        let vh = OutputArtifact::single_band(
            output_dir.join(format!("{}_vh.tif", date)),
            &bands.vh,
            &config.output_format,
        );
        Self::write_band(runner, Stage::WriteVh, product, &vh)?;

        Ok(IntensityOutputs {
            vv: vv.path,
            vh: vh.path,
        })
    }

    fn write_band(
        runner: &mut StageRunner<'_, E>,
        stage: Stage,
        source: ProductId,
        artifact: &OutputArtifact,
    ) -> PipelineResult<()> {
        let subset = runner.apply(
            StageSpec::new(stage, operators::BAND_SELECT, source)
                .param("sourceBands", artifact.bands.clone()),
        )?;
        runner.write(subset, artifact)
    }
}
