mod common;

use common::{scene, MockEngine, MASTER_SCENE, SLAVE_SCENE};
use sarflow::{
    CoherencePipeline, ParamValue, PipelineConfig, PipelineError, RunLogger, SceneRole, Stage,
};
use tempfile::TempDir;

fn logger() -> RunLogger {
    common::init_logging();
    RunLogger::new("sarflow::coherence")
}

#[test]
fn test_coherence_output_named_by_both_dates() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = scene(temp_dir.path(), SLAVE_SCENE);
    let output_dir = temp_dir.path().join("Output");

    let engine = MockEngine::with_snap_catalogs();
    let config = PipelineConfig::default();
    let output = CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, &output_dir)
        .expect("Coherence pipeline failed");

    assert_eq!(output, output_dir.join("2024-07-20_2024-08-01_coherence.tif"));
    assert!(output.is_file());
}

#[test]
fn test_coherence_stage_wiring() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = scene(temp_dir.path(), SLAVE_SCENE);

    let engine = MockEngine::with_snap_catalogs();
    let config = PipelineConfig::default();
    CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, temp_dir.path())
        .unwrap();

    assert_eq!(
        engine.operators(),
        vec![
            "TOPSAR-Split",
            "TOPSAR-Split",
            "Apply-Orbit-File",
            "Apply-Orbit-File",
            "Back-Geocoding",
            "Interferogram",
            "BandSelect",
            "TOPSAR-Deburst",
            "Terrain-Correction",
        ]
    );

    let log = engine.log.lock().unwrap();
    assert_eq!(log.reads.len(), 2);
    assert_eq!(log.reads[0].0, master);
    assert_eq!(log.reads[1].0, slave);
    let (master_read, slave_read) = (log.reads[0].1, log.reads[1].1);

    let calls = &log.calls;
    assert_eq!(calls[0].inputs, vec![("source".to_string(), master_read)]);
    assert_eq!(calls[1].inputs, vec![("source".to_string(), slave_read)]);
    for split in &calls[..2] {
        assert_eq!(split.params.get("subswath"), Some(&ParamValue::Str("IW2".into())));
        assert_eq!(
            split.params.get("selectedPolarisations"),
            Some(&ParamValue::Str("VV".into()))
        );
    }
    assert_eq!(calls[2].inputs[0].1, calls[0].output);
    assert_eq!(calls[3].inputs[0].1, calls[1].output);

    // Coregistration takes both orbit-corrected scenes as named sources
    assert_eq!(
        calls[4].inputs,
        vec![
            ("Master".to_string(), calls[2].output),
            ("Slave".to_string(), calls[3].output),
        ]
    );
    assert_eq!(
        calls[4].params.get("demName"),
        Some(&ParamValue::Str("SRTM 3Sec".into()))
    );

    assert_eq!(
        calls[6].params.get("sourceBands"),
        Some(&ParamValue::StrList(vec!["coh_IW2_VV_20Jul2024_01Aug2024".to_string()]))
    );

    let terrain = &calls[8].params;
    assert_eq!(terrain.get("mapProjection"), Some(&ParamValue::Str("EPSG:32643".into())));
    assert_eq!(terrain.get("pixelSpacingInMeter"), None);

    assert_eq!(log.writes.len(), 1);
    assert_eq!(log.writes[0].2, calls[8].output);
    drop(log);

    assert_eq!(engine.created(), 11);
    engine.assert_all_released();
}

#[test]
fn test_first_coherence_band_wins() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = scene(temp_dir.path(), SLAVE_SCENE);

    let engine = MockEngine::new().with_catalog(
        "Interferogram",
        &["Phase_ifg", "coh_IW2_VV_a", "coh_IW2_VV_b"],
    );
    let config = PipelineConfig::default();
    CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, temp_dir.path())
        .unwrap();

    let select = &engine.calls_to("BandSelect")[0];
    assert_eq!(
        select.params.get("sourceBands"),
        Some(&ParamValue::StrList(vec!["coh_IW2_VV_a".to_string()]))
    );
}

#[test]
fn test_missing_coherence_band_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = scene(temp_dir.path(), SLAVE_SCENE);
    let output_dir = temp_dir.path().join("out");

    let engine = MockEngine::new().with_catalog("Interferogram", &["i_ifg", "q_ifg", "Phase_ifg"]);
    let config = PipelineConfig::default();
    let result = CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, &output_dir);

    match result {
        Err(PipelineError::BandResolution(message)) => assert!(message.contains("Phase_ifg")),
        other => panic!("expected a band resolution error, got {:?}", other),
    }
    assert!(engine.calls_to("BandSelect").is_empty());
    assert!(engine.log.lock().unwrap().writes.is_empty());
    engine.assert_all_released();
}

#[test]
fn test_slave_split_failure_names_the_scene() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = scene(temp_dir.path(), SLAVE_SCENE);

    let engine = MockEngine::with_snap_catalogs().failing_on_call("TOPSAR-Split", 1);
    let config = PipelineConfig::default();
    let result = CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, temp_dir.path());

    match result {
        Err(err @ PipelineError::Stage { .. }) => {
            assert!(err.to_string().contains("(slave)"));
            if let PipelineError::Stage { stage, scene, .. } = err {
                assert_eq!(stage, Stage::Split);
                assert_eq!(scene, Some(SceneRole::Slave));
            }
        }
        other => panic!("expected a Split stage error, got {:?}", other),
    }

    // Both reads and the master split
    assert_eq!(engine.created(), 3);
    engine.assert_all_released();
}

#[test]
fn test_write_failure_releases_products() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = scene(temp_dir.path(), SLAVE_SCENE);

    let engine =
        MockEngine::with_snap_catalogs().failing_write("2024-07-20_2024-08-01_coherence.tif");
    let config = PipelineConfig::default();
    let result = CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, temp_dir.path());

    assert!(matches!(result, Err(PipelineError::OutputWrite { .. })));
    engine.assert_all_released();
}

#[test]
fn test_missing_slave_fails_before_engine() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = temp_dir.path().join(SLAVE_SCENE);

    let engine = MockEngine::with_snap_catalogs();
    let config = PipelineConfig::default();
    let result = CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, temp_dir.path());

    assert!(matches!(result, Err(PipelineError::InputNotFound(p)) if p == slave));
    assert_eq!(engine.created(), 0);
}

#[test]
fn test_undated_slave_fails_before_engine() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = scene(temp_dir.path(), "post_event.zip");

    let engine = MockEngine::with_snap_catalogs();
    let config = PipelineConfig::default();
    let result = CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, temp_dir.path());

    assert!(matches!(result, Err(PipelineError::DateFormat(_))));
    assert_eq!(engine.created(), 0);
}

#[test]
fn test_coregistration_failure_releases_both_scenes() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = scene(temp_dir.path(), SLAVE_SCENE);

    let engine = MockEngine::with_snap_catalogs().failing_operator("Back-Geocoding");
    let config = PipelineConfig::default();
    let result = CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, temp_dir.path());

    match result {
        Err(PipelineError::Stage { stage, scene, cause }) => {
            assert_eq!(stage, Stage::Coregister);
            assert_eq!(scene, None);
            assert!(cause.to_string().contains("Back-Geocoding"));
        }
        other => panic!("expected a Coregister stage error, got {:?}", other),
    }

    // Two reads, two splits, two orbit corrections
    assert_eq!(engine.created(), 6);
    engine.assert_all_released();
    assert!(engine.log.lock().unwrap().writes.is_empty());
}

#[test]
fn test_interferogram_failure_releases_products() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let master = scene(temp_dir.path(), MASTER_SCENE);
    let slave = scene(temp_dir.path(), SLAVE_SCENE);

    let engine = MockEngine::with_snap_catalogs().failing_operator("Interferogram");
    let config = PipelineConfig::default();
    let result = CoherencePipeline::new(&engine, &config, logger())
        .generate(&master, &slave, temp_dir.path());

    assert!(matches!(
        result,
        Err(PipelineError::Stage { stage: Stage::Interferogram, scene: None, .. })
    ));
    assert_eq!(engine.created(), 7);
    engine.assert_all_released();
}
