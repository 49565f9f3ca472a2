//! Logging setup and the per-component run logger

use log::{Level, LevelFilter};
use std::fmt;

/// Logger handed explicitly to each component.
///
/// Forwards to the `log` facade under a fixed target, prefixing messages with
/// the scene label of the run when one is set.
#[derive(Debug, Clone)]
pub struct RunLogger {
    target: &'static str,
    scene: Option<String>,
}

impl RunLogger {
    pub fn new(target: &'static str) -> Self {
        Self { target, scene: None }
    }

    /// Same target, labelled with a scene
    pub fn for_scene(&self, scene: impl Into<String>) -> Self {
        Self {
            target: self.target,
            scene: Some(scene.into()),
        }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        match &self.scene {
            Some(scene) => log::log!(target: self.target, level, "[{}] {}", scene, args),
            None => log::log!(target: self.target, level, "{}", args),
        }
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

/// One-time process logging setup. `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.to_string()));
    builder.format_timestamp_secs();
    builder.try_init()?;
    log::info!("Logging configured at {} level", level);
    Ok(())
}
