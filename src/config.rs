//! Run-wide configuration

use crate::types::{PipelineError, PipelineResult, Polarization};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the SNAP `gpt` executable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GptSettings {
    /// Executable name or path
    pub executable: PathBuf,
    /// Extra arguments appended after the graph file (e.g. `-q 8`, `-c 4G`)
    pub extra_args: Vec<String>,
}

impl Default for GptSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("gpt"),
            extra_args: Vec::new(),
        }
    }
}

/// Immutable parameters shared by every pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub utm_projection: String,
    pub dem_name: String,
    pub pixel_spacing: f64,
    pub subswath: String,
    pub polarizations: Vec<String>,
    pub output_format: String,
    pub speckle_filter: String,
    pub speckle_window: u32,
    /// Polarization carried through the coherence chain
    pub coherence_polarization: String,
    pub gpt: GptSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            utm_projection: "EPSG:32643".to_string(), // WGS 84 / UTM zone 43N
            dem_name: "SRTM 3Sec".to_string(),
            pixel_spacing: 10.0,
            subswath: "IW2".to_string(),
            polarizations: vec!["VV".to_string(), "VH".to_string()],
            output_format: "GeoTIFF".to_string(),
            speckle_filter: "Refined Lee".to_string(),
            speckle_window: 5,
            coherence_polarization: "VV".to_string(),
            gpt: GptSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        let config: PipelineConfig = toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        log::info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Explicit file, else the user config file if present, else defaults
    pub fn load(explicit: Option<&Path>) -> PipelineResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::user_config_path() {
            Some(path) if path.is_file() => Self::from_file(path),
            _ => {
                log::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// `<config dir>/sarflow/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sarflow").join("config.toml"))
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.polarizations.is_empty() {
            return Err(PipelineError::Config(
                "At least one polarization is required".to_string(),
            ));
        }
        for pol in &self.polarizations {
            pol.parse::<Polarization>()?;
        }
        self.coherence_polarization.parse::<Polarization>()?;

        if !(self.pixel_spacing.is_finite() && self.pixel_spacing > 0.0) {
            return Err(PipelineError::Config(format!(
                "Pixel spacing must be positive, got {}",
                self.pixel_spacing
            )));
        }
        if self.speckle_window == 0 || self.speckle_window % 2 == 0 {
            return Err(PipelineError::Config(format!(
                "Speckle filter window must be odd, got {}",
                self.speckle_window
            )));
        }

        let required = [
            ("utm_projection", &self.utm_projection),
            ("dem_name", &self.dem_name),
            ("subswath", &self.subswath),
            ("output_format", &self.output_format),
            ("speckle_filter", &self.speckle_filter),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }

    /// Configured polarizations joined for the split operator, e.g. `VV,VH`
    pub fn polarization_list(&self) -> String {
        self.polarizations.join(",")
    }

    pub fn to_toml(&self) -> PipelineResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Cannot serialize configuration: {}", e)))
    }
}

/// Project directory layout
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPaths {
    pub base_dir: PathBuf,
    pub inputs_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ProjectPaths {
    pub fn from_base<P: Into<PathBuf>>(base_dir: P) -> Self {
        let base_dir = base_dir.into();
        Self {
            inputs_dir: base_dir.join("data").join("inputs"),
            outputs_dir: base_dir.join("data").join("outputs"),
            logs_dir: base_dir.join("logs"),
            base_dir,
        }
    }

    /// Create every directory of the layout
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.inputs_dir, &self.outputs_dir, &self.logs_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
