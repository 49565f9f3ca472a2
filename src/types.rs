use crate::io::engine::EngineError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

impl FromStr for Polarization {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            _ => Err(PipelineError::Config(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Role of a scene in a two-scene (interferometric) chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneRole {
    Master,
    Slave,
}

impl SceneRole {
    /// Source key the coregistration operator expects for this scene
    pub fn source_key(&self) -> &'static str {
        match self {
            SceneRole::Master => "Master",
            SceneRole::Slave => "Slave",
        }
    }
}

impl fmt::Display for SceneRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneRole::Master => write!(f, "master"),
            SceneRole::Slave => write!(f, "slave"),
        }
    }
}

/// Named states of the intensity and coherence chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Read,
    Split,
    OrbitCorrect,
    ThermalNoiseRemove,
    Calibrate,
    Deburst,
    SpeckleFilter,
    TerrainCorrect,
    ResolveBands,
    WriteVv,
    WriteVh,
    Coregister,
    Interferogram,
    ResolveCoherenceBand,
    SelectBand,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "Read",
            Stage::Split => "Split",
            Stage::OrbitCorrect => "OrbitCorrect",
            Stage::ThermalNoiseRemove => "ThermalNoiseRemove",
            Stage::Calibrate => "Calibrate",
            Stage::Deburst => "Deburst",
            Stage::SpeckleFilter => "SpeckleFilter",
            Stage::TerrainCorrect => "TerrainCorrect",
            Stage::ResolveBands => "ResolveBands",
            Stage::WriteVv => "WriteVV",
            Stage::WriteVh => "WriteVH",
            Stage::Coregister => "Coregister",
            Stage::Interferogram => "Interferogram",
            Stage::ResolveCoherenceBand => "ResolveCoherenceBand",
            Stage::SelectBand => "SelectBand",
            Stage::Write => "Write",
        };
        f.write_str(name)
    }
}

/// Typed operator parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    StrList(Vec<String>),
}

/// Wire rendering used by graph-based engines: lists are comma-joined.
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::StrList(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::StrList(value)
    }
}

/// Ordered operator parameter mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageParams {
    entries: Vec<(String, ParamValue)>,
}

impl StageParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value for the key
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A raster to be persisted: destination, band subset and format name
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub bands: Vec<String>,
    pub format: String,
}

impl OutputArtifact {
    pub fn single_band(path: PathBuf, band: &str, format: &str) -> Self {
        Self {
            path,
            bands: vec![band.to_string()],
            format: format.to_string(),
        }
    }
}

fn scene_suffix(scene: &Option<SceneRole>) -> String {
    match scene {
        Some(role) => format!(" ({})", role),
        None => String::new(),
    }
}

/// Error types for pipeline runs
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Could not extract date from identifier: {0}")]
    DateFormat(String),

    #[error("{stage} stage failed{}: {cause}", scene_suffix(.scene))]
    Stage {
        stage: Stage,
        scene: Option<SceneRole>,
        #[source]
        cause: EngineError,
    },

    #[error("Band resolution error: {0}")]
    BandResolution(String),

    #[error("Failed to write {}: {cause}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        cause: EngineError,
    },

    #[error("Product handle #{0} is not tracked by this run")]
    UnknownProduct(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
