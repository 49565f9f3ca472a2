//! Transform engine contract
//!
//! The radiometric and geometric processing runs inside an external engine.
//! Pipelines drive it through [`TransformEngine`]: read a scene, apply named
//! operators, ask for a product's band catalog, write a raster, and release
//! every product they created.

use crate::types::StageParams;
use std::path::{Path, PathBuf};

/// Errors reported by a transform engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("operator {operator} failed: {message}")]
    Operator { operator: String, message: String },

    /// Failure the engine traced to one node of a deferred graph
    #[error("operator {operator} ({node}) failed: {message}")]
    Node {
        node: String,
        operator: String,
        message: String,
    },

    #[error("cannot read product {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("cannot write product {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    #[error("release failed: {0}")]
    Release(String),

    #[error("graph error: {0}")]
    Graph(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Engine node the failure was traced to, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            EngineError::Node { node, .. } => Some(node),
            _ => None,
        }
    }
}

/// A scene or intermediate result owned by one pipeline run
pub trait Product {
    /// Free the resources behind this product. Consumes the handle.
    fn release(self) -> Result<(), EngineError>;

    /// Engine-side id of the node producing this product. Engines that run
    /// stages lazily use it to report which stage a failure belongs to.
    fn node_id(&self) -> Option<&str> {
        None
    }
}

/// Inputs of a stage: one product, or a named map of products
#[derive(Debug, Clone, PartialEq)]
pub enum StageInputs<T> {
    Single(T),
    Named(Vec<(&'static str, T)>),
}

impl<T> StageInputs<T> {
    /// Convert every input, failing on the first conversion error
    pub fn try_map<U, E>(self, mut f: impl FnMut(T) -> Result<U, E>) -> Result<StageInputs<U>, E> {
        match self {
            StageInputs::Single(input) => Ok(StageInputs::Single(f(input)?)),
            StageInputs::Named(inputs) => {
                let mut mapped = Vec::with_capacity(inputs.len());
                for (name, input) in inputs {
                    mapped.push((name, f(input)?));
                }
                Ok(StageInputs::Named(mapped))
            }
        }
    }
}

/// Executes named operators against product handles
pub trait TransformEngine {
    type Product: Product;

    fn read_product(&self, path: &Path) -> Result<Self::Product, EngineError>;

    fn apply(
        &self,
        operator: &str,
        params: &StageParams,
        inputs: StageInputs<&Self::Product>,
    ) -> Result<Self::Product, EngineError>;

    fn write_product(
        &self,
        product: &Self::Product,
        path: &Path,
        format: &str,
    ) -> Result<(), EngineError>;

    /// Ordered band catalog of a product. May require the engine to execute
    /// the pending chain.
    fn band_names(&self, product: &Self::Product) -> Result<Vec<String>, EngineError>;
}
