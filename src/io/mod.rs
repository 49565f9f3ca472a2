//! Engine contract and engine adapters

pub mod engine;
pub mod gpt;

pub use engine::{EngineError, Product, StageInputs, TransformEngine};
pub use gpt::{GptEngine, GptProduct};
