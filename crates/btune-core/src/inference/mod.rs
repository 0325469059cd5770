// crates/btune-core/src/inference/mod.rs

pub mod engine;
pub mod metadata;
pub mod model;

pub use engine::{InferenceEngine, Prediction, MODEL_COMP, MODEL_DECOMP};
pub use metadata::{Category, Metadata, METADATA_FILE};
pub use model::Model;
