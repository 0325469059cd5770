// crates/btune-core/src/inference/engine.rs

use std::path::Path;

use crate::config::PerfMode;
use crate::error::{BtuneError, Result};
use crate::features::ChunkFeatures;
use crate::inference::metadata::{self, Metadata};
use crate::inference::model::{self, Model};
use crate::pipeline::context::{Codec, Filter, SplitMode};

pub const MODEL_COMP: &str = "model_comp.btm";
pub const MODEL_DECOMP: &str = "model_decomp.btm";

/// A resolved classifier output.
#[derive(Clone, Copy, Debug)]
pub struct Prediction {
    pub category: usize,
    pub codec: Codec,
    pub filter: Filter,
    pub clevel: u8,
    pub splitmode: SplitMode,
}

/// Per-context inference state: the loaded artifact pair and a histogram of
/// everything it has predicted so far.
pub struct InferenceEngine {
    model: Model,
    meta: Metadata,
    histogram: Vec<u32>,
}

impl InferenceEngine {
    /// Load the artifact matching `perf_mode` from `models_dir`, falling
    /// back to the other perf mode's file when the preferred one is absent.
    pub fn load(models_dir: &Path, perf_mode: PerfMode) -> Result<InferenceEngine> {
        let meta = match metadata::load(models_dir) {
            Ok(meta) => meta,
            Err(err) => {
                eprintln!("Empty metadata, no inference performed");
                return Err(err);
            }
        };

        let (preferred, fallback) = match perf_mode {
            PerfMode::Decomp => (MODEL_DECOMP, MODEL_COMP),
            _ => (MODEL_COMP, MODEL_DECOMP),
        };
        let path = [preferred, fallback]
            .iter()
            .map(|name| models_dir.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                BtuneError::ModelMissing(format!("no model artifact in {}", models_dir.display()))
            })?;

        let model = model::decode(&std::fs::read(&path)?)?;
        if model.ncategories != meta.categories.len() {
            return Err(BtuneError::ModelFormat(format!(
                "model has {} categories, metadata declares {}",
                model.ncategories,
                meta.categories.len()
            )));
        }
        if model.nfeatures != meta.features.len() {
            return Err(BtuneError::ModelFormat(format!(
                "model has {} features, metadata declares {}",
                model.nfeatures,
                meta.features.len()
            )));
        }

        let ncats = model.ncategories;
        Ok(InferenceEngine {
            model,
            meta,
            histogram: vec![0; ncats],
        })
    }

    /// Classify one chunk and record the category in the histogram.
    pub fn predict(&mut self, features: &ChunkFeatures) -> Result<Prediction> {
        let category = self.model.predict(&features.to_vec())?;
        self.histogram[category] += 1;
        self.resolve(category)
    }

    /// The category predicted most often so far. None until `predict` has
    /// succeeded at least once.
    pub fn most_predicted(&self) -> Option<Prediction> {
        let (category, &count) = self
            .histogram
            .iter()
            .enumerate()
            .max_by_key(|&(_, &c)| c)?;
        if count == 0 {
            return None;
        }
        self.resolve(category).ok()
    }

    fn resolve(&self, category: usize) -> Result<Prediction> {
        let cat = &self.meta.categories[category];
        let (codec, filter, clevel, splitmode) = cat.resolve()?;
        Ok(Prediction {
            category,
            codec,
            filter,
            clevel,
            splitmode,
        })
    }
}
