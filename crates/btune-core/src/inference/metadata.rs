// crates/btune-core/src/inference/metadata.rs

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BtuneError, Result};
use crate::pipeline::context::{Codec, Filter, SplitMode};

pub const METADATA_FILE: &str = "metadata.json";

/// One discrete output of the classifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    pub codec: String,
    pub filter: String,
    pub clevel: u8,
    pub splitmode: String,
}

impl Category {
    /// Map the declared names onto pipeline types. Unknown names poison the
    /// category, not the whole run.
    pub fn resolve(&self) -> Result<(Codec, Filter, u8, SplitMode)> {
        let codec = match self.codec.as_str() {
            "blosclz" => Codec::BloscLz,
            "lz4" => Codec::Lz4,
            "lz4hc" => Codec::Lz4hc,
            "zlib" => Codec::Zlib,
            "zstd" => Codec::Zstd,
            other => {
                return Err(BtuneError::ModelFormat(format!("unknown codec {:?}", other)));
            }
        };
        let filter = match self.filter.as_str() {
            "nofilter" => Filter::NoFilter,
            "shuffle" => Filter::Shuffle,
            "bitshuffle" => Filter::BitShuffle,
            "bytedelta" => Filter::ByteDelta,
            other => {
                return Err(BtuneError::ModelFormat(format!("unknown filter {:?}", other)));
            }
        };
        let splitmode = match self.splitmode.as_str() {
            "always" => SplitMode::Always,
            "never" => SplitMode::Never,
            "auto" => SplitMode::Auto,
            other => {
                return Err(BtuneError::ModelFormat(format!(
                    "unknown splitmode {:?}",
                    other
                )));
            }
        };
        if self.clevel > 9 {
            return Err(BtuneError::ModelFormat(format!(
                "clevel {} out of range",
                self.clevel
            )));
        }
        Ok((codec, filter, self.clevel, splitmode))
    }
}

/// Training metadata shipped next to the model artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Metadata {
    pub categories: Vec<Category>,
    /// Feature names, in the order the artifact expects them.
    pub features: Vec<String>,
}

pub fn load(models_dir: &Path) -> Result<Metadata> {
    let path = models_dir.join(METADATA_FILE);
    if !path.is_file() {
        return Err(BtuneError::ModelMissing(format!(
            "no {} in {}",
            METADATA_FILE,
            models_dir.display()
        )));
    }
    let text = std::fs::read_to_string(&path)?;
    let meta: Metadata = serde_json::from_str(&text)?;
    if meta.categories.is_empty() {
        return Err(BtuneError::ModelFormat("metadata has no categories".into()));
    }
    Ok(meta)
}
