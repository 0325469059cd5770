// crates/btune-core/src/pipeline/registry.rs

use std::sync::Arc;

use crate::error::{BtuneError, Result};
use crate::pipeline::context::Codec;

/// A codec as the registry sees it: encode into `dst`, return the compressed
/// size. Size-only estimators (the entropy probe) may leave `dst` untouched
/// and just return the size they would have produced.
pub trait ChunkCodec {
    fn encode(&self, src: &[u8], dst: &mut Vec<u8>, clevel: u8, typesize: u32) -> Result<usize>;

    fn decode(&self, _src: &[u8], _dst: &mut Vec<u8>) -> Result<usize> {
        Err(BtuneError::Pipeline("codec has no decoder".into()))
    }
}

#[derive(Clone)]
pub struct CodecEntry {
    pub id: u8,
    pub name: &'static str,
    pub codec: Arc<dyn ChunkCodec>,
}

/// The pipeline's codec table. Owned by the caller and handed to the tuner
/// at init; registration is idempotent by id so the tuner can install the
/// entropy probe unconditionally.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    entries: Vec<CodecEntry>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec. A second registration under the same id is a no-op.
    pub fn register(&mut self, id: u8, name: &'static str, codec: Arc<dyn ChunkCodec>) {
        if self.entries.iter().any(|e| e.id == id) {
            return;
        }
        self.entries.push(CodecEntry { id, name, codec });
    }

    pub fn get(&self, id: u8) -> Option<&CodecEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn is_available(&self, codec: Codec) -> bool {
        self.get(codec.id()).is_some()
    }

    /// Comma-separated list of registered codec names.
    pub fn names(&self) -> String {
        let names: Vec<&str> = self.entries.iter().map(|e| e.name).collect();
        names.join(",")
    }

    pub fn name_of(&self, id: u8) -> Option<&'static str> {
        self.get(id).map(|e| e.name)
    }
}
