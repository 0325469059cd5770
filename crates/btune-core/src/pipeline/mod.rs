// crates/btune-core/src/pipeline/mod.rs

pub mod context;
pub mod registry;

pub use context::{
    ChunkSample, Codec, CompressContext, Decompressor, Filter, SplitMode, MAX_FILTERS,
    MAX_OVERHEAD,
};
pub use registry::{ChunkCodec, CodecEntry, CodecRegistry};
