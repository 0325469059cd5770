// crates/btune-core/src/lib.rs

pub mod config;
pub mod error;

pub mod features;
pub mod inference;
pub mod pipeline;
pub mod probe;
pub mod tuner;

pub use crate::config::{Band, Behaviour, BtuneConfig, PerfMode, RepeatMode};
pub use crate::pipeline::{
    ChunkSample, Codec, CompressContext, Decompressor, Filter, SplitMode,
};
pub use crate::pipeline::{ChunkCodec, CodecRegistry};
pub use crate::tuner::{Btune, Cparams, Readapt, State};
