// crates/btune-core/src/pipeline/context.rs

use std::time::Duration;

use crate::error::Result;

/// Filter slots available on a compress context. A single filter occupies
/// the last slot; see `Filter::ByteDelta` for the one two-slot case.
pub const MAX_FILTERS: usize = 6;

/// Worst-case container overhead per chunk. Chunks whose compressed size is
/// within `MAX_OVERHEAD + typesize` are treated as made of special values.
pub const MAX_OVERHEAD: usize = 32;

/// Codec ids stable across the registry and the chunk header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Codec {
    BloscLz = 0,
    Lz4 = 1,
    Lz4hc = 2,
    Zlib = 4,
    Zstd = 5,
}

impl Codec {
    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Codec> {
        match id {
            0 => Some(Codec::BloscLz),
            1 => Some(Codec::Lz4),
            2 => Some(Codec::Lz4hc),
            4 => Some(Codec::Zlib),
            5 => Some(Codec::Zstd),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::BloscLz => "blosclz",
            Codec::Lz4 => "lz4",
            Codec::Lz4hc => "lz4hc",
            Codec::Zlib => "zlib",
            Codec::Zstd => "zstd",
        }
    }
}

/// Pre-transform applied before the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Filter {
    NoFilter = 0,
    Shuffle = 1,
    BitShuffle = 2,
    ByteDelta = 35,
}

impl Filter {
    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Filter> {
        match id {
            0 => Some(Filter::NoFilter),
            1 => Some(Filter::Shuffle),
            2 => Some(Filter::BitShuffle),
            35 => Some(Filter::ByteDelta),
            _ => None,
        }
    }
}

/// Whether chunk blocks are split per type-size lane before compression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitMode {
    Always,
    Never,
    Auto,
}

/// The mutable per-chunk compression parameters the tuner drives.
///
/// The pipeline fills in `typesize`, `nthreads` and `blocksize` at creation;
/// the tuner rewrites the rest on every `next_cparams` call and the pipeline
/// reads them back when compressing.
#[derive(Clone, Debug)]
pub struct CompressContext {
    pub codec: Codec,
    pub filters: [Filter; MAX_FILTERS],
    pub filters_meta: [u8; MAX_FILTERS],
    pub splitmode: SplitMode,
    pub clevel: u8,
    /// 0 means the pipeline picks.
    pub blocksize: usize,
    pub typesize: u32,
    pub nthreads: u16,
    /// Thread count the pipeline should switch to for the next chunk.
    pub new_nthreads: u16,
    /// Chunks appended so far on this context.
    pub nchunks: u64,
}

impl CompressContext {
    pub fn new(typesize: u32, nthreads: u16) -> Self {
        Self {
            codec: Codec::Lz4,
            filters: [Filter::NoFilter; MAX_FILTERS],
            filters_meta: [0; MAX_FILTERS],
            splitmode: SplitMode::Auto,
            clevel: 9,
            blocksize: 0,
            typesize,
            nthreads,
            new_nthreads: nthreads,
            nchunks: 0,
        }
    }

    /// The single tuned filter, by convention the last slot.
    pub fn filter(&self) -> Filter {
        self.filters[MAX_FILTERS - 1]
    }
}

/// Decompression seam handed to the tuner at init. Owns whatever state the
/// pipeline needs to decompress one chunk, plus the tuned thread count.
pub trait Decompressor {
    fn nthreads(&self) -> u16;

    /// Thread count to use from the next decompression on.
    fn set_new_nthreads(&mut self, nthreads: u16);

    /// Decompress a full chunk into `dst`, returning the decompressed size.
    fn decompress(&mut self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize>;
}

/// One compressed chunk as observed by the pipeline, fed back to the tuner.
#[derive(Clone, Copy, Debug)]
pub struct ChunkSample<'a> {
    /// Wall time spent compressing.
    pub ctime: Duration,
    /// Compressed size in bytes.
    pub cbytes: usize,
    /// The uncompressed chunk.
    pub src: &'a [u8],
    /// The compressed frame, when one exists (prefilter evaluation has none).
    pub dest: Option<&'a [u8]>,
}
