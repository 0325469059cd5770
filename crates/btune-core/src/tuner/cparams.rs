// crates/btune-core/src/tuner/cparams.rs

use crate::pipeline::context::{Codec, Filter, SplitMode};

/// One candidate parameter tuple, together with the direction flags that
/// steer its next mutation and the measurements of its last trial.
#[derive(Clone, Copy, Debug)]
pub struct Cparams {
    pub codec: Codec,
    pub filter: Filter,
    pub splitmode: SplitMode,
    pub clevel: u8,
    pub blocksize: usize,
    /// Rides the context's typesize slot; a power of two while tuned.
    pub shufflesize: u32,
    pub nthreads_comp: u16,
    pub nthreads_decomp: u16,

    pub increasing_clevel: bool,
    pub increasing_block: bool,
    pub increasing_shuffle: bool,
    pub increasing_nthreads: bool,

    pub score: f64,
    pub cratio: f64,
    pub ctime: f64,
    pub dtime: f64,
}

impl Default for Cparams {
    fn default() -> Self {
        Self {
            codec: Codec::Lz4,
            filter: Filter::Shuffle,
            splitmode: SplitMode::Always,
            clevel: 9,
            blocksize: 0,
            shufflesize: 0,
            nthreads_comp: 0,
            nthreads_decomp: 0,
            increasing_clevel: false,
            increasing_block: true,
            increasing_shuffle: true,
            increasing_nthreads: true,
            // Sentinels high enough that any real measurement beats them.
            score: 100.0,
            cratio: 1.0,
            ctime: 100.0,
            dtime: 100.0,
        }
    }
}
