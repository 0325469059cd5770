// crates/btune-core/src/tuner/score.rs

use crate::config::{Band, PerfMode, KB};

/// Per-step outcome shown in the trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winner {
    Improved,
    NotImproved,
    Special,
}

impl Winner {
    pub fn as_char(&self) -> char {
        match self {
            Winner::Improved => 'W',
            Winner::NotImproved => '-',
            Winner::Special => 'S',
        }
    }
}

/// Scalar cost of one trial. Compressed bytes are converted to transfer
/// seconds through the reference bandwidth (KB/s); lower is better.
pub fn score(perf_mode: PerfMode, ctime: f64, cbytes: usize, dtime: f64, bandwidth: u32) -> f64 {
    let reduced_cbytes = cbytes as f64 / KB as f64;
    let transfer = reduced_cbytes / bandwidth as f64;
    match perf_mode {
        // Auto is resolved at init; score it as COMP if it ever leaks through.
        PerfMode::Comp | PerfMode::Auto => ctime + transfer,
        PerfMode::Decomp => transfer + dtime,
        PerfMode::Balanced => ctime + transfer + dtime,
    }
}

/// Did the trial improve on the best so far, given the trade-off band?
///
/// `score_coef` is best.score / new.score, `cratio_coef` is
/// new.cratio / best.cratio: both are > 1 when the new trial wins outright.
/// The lower bands accept mixed outcomes along a fixed exchange table.
pub fn has_improved(band: Band, score_coef: f64, cratio_coef: f64) -> bool {
    let (s, cr) = (score_coef, cratio_coef);
    match band {
        Band::Low => {
            (cr > 1.0 && s > 1.0)
                || (cr > 0.5 && s > 2.0)
                || (cr > 0.67 && s > 1.3)
                || (cr > 2.0 && s > 0.7)
        }
        Band::Balanced => {
            (cr > 1.0 && s > 1.0) || (cr > 1.1 && s > 0.8) || (cr > 1.3 && s > 0.5)
        }
        Band::High => cr > 1.0,
    }
}
