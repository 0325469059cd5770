// crates/btune-core/src/tuner/trace.rs
//
// One-line-per-step tabular trace on stdout, enabled by BTUNE_TRACE.

use crate::config::{bandwidth_to_str, BtuneConfig};
use crate::inference::Prediction;
use crate::tuner::cparams::Cparams;
use crate::tuner::score::Winner;
use crate::pipeline::context::SplitMode;

pub fn banner(config: &BtuneConfig) {
    println!(
        "-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-="
    );
    println!(
        "Btune version: {}\n\
         Performance Mode: {}, Compression tradeoff: {}, Bandwidth: {}\n\
         Behaviour: Waits - {}, Softs - {}, Hards - {}, Repeat Mode - {}",
        env!("CARGO_PKG_VERSION"),
        config.perf_mode.as_str(),
        config.tradeoff,
        bandwidth_to_str(config.bandwidth),
        config.behaviour.nwaits_before_readapt,
        config.behaviour.nsofts_before_hard,
        config.behaviour.nhards_before_stop,
        config.behaviour.repeat_mode.as_str(),
    );
}

pub fn header() {
    println!(
        "|    Codec   | Filter | Split | C.Level | Blocksize | Shufflesize | C.Threads | \
         D.Threads |   Score   |  C.Ratio   |   Btune State   | Readapt | Winner"
    );
}

pub fn inference_line(pred: &Prediction) {
    println!(
        "Inference category={} codec={} filter={} clevel={} splitmode={}",
        pred.category,
        pred.codec.name(),
        pred.filter.id(),
        pred.clevel,
        match pred.splitmode {
            SplitMode::Always => "always",
            SplitMode::Never => "never",
            SplitMode::Auto => "auto",
        },
    );
}

pub fn step_line(
    cparams: &Cparams,
    score: f64,
    cratio: f64,
    state_name: &str,
    readapt: &str,
    winner: Winner,
) {
    let split = if cparams.splitmode == SplitMode::Always {
        1
    } else {
        0
    };
    println!(
        "| {:>10} | {:>6} | {:>5} | {:>7} | {:>9} | {:>11} | {:>9} | {:>9} | {:>9} | {:>9}x | {:>15} | {:>7} | {}",
        cparams.codec.name(),
        cparams.filter.id(),
        split,
        cparams.clevel,
        cparams.blocksize / 1024,
        cparams.shufflesize,
        cparams.nthreads_comp,
        cparams.nthreads_decomp,
        sig3(score),
        sig3(cratio),
        state_name,
        readapt,
        winner.as_char(),
    );
}

/// Three-significant-digit rendering, close to C's %.3g.
fn sig3(v: f64) -> String {
    if v == 0.0 || !v.is_finite() {
        return format!("{}", v);
    }
    let exp = v.abs().log10().floor() as i32;
    if !(-4..6).contains(&exp) {
        format!("{:.2e}", v)
    } else {
        let decimals = (2 - exp).max(0) as usize;
        format!("{:.*}", decimals, v)
    }
}

#[cfg(test)]
mod tests {
    use super::sig3;

    #[test]
    fn sig3_keeps_three_significant_digits() {
        assert_eq!(sig3(0.123456), "0.123");
        assert_eq!(sig3(1.23456), "1.23");
        assert_eq!(sig3(123.456), "123");
        assert_eq!(sig3(0.000123456), "0.000123");
    }
}
