// crates/btune-core/tests/tuner_invariants.rs

use std::sync::Arc;
use std::time::Duration;

use btune_core::error::Result;
use btune_core::pipeline::context::{ChunkSample, Codec, CompressContext};
use btune_core::pipeline::registry::{ChunkCodec, CodecRegistry};
use btune_core::tuner::{Btune, State};
use btune_core::{Behaviour, BtuneConfig, PerfMode, RepeatMode};

struct NullCodec;

impl ChunkCodec for NullCodec {
    fn encode(&self, src: &[u8], _dst: &mut Vec<u8>, _clevel: u8, _typesize: u32) -> Result<usize> {
        Ok(src.len())
    }
}

/// Registry advertising every tunable codec, so band restrictions are the
/// only thing shaping `codecs[]`.
fn registry_all() -> CodecRegistry {
    let mut registry = CodecRegistry::new();
    for codec in [
        Codec::BloscLz,
        Codec::Lz4,
        Codec::Lz4hc,
        Codec::Zlib,
        Codec::Zstd,
    ] {
        registry.register(codec.id(), codec.name(), Arc::new(NullCodec));
    }
    registry
}

fn step(btune: &mut Btune, cctx: &mut CompressContext, src: &[u8], cbytes: usize, ctime_us: u64) {
    btune.next_cparams(cctx, src);
    btune.update(
        cctx,
        ChunkSample {
            ctime: Duration::from_micros(ctime_us),
            cbytes,
            src,
            dest: None,
        },
    );
    cctx.nchunks += 1;
}

fn config(tradeoff: f64, perf_mode: PerfMode) -> BtuneConfig {
    BtuneConfig {
        perf_mode,
        tradeoff,
        ..BtuneConfig::default()
    }
}

#[test]
fn best_params_stay_in_range() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 4);
    let mut btune = Btune::new(
        Some(config(0.5, PerfMode::Comp)),
        &mut cctx,
        None,
        &mut registry,
    );

    let src = vec![0x5Au8; 64 * 1024];
    for i in 0..200u64 {
        // Vary outcomes so both improving and worsening steps occur.
        let cbytes = 20_000 + ((i * 7919) % 30_000) as usize;
        let ctime = 50 + (i * 131) % 400;
        step(&mut btune, &mut cctx, &src, cbytes, ctime);

        let best = btune.best();
        assert!((1..=9).contains(&best.clevel), "clevel {}", best.clevel);
        assert!(
            best.shufflesize.is_power_of_two(),
            "shufflesize {}",
            best.shufflesize
        );
        assert!((1..=btune.max_threads()).contains(&best.nthreads_comp));
        assert!((1..=btune.max_threads()).contains(&best.nthreads_decomp));
    }
}

#[test]
fn high_tradeoff_never_worsens_cratio() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 2);
    let mut btune = Btune::new(
        Some(config(1.0, PerfMode::Comp)),
        &mut cctx,
        None,
        &mut registry,
    );

    let src = vec![0x11u8; 32 * 1024];
    let mut last_cratio = btune.best().cratio;
    for i in 0..120u64 {
        let cbytes = 1_000 + ((i * 613) % 20_000) as usize;
        step(&mut btune, &mut cctx, &src, cbytes, 100);
        let cratio = btune.best().cratio;
        assert!(cratio >= last_cratio, "{} < {}", cratio, last_cratio);
        last_cratio = cratio;
    }
}

#[test]
fn worse_cbytes_does_not_replace_best() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 2);
    let mut btune = Btune::new(
        Some(config(1.0, PerfMode::Comp)),
        &mut cctx,
        None,
        &mut registry,
    );

    let src = vec![0x42u8; 16 * 1024];
    // Establish a good best first.
    step(&mut btune, &mut cctx, &src, 2_000, 100);
    let best_before = *btune.best();

    // A zero-time trial with worse ratio must not take over.
    step(&mut btune, &mut cctx, &src, 8_000, 0);
    assert_eq!(btune.best().cratio, best_before.cratio);
    assert_eq!(btune.best().score, best_before.score);
}

#[test]
fn decomp_mode_tunes_decompression_threads_first() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 4);
    let mut btune = Btune::new(
        Some(config(0.2, PerfMode::Decomp)),
        &mut cctx,
        None,
        &mut registry,
    );

    assert!(!btune.is_threads_for_comp());
    let src = vec![0x33u8; 8 * 1024];
    for i in 0..40u64 {
        step(&mut btune, &mut cctx, &src, 4_000 + (i % 5) as usize * 100, 80);
        if btune.nhards() < 1 {
            assert!(!btune.is_threads_for_comp());
        }
    }
}

#[test]
fn special_chunks_never_become_best() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 2);
    let mut btune = Btune::new(
        Some(config(0.5, PerfMode::Comp)),
        &mut cctx,
        None,
        &mut registry,
    );

    let src = vec![0u8; 1024 * 1024];
    let sentinel = btune.best().score;
    for _ in 0..30 {
        // Constant chunks collapse to header + typesize bytes.
        step(&mut btune, &mut cctx, &src, 20, 10);
        assert_eq!(btune.best().score, sentinel, "special chunk took over best");
    }
}

#[test]
fn score_is_monotone_when_ratio_is_flat() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 2);
    let mut btune = Btune::new(
        Some(config(0.2, PerfMode::Comp)),
        &mut cctx,
        None,
        &mut registry,
    );

    let src = vec![0x77u8; 32 * 1024];
    let mut last_best = f64::INFINITY;
    for i in 0..100u64 {
        // Equal cbytes every step: only speed can drive an improvement.
        let ctime = 1_000u64.saturating_sub(i * 9) + 10;
        step(&mut btune, &mut cctx, &src, 10_000, ctime);
        let best = btune.best().score;
        assert!(best <= last_best, "best score went up: {} > {}", best, last_best);
        last_best = best;
    }
}

#[test]
fn disabled_inference_matches_missing_models() {
    let run = |models_dir: Option<std::path::PathBuf>| -> Vec<(Codec, u8, u8)> {
        let mut registry = registry_all();
        let mut cctx = CompressContext::new(4, 2);
        let cfg = BtuneConfig {
            perf_mode: PerfMode::Comp,
            tradeoff: 0.5,
            use_inference: 0,
            models_dir,
            ..BtuneConfig::default()
        };
        let mut btune = Btune::new(Some(cfg), &mut cctx, None, &mut registry);
        let src = vec![0xA5u8; 8 * 1024];
        let mut proposals = Vec::new();
        for i in 0..60u64 {
            btune.next_cparams(&mut cctx, &src);
            proposals.push((cctx.codec, cctx.clevel, cctx.filter().id()));
            btune.update(
                &mut cctx,
                ChunkSample {
                    ctime: Duration::from_micros(100 + i % 3),
                    cbytes: 4_000,
                    src: &src,
                    dest: None,
                },
            );
            cctx.nchunks += 1;
        }
        proposals
    };

    let empty = tempfile::tempdir().unwrap();
    let without_models = run(None);
    let with_empty_dir = run(Some(empty.path().to_path_buf()));
    assert_eq!(without_models, with_empty_dir);
}

#[test]
fn stopped_machine_ignores_further_chunks() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 1);
    let cfg = BtuneConfig {
        perf_mode: PerfMode::Comp,
        tradeoff: 0.5,
        behaviour: Behaviour {
            nwaits_before_readapt: 0,
            nsofts_before_hard: 0,
            nhards_before_stop: 1,
            repeat_mode: RepeatMode::Stop,
        },
        ..BtuneConfig::default()
    };
    let mut btune = Btune::new(Some(cfg), &mut cctx, None, &mut registry);

    let src = vec![0xC3u8; 4 * 1024];
    for _ in 0..300 {
        step(&mut btune, &mut cctx, &src, 2_000, 50);
        if btune.state() == State::Stop {
            break;
        }
    }
    assert_eq!(btune.state(), State::Stop);

    let steps = btune.steps_count();
    step(&mut btune, &mut cctx, &src, 2_000, 50);
    assert_eq!(btune.steps_count(), steps);
}
