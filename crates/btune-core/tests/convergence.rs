// crates/btune-core/tests/convergence.rs
//
// End-to-end runs of the search machine over synthetic measurement streams.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use btune_core::error::Result;
use btune_core::pipeline::context::{ChunkSample, Codec, CompressContext, Decompressor};
use btune_core::pipeline::registry::{ChunkCodec, CodecRegistry};
use btune_core::tuner::{Btune, State};
use btune_core::{Behaviour, BtuneConfig, PerfMode, RepeatMode};

struct NullCodec;

impl ChunkCodec for NullCodec {
    fn encode(&self, src: &[u8], _dst: &mut Vec<u8>, _clevel: u8, _typesize: u32) -> Result<usize> {
        Ok(src.len())
    }
}

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

/// Copies its input back out; enough for the tuner to time a dtime probe.
struct EchoDecompressor {
    nthreads: u16,
}

impl Decompressor for EchoDecompressor {
    fn nthreads(&self) -> u16 {
        self.nthreads
    }

    fn set_new_nthreads(&mut self, nthreads: u16) {
        self.nthreads = nthreads;
    }

    fn decompress(&mut self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize> {
        dst.extend_from_slice(src);
        Ok(src.len())
    }
}

/// Deterministic stand-in for real compression: cost grows with clevel,
/// shrinks with threads, and the ratio slightly rewards higher levels.
fn simulate(cctx: &CompressContext, srclen: usize) -> (usize, u64) {
    let clevel = cctx.clevel as u64;
    let nthreads = cctx.new_nthreads.max(1) as u64;
    let cbytes = srclen / 3 - (clevel as usize * srclen / 200);
    let ctime_us = (100 + clevel * clevel * 100) / nthreads;
    (cbytes.max(64), ctime_us)
}

#[test]
fn identical_chunks_converge_to_stop() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 2);
    let cfg = BtuneConfig {
        perf_mode: PerfMode::Comp,
        tradeoff: 0.5,
        ..BtuneConfig::default()
    };
    let nhards_cfg = cfg.behaviour.nhards_before_stop;
    let mut btune = Btune::new(Some(cfg), &mut cctx, None, &mut registry);

    let src = vec![0xE1u8; 64 * 1024];
    let mut iterations = 0u32;
    while btune.state() != State::Stop && iterations < 5_000 {
        btune.next_cparams(&mut cctx, &src);
        let (cbytes, ctime_us) = simulate(&cctx, src.len());
        btune.update(
            &mut cctx,
            ChunkSample {
                ctime: Duration::from_micros(ctime_us),
                cbytes,
                src: &src,
                dest: None,
            },
        );
        cctx.nchunks += 1;
        iterations += 1;
    }

    assert_eq!(btune.state(), State::Stop, "never converged");
    // The configured hards plus the seeding one granted at init.
    assert_eq!(btune.nhards(), nhards_cfg + 1);

    let proposals_frozen = cctx.clone();
    btune.next_cparams(&mut cctx, &src);
    assert_eq!(cctx.clevel, proposals_frozen.clevel);
    assert_eq!(cctx.codec, proposals_frozen.codec);
}

#[test]
fn high_ratio_run_restricts_codecs_and_levels() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 2);
    let cfg = BtuneConfig {
        perf_mode: PerfMode::Comp,
        tradeoff: 0.9,
        behaviour: Behaviour {
            nwaits_before_readapt: 0,
            nsofts_before_hard: 5,
            nhards_before_stop: 1,
            repeat_mode: RepeatMode::Stop,
        },
        ..BtuneConfig::default()
    };
    let mut btune = Btune::new(Some(cfg), &mut cctx, None, &mut registry);

    for codec in btune.codecs() {
        assert!(
            matches!(codec, Codec::Zstd | Codec::Zlib),
            "codec {:?} not admissible in the high band",
            codec
        );
    }

    // Twelve distinct chunks of typesize 4, recycled until convergence.
    let chunks: Vec<Vec<u8>> = (0..12u8).map(|i| vec![i; 16 * 1024]).collect();
    let mut iterations = 0u32;
    while btune.state() != State::Stop && iterations < 5_000 {
        let src = &chunks[(iterations as usize) % chunks.len()];
        btune.next_cparams(&mut cctx, src);
        let (cbytes, ctime_us) = simulate(&cctx, src.len());
        btune.update(
            &mut cctx,
            ChunkSample {
                ctime: Duration::from_micros(ctime_us),
                cbytes,
                src,
                dest: None,
            },
        );
        cctx.nchunks += 1;
        iterations += 1;
    }

    assert_eq!(btune.state(), State::Stop);
    assert!(btune.best().clevel <= 6, "clevel {}", btune.best().clevel);
}

#[test]
fn balanced_run_visits_every_enabled_state() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 4);
    let cfg = BtuneConfig {
        perf_mode: PerfMode::Balanced,
        tradeoff: 0.5,
        behaviour: Behaviour {
            nwaits_before_readapt: 0,
            nsofts_before_hard: 5,
            nhards_before_stop: 11,
            repeat_mode: RepeatMode::Stop,
        },
        ..BtuneConfig::default()
    };
    let dctx = Box::new(EchoDecompressor { nthreads: 4 });
    let mut btune = Btune::new(Some(cfg), &mut cctx, Some(dctx), &mut registry);

    let src = vec![0x9Du8; 32 * 1024];
    let mut seen: HashSet<&'static str> = HashSet::new();
    let mut iterations = 0u32;
    while btune.state() != State::Stop && iterations < 20_000 {
        seen.insert(btune.state().name(btune.is_threads_for_comp()));
        btune.next_cparams(&mut cctx, &src);
        let (cbytes, ctime_us) = simulate(&cctx, src.len());
        let dest = vec![0u8; cbytes];
        btune.update(
            &mut cctx,
            ChunkSample {
                ctime: Duration::from_micros(ctime_us),
                cbytes,
                src: &src,
                dest: Some(&dest),
            },
        );
        cctx.nchunks += 1;
        iterations += 1;
    }

    assert_eq!(btune.state(), State::Stop);
    for name in ["CODEC_FILTER", "CLEVEL"] {
        assert!(seen.contains(name), "state {} never visited: {:?}", name, seen);
    }
    assert!(
        seen.contains("THREADS_COMP") || seen.contains("THREADS_DECOMP"),
        "threads never tuned: {:?}",
        seen
    );
}

#[test]
fn pure_speed_run_settles_on_fast_parameters() {
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 2);
    let cfg = BtuneConfig {
        perf_mode: PerfMode::Comp,
        tradeoff: 0.0,
        ..BtuneConfig::default()
    };
    let mut btune = Btune::new(Some(cfg), &mut cctx, None, &mut registry);

    // Repeating mixed-entropy stream.
    let chunks: Vec<Vec<u8>> = (0..4u64)
        .map(|seed| {
            (0..32 * 1024u64)
                .map(|i| ((i * (seed * 2 + 3) + i / 7) % 251) as u8)
                .collect()
        })
        .collect();

    let mut iterations = 0u32;
    while btune.state() != State::Stop && iterations < 10_000 {
        let src = &chunks[(iterations as usize) % chunks.len()];
        btune.next_cparams(&mut cctx, src);
        let (cbytes, ctime_us) = simulate(&cctx, src.len());
        btune.update(
            &mut cctx,
            ChunkSample {
                ctime: Duration::from_micros(ctime_us),
                cbytes,
                src,
                dest: None,
            },
        );
        cctx.nchunks += 1;
        iterations += 1;
    }

    assert_eq!(btune.state(), State::Stop);
    assert!(
        matches!(btune.best().codec, Codec::Lz4 | Codec::BloscLz),
        "codec {:?}",
        btune.best().codec
    );
    assert!(btune.best().clevel <= 3, "clevel {}", btune.best().clevel);
}
