// crates/btune-core/tests/inference_models.rs
//
// Model-driven proposals: artifact round-trip, first-N predictions and the
// most-predicted seeding of the search.

use std::sync::Arc;
use std::time::Duration;

use btune_core::error::Result;
use btune_core::features::NFEATURES;
use btune_core::inference::{model, Model};
use btune_core::pipeline::context::{ChunkSample, Codec, CompressContext};
use btune_core::pipeline::registry::{ChunkCodec, CodecRegistry};
use btune_core::tuner::Btune;
use btune_core::{BtuneConfig, PerfMode};

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

const METADATA: &str = r#"{
  "categories": [
    {"codec": "blosclz", "filter": "shuffle", "clevel": 5, "splitmode": "always"},
    {"codec": "lz4", "filter": "bitshuffle", "clevel": 5, "splitmode": "never"},
    {"codec": "zstd", "filter": "shuffle", "clevel": 7, "splitmode": "always"}
  ],
  "features": ["cratio", "cspeed", "arange_speed", "zeros_speed", "typesize", "chunksize"]
}"#;

/// A model whose bias alone decides: always category 1 (lz4, bitshuffle, 5).
fn constant_model() -> Model {
    Model {
        nfeatures: NFEATURES,
        ncategories: 3,
        mean: vec![0.0; NFEATURES],
        std: vec![1.0; NFEATURES],
        weights: vec![0.0; 3 * NFEATURES],
        bias: vec![0.0, 10.0, 0.0],
    }
}

fn write_models_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("metadata.json"), METADATA).unwrap();
    std::fs::write(
        dir.path().join("model_comp.btm"),
        model::encode(&constant_model()),
    )
    .unwrap();
    dir
}

#[test]
fn artifact_roundtrips_and_rejects_corruption() {
    let m = constant_model();
    let bytes = model::encode(&m);
    let back = model::decode(&bytes).unwrap();
    assert_eq!(back.nfeatures, m.nfeatures);
    assert_eq!(back.ncategories, m.ncategories);
    assert_eq!(back.bias, m.bias);

    let mut bad = bytes.clone();
    bad[10] ^= 0xFF;
    assert!(model::decode(&bad).is_err());

    assert!(model::decode(&bytes[..bytes.len() - 1]).is_err());
}

#[test]
fn first_n_proposals_come_from_the_model() {
    let dir = write_models_dir();
    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 2);
    let cfg = BtuneConfig {
        perf_mode: PerfMode::Comp,
        tradeoff: 0.5,
        use_inference: 3,
        models_dir: Some(dir.path().to_path_buf()),
        ..BtuneConfig::default()
    };
    let mut btune = Btune::new(Some(cfg), &mut cctx, None, &mut registry);

    let src: Vec<u8> = (0..8192u32).map(|i| (i % 253) as u8).collect();
    for chunk in 0..3u64 {
        btune.next_cparams(&mut cctx, &src);
        assert_eq!(cctx.codec, Codec::Lz4, "chunk {} not model-driven", chunk);
        assert_eq!(cctx.filter().id(), 2, "chunk {} filter", chunk);
        assert_eq!(cctx.clevel, 5, "chunk {} clevel", chunk);
        btune.update(
            &mut cctx,
            ChunkSample {
                ctime: Duration::from_micros(120),
                cbytes: 3000,
                src: &src,
                dest: None,
            },
        );
        cctx.nchunks += 1;
    }

    // Fourth chunk: inference is exhausted, the search starts from the
    // most-predicted tuple with singleton codec and filter lists.
    btune.next_cparams(&mut cctx, &src);
    assert_eq!(btune.codecs(), &[Codec::Lz4]);
    assert_eq!(cctx.codec, Codec::Lz4);
    btune.update(
        &mut cctx,
        ChunkSample {
            ctime: Duration::from_micros(120),
            cbytes: 3000,
            src: &src,
            dest: None,
        },
    );
    cctx.nchunks += 1;

    // The seeded clevel sweep is centred on the predicted level.
    for _ in 0..40u32 {
        btune.next_cparams(&mut cctx, &src);
        assert!(
            (4..=6).contains(&cctx.clevel),
            "clevel {} outside the seeded window",
            cctx.clevel
        );
        btune.update(
            &mut cctx,
            ChunkSample {
                ctime: Duration::from_micros(120),
                cbytes: 3000,
                src: &src,
                dest: None,
            },
        );
        cctx.nchunks += 1;
    }
}

#[test]
fn missing_artifacts_devolve_to_pure_search() {
    let dir = tempfile::tempdir().unwrap();
    // Metadata alone is not enough.
    std::fs::write(dir.path().join("metadata.json"), METADATA).unwrap();

    let mut registry = registry_all();
    let mut cctx = CompressContext::new(4, 2);
    let cfg = BtuneConfig {
        perf_mode: PerfMode::Comp,
        tradeoff: 0.5,
        use_inference: -1,
        models_dir: Some(dir.path().to_path_buf()),
        ..BtuneConfig::default()
    };
    let mut btune = Btune::new(Some(cfg), &mut cctx, None, &mut registry);

    let src = vec![0x61u8; 4096];
    btune.next_cparams(&mut cctx, &src);
    // Search-driven from the start: full balanced codec list survives.
    assert!(btune.codecs().len() > 1);
}
