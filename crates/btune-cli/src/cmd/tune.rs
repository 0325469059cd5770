// crates/btune-cli/src/cmd/tune.rs

use std::path::PathBuf;
use std::time::Instant;

use btune_core::pipeline::context::{ChunkSample, CompressContext};
use btune_core::tuner::{Btune, State};
use btune_core::{Behaviour, BtuneConfig, PerfMode, RepeatMode};
use clap::Args;

use crate::io::chunks;
use crate::pipeline::Pipeline;

#[derive(Args, Debug)]
pub struct TuneArgs {
    /// Input file, cut into chunks and streamed through the tuner.
    #[arg(long)]
    pub r#in: String,

    /// Chunk size in bytes.
    #[arg(long, default_value_t = 256 * 1024)]
    pub chunk_size: usize,

    /// Bytes per element (shuffle lane width).
    #[arg(long, default_value_t = 4)]
    pub typesize: u32,

    /// Speed/ratio trade-off, 0.0 = speed, 1.0 = ratio.
    #[arg(long, default_value_t = 0.5)]
    pub tradeoff: f64,

    /// COMP, DECOMP or BALANCED. Omit to resolve from BTUNE_PERF_MODE.
    #[arg(long)]
    pub perf_mode: Option<String>,

    /// Reference I/O bandwidth in KB/s.
    #[arg(long)]
    pub bandwidth: Option<u32>,

    /// Worker threads advertised to the tuner.
    #[arg(long, default_value_t = 4)]
    pub nthreads: u16,

    /// Waits between readapts.
    #[arg(long, default_value_t = 0)]
    pub waits: u32,

    /// Soft readapts per hard.
    #[arg(long, default_value_t = 5)]
    pub softs: u32,

    /// Hard readapts before stopping.
    #[arg(long, default_value_t = 11)]
    pub hards: u32,

    /// What to do after the last hard: stop, repeat-soft or repeat-all.
    #[arg(long, default_value = "stop")]
    pub repeat: String,

    /// -1 = every chunk, 0 = never, k > 0 = first k chunks.
    #[arg(long, default_value_t = 0)]
    pub use_inference: i32,

    /// Directory with classifier artifacts for this dataset.
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Loop over the input until the tuner stops (or --max-chunks).
    #[arg(long, default_value_t = false)]
    pub until_stop: bool,

    /// Upper bound on tuned chunks when looping.
    #[arg(long, default_value_t = 10_000)]
    pub max_chunks: u64,
}

fn parse_perf_mode(s: &str) -> anyhow::Result<PerfMode> {
    match s {
        "COMP" => Ok(PerfMode::Comp),
        "DECOMP" => Ok(PerfMode::Decomp),
        "BALANCED" => Ok(PerfMode::Balanced),
        other => anyhow::bail!("unknown perf mode: {} (want COMP|DECOMP|BALANCED)", other),
    }
}

fn parse_repeat(s: &str) -> anyhow::Result<RepeatMode> {
    match s {
        "stop" => Ok(RepeatMode::Stop),
        "repeat-soft" => Ok(RepeatMode::RepeatSoft),
        "repeat-all" => Ok(RepeatMode::RepeatAll),
        other => anyhow::bail!("unknown repeat mode: {}", other),
    }
}

pub fn run(args: TuneArgs) -> anyhow::Result<()> {
    let bytes = chunks::read_file(&args.r#in)?;
    let chunk_list = chunks::split_chunks(&bytes, args.chunk_size, args.typesize as usize);

    let perf_mode = match args.perf_mode.as_deref() {
        Some(s) => parse_perf_mode(s)?,
        None => PerfMode::Auto,
    };
    let defaults = BtuneConfig::default();
    let config = BtuneConfig {
        perf_mode,
        tradeoff: args.tradeoff,
        bandwidth: args.bandwidth.unwrap_or(defaults.bandwidth),
        behaviour: Behaviour {
            nwaits_before_readapt: args.waits,
            nsofts_before_hard: args.softs,
            nhards_before_stop: args.hards,
            repeat_mode: parse_repeat(&args.repeat)?,
        },
        cparams_hint: false,
        use_inference: args.use_inference,
        models_dir: args.models_dir.clone(),
    };

    let mut pipeline = Pipeline::new();
    let mut cctx = CompressContext::new(args.typesize, args.nthreads);
    let dctx = Box::new(pipeline.decompressor(args.nthreads));
    let mut btune = Btune::new(Some(config), &mut cctx, Some(dctx), pipeline.registry_mut());

    let t0 = Instant::now();
    let mut srcbytes: u64 = 0;
    let mut cbytes_total: u64 = 0;
    let mut nchunks: u64 = 0;

    'outer: loop {
        for chunk in &chunk_list {
            btune.next_cparams(&mut cctx, chunk);
            let start = Instant::now();
            let frame = pipeline.compress(&cctx, chunk)?;
            let ctime = start.elapsed();
            btune.update(
                &mut cctx,
                ChunkSample {
                    ctime,
                    cbytes: frame.len(),
                    src: chunk,
                    dest: Some(&frame),
                },
            );
            cctx.nchunks += 1;
            nchunks += 1;
            srcbytes += chunk.len() as u64;
            cbytes_total += frame.len() as u64;

            if nchunks >= args.max_chunks {
                break 'outer;
            }
        }
        if !args.until_stop || btune.state() == State::Stop {
            break;
        }
    }

    let best = btune.best();
    eprintln!("--- tune ---");
    eprintln!("file           = {}", args.r#in);
    eprintln!("chunks         = {}", nchunks);
    eprintln!(
        "overall_cratio = {:.3}",
        srcbytes as f64 / cbytes_total as f64
    );
    eprintln!("elapsed_ms     = {}", t0.elapsed().as_millis());
    eprintln!(
        "best: codec={} filter={} split={:?} clevel={} shufflesize={} cthreads={} dthreads={} cratio={:.3}",
        best.codec.name(),
        best.filter.id(),
        best.splitmode,
        best.clevel,
        best.shufflesize,
        best.nthreads_comp,
        best.nthreads_decomp,
        best.cratio,
    );
    eprintln!(
        "state          = {}",
        btune.state().name(btune.is_threads_for_comp())
    );

    Ok(())
}
