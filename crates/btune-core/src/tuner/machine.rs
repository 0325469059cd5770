// crates/btune-core/src/tuner/machine.rs
//
// The search state machine. Per chunk the driver calls `next_cparams`,
// compresses with whatever the context now says, then calls `update` with
// the measurements; the machine scores the trial and moves on.

use std::time::Instant;

use crate::config::{Band, BtuneConfig, PerfMode, RepeatMode};
use crate::features::FeatureExtractor;
use crate::inference::{InferenceEngine, Prediction};
use crate::pipeline::context::{
    ChunkSample, Codec, CompressContext, Decompressor, Filter, SplitMode, MAX_FILTERS,
    MAX_OVERHEAD,
};
use crate::pipeline::registry::CodecRegistry;
use crate::probe::register_entropy_probe;
use crate::tuner::cparams::Cparams;
use crate::tuner::score::{self, Winner};
use crate::tuner::state::{Readapt, State};
use crate::tuner::trace;

// Disable individual states, mirroring the shipped configuration.
const ENABLE_SHUFFLE_SIZE: bool = false;
const ENABLE_MEMCPY: bool = false;
const ENABLE_THREADS: bool = true;

const MIN_BITSHUFFLE: u32 = 1;
const MIN_SHUFFLE: u32 = 2;
const MAX_SHUFFLE: u32 = 16;
const MIN_THREADS: u16 = 1;
const SOFT_STEP_SIZE: i32 = 1;
const HARD_STEP_SIZE: i32 = 2;
// Sentinel larger than any real number of thread-tuning steps; lets the
// BALANCED mode reuse aux_index to hand over from comp to decomp threads.
const MAX_STATE_THREADS: u32 = 50;
// Trials averaged per candidate before judging it.
const REPEATS_PER_CPARAMS: usize = 1;

pub struct Btune {
    config: BtuneConfig,

    codecs: Vec<Codec>,
    filters: Vec<Filter>,
    clevels: Vec<u8>,
    clevel_index: i32,
    splitmode: SplitMode,

    state: State,
    readapt_from: Readapt,
    step_size: i32,

    nsofts: u32,
    nhards: u32,
    nwaitings: u32,
    steps_count: u64,
    aux_index: u32,
    rep_index: usize,
    is_repeating: bool,

    threads_for_comp: bool,
    max_threads: u16,
    nthreads_decomp: u16,

    best: Cparams,
    aux_cparams: Cparams,
    current_scores: [f64; REPEATS_PER_CPARAMS],
    current_cratios: [f64; REPEATS_PER_CPARAMS],

    inference: Option<InferenceEngine>,
    inference_count: i32,
    inference_ended: bool,
    from_inference: bool,
    extractor: FeatureExtractor,

    dctx: Option<Box<dyn Decompressor>>,
    trace: bool,
}

impl Btune {
    /// Build the tuner for one pipeline context. Applies environment
    /// overrides, installs the entropy probe into `registry`, snapshots
    /// codec availability and optionally loads per-dataset models.
    pub fn new(
        config: Option<BtuneConfig>,
        cctx: &mut CompressContext,
        dctx: Option<Box<dyn Decompressor>>,
        registry: &mut CodecRegistry,
    ) -> Btune {
        register_entropy_probe(registry);

        let config = config.unwrap_or_default().resolved_from_env();
        let trace = std::env::var_os("BTUNE_TRACE").is_some();

        let codecs = init_codecs(&config, registry);
        let filters = vec![Filter::NoFilter, Filter::Shuffle, Filter::BitShuffle];

        let nthreads_decomp = dctx.as_ref().map(|d| d.nthreads()).unwrap_or(cctx.nthreads);
        let max_threads = cctx.nthreads.max(nthreads_decomp);

        let mut best = Cparams::default();
        best.codec = codecs[0];
        if config.band() == Band::High {
            best.clevel = 8;
        }
        best.shufflesize = cctx.typesize;
        best.nthreads_comp = cctx.nthreads;
        best.nthreads_decomp = nthreads_decomp;

        let mut btune = Btune {
            config: config.clone(),
            codecs,
            filters,
            clevels: Vec::new(),
            clevel_index: 0,
            splitmode: SplitMode::Auto,
            state: State::CodecFilter,
            readapt_from: Readapt::Hard,
            step_size: HARD_STEP_SIZE,
            nsofts: 0,
            nhards: 0,
            nwaitings: 0,
            steps_count: 0,
            aux_index: 0,
            rep_index: 0,
            is_repeating: false,
            threads_for_comp: config.perf_mode != PerfMode::Decomp,
            max_threads,
            nthreads_decomp,
            best,
            aux_cparams: best,
            current_scores: [0.0; REPEATS_PER_CPARAMS],
            current_cratios: [0.0; REPEATS_PER_CPARAMS],
            inference: None,
            inference_count: 0,
            inference_ended: false,
            from_inference: false,
            extractor: FeatureExtractor::new(),
            dctx,
            trace,
        };
        let start_clevel = btune.best.clevel;
        btune.init_clevels(1, 9, start_clevel);

        if btune.config.cparams_hint {
            let hinted = btune.extract_cparams(cctx);
            btune.best = hinted;
            btune.aux_cparams = hinted;
            if !btune.codecs.contains(&cctx.codec) {
                btune.codecs.push(cctx.codec);
            }
            let behaviour = btune.config.behaviour;
            if behaviour.nhards_before_stop > 0 {
                if behaviour.nsofts_before_hard > 0 {
                    btune.init_soft();
                } else if behaviour.nwaits_before_readapt > 0 {
                    btune.state = State::Waiting;
                    btune.readapt_from = Readapt::Wait;
                } else {
                    btune.init_hard();
                }
            } else {
                btune.init_without_hards();
            }
        } else {
            btune.init_hard();
            // The first hard only seeds `best`; grant it on top of the quota.
            btune.config.behaviour.nhards_before_stop += 1;
        }
        btune.step_size = if btune.config.behaviour.nhards_before_stop == 1 {
            SOFT_STEP_SIZE
        } else {
            HARD_STEP_SIZE
        };

        if let Some(dir) = btune.config.models_dir.clone() {
            match InferenceEngine::load(&dir, btune.config.perf_mode) {
                Ok(engine) => {
                    btune.inference = Some(engine);
                    btune.inference_count = btune.config.use_inference;
                }
                Err(err) => {
                    if btune.trace {
                        eprintln!("could not load models from {}: {}", dir.display(), err);
                    }
                }
            }
        }

        if btune.trace {
            trace::banner(&btune.config);
        }

        btune
    }

    /// Must exist for the plug-in contract; blocksize is left to the
    /// pipeline.
    pub fn next_blocksize(&mut self, _cctx: &mut CompressContext) {}

    /// Propose the parameters for the next chunk, writing them onto `cctx`.
    pub fn next_cparams(&mut self, cctx: &mut CompressContext, src: &[u8]) {
        self.from_inference = false;
        let mut prediction: Option<Prediction> = None;
        let mut seed: Option<Prediction> = None;

        if self.inference_count != 0 {
            if self.inference_count > 0 {
                self.inference_count -= 1;
            }
            if let Some(engine) = self.inference.as_mut() {
                let features = self.extractor.extract(src, cctx.typesize);
                match engine.predict(&features) {
                    Ok(pred) => {
                        prediction = Some(pred);
                        seed = Some(pred);
                    }
                    Err(err) => {
                        if self.trace {
                            eprintln!("inference failed: {}", err);
                        }
                    }
                }
            }
        } else if !self.inference_ended {
            seed = self.inference.as_ref().and_then(|e| e.most_predicted());
            self.inference_ended = true;
        }

        if let Some(pred) = seed {
            self.codecs = vec![pred.codec];
            self.filters = vec![pred.filter];
            if self.config.perf_mode == PerfMode::Decomp {
                self.init_clevels(pred.clevel, pred.clevel, pred.clevel);
            } else {
                let min = if pred.clevel > 1 { pred.clevel - 1 } else { pred.clevel };
                let max = if pred.clevel < 9 { pred.clevel + 1 } else { pred.clevel };
                self.init_clevels(min, max, pred.clevel);
            }
        }

        if self.trace && cctx.nchunks == 0 && self.state != State::Stop {
            trace::header();
        }

        if self.state == State::Stop {
            return;
        }

        // While the model drives, emit its tuple directly; the search
        // machinery only starts moving once inference is exhausted.
        if let Some(pred) = prediction {
            self.from_inference = true;
            let mut cparams = self.best;
            cparams.codec = pred.codec;
            cparams.filter = pred.filter;
            cparams.clevel = pred.clevel;
            cparams.splitmode = pred.splitmode;
            self.aux_cparams = cparams;
            if self.trace {
                trace::inference_line(&pred);
            }
            self.set_cparams(cctx, src.len());
            return;
        }

        self.aux_cparams = self.best;

        match self.state {
            // Cycle codecs, filters and splits.
            State::CodecFilter => {
                let n_filters_splits = (self.filters.len() * 2) as u32;
                let codec = self.codecs[(self.aux_index / n_filters_splits) as usize];
                let filter = self.filters[((self.aux_index % n_filters_splits) / 2) as usize];
                let cparams = &mut self.aux_cparams;
                cparams.codec = codec;
                cparams.filter = filter;
                cparams.splitmode = if self.splitmode == SplitMode::Auto {
                    if self.aux_index % 2 == 0 {
                        SplitMode::Always
                    } else {
                        SplitMode::Never
                    }
                } else {
                    self.splitmode
                };

                // The first tuning of ZSTD/ZLIB in timing-sensitive modes
                // starts at clevel 3.
                if matches!(self.config.perf_mode, PerfMode::Comp | PerfMode::Balanced)
                    && matches!(cparams.codec, Codec::Zstd | Codec::Zlib)
                    && self.nhards == 0
                {
                    cparams.clevel = 3;
                }
                if self.inference_ended {
                    self.aux_index += 1;
                }
            }

            State::ShuffleSize => {
                self.aux_index += 1;
                let cparams = &mut self.aux_cparams;
                if cparams.increasing_shuffle {
                    if cparams.shufflesize < MAX_SHUFFLE {
                        cparams.shufflesize <<= 1;
                    }
                } else {
                    let min_shuffle = if cparams.filter == Filter::Shuffle {
                        MIN_SHUFFLE
                    } else {
                        MIN_BITSHUFFLE
                    };
                    if cparams.shufflesize > min_shuffle {
                        cparams.shufflesize >>= 1;
                    }
                }
            }

            State::Threads => {
                self.aux_index += 1;
                let max_threads = self.max_threads;
                let cparams = &mut self.aux_cparams;
                let increasing = cparams.increasing_nthreads;
                let nthreads = if self.threads_for_comp {
                    &mut cparams.nthreads_comp
                } else {
                    &mut cparams.nthreads_decomp
                };
                if increasing {
                    if *nthreads < max_threads {
                        *nthreads += 1;
                    }
                } else if *nthreads > MIN_THREADS {
                    *nthreads -= 1;
                }
            }

            State::Clevel => {
                self.aux_index += 1;
                if !self.has_ended_clevel() {
                    if self.aux_cparams.increasing_clevel {
                        self.clevel_index += self.step_size;
                    } else {
                        self.clevel_index -= self.step_size;
                    }
                }
                let cparams = &mut self.aux_cparams;
                cparams.clevel = self.clevels[self.clevel_index as usize];
                if cparams.clevel == 9 && cparams.codec == Codec::Zstd {
                    cparams.clevel = 8;
                }
            }

            // Try without compressing.
            State::Memcpy => {
                self.aux_index += 1;
                self.aux_cparams.clevel = 0;
            }

            State::Waiting => {
                self.nwaitings += 1;
            }

            State::Stop => return,
        }

        self.set_cparams(cctx, src.len());
    }

    /// Record one compression result, optionally time the decompression,
    /// score the trial and advance the machine.
    pub fn update(&mut self, cctx: &mut CompressContext, sample: ChunkSample<'_>) {
        if self.state == State::Stop {
            return;
        }
        self.steps_count += 1;

        let ctime = sample.ctime.as_secs_f64();
        let cbytes = sample.cbytes.max(1);
        let behaviour = self.config.behaviour;

        // Waiting chunks carry no probe, except the one that ends the wait.
        let idle_wait = self.state == State::Waiting
            && (behaviour.nwaits_before_readapt == 0
                || self.nwaitings % behaviour.nwaits_before_readapt != 0);

        let mut dtime = 0.0;
        let mut pipeline_failed = false;
        if !idle_wait
            && matches!(self.config.perf_mode, PerfMode::Decomp | PerfMode::Balanced)
        {
            if let (Some(dest), Some(dctx)) = (sample.dest, self.dctx.as_mut()) {
                let mut scratch = Vec::with_capacity(sample.src.len());
                let start = Instant::now();
                match dctx.decompress(dest, &mut scratch) {
                    Ok(_) => dtime = start.elapsed().as_secs_f64(),
                    Err(err) => {
                        // Uninformative step; keep going.
                        pipeline_failed = true;
                        if self.trace {
                            eprintln!("decompression probe failed: {}", err);
                        }
                    }
                }
            }
        }

        let score = score::score(
            self.config.perf_mode,
            ctime,
            cbytes,
            dtime,
            self.config.bandwidth,
        );
        if !(score > 0.0) {
            debug_assert!(score > 0.0, "score must be positive");
            self.state = State::Stop;
            return;
        }
        let cratio = sample.src.len() as f64 / cbytes as f64;

        self.aux_cparams.score = score;
        self.aux_cparams.cratio = cratio;
        self.aux_cparams.ctime = ctime;
        self.aux_cparams.dtime = dtime;
        self.current_scores[self.rep_index] = score;
        self.current_cratios[self.rep_index] = cratio;
        self.rep_index += 1;
        if self.rep_index < REPEATS_PER_CPARAMS {
            return;
        }

        let score = mean(&self.current_scores);
        let cratio = mean(&self.current_cratios);
        let cratio_coef = cratio / self.best.cratio;
        let score_coef = self.best.score / score;

        // In the threads state the improvement comes from ctime or dtime.
        let mut improved = if self.state == State::Threads {
            if self.threads_for_comp {
                ctime < self.best.ctime
            } else {
                dtime < self.best.dtime
            }
        } else {
            score::has_improved(self.config.band(), score_coef, cratio_coef)
        };
        if pipeline_failed {
            improved = false;
        }

        let mut winner = Winner::NotImproved;
        // A chunk made of special values can never improve the scoring.
        if cbytes <= MAX_OVERHEAD + cctx.typesize as usize {
            improved = false;
            winner = Winner::Special;
        }
        if improved {
            winner = Winner::Improved;
        }

        if !self.is_repeating && self.trace {
            trace::step_line(
                &self.aux_cparams,
                score,
                cratio,
                self.state.name(self.threads_for_comp),
                self.readapt_from.as_str(),
                winner,
            );
        }

        if improved {
            self.best = self.aux_cparams;
        }
        self.rep_index = 0;
        if !self.from_inference {
            self.update_aux(improved);
        }
    }

    // ---- accessors, mostly for drivers and tests ----

    pub fn state(&self) -> State {
        self.state
    }

    pub fn readapt_from(&self) -> Readapt {
        self.readapt_from
    }

    pub fn best(&self) -> &Cparams {
        &self.best
    }

    pub fn config(&self) -> &BtuneConfig {
        &self.config
    }

    pub fn codecs(&self) -> &[Codec] {
        &self.codecs
    }

    pub fn is_threads_for_comp(&self) -> bool {
        self.threads_for_comp
    }

    pub fn max_threads(&self) -> u16 {
        self.max_threads
    }

    pub fn nhards(&self) -> u32 {
        self.nhards
    }

    pub fn nsofts(&self) -> u32 {
        self.nsofts
    }

    pub fn steps_count(&self) -> u64 {
        self.steps_count
    }

    pub fn decompressor(&mut self) -> Option<&mut (dyn Decompressor + 'static)> {
        self.dctx.as_deref_mut()
    }

    // ---- internals ----

    fn extract_cparams(&self, cctx: &CompressContext) -> Cparams {
        let mut cp = Cparams::default();
        cp.codec = cctx.codec;
        cp.filter = cctx.filter();
        cp.clevel = cctx.clevel;
        cp.splitmode = cctx.splitmode;
        cp.blocksize = cctx.blocksize;
        cp.shufflesize = cctx.typesize;
        cp.nthreads_comp = cctx.nthreads;
        cp.nthreads_decomp = self
            .dctx
            .as_ref()
            .map(|d| d.nthreads())
            .unwrap_or(self.nthreads_decomp);
        cp
    }

    fn init_clevels(&mut self, min: u8, max: u8, start: u8) {
        debug_assert!(max <= 9 && min <= start && start <= max);

        self.best.clevel = start;
        self.aux_cparams.clevel = start;
        self.clevels = (min..=max).collect();
        self.clevel_index = (start - min) as i32;
    }

    fn has_ended_clevel(&self) -> bool {
        let max_clevel = self.clevels.len() as i32;
        if self.best.increasing_clevel {
            self.clevel_index + self.step_size >= max_clevel
        } else {
            self.clevel_index - self.step_size < 0
        }
    }

    fn has_ended_threads(&self) -> bool {
        let best = &self.best;
        let nthreads = if self.threads_for_comp {
            best.nthreads_comp
        } else {
            best.nthreads_decomp
        };
        (best.increasing_nthreads && nthreads == self.max_threads)
            || (!best.increasing_nthreads && nthreads == MIN_THREADS)
    }

    fn init_soft(&mut self) {
        if self.has_ended_clevel() {
            self.best.increasing_clevel = !self.best.increasing_clevel;
        }
        self.state = State::Clevel;
        self.step_size = SOFT_STEP_SIZE;
        self.readapt_from = Readapt::Soft;
    }

    fn init_hard(&mut self) {
        self.state = State::CodecFilter;
        self.step_size = HARD_STEP_SIZE;
        self.readapt_from = Readapt::Hard;
        self.threads_for_comp = self.config.perf_mode != PerfMode::Decomp;
        if has_ended_shuffle(&self.best) {
            self.best.increasing_shuffle = !self.best.increasing_shuffle;
        }
    }

    /// Entry point when the configured number of hards is zero.
    fn init_without_hards(&mut self) {
        let behaviour = self.config.behaviour;
        let minimum_hards: u32 = if self.config.cparams_hint { 0 } else { 1 };
        let mode = behaviour.repeat_mode;

        if mode == RepeatMode::RepeatAll && behaviour.nhards_before_stop > minimum_hards {
            self.init_hard();
        } else if (mode == RepeatMode::RepeatAll || mode == RepeatMode::RepeatSoft)
            && behaviour.nsofts_before_hard > 0
        {
            self.init_soft();
        } else if minimum_hards == 0 && behaviour.nsofts_before_hard > 0 {
            self.init_soft();
        } else {
            self.state = State::Stop;
            self.readapt_from = Readapt::Wait;
        }
        self.is_repeating = true;
    }

    /// Write the candidate onto the context, applying the filter-slot
    /// convention and the per-band clevel caps.
    fn set_cparams(&mut self, cctx: &mut CompressContext, srcsize: usize) {
        let band = self.config.band();
        let cparams = &mut self.aux_cparams;

        // Do not set a too large clevel for ZSTD/ZLIB in the balanced band.
        if band == Band::Balanced
            && matches!(cparams.codec, Codec::Zstd | Codec::Zlib)
            && cparams.clevel >= 3
        {
            cparams.clevel = 3;
        }
        // Nor anywhere in the high-ratio band.
        if band == Band::High && cparams.clevel >= 6 {
            cparams.clevel = 6;
        }

        cctx.codec = cparams.codec;
        cctx.filters = [Filter::NoFilter; MAX_FILTERS];
        cctx.filters_meta = [0; MAX_FILTERS];
        cctx.filters[MAX_FILTERS - 1] = cparams.filter;
        // Bytedelta requires a shuffle before it.
        if cparams.filter == Filter::ByteDelta {
            cctx.filters[MAX_FILTERS - 2] = Filter::Shuffle;
            cctx.filters_meta[MAX_FILTERS - 1] = cctx.typesize.min(255) as u8;
        }

        cctx.splitmode = cparams.splitmode;
        cctx.clevel = cparams.clevel;
        if cparams.blocksize != 0 {
            cctx.blocksize = cparams.blocksize;
        }
        cctx.typesize = cparams.shufflesize;
        cctx.new_nthreads = cparams.nthreads_comp;
        match self.dctx.as_mut() {
            Some(dctx) => dctx.set_new_nthreads(cparams.nthreads_decomp),
            None => self.nthreads_decomp = cparams.nthreads_decomp,
        }

        // blocksize cannot be greater than sourcesize
        if cctx.blocksize > srcsize {
            cctx.blocksize = srcsize;
        }
    }

    /// State transition handling after one scored trial.
    fn update_aux(&mut self, improved: bool) {
        let mut first_time = self.aux_index == 1;
        match self.state {
            State::CodecFilter => {
                let mut aux_index_max = (self.codecs.len() * self.filters.len()) as u32;
                if self.splitmode == SplitMode::Auto {
                    aux_index_max *= 2;
                }

                // Reached the last combination of codec and filter.
                if self.aux_index >= aux_index_max {
                    self.aux_index = 0;

                    if ENABLE_SHUFFLE_SIZE {
                        let s = self.best.shufflesize;
                        let is_power_2 = s & s.wrapping_sub(1) == 0;
                        self.state = if self.best.filter != Filter::NoFilter && is_power_2 {
                            State::ShuffleSize
                        } else {
                            State::Threads
                        };
                    } else {
                        self.state = if ENABLE_THREADS {
                            State::Threads
                        } else {
                            State::Clevel
                        };
                    }

                    // Thread tuning needs more than one thread to play with.
                    if self.state == State::Threads && self.max_threads == 1 {
                        self.state = State::Clevel;
                        if self.has_ended_clevel() {
                            self.best.increasing_clevel = !self.best.increasing_clevel;
                        }
                    }
                    if ENABLE_SHUFFLE_SIZE && self.state == State::ShuffleSize {
                        if has_ended_shuffle(&self.best) {
                            self.best.increasing_shuffle = !self.best.increasing_shuffle;
                        }
                    } else if self.state == State::Threads && self.has_ended_threads() {
                        self.best.increasing_nthreads = !self.best.increasing_nthreads;
                    }
                }
            }

            State::ShuffleSize => {
                if !improved && first_time {
                    self.best.increasing_shuffle = !self.best.increasing_shuffle;
                }
                // Cannot change the parameter further, or it is not improving.
                if has_ended_shuffle(&self.best) || (!improved && !first_time) {
                    self.aux_index = 0;
                    self.state = if ENABLE_THREADS {
                        State::Threads
                    } else {
                        State::Clevel
                    };
                    if self.state == State::Threads && self.max_threads == 1 {
                        self.state = State::Clevel;
                        if self.has_ended_clevel() {
                            self.best.increasing_clevel = !self.best.increasing_clevel;
                        }
                    } else if self.has_ended_threads() {
                        self.best.increasing_nthreads = !self.best.increasing_nthreads;
                    }
                }
            }

            State::Threads => {
                first_time = self.aux_index % MAX_STATE_THREADS == 1;
                if !improved && first_time {
                    self.best.increasing_nthreads = !self.best.increasing_nthreads;
                }
                if self.has_ended_threads() || (!improved && !first_time) {
                    if self.config.perf_mode == PerfMode::Balanced {
                        // Hand over from compression to decompression threads.
                        if self.aux_index < MAX_STATE_THREADS {
                            self.threads_for_comp = !self.threads_for_comp;
                            self.aux_index = MAX_STATE_THREADS;
                            if self.has_ended_threads() {
                                self.best.increasing_nthreads = !self.best.increasing_nthreads;
                            }
                        }
                    } else {
                        self.aux_index = MAX_STATE_THREADS + 1;
                    }
                    if self.aux_index > MAX_STATE_THREADS {
                        self.aux_index = 0;
                        self.state = State::Clevel;
                        if self.has_ended_clevel() {
                            self.best.increasing_clevel = !self.best.increasing_clevel;
                        }
                    }
                }
            }

            State::Clevel => {
                if !improved && first_time {
                    self.best.increasing_clevel = !self.best.increasing_clevel;
                }
                if self.has_ended_clevel() || (!improved && !first_time) {
                    self.aux_index = 0;
                    self.state = if ENABLE_MEMCPY {
                        State::Memcpy
                    } else {
                        State::Waiting
                    };
                }
            }

            State::Memcpy => {
                self.aux_index = 0;
                self.state = State::Waiting;
            }

            State::Waiting | State::Stop => {}
        }
        if self.state == State::Waiting {
            self.process_waiting_state();
        }
    }

    /// Decide what comes after a completed readapt or wait.
    fn process_waiting_state(&mut self) {
        let behaviour = self.config.behaviour;
        let minimum_hards: u32 = if self.config.cparams_hint { 0 } else { 1 };

        match self.readapt_from {
            Readapt::Hard => {
                self.nhards += 1;
                // Last hard (initial readapts completed).
                if behaviour.nhards_before_stop == minimum_hards
                    || self.nhards % behaviour.nhards_before_stop == 0
                {
                    self.is_repeating = true;
                    if behaviour.nsofts_before_hard > 0
                        && behaviour.repeat_mode != RepeatMode::Stop
                    {
                        self.init_soft();
                    } else if behaviour.repeat_mode != RepeatMode::RepeatAll {
                        self.state = State::Stop;
                    } else if behaviour.nwaits_before_readapt > 0 {
                        self.state = State::Waiting;
                        self.readapt_from = Readapt::Wait;
                    } else if behaviour.nhards_before_stop > minimum_hards {
                        self.init_hard();
                    } else {
                        self.state = State::Stop;
                    }
                // Not the last hard: prefer softs, then waits, then hards.
                } else if behaviour.nsofts_before_hard > 0 {
                    self.init_soft();
                } else if behaviour.nwaits_before_readapt > 0 {
                    self.state = State::Waiting;
                    self.readapt_from = Readapt::Wait;
                } else {
                    self.init_hard();
                }
            }

            Readapt::Soft => {
                self.nsofts += 1;
                self.readapt_from = Readapt::Wait;
                if behaviour.nwaits_before_readapt == 0 {
                    let last_soft = behaviour.nsofts_before_hard == 0
                        || self.nsofts % behaviour.nsofts_before_hard == 0;
                    if last_soft
                        && !(self.is_repeating && behaviour.repeat_mode != RepeatMode::RepeatAll)
                        && behaviour.nhards_before_stop > minimum_hards
                    {
                        self.init_hard();
                    // Hint given, no hards configured, last soft, stop mode.
                    } else if minimum_hards == 0
                        && behaviour.nhards_before_stop == 0
                        && behaviour.nsofts_before_hard > 0
                        && self.nsofts % behaviour.nsofts_before_hard == 0
                        && behaviour.repeat_mode == RepeatMode::Stop
                    {
                        self.is_repeating = true;
                        self.state = State::Stop;
                    } else {
                        self.init_soft();
                    }
                }
            }

            Readapt::Wait => {
                let last_wait = behaviour.nwaits_before_readapt == 0
                    || (self.nwaitings != 0
                        && self.nwaitings % behaviour.nwaits_before_readapt == 0);
                if last_wait {
                    let last_soft = behaviour.nsofts_before_hard == 0
                        || (self.nsofts != 0
                            && self.nsofts % behaviour.nsofts_before_hard == 0);
                    if last_soft
                        && !(self.is_repeating && behaviour.repeat_mode != RepeatMode::RepeatAll)
                        && behaviour.nhards_before_stop > minimum_hards
                    {
                        self.init_hard();
                    } else if behaviour.nsofts_before_hard > 0
                        && !(self.is_repeating && behaviour.repeat_mode == RepeatMode::Stop)
                    {
                        self.init_soft();
                    }
                }
            }
        }

        // Force the soft step size on the last hard.
        if self.readapt_from == Readapt::Hard
            && behaviour.nhards_before_stop > 0
            && self.nhards == behaviour.nhards_before_stop - 1
        {
            self.step_size = SOFT_STEP_SIZE;
        }
    }
}

fn has_ended_shuffle(best: &Cparams) -> bool {
    let min_shuffle = if best.filter == Filter::Shuffle {
        MIN_SHUFFLE
    } else {
        MIN_BITSHUFFLE
    };
    (best.increasing_shuffle && best.shufflesize == MAX_SHUFFLE)
        || (!best.increasing_shuffle && best.shufflesize == min_shuffle)
}

/// Codecs admissible for the configured trade-off band, filtered down to
/// what the registry actually has.
fn init_codecs(config: &BtuneConfig, registry: &CodecRegistry) -> Vec<Codec> {
    let mut codecs: Vec<Codec> = Vec::new();
    let add = |codecs: &mut Vec<Codec>, codec: Codec| {
        if registry.is_available(codec) && !codecs.contains(&codec) {
            codecs.push(codec);
        }
    };

    match config.band() {
        // In the high-ratio band only try ZSTD and ZLIB.
        Band::High => {
            add(&mut codecs, Codec::Zstd);
            add(&mut codecs, Codec::Zlib);
        }
        band => {
            // In all other modes, LZ4 is mandatory.
            add(&mut codecs, Codec::Lz4);
            if band == Band::Balanced {
                add(&mut codecs, Codec::BloscLz);
            }
            if config.perf_mode == PerfMode::Decomp {
                add(&mut codecs, Codec::Lz4hc);
            }
        }
    }

    if codecs.is_empty() {
        eprintln!("WARNING: no admissible codec is registered, falling back to lz4");
        codecs.push(Codec::Lz4);
    }
    codecs
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
