// crates/btune-core/src/config.rs

use std::path::PathBuf;

pub const KB: usize = 1024;

/// Bandwidth is carried in KB/s everywhere the score touches it.
pub const MBPS: u32 = 1024;
pub const GBPS: u32 = 1024 * 1024;
pub const TBPS: u32 = 1024 * 1024 * 1024;

/// Which times enter the score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerfMode {
    Comp,
    Decomp,
    Balanced,
    /// Resolved at init from `BTUNE_PERF_MODE`, defaulting to `Comp`.
    Auto,
}

impl PerfMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerfMode::Comp => "COMP",
            PerfMode::Decomp => "DECOMP",
            PerfMode::Balanced => "BALANCED",
            PerfMode::Auto => "AUTO",
        }
    }
}

/// What to do once the configured hard readapts are exhausted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatMode {
    RepeatAll,
    RepeatSoft,
    Stop,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::RepeatAll => "REPEAT_ALL",
            RepeatMode::RepeatSoft => "REPEAT_SOFT",
            RepeatMode::Stop => "STOP",
        }
    }
}

/// Readapt cadence: how many waits between readapts, softs per hard,
/// hards before the machine stops, and the repeat policy after that.
#[derive(Clone, Copy, Debug)]
pub struct Behaviour {
    pub nwaits_before_readapt: u32,
    pub nsofts_before_hard: u32,
    pub nhards_before_stop: u32,
    pub repeat_mode: RepeatMode,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            nwaits_before_readapt: 0,
            nsofts_before_hard: 5,
            nhards_before_stop: 11,
            repeat_mode: RepeatMode::Stop,
        }
    }
}

/// Speed/ratio trade-off band. Edges follow the intended semantics:
/// the LOW band is closed at 1/3, BALANCED is (1/3, 2/3], HIGH is (2/3, 1].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    Low,
    Balanced,
    High,
}

impl Band {
    pub fn from_tradeoff(tradeoff: f64) -> Self {
        if tradeoff <= 1.0 / 3.0 {
            Band::Low
        } else if tradeoff <= 2.0 / 3.0 {
            Band::Balanced
        } else {
            Band::High
        }
    }
}

#[derive(Clone, Debug)]
pub struct BtuneConfig {
    pub perf_mode: PerfMode,
    /// 0.0 = pure speed, 1.0 = pure ratio.
    pub tradeoff: f64,
    /// Reference I/O bandwidth in KB/s; converts bytes to time in the score.
    pub bandwidth: u32,
    pub behaviour: Behaviour,
    /// Seed `best` from the parameters already present on the context.
    pub cparams_hint: bool,
    /// -1 = every chunk, 0 = never, k > 0 = first k chunks.
    pub use_inference: i32,
    pub models_dir: Option<PathBuf>,
}

impl Default for BtuneConfig {
    fn default() -> Self {
        Self {
            perf_mode: PerfMode::Auto,
            tradeoff: 0.5,
            bandwidth: GBPS,
            behaviour: Behaviour::default(),
            cparams_hint: false,
            use_inference: -1,
            models_dir: None,
        }
    }
}

impl BtuneConfig {
    pub fn band(&self) -> Band {
        Band::from_tradeoff(self.tradeoff)
    }

    /// Apply environment overrides and clamp out-of-range values.
    /// Bad values are replaced, never fatal.
    pub fn resolved_from_env(mut self) -> Self {
        if self.perf_mode == PerfMode::Auto {
            self.perf_mode = match std::env::var("BTUNE_PERF_MODE").ok().as_deref() {
                Some("COMP") => PerfMode::Comp,
                Some("DECOMP") => PerfMode::Decomp,
                Some("BALANCED") => PerfMode::Balanced,
                Some(other) => {
                    eprintln!(
                        "WARNING: unsupported {} performance mode, default to COMP",
                        other
                    );
                    PerfMode::Comp
                }
                None => PerfMode::Comp,
            };
        }

        if let Ok(v) = std::env::var("BTUNE_TRADEOFF") {
            match v.parse::<f64>() {
                Ok(t) => self.tradeoff = t,
                Err(_) => eprintln!("WARNING: could not parse BTUNE_TRADEOFF {:?}", v),
            }
        }
        if !(0.0..=1.0).contains(&self.tradeoff) {
            let default = BtuneConfig::default().tradeoff;
            eprintln!(
                "WARNING: unsupported {} compression tradeoff, it must be between 0. and 1., \
                 default to {}",
                self.tradeoff, default
            );
            self.tradeoff = default;
        }

        if let Ok(v) = std::env::var("BTUNE_USE_INFERENCE") {
            match v.parse::<i32>() {
                Ok(n) => self.use_inference = n,
                Err(_) => eprintln!("WARNING: could not parse BTUNE_USE_INFERENCE {:?}", v),
            }
        }

        if let Ok(dir) = std::env::var("BTUNE_MODELS_DIR") {
            if !dir.is_empty() {
                self.models_dir = Some(PathBuf::from(dir));
            }
        }

        self
    }
}

/// Human rendering for the trace banner. The score itself stays in KB/s.
pub fn bandwidth_to_str(bandwidth: u32) -> String {
    if bandwidth < MBPS {
        format!("{} KB/s", bandwidth)
    } else if bandwidth < GBPS {
        format!("{} MB/s", bandwidth / MBPS)
    } else if bandwidth < TBPS {
        format!("{} GB/s", bandwidth / GBPS)
    } else {
        format!("{} TB/s", bandwidth / TBPS)
    }
}
