// crates/btune-core/src/tuner/state.rs

/// Which parameter axis the machine is probing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    CodecFilter,
    ShuffleSize,
    Threads,
    Clevel,
    Memcpy,
    Waiting,
    Stop,
}

impl State {
    /// Trace name. The threads state reports which axis it is on.
    pub fn name(&self, threads_for_comp: bool) -> &'static str {
        match self {
            State::CodecFilter => "CODEC_FILTER",
            State::ShuffleSize => "SHUFFLE_SIZE",
            State::Threads => {
                if threads_for_comp {
                    "THREADS_COMP"
                } else {
                    "THREADS_DECOMP"
                }
            }
            State::Clevel => "CLEVEL",
            State::Memcpy => "MEMCPY",
            State::Waiting => "WAITING",
            State::Stop => "STOP",
        }
    }
}

/// Which kind of readapt cycle the machine most recently came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readapt {
    Hard,
    Soft,
    Wait,
}

impl Readapt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Readapt::Hard => "HARD",
            Readapt::Soft => "SOFT",
            Readapt::Wait => "WAIT",
        }
    }
}
