// crates/btune-core/src/tuner/mod.rs

pub mod cparams;
pub mod machine;
pub mod score;
pub mod state;
pub mod trace;

pub use cparams::Cparams;
pub use machine::Btune;
pub use score::Winner;
pub use state::{Readapt, State};
