// crates/btune-cli/src/io/mod.rs

pub mod chunks;
