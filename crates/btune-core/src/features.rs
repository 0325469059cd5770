// crates/btune-core/src/features.rs

use std::time::Instant;

use crate::probe::chunk_cratio;

/// Number of entries in [`ChunkFeatures::to_vec`]; model artifacts must
/// declare the same width.
pub const NFEATURES: usize = 6;

/// Fixed-size feature vector handed to the classifier.
#[derive(Clone, Copy, Debug)]
pub struct ChunkFeatures {
    /// Probe-estimated compression ratio of the chunk.
    pub cratio: f32,
    /// Probe throughput over the chunk, bytes/s.
    pub cspeed: f32,
    /// Probe throughput over a synthetic arange chunk of the same size.
    pub arange_speed: f32,
    /// Probe throughput over an all-zeros chunk of the same size.
    pub zeros_speed: f32,
    pub typesize: u32,
    pub chunksize: usize,
}

impl ChunkFeatures {
    pub fn to_vec(&self) -> [f32; NFEATURES] {
        [
            self.cratio,
            self.cspeed,
            self.arange_speed,
            self.zeros_speed,
            self.typesize as f32,
            self.chunksize as f32,
        ]
    }
}

/// Reduces chunks to feature vectors. The two reference speeds are computed
/// once for the first chunk size seen and cached for the rest of the run.
#[derive(Default)]
pub struct FeatureExtractor {
    arange_speed: Option<f32>,
    zeros_speed: Option<f32>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&mut self, chunk: &[u8], typesize: u32) -> ChunkFeatures {
        let start = Instant::now();
        let cratio = chunk_cratio(chunk);
        let cspeed = throughput(chunk.len(), start);

        let arange_speed = *self
            .arange_speed
            .get_or_insert_with(|| probe_speed(&arange_chunk(chunk.len())));
        let zeros_speed = *self
            .zeros_speed
            .get_or_insert_with(|| probe_speed(&vec![0u8; chunk.len()]));

        ChunkFeatures {
            cratio,
            cspeed,
            arange_speed,
            zeros_speed,
            typesize,
            chunksize: chunk.len(),
        }
    }
}

/// A u64 ramp, the canonical well-compressible reference chunk.
fn arange_chunk(size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    let mut i: u64 = 0;
    for w in out.chunks_exact_mut(8) {
        w.copy_from_slice(&i.to_le_bytes());
        i += 1;
    }
    // The sub-word remainder stays zeroed.
    out
}

fn probe_speed(chunk: &[u8]) -> f32 {
    let start = Instant::now();
    let _ = chunk_cratio(chunk);
    throughput(chunk.len(), start)
}

fn throughput(nbytes: usize, start: Instant) -> f32 {
    let secs = start.elapsed().as_secs_f32();
    if secs > 0.0 {
        nbytes as f32 / secs
    } else {
        f32::MAX
    }
}
