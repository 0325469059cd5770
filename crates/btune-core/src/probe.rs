// crates/btune-core/src/probe.rs
//
// Lossy LZ-style compressed-size estimator. The encoder never materialises
// compressed bytes; it walks the input once, accounting header and token
// costs, and reports the size a blosclz-family codec would roughly produce.

use std::sync::Arc;

use crate::error::Result;
use crate::pipeline::registry::{ChunkCodec, CodecRegistry};

/// Reserved codec id for the probe.
pub const ENTROPY_PROBE_ID: u8 = 244;
pub const ENTROPY_PROBE_NAME: &str = "entropy_probe";

/// Defaults used by the feature extractor.
pub const PROBE_MINLEN: usize = 3;
pub const PROBE_IPSHIFT: usize = 3;

const MAX_COPY: u8 = 32;
const MAX_DISTANCE: usize = 8191;
const MAX_FARDISTANCE: usize = 65535 + MAX_DISTANCE - 1;

// The hash length (1 << HASH_LOG) can be tuned for performance (12 -> 15).
const HASH_LOG: u32 = 14;
const HASH_LEN: usize = 1 << HASH_LOG;

#[inline]
fn hash(seq: u32) -> usize {
    (seq.wrapping_mul(2654435761) >> (32 - HASH_LOG)) as usize
}

#[inline]
fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

#[inline]
fn read_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

/// Extend a run of the byte `x` starting at `ip`, comparing against the
/// reference stream at `ref_pos`. Returns the first non-matching position.
fn extend_run(buf: &[u8], mut ip: usize, ip_bound: usize, mut ref_pos: usize, x: u8) -> usize {
    let broadcast = u64::from_le_bytes([x; 8]);
    while ip + 8 < ip_bound {
        if read_u64(buf, ref_pos) != broadcast {
            // The differing byte is within this stride.
            while buf[ref_pos] == x {
                ref_pos += 1;
                ip += 1;
            }
            return ip;
        }
        ip += 8;
        ref_pos += 8;
    }
    while ip < ip_bound && buf[ref_pos] == x {
        ref_pos += 1;
        ip += 1;
    }
    ip
}

/// Extend a plain match. Mirrors the run variant, except the scan walks one
/// byte past the first mismatch, which the caller's shift accounts for.
fn extend_match(buf: &[u8], mut ip: usize, ip_bound: usize, mut ref_pos: usize) -> usize {
    while ip + 8 < ip_bound {
        if read_u64(buf, ref_pos) != read_u64(buf, ip) {
            loop {
                let matched = buf[ref_pos] == buf[ip];
                ref_pos += 1;
                ip += 1;
                if !matched {
                    return ip;
                }
            }
        }
        ip += 8;
        ref_pos += 8;
    }
    while ip < ip_bound {
        let matched = buf[ref_pos] == buf[ip];
        ref_pos += 1;
        ip += 1;
        if !matched {
            break;
        }
    }
    ip
}

/// Estimated compression ratio for `input`, scanning at most the hash window.
///
/// Deterministic and O(n); identical input always yields an identical ratio.
pub fn estimate_cratio(input: &[u8], minlen: usize, ipshift: usize) -> f32 {
    // Make a tradeoff between testing too much and too little.
    let limit = input.len().min(HASH_LEN);
    if limit < 16 {
        return 1.0;
    }
    let ip_bound = limit - 1;
    let ip_limit = limit - 12;

    let mut htab = vec![0u32; HASH_LEN];
    let mut ip: usize = 0;
    let mut oc: usize = 5;
    let mut copy: u8 = 4;

    macro_rules! literal {
        ($anchor:expr) => {{
            oc += 1;
            ip = $anchor + 1;
            copy += 1;
            if copy == MAX_COPY {
                copy = 0;
                oc += 1;
            }
        }};
    }

    while ip < ip_limit {
        let anchor = ip;

        let seq = read_u32(input, ip);
        let hval = hash(seq);
        let ref_pos = htab[hval] as usize;
        let mut distance = anchor - ref_pos;
        htab[hval] = anchor as u32;

        if distance == 0 || distance >= MAX_FARDISTANCE {
            literal!(anchor);
            continue;
        }

        // A match needs its first 4 bytes to agree.
        if read_u32(input, ref_pos) != read_u32(input, ip) {
            literal!(anchor);
            continue;
        }

        ip = anchor + 4;
        distance -= 1;

        // Zero biased distance means a run of the previous byte.
        ip = if distance == 0 {
            extend_run(input, ip, ip_bound, ref_pos + 4, input[ip - 1])
        } else {
            extend_match(input, ip, ip_bound, ref_pos + 4)
        };

        ip -= ipshift;
        let len = ip - anchor;
        if len < minlen {
            literal!(anchor);
            continue;
        }

        if copy == 0 {
            // The pending literal-group header byte is not needed after all.
            oc -= 1;
        }
        copy = 0;

        if len >= 7 {
            oc += (len - 7) / 255 + 1;
        }
        oc += if distance < MAX_DISTANCE { 2 } else { 4 };

        // Refresh the hash at the match boundary and assume a literal next.
        let seq = read_u32(input, ip);
        htab[hash(seq)] = ip as u32;
        ip += 2;
        oc += 1;
    }

    ip as f32 / oc as f32
}

/// Ratio with the extractor's default scan parameters.
pub fn chunk_cratio(input: &[u8]) -> f32 {
    estimate_cratio(input, PROBE_MINLEN, PROBE_IPSHIFT)
}

/// The probe as a registrable codec: encoder-only, returns the estimated
/// compressed size without writing output.
pub struct EntropyProbe;

impl ChunkCodec for EntropyProbe {
    fn encode(&self, src: &[u8], _dst: &mut Vec<u8>, _clevel: u8, _typesize: u32) -> Result<usize> {
        let cratio = chunk_cratio(src);
        let mut cbytes = if cratio > 0.0 {
            (src.len() as f32 / cratio) as usize
        } else {
            src.len()
        };
        if cbytes > src.len() {
            cbytes = src.len();
        }
        Ok(cbytes)
    }
}

/// Install the probe into the pipeline's codec table. Safe to call more than
/// once; the registry ignores duplicate ids.
pub fn register_entropy_probe(registry: &mut CodecRegistry) {
    registry.register(ENTROPY_PROBE_ID, ENTROPY_PROBE_NAME, Arc::new(EntropyProbe));
}
