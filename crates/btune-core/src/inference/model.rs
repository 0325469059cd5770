// crates/btune-core/src/inference/model.rs

use crate::error::{BtuneError, Result};

const MAGIC: &[u8; 4] = b"BTM1";

/// Linear classifier over the chunk feature vector.
///
/// Binary layout (little-endian):
/// MAGIC[4]
/// nfeatures:u16 ncategories:u16
/// mean:  [f32; nfeatures]
/// std:   [f32; nfeatures]
/// weights: [f32; ncategories * nfeatures]   (row per category)
/// bias:  [f32; ncategories]
/// crc32:u32          (over everything before crc32)
/// blake3_16:[16]     (over everything before blake3)
#[derive(Clone, Debug)]
pub struct Model {
    pub nfeatures: usize,
    pub ncategories: usize,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl Model {
    /// Argmax category for a raw (unnormalised) feature vector.
    pub fn predict(&self, features: &[f32]) -> Result<usize> {
        if features.len() != self.nfeatures {
            return Err(BtuneError::ModelFormat(format!(
                "feature width mismatch: got {}, model wants {}",
                features.len(),
                self.nfeatures
            )));
        }

        let mut best_cat = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for cat in 0..self.ncategories {
            let row = &self.weights[cat * self.nfeatures..(cat + 1) * self.nfeatures];
            let mut score = self.bias[cat];
            for (i, w) in row.iter().enumerate() {
                let sigma = if self.std[i] != 0.0 { self.std[i] } else { 1.0 };
                let x = (features[i] - self.mean[i]) / sigma;
                score += w * x;
            }
            if score > best_score {
                best_score = score;
                best_cat = cat;
            }
        }
        Ok(best_cat)
    }
}

pub fn encode(m: &Model) -> Vec<u8> {
    let mut b = Vec::with_capacity(
        4 + 4 + 4 * (2 * m.nfeatures + m.ncategories * m.nfeatures + m.ncategories) + 20,
    );
    b.extend_from_slice(MAGIC);
    b.extend_from_slice(&(m.nfeatures as u16).to_le_bytes());
    b.extend_from_slice(&(m.ncategories as u16).to_le_bytes());
    for v in m.mean.iter().chain(&m.std).chain(&m.weights).chain(&m.bias) {
        b.extend_from_slice(&v.to_le_bytes());
    }
    append_integrity(&mut b);
    b
}

pub fn decode(bytes: &[u8]) -> Result<Model> {
    let body = verify_integrity(bytes)?;

    let mut i = 0usize;
    if body.len() < 8 || &body[0..4] != MAGIC {
        return Err(BtuneError::ModelFormat("bad magic".into()));
    }
    i += 4;
    let nfeatures = read_u16(body, &mut i)? as usize;
    let ncategories = read_u16(body, &mut i)? as usize;
    if nfeatures == 0 || ncategories == 0 {
        return Err(BtuneError::ModelFormat("empty model".into()));
    }

    let mean = read_f32s(body, &mut i, nfeatures)?;
    let std = read_f32s(body, &mut i, nfeatures)?;
    let weights = read_f32s(body, &mut i, ncategories * nfeatures)?;
    let bias = read_f32s(body, &mut i, ncategories)?;

    if i != body.len() {
        return Err(BtuneError::ModelFormat("trailing bytes".into()));
    }

    Ok(Model {
        nfeatures,
        ncategories,
        mean,
        std,
        weights,
        bias,
    })
}

/// crc32 then a 16-byte blake3 prefix, each over everything before itself.
fn append_integrity(b: &mut Vec<u8>) {
    let mut h = crc32fast::Hasher::new();
    h.update(b);
    b.extend_from_slice(&h.finalize().to_le_bytes());

    let hash = blake3::hash(b);
    b.extend_from_slice(&hash.as_bytes()[0..16]);
}

/// Check both trailers; return the payload without them.
fn verify_integrity(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < 20 {
        return Err(BtuneError::ModelFormat("artifact too small".into()));
    }
    let blake_at = bytes.len() - 16;
    let crc_at = blake_at - 4;

    let hash = blake3::hash(&bytes[..blake_at]);
    if bytes[blake_at..] != hash.as_bytes()[0..16] {
        return Err(BtuneError::ModelFormat("blake3 mismatch".into()));
    }

    let mut h = crc32fast::Hasher::new();
    h.update(&bytes[..crc_at]);
    let expected = u32::from_le_bytes(bytes[crc_at..blake_at].try_into().unwrap());
    if h.finalize() != expected {
        return Err(BtuneError::ModelFormat("crc32 mismatch".into()));
    }

    Ok(&bytes[..crc_at])
}

fn read_u16(bytes: &[u8], i: &mut usize) -> Result<u16> {
    if bytes.len() < *i + 2 {
        return Err(BtuneError::ModelFormat("unexpected eof".into()));
    }
    let v = u16::from_le_bytes(bytes[*i..*i + 2].try_into().unwrap());
    *i += 2;
    Ok(v)
}

fn read_f32s(bytes: &[u8], i: &mut usize, n: usize) -> Result<Vec<f32>> {
    if bytes.len() < *i + 4 * n {
        return Err(BtuneError::ModelFormat("unexpected eof".into()));
    }
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(f32::from_le_bytes(bytes[*i..*i + 4].try_into().unwrap()));
        *i += 4;
    }
    Ok(out)
}
