// crates/btune-cli/src/pipeline.rs
//
// Reference blocked pipeline: enough container format to exercise the tuner
// end to end. One frame per chunk, 16-byte header, optional per-lane split,
// constant-chunk special encoding. Thread counts are carried as parameters
// but the demo compresses on one thread.

use std::io::Write;
use std::sync::Arc;

use btune_core::error::{BtuneError, Result};
use btune_core::pipeline::context::{Codec, CompressContext, Decompressor, Filter, SplitMode};
use btune_core::pipeline::registry::{ChunkCodec, CodecRegistry};

pub const FRAME_MAGIC: u8 = 0xB7;
pub const HEADER_LEN: usize = 16;

const FLAG_CONSTANT: u8 = 0x01;
const FLAG_SPLIT: u8 = 0x02;

pub struct Pipeline {
    registry: CodecRegistry,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Registry preloaded with the codecs this build carries. blosclz and
    /// lz4hc are left unregistered on purpose; the tuner must cope.
    pub fn new() -> Self {
        let mut registry = CodecRegistry::new();
        registry.register(Codec::Lz4.id(), Codec::Lz4.name(), Arc::new(Lz4Codec));
        registry.register(Codec::Zstd.id(), Codec::Zstd.name(), Arc::new(ZstdCodec));
        registry.register(Codec::Zlib.id(), Codec::Zlib.name(), Arc::new(ZlibCodec));
        Pipeline { registry }
    }

    pub fn registry_mut(&mut self) -> &mut CodecRegistry {
        &mut self.registry
    }

    pub fn decompressor(&self, nthreads: u16) -> FrameDecompressor {
        FrameDecompressor {
            registry: self.registry.clone(),
            nthreads,
            new_nthreads: nthreads,
        }
    }

    /// Compress one chunk with whatever the context currently says.
    pub fn compress(&self, cctx: &CompressContext, src: &[u8]) -> Result<Vec<u8>> {
        let typesize = cctx.typesize.max(1);

        let mut header = [0u8; HEADER_LEN];
        header[0] = FRAME_MAGIC;
        header[2] = cctx.codec.id();
        header[3] = cctx.clevel;
        header[4] = cctx.filters[5].id();
        header[5] = cctx.filters[4].id();
        header[6..8].copy_from_slice(&(typesize as u16).to_le_bytes());
        header[8..12].copy_from_slice(&(src.len() as u32).to_le_bytes());

        // Chunks of one repeated byte collapse to a single value.
        if !src.is_empty() && src.iter().all(|&b| b == src[0]) {
            let mut frame = Vec::with_capacity(HEADER_LEN + 1);
            header[1] = FLAG_CONSTANT;
            let csize = (HEADER_LEN + 1) as u32;
            header[12..16].copy_from_slice(&csize.to_le_bytes());
            frame.extend_from_slice(&header);
            frame.push(src[0]);
            return Ok(frame);
        }

        let entry = self
            .registry
            .get(cctx.codec.id())
            .ok_or(BtuneError::CodecUnavailable(cctx.codec.id()))?;

        let filtered = apply_filters(&cctx.filters, typesize as usize, src);
        let split = split_resolved(cctx.splitmode, cctx.codec, typesize as usize, src.len());

        let mut frame = vec![0u8; HEADER_LEN];
        if split {
            header[1] = FLAG_SPLIT;
            for lane in lane_ranges(typesize as usize, filtered.len()) {
                let mut cdata = Vec::new();
                let clen = entry
                    .codec
                    .encode(&filtered[lane], &mut cdata, cctx.clevel, typesize)?;
                frame.extend_from_slice(&(clen as u32).to_le_bytes());
                frame.extend_from_slice(&cdata[..clen]);
            }
        } else {
            let mut cdata = Vec::new();
            let clen = entry
                .codec
                .encode(&filtered, &mut cdata, cctx.clevel, typesize)?;
            frame.extend_from_slice(&(clen as u32).to_le_bytes());
            frame.extend_from_slice(&cdata[..clen]);
        }

        header[12..16].copy_from_slice(&(frame.len() as u32).to_le_bytes());
        frame[..HEADER_LEN].copy_from_slice(&header);
        Ok(frame)
    }
}

/// Decompression half of the pipeline; doubles as the tuner's dtime seam.
pub struct FrameDecompressor {
    registry: CodecRegistry,
    nthreads: u16,
    new_nthreads: u16,
}

impl Decompressor for FrameDecompressor {
    fn nthreads(&self) -> u16 {
        self.nthreads
    }

    fn set_new_nthreads(&mut self, nthreads: u16) {
        self.new_nthreads = nthreads;
    }

    fn decompress(&mut self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize> {
        // Tuned thread counts take effect at chunk boundaries.
        self.nthreads = self.new_nthreads;

        if src.len() < HEADER_LEN || src[0] != FRAME_MAGIC {
            return Err(BtuneError::Pipeline("bad frame header".into()));
        }
        let flags = src[1];
        let codec_id = src[2];
        let filters = [
            Filter::from_id(src[5]).unwrap_or(Filter::NoFilter),
            Filter::from_id(src[4]).unwrap_or(Filter::NoFilter),
        ];
        let typesize = u16::from_le_bytes(src[6..8].try_into().unwrap()) as usize;
        let srcsize = u32::from_le_bytes(src[8..12].try_into().unwrap()) as usize;

        if flags & FLAG_CONSTANT != 0 {
            if src.len() < HEADER_LEN + 1 {
                return Err(BtuneError::Pipeline("truncated constant frame".into()));
            }
            dst.extend_from_slice(&vec![src[HEADER_LEN]; srcsize]);
            return Ok(srcsize);
        }

        let entry = self
            .registry
            .get(codec_id)
            .ok_or(BtuneError::CodecUnavailable(codec_id))?;

        let mut filtered = Vec::with_capacity(srcsize);
        let mut at = HEADER_LEN;
        let nstreams = if flags & FLAG_SPLIT != 0 {
            lane_ranges(typesize.max(1), srcsize).len()
        } else {
            1
        };
        for _ in 0..nstreams {
            if src.len() < at + 4 {
                return Err(BtuneError::Pipeline("truncated frame".into()));
            }
            let clen = u32::from_le_bytes(src[at..at + 4].try_into().unwrap()) as usize;
            at += 4;
            if src.len() < at + clen {
                return Err(BtuneError::Pipeline("truncated stream".into()));
            }
            entry.codec.decode(&src[at..at + clen], &mut filtered)?;
            at += clen;
        }

        if filtered.len() != srcsize {
            return Err(BtuneError::Pipeline(format!(
                "frame decodes to {} bytes, expected {}",
                filtered.len(),
                srcsize
            )));
        }

        let out = reverse_filters(&filters, typesize.max(1), &filtered);
        let n = out.len();
        dst.extend_from_slice(&out);
        Ok(n)
    }
}

/// AUTO splits for the fast byte-oriented codecs, the way blocked formats
/// usually do.
fn split_resolved(mode: SplitMode, codec: Codec, typesize: usize, srcsize: usize) -> bool {
    if typesize <= 1 || srcsize < typesize {
        return false;
    }
    match mode {
        SplitMode::Always => true,
        SplitMode::Never => false,
        SplitMode::Auto => matches!(codec, Codec::Lz4 | Codec::BloscLz),
    }
}

/// Byte ranges of the per-typesize lanes plus the sub-element tail.
fn lane_ranges(typesize: usize, len: usize) -> Vec<std::ops::Range<usize>> {
    let nelem = len / typesize;
    if nelem == 0 {
        return vec![0..len];
    }
    let mut out: Vec<std::ops::Range<usize>> = (0..typesize)
        .map(|lane| lane * nelem..(lane + 1) * nelem)
        .collect();
    if typesize * nelem < len {
        out.push(typesize * nelem..len);
    }
    out
}

/// Apply the context's filter slots in order (only the last two are used).
fn apply_filters(slots: &[Filter; 6], typesize: usize, src: &[u8]) -> Vec<u8> {
    let mut data = src.to_vec();
    for filter in &slots[4..6] {
        data = match filter {
            Filter::NoFilter => data,
            Filter::Shuffle => shuffle(typesize, &data),
            Filter::BitShuffle => bitshuffle(typesize, &data),
            Filter::ByteDelta => bytedelta(typesize, &data),
        };
    }
    data
}

fn reverse_filters(applied: &[Filter; 2], typesize: usize, data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for filter in applied.iter().rev() {
        out = match filter {
            Filter::NoFilter => out,
            Filter::Shuffle => unshuffle(typesize, &out),
            Filter::BitShuffle => unbitshuffle(typesize, &out),
            Filter::ByteDelta => unbytedelta(typesize, &out),
        };
    }
    out
}

/// Byte transpose: lane j collects byte j of every element. The sub-element
/// tail is carried through untouched.
fn shuffle(typesize: usize, src: &[u8]) -> Vec<u8> {
    let nelem = src.len() / typesize;
    if typesize <= 1 || nelem == 0 {
        return src.to_vec();
    }
    let mut out = vec![0u8; src.len()];
    for i in 0..nelem {
        for j in 0..typesize {
            out[j * nelem + i] = src[i * typesize + j];
        }
    }
    out[typesize * nelem..].copy_from_slice(&src[typesize * nelem..]);
    out
}

fn unshuffle(typesize: usize, src: &[u8]) -> Vec<u8> {
    let nelem = src.len() / typesize;
    if typesize <= 1 || nelem == 0 {
        return src.to_vec();
    }
    let mut out = vec![0u8; src.len()];
    for i in 0..nelem {
        for j in 0..typesize {
            out[i * typesize + j] = src[j * nelem + i];
        }
    }
    out[typesize * nelem..].copy_from_slice(&src[typesize * nelem..]);
    out
}

/// Bit transpose over the largest element prefix with a multiple of eight
/// elements; the rest is carried raw so sizes stay equal.
fn bitshuffle(typesize: usize, src: &[u8]) -> Vec<u8> {
    let nelem = (src.len() / typesize) & !7;
    if typesize == 0 || nelem == 0 {
        return src.to_vec();
    }
    let body = nelem * typesize;
    let mut out = vec![0u8; src.len()];
    let nplanes = typesize * 8;
    let plane_len = nelem / 8;
    for plane in 0..nplanes {
        let (byte_in_elem, bit) = (plane / 8, plane % 8);
        for i in 0..nelem {
            let b = (src[i * typesize + byte_in_elem] >> bit) & 1;
            out[plane * plane_len + i / 8] |= b << (i % 8);
        }
    }
    out[body..].copy_from_slice(&src[body..]);
    out
}

fn unbitshuffle(typesize: usize, src: &[u8]) -> Vec<u8> {
    let nelem = (src.len() / typesize) & !7;
    if typesize == 0 || nelem == 0 {
        return src.to_vec();
    }
    let body = nelem * typesize;
    let mut out = vec![0u8; src.len()];
    let nplanes = typesize * 8;
    let plane_len = nelem / 8;
    for plane in 0..nplanes {
        let (byte_in_elem, bit) = (plane / 8, plane % 8);
        for i in 0..nelem {
            let b = (src[plane * plane_len + i / 8] >> (i % 8)) & 1;
            out[i * typesize + byte_in_elem] |= b << bit;
        }
    }
    out[body..].copy_from_slice(&src[body..]);
    out
}

/// Per-lane byte delta; pairs with a preceding shuffle for bytedelta proper.
fn bytedelta(typesize: usize, src: &[u8]) -> Vec<u8> {
    let mut out = src.to_vec();
    for lane in lane_ranges(typesize, src.len()) {
        let mut prev = 0u8;
        for i in lane {
            let cur = src[i];
            out[i] = cur.wrapping_sub(prev);
            prev = cur;
        }
    }
    out
}

fn unbytedelta(typesize: usize, src: &[u8]) -> Vec<u8> {
    let mut out = src.to_vec();
    for lane in lane_ranges(typesize, src.len()) {
        let mut prev = 0u8;
        for i in lane {
            prev = prev.wrapping_add(src[i]);
            out[i] = prev;
        }
    }
    out
}

// ---- codecs ----

struct Lz4Codec;

impl ChunkCodec for Lz4Codec {
    fn encode(&self, src: &[u8], dst: &mut Vec<u8>, _clevel: u8, _typesize: u32) -> Result<usize> {
        let out = lz4_flex::compress_prepend_size(src);
        dst.extend_from_slice(&out);
        Ok(out.len())
    }

    fn decode(&self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize> {
        let out = lz4_flex::decompress_size_prepended(src)
            .map_err(|e| BtuneError::Pipeline(e.to_string()))?;
        let n = out.len();
        dst.extend_from_slice(&out);
        Ok(n)
    }
}

struct ZstdCodec;

impl ChunkCodec for ZstdCodec {
    fn encode(&self, src: &[u8], dst: &mut Vec<u8>, clevel: u8, _typesize: u32) -> Result<usize> {
        let out = zstd::encode_all(std::io::Cursor::new(src), clevel.max(1) as i32)
            .map_err(|e| BtuneError::Pipeline(e.to_string()))?;
        dst.extend_from_slice(&out);
        Ok(out.len())
    }

    fn decode(&self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize> {
        let out = zstd::decode_all(std::io::Cursor::new(src))
            .map_err(|e| BtuneError::Pipeline(e.to_string()))?;
        let n = out.len();
        dst.extend_from_slice(&out);
        Ok(n)
    }
}

struct ZlibCodec;

impl ChunkCodec for ZlibCodec {
    fn encode(&self, src: &[u8], dst: &mut Vec<u8>, clevel: u8, _typesize: u32) -> Result<usize> {
        let mut enc = flate2::write::ZlibEncoder::new(
            Vec::new(),
            flate2::Compression::new(clevel.min(9) as u32),
        );
        enc.write_all(src)?;
        let out = enc.finish()?;
        dst.extend_from_slice(&out);
        Ok(out.len())
    }

    fn decode(&self, src: &[u8], dst: &mut Vec<u8>) -> Result<usize> {
        let mut dec = flate2::write::ZlibDecoder::new(Vec::new());
        dec.write_all(src)?;
        let out = dec.finish()?;
        let n = out.len();
        dst.extend_from_slice(&out);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Vec<u8> {
        (0..n).map(|i| ((i * 31 + i / 5) % 251) as u8).collect()
    }

    #[test]
    fn shuffle_roundtrip_with_tail() {
        let data = sample(1003);
        for typesize in [1usize, 2, 4, 8] {
            assert_eq!(unshuffle(typesize, &shuffle(typesize, &data)), data);
        }
    }

    #[test]
    fn bitshuffle_roundtrip() {
        let data = sample(4096);
        for typesize in [1usize, 2, 4] {
            assert_eq!(unbitshuffle(typesize, &bitshuffle(typesize, &data)), data);
        }
        // Non-multiple-of-eight element counts carry a raw tail.
        let ragged = sample(4 * 13);
        assert_eq!(unbitshuffle(4, &bitshuffle(4, &ragged)), ragged);
    }

    #[test]
    fn bytedelta_roundtrip() {
        let data = sample(777);
        assert_eq!(unbytedelta(4, &bytedelta(4, &data)), data);
    }

    #[test]
    fn frame_roundtrip_all_codecs_and_filters() {
        let pipeline = Pipeline::new();
        let data = sample(64 * 1024);
        for codec in [Codec::Lz4, Codec::Zstd, Codec::Zlib] {
            for filter in [
                Filter::NoFilter,
                Filter::Shuffle,
                Filter::BitShuffle,
                Filter::ByteDelta,
            ] {
                for splitmode in [SplitMode::Always, SplitMode::Never, SplitMode::Auto] {
                    let mut cctx = CompressContext::new(4, 1);
                    cctx.codec = codec;
                    cctx.clevel = 5;
                    cctx.splitmode = splitmode;
                    cctx.filters[5] = filter;
                    if filter == Filter::ByteDelta {
                        cctx.filters[4] = Filter::Shuffle;
                    }
                    let frame = pipeline.compress(&cctx, &data).unwrap();
                    let mut out = Vec::new();
                    pipeline.decompressor(1).decompress(&frame, &mut out).unwrap();
                    assert_eq!(out, data, "{:?}/{:?}/{:?}", codec, filter, splitmode);
                }
            }
        }
    }

    #[test]
    fn constant_chunks_use_the_special_encoding() {
        let pipeline = Pipeline::new();
        let cctx = CompressContext::new(4, 1);
        let data = vec![0u8; 1024 * 1024];
        let frame = pipeline.compress(&cctx, &data).unwrap();
        assert_eq!(frame.len(), HEADER_LEN + 1);

        let mut out = Vec::new();
        pipeline.decompressor(1).decompress(&frame, &mut out).unwrap();
        assert_eq!(out, data);
    }
}
