// crates/btune-cli/src/io/chunks.rs

/// Cut a file's bytes into fixed-size chunks; the last one keeps the
/// remainder. Chunk sizes are rounded down to a whole number of elements so
/// the typesize lanes stay aligned.
pub fn split_chunks(bytes: &[u8], chunk_size: usize, typesize: usize) -> Vec<&[u8]> {
    let ts = typesize.max(1);
    let size = (chunk_size.max(ts) / ts) * ts;
    let mut out = Vec::with_capacity(bytes.len() / size + 1);
    let mut at = 0;
    while at < bytes.len() {
        let end = (at + size).min(bytes.len());
        out.push(&bytes[at..end]);
        at = end;
    }
    out
}

pub fn read_file(path: &str) -> anyhow::Result<Vec<u8>> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        anyhow::bail!("input file is empty: {}", path);
    }
    Ok(bytes)
}
