// crates/btune-cli/src/cmd/analyze.rs

use btune_core::probe::chunk_cratio;
use clap::Args;

use crate::io::chunks;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input file to analyze as raw bytes.
    #[arg(long)]
    pub r#in: String,

    /// Show the top N most frequent bytes.
    #[arg(long, default_value_t = 8)]
    pub top: usize,
}

pub fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let bytes = chunks::read_file(&args.r#in)?;
    let n = bytes.len() as u64;

    let mut hist = [0u64; 256];
    for &b in &bytes {
        hist[b as usize] += 1;
    }
    let distinct = hist.iter().filter(|&&c| c > 0).count();
    let entropy = entropy_bits(&hist, n);

    let mut ranked: Vec<(u8, u64)> = (0u8..=255)
        .map(|b| (b, hist[b as usize]))
        .filter(|&(_, c)| c > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    eprintln!("--- analyze ---");
    eprintln!("file            = {}", args.r#in);
    eprintln!("bytes           = {}", n);
    eprintln!("distinct_bytes  = {}/256", distinct);
    eprintln!("entropy_bits    = {:.6} (max 8.000000)", entropy);
    eprintln!("probe_cratio    = {:.3}", chunk_cratio(&bytes));
    for (rank, (byte, count)) in ranked.iter().take(args.top).enumerate() {
        eprintln!(
            "#{:>2} byte=0x{:02x} count={} ({:.2}%)",
            rank + 1,
            byte,
            count,
            *count as f64 * 100.0 / n as f64
        );
    }

    Ok(())
}

fn entropy_bits(hist: &[u64; 256], total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let mut ent = 0.0;
    for &c in hist.iter() {
        if c == 0 {
            continue;
        }
        let p = c as f64 / total as f64;
        ent -= p * p.log2();
    }
    ent
}
