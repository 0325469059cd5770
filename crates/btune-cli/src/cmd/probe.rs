// crates/btune-cli/src/cmd/probe.rs

use btune_core::probe::chunk_cratio;
use clap::Args;

use crate::io::chunks;

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Input file to estimate.
    #[arg(long)]
    pub r#in: String,

    /// Chunk size in bytes.
    #[arg(long, default_value_t = 256 * 1024)]
    pub chunk_size: usize,

    /// Print the estimate for every chunk, not just the aggregate.
    #[arg(long, default_value_t = false)]
    pub per_chunk: bool,
}

pub fn run(args: ProbeArgs) -> anyhow::Result<()> {
    let bytes = chunks::read_file(&args.r#in)?;
    let chunk_list = chunks::split_chunks(&bytes, args.chunk_size, 1);

    let mut estimated_total: f64 = 0.0;
    for (i, chunk) in chunk_list.iter().enumerate() {
        let cratio = chunk_cratio(chunk) as f64;
        estimated_total += chunk.len() as f64 / cratio.max(1.0);
        if args.per_chunk {
            eprintln!("chunk {:>5}: {:>10} bytes cratio={:.3}", i, chunk.len(), cratio);
        }
    }

    eprintln!("--- probe ---");
    eprintln!("file            = {}", args.r#in);
    eprintln!("bytes           = {}", bytes.len());
    eprintln!("chunks          = {}", chunk_list.len());
    eprintln!(
        "estimated_cratio = {:.3}",
        bytes.len() as f64 / estimated_total
    );

    Ok(())
}
