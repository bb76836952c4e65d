//! Populate the SNIST cache and print a summary of every partition
//!
//! Run with: cargo run --example populate_cache -- [ROOT] [MIRROR_DIR]
//!
//! Without MIRROR_DIR the raw files are downloaded over HTTP.
//! Set RUST_LOG=snist=debug to see per-file activity.

use anyhow::{Context, Result};
use snist::fetch::MirrorFetcher;
use snist::{NoiseLevel, Snist, SnistOptions};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| "data".to_string());
    let mirror = args.next();

    let mut options = SnistOptions::new(&root).download(true);
    if let Some(dir) = mirror {
        options = options.fetcher(MirrorFetcher::new(dir));
    }
    let train = options
        .open()
        .with_context(|| format!("failed to populate {root}"))?;
    println!("{train}\n");

    for noise in [NoiseLevel::Clean, NoiseLevel::Level1, NoiseLevel::Level2] {
        let test = Snist::new(&root, false, noise, false)
            .with_context(|| format!("failed to open test split at noise {}", noise.as_u8()))?;
        println!("{test}\n");
    }

    let (amplitudes, velocities) = train.get(0)?;
    println!("First training sample:");
    println!("  amplitudes: {:?}", amplitudes.shape());
    println!("  velocities: {:?}", velocities.shape());
    println!("  entry written: {}", train.header().created_at);

    Ok(())
}
