//! Stats command implementation.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use crate::utils;

/// Execute the stats command.
pub fn execute(data_dir: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let engine = utils::open_engine(data_dir)?;
    let stats = engine.stats();

    if json {
        return utils::print_json(&stats);
    }
    if quiet {
        return Ok(());
    }

    let location = engine
        .config()
        .data_dir
        .as_deref()
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| "in-memory".to_string());

    println!("   {} {}", "Data directory:".dimmed(), location);
    println!("   {} {}", "Indexed texts:".dimmed(), stats.indexed_texts.to_string().bold());
    println!("   {} {}", "Indexed images:".dimmed(), stats.indexed_hashes.to_string().bold());
    println!(
        "   {} {} ({} dimensions)",
        "Embeddings:".dimmed(),
        stats.embedding_provider,
        stats.dimension
    );
    println!("   {} {} bits", "Image hashes:".dimmed(), stats.hash_bits);
    println!(
        "   {} {:.2}",
        "Duplicate threshold:".dimmed(),
        stats.duplicate_threshold
    );
    println!(
        "   {} {} bits",
        "Near-image distance:".dimmed(),
        stats.near_hash_distance
    );
    Ok(())
}
