//! Query command implementation.
//!
//! A read-only duplicate lookup: the file is compared against everything
//! registered so far but is not registered itself.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use sleuth_core::forensics::{TextExtractor, Utf8TextExtractor};
use sleuth_core::{DuplicateVerdict, ImageHasher, PerceptualHasher};
use tracing::{debug, info};

use crate::utils;

#[derive(Serialize)]
struct QueryOutput<'a> {
    file: String,
    perceptual_hash: Option<String>,
    #[serde(flatten)]
    verdict: &'a DuplicateVerdict,
}

/// Execute the query command.
pub async fn execute(
    file: PathBuf,
    text: Option<String>,
    data_dir: Option<PathBuf>,
    max_distance: Option<u32>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let bytes = utils::read_input(&file)?;
    info!(path = %file.display(), bytes = bytes.len(), "Read file");

    let engine = utils::open_engine(data_dir)?;

    let text = text.unwrap_or_else(|| Utf8TextExtractor::new().extract(&bytes));
    let hasher = PerceptualHasher::new(engine.config().hash_algorithm);
    let image_hash = if hasher.supports(&bytes) {
        Some(hasher.hash_bytes(&bytes).context("Failed to hash image")?)
    } else {
        None
    };
    debug!(chars = text.len(), has_image = image_hash.is_some(), "Querying");

    let max_distance = max_distance.unwrap_or(engine.config().near_hash_distance);
    let verdict = engine
        .check_with_distance(&text, image_hash.as_ref(), max_distance)
        .await
        .context("Duplicate lookup failed")?;

    if json {
        return utils::print_json(&QueryOutput {
            file: file.display().to_string(),
            perceptual_hash: image_hash.map(|h| h.to_hex()),
            verdict: &verdict,
        });
    }
    if quiet {
        return Ok(());
    }

    println!();
    println!(
        "   {} {}",
        "Result:".dimmed(),
        utils::duplicate_label(verdict.kind)
    );
    if let Some(matched) = &verdict.matched_submission {
        println!("   {} {}", "Matches:".dimmed(), matched.bold());
        println!(
            "   {} {:.0}%",
            "Confidence:".dimmed(),
            verdict.confidence * 100.0
        );
    }
    if let Some(score) = verdict.text_score {
        println!("   {} {:.3}", "Text similarity:".dimmed(), score);
    }
    if let Some(distance) = verdict.image_distance {
        println!("   {} {} bits", "Image distance:".dimmed(), distance);
    }
    if let Some(hash) = &image_hash {
        println!("   {} {}", "Image hash:".dimmed(), hash);
    }
    println!(
        "   {} {}",
        "Note:".dimmed(),
        "not registered (read-only lookup)".dimmed()
    );
    Ok(())
}
