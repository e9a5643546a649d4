//! Hash command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::json;
use sleuth_core::{HashAlgorithm, ImageHasher, PerceptualHasher};
use tracing::info;

use crate::utils;

/// Execute the hash command.
pub fn execute(image: PathBuf, algorithm: HashAlgorithm, json: bool, quiet: bool) -> Result<()> {
    let bytes = utils::read_input(&image)?;

    let hasher = PerceptualHasher::new(algorithm);
    if !hasher.supports(&bytes) {
        bail!("Failed to read file: {} is not a supported image", image.display());
    }
    let hash = hasher
        .hash_bytes(&bytes)
        .with_context(|| format!("Failed to hash {}", image.display()))?;
    info!(algorithm = %algorithm, hash = %hash.to_hex(), "Computed perceptual hash");

    if json {
        return utils::print_json(&json!({
            "file": image.display().to_string(),
            "algorithm": algorithm.as_str(),
            "bits": hash.bit_len(),
            "hash": hash.to_hex(),
        }));
    }

    if quiet {
        // Bare hex for shell pipelines
        println!("{}", hash.to_hex());
    } else {
        println!("   {} {}", "Algorithm:".dimmed(), algorithm);
        println!("   {} {}", "Bits:".dimmed(), hash.bit_len());
        println!("   {} {}", "Hash:".dimmed(), hash.to_hex().bold());
    }
    Ok(())
}
