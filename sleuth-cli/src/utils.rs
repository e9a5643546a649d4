//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use sleuth_core::{
    DuplicateEngine, DuplicateKind, EmbeddingProviderConfig, EmbeddingProviderFactory,
    EngineConfig, Finding, Registration, Severity,
};
use tracing::debug;

/// Data directory used when neither `--data-dir` nor `SLEUTH_DATA_DIR` is set.
pub const DEFAULT_DATA_DIR: &str = ".sleuth";

/// Engine configuration from the environment, with `--data-dir` taking
/// precedence over `SLEUTH_DATA_DIR`.
pub fn engine_config(data_dir: Option<PathBuf>) -> Result<EngineConfig> {
    let config = EngineConfig::from_env().context("Invalid SLEUTH_* configuration")?;
    Ok(match (data_dir, &config.data_dir) {
        (Some(dir), _) => config.with_data_dir(dir),
        (None, Some(_)) => config,
        (None, None) => config.with_data_dir(DEFAULT_DATA_DIR),
    })
}

/// Open the persisted duplicate engine.
pub fn open_engine(data_dir: Option<PathBuf>) -> Result<Arc<DuplicateEngine>> {
    let config = engine_config(data_dir)?;
    let dir = config
        .data_dir
        .as_deref()
        .map(|d| d.display().to_string())
        .unwrap_or_default();

    let embedder = EmbeddingProviderFactory::create(EmbeddingProviderConfig::Auto)
        .context("Failed to create embedding provider")?;
    debug!(provider = %embedder.provider_id(), data_dir = %dir, "Opening engine");

    let engine = DuplicateEngine::open(config, embedder)
        .with_context(|| format!("Failed to open data directory: {dir}"))?;
    Ok(Arc::new(engine))
}

/// Read an input file, with the error message the exit-code mapping expects.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Final path component, if it is valid UTF-8.
pub fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

pub fn format_score(score: f32) -> String {
    format!("{score:.1}/100")
}

pub fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::None => severity.as_str().green(),
        Severity::Low => severity.as_str().yellow(),
        Severity::Medium => severity.as_str().bright_red(),
        Severity::High => severity.as_str().red().bold(),
    }
}

pub fn duplicate_label(kind: DuplicateKind) -> ColoredString {
    match kind {
        DuplicateKind::Unique => kind.as_str().green(),
        DuplicateKind::NearDuplicate => kind.as_str().yellow(),
        DuplicateKind::ExactDuplicate => kind.as_str().red().bold(),
    }
}

pub fn registration_label(registration: &Registration) -> ColoredString {
    match registration {
        Registration::Committed => "committed".green(),
        Registration::Skipped => "skipped".dimmed(),
        Registration::Failed { reason } => format!("FAILED ({reason})").red(),
    }
}

pub fn print_finding(finding: &Finding) {
    println!(
        "     {} {} {}",
        "•".dimmed(),
        finding.kind.as_str().bold(),
        format!("({:.0}%)", finding.confidence * 100.0).dimmed()
    );
    println!("       {}", finding.description);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_flag_overrides_default() {
        let config = engine_config(Some(PathBuf::from("/tmp/sleuth-test"))).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/sleuth-test")));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name(Path::new("/uploads/receipt.pdf")),
            Some("receipt.pdf".to_string())
        );
        assert_eq!(file_name(Path::new("/")), None);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.0), "0.0/100");
        assert_eq!(format_score(62.5), "62.5/100");
    }

    #[test]
    fn test_read_input_error_mentions_path() {
        let err = read_input(Path::new("/nonexistent/statement.pdf")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read file: /nonexistent/statement.pdf"));
    }
}
