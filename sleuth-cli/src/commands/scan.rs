//! Scan command implementation.

use std::path::PathBuf;

use anyhow::{bail, Result};
use colored::Colorize;
use sleuth_core::{
    Registration, ScanPipeline, ScanReport, ScoreWeights, Severity, SignalAggregator,
    SignalStatus, Submission,
};
use tracing::{info, warn};

use crate::utils;

/// Execute the scan command.
pub async fn execute(
    file: PathBuf,
    text: Option<String>,
    data_dir: Option<PathBuf>,
    json: bool,
    fail_on: Option<Severity>,
    quiet: bool,
) -> Result<()> {
    let bytes = utils::read_input(&file)?;
    info!(path = %file.display(), bytes = bytes.len(), "Read file");

    let engine = utils::open_engine(data_dir)?;
    let pipeline = ScanPipeline::builder(engine)
        .with_aggregator(SignalAggregator::new(ScoreWeights::from_env()))
        .build()?;

    let mut submission = Submission::new(bytes);
    if let Some(name) = utils::file_name(&file) {
        submission = submission.with_file_name(name);
    }
    if let Some(text) = text {
        submission = submission.with_text(text);
    }

    let report = pipeline.scan(submission).await;

    if json {
        utils::print_json(&report)?;
    } else if !quiet {
        print_report(&report);
    }

    if let Registration::Failed { reason } = &report.registration {
        warn!(%reason, "Scan finished but the submission was not stored");
        bail!("Submission was not registered: {reason}");
    }

    if let Some(threshold) = fail_on {
        if report.verdict.severity >= threshold {
            bail!(
                "Fraud severity {} meets --fail-on threshold {}",
                report.verdict.severity,
                threshold
            );
        }
    }

    Ok(())
}

fn print_report(report: &ScanReport) {
    let verdict = &report.verdict;
    let (banner, paint): (&str, fn(&str) -> colored::ColoredString) = match verdict.severity {
        Severity::None => ("║            NO FRAUD SIGNALS            ║", |s| s.green()),
        Severity::Low => ("║                LOW RISK                ║", |s| s.yellow()),
        Severity::Medium => ("║              MEDIUM RISK               ║", |s| s.bright_red()),
        Severity::High => ("║               HIGH RISK                ║", |s| s.red()),
    };

    println!();
    println!("{}", paint("╔════════════════════════════════════════╗"));
    println!("{}", paint(banner).bold());
    println!("{}", paint("╚════════════════════════════════════════╝"));
    println!();
    println!("   {} {}", "Submission:".dimmed(), verdict.submission_id);
    if let Some(name) = &report.file_name {
        println!("   {} {}", "File:".dimmed(), name);
    }
    println!(
        "   {} {} ({})",
        "Fraud score:".dimmed(),
        utils::format_score(verdict.fraud_score),
        utils::severity_label(verdict.severity)
    );

    match &report.duplicate {
        Some(duplicate) => {
            let matched = duplicate
                .matched_submission
                .as_deref()
                .map(|id| format!(" of {id}"))
                .unwrap_or_default();
            println!(
                "   {} {}{}",
                "Duplicate:".dimmed(),
                utils::duplicate_label(duplicate.kind),
                matched
            );
        }
        None => println!("   {} {}", "Duplicate:".dimmed(), "not checked".red()),
    }

    if let Some(hash) = &report.perceptual_hash {
        println!("   {} {}", "Image hash:".dimmed(), hash);
    }
    println!("   {} {} chars", "Text:".dimmed(), report.text_chars);
    println!(
        "   {} {}",
        "Registration:".dimmed(),
        utils::registration_label(&report.registration)
    );

    if !verdict.findings.is_empty() {
        println!();
        println!("   {}", "Findings:".bold());
        for finding in &verdict.findings {
            utils::print_finding(finding);
        }
    }
    if verdict.dropped_findings > 0 {
        println!(
            "   {} {}",
            "Dropped:".dimmed(),
            format!("{} invalid findings", verdict.dropped_findings).yellow()
        );
    }

    let failed: Vec<_> = report.failed_signals().collect();
    if !failed.is_empty() {
        println!();
        println!("   {}", "Signals that could not run:".red().bold());
        for signal in failed {
            if let SignalStatus::Failed { reason } = &signal.status {
                println!("     {} {}: {}", "✗".red(), signal.name, reason);
            }
        }
    }
}
