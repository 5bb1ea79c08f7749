//! Run outputs: result files and the terminal summary.

use crate::steps::RunState;
use anyhow::{Context, Result};
use colored::Colorize;
use kgdelta_model::{DatasetId, Finding, QualityMeasurement};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct DatasetReport<'a> {
    dataset: &'a DatasetId,
    findings: &'a [Finding],
}

/// Writes `measurements.json` plus one `findings/<n>.json` per dataset, in
/// plan declaration order.
pub fn write_outputs(state: &RunState, output: &Path) -> Result<()> {
    fs::create_dir_all(output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;

    let measurements = state.measurements.read();
    let all: Vec<&QualityMeasurement> = measurements.iter().collect();
    let path = output.join("measurements.json");
    fs::write(&path, serde_json::to_string_pretty(&all)?)
        .with_context(|| format!("failed to write {}", path.display()))?;

    let findings_dir = output.join("findings");
    fs::create_dir_all(&findings_dir)?;
    let findings = state.findings.read();
    for (index, dataset) in state.datasets.iter().enumerate() {
        let report = DatasetReport {
            dataset,
            findings: findings.of_dataset(dataset),
        };
        let path = findings_dir.join(format!("{index}.json"));
        fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

pub fn print_summary(state: &RunState, output: &Path) {
    let measurements = state.measurements.read();
    let findings = state.findings.read();

    println!(
        "{} {} measurements, {} findings",
        "done:".green().bold(),
        measurements.len(),
        findings.len()
    );
    for dataset in &state.datasets {
        let per_dataset = findings.of_dataset(dataset);
        let deviations = count(per_dataset, |f| matches!(f, Finding::Deviation { .. }));
        let omissions = count(per_dataset, |f| {
            matches!(
                f,
                Finding::ValueOmission { .. } | Finding::ResourceOmission { .. }
            )
        });
        let duplicates = count(per_dataset, |f| matches!(f, Finding::Duplicate { .. }));
        let issues = count(per_dataset, |f| matches!(f, Finding::Issue { .. }));
        println!(
            "  {} {} deviations, {} omissions, {} duplicates, {} issues",
            dataset.to_string().bold(),
            colored_count(deviations),
            colored_count(omissions),
            colored_count(duplicates),
            colored_count(issues)
        );
    }
    println!(
        "{} {}",
        "wrote".green().bold(),
        output.display().to_string().bold()
    );
}

fn count(findings: &[Finding], predicate: impl Fn(&Finding) -> bool) -> usize {
    findings.iter().filter(|f| predicate(f)).count()
}

fn colored_count(value: usize) -> colored::ColoredString {
    if value == 0 {
        value.to_string().green()
    } else {
        value.to_string().yellow()
    }
}
