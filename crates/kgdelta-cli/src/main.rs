//! kgdelta CLI
//!
//! Runs comparison plans: loads a JSON plan (datasets, aspects, inline data
//! tables, step DAG), executes the mapping and comparison steps over the
//! shared correspondence engine, and writes measurements and per-dataset
//! findings as JSON reports.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod plan;
mod report;
mod steps;

use plan::Plan;
use steps::RunState;

#[derive(Parser)]
#[command(name = "kgdelta")]
#[command(author, version, about = "Compare corresponding entities across knowledge datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a comparison plan and write the result files.
    Run {
        /// Plan file (JSON).
        plan: PathBuf,
        /// Output directory for measurements.json and findings/.
        #[arg(short, long, default_value = "kgdelta-out")]
        output: PathBuf,
    },
    /// Parse and validate a plan, then print its structure.
    Inspect {
        /// Plan file (JSON).
        plan: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kgdelta=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { plan, output } => run(&plan, &output),
        Commands::Inspect { plan } => inspect(&plan),
    }
}

fn run(plan_path: &PathBuf, output: &PathBuf) -> Result<()> {
    let plan = Plan::load(plan_path)?;
    let state = RunState::new(plan.build()?);
    let pipeline = steps::build_pipeline(&plan, &state)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")?;
    runtime.block_on(pipeline.run())?;

    report::write_outputs(&state, output)?;
    report::print_summary(&state, output);
    Ok(())
}

fn inspect(plan_path: &PathBuf) -> Result<()> {
    let plan = Plan::load(plan_path)?;
    let inputs = plan.input_indices()?;

    println!("{}", "datasets:".bold());
    for dataset in &plan.datasets {
        println!("  {}", dataset.id);
    }
    println!("{}", "aspects:".bold());
    for aspect in &plan.aspects {
        println!("  {} (key: ?{})", aspect.id, aspect.key_variable);
        for (dataset, pattern) in &aspect.patterns {
            let variables: Vec<&str> = pattern
                .covered_variables
                .iter()
                .map(String::as_str)
                .collect();
            println!("    {} covers [{}]", dataset, variables.join(", "));
        }
    }
    println!("{}", "steps:".bold());
    for (step, inputs) in plan.steps.iter().zip(&inputs) {
        let after = if inputs.is_empty() {
            String::new()
        } else {
            let names: Vec<&str> = inputs
                .iter()
                .map(|&i| plan.steps[i].id.as_str())
                .collect();
            format!(" after [{}]", names.join(", "))
        };
        println!(
            "  {} {}{}",
            step.id.bold(),
            step.kind.name().cyan(),
            after
        );
    }
    println!(
        "{} {} data rows, {} seed correspondences, {} wrong values",
        "inline:".bold(),
        plan.data.len(),
        plan.correspondences.len(),
        plan.wrong_values.len()
    );
    Ok(())
}
