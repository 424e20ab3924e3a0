// asyncdpctl
// Command-line driver for the asynchronous dynamic-programming solvers

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use asyncdp_core::{CheckpointLog, RunReport};
use asyncdp_env::SailingOracle;
use asyncdp_solver::{solve, Solution};

mod args;

use args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = match Args::parse_from_argv(std::env::args_os()) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    run(&args).await
}

/// Diagnostics go to stderr so stdout carries only the checkpoint table
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: &Args) -> Result<()> {
    let config = args.run_config().context("Invalid arguments")?;
    config.validate().context("Invalid configuration")?;
    let report = RunReport::begin(&config);
    tracing::info!(run_id = %report.id, seed = ?config.seed, "Run configured");

    let task_config = config.clone();
    let (solution, log) = tokio::task::spawn_blocking(move || -> asyncdp_core::Result<_> {
        let log = CheckpointLog::stdout();
        let solution = solve(
            &task_config,
            |worker_id| SailingOracle::for_worker(&task_config, worker_id),
            &log,
        )?;
        Ok((solution, log))
    })
    .await
    .context("Solver task failed")?
    .context("Solver run failed")?;

    if let Some(checkpoint) = log.checkpoints().last() {
        tracing::info!(
            iterations = solution.iterations,
            average_return = checkpoint.average_return,
            goal_reached = checkpoint.goal_reached,
            "Final checkpoint"
        );
    }

    if args.save_policy() {
        save_policy(&args.output, &solution).await?;
    }
    if let Some(path) = &args.report {
        write_report(path, &report.finish(solution.iterations, &log)).await?;
    }

    Ok(())
}

/// One action index per line, states in order
fn policy_text(policy: &[usize]) -> String {
    policy.iter().fold(String::new(), |mut text, action| {
        let _ = writeln!(text, "{action}");
        text
    })
}

async fn save_policy(path: &Path, solution: &Solution) -> Result<()> {
    tokio::fs::write(path, policy_text(&solution.policy))
        .await
        .with_context(|| format!("Failed to write policy to {}", path.display()))?;
    tracing::info!(path = %path.display(), states = solution.policy.len(), "Saved policy");
    Ok(())
}

async fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = report.to_json()?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "Saved run report");
    Ok(())
}
