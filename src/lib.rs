// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod trigger;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::config::parse_duration;
use crate::engine::{Lifetime, RunSummary, Scheduler, TaskExit};
use crate::exec::ShellBody;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - one scheduled task per `[task.<name>]`, each running its command
///   through a [`ShellBody`]
/// - Ctrl-C and `run_for` handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let run_for = match args.run_for.as_deref() {
        Some(raw) => Some(parse_duration(raw).map_err(|e| anyhow!("--run-for: {e}"))?),
        None => cfg.run_for(),
    };

    if args.dry_run {
        print_dry_run(&cfg, run_for);
        return Ok(());
    }

    let mut scheduler = Scheduler::new();
    for task in cfg.into_tasks() {
        scheduler.add_task(task.name, task.trigger, ShellBody::new(task.cmd))?;
    }

    spawn_shutdown_sources(scheduler.lifetime().clone(), run_for);

    let summary = scheduler.run().await?;
    report_summary(&summary)
}

/// Ctrl-C and the optional `run_for` timer both end the lifetime.
fn spawn_shutdown_sources(lifetime: Lifetime, run_for: Option<Duration>) {
    {
        let lifetime = lifetime.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received");
            lifetime.shutdown();
        });
    }

    if let Some(limit) = run_for {
        info!(?limit, "run time limit set");
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            info!(?limit, "run time limit reached");
            lifetime.shutdown();
        });
    }
}

fn report_summary(summary: &RunSummary) -> Result<()> {
    let mut failed = Vec::new();
    for report in summary.iter() {
        match &report.exit {
            TaskExit::Failed(reason) => {
                warn!(
                    task = %report.name,
                    fired = report.fired,
                    failures = report.failures,
                    reason = %reason,
                    "task stopped on error"
                );
                failed.push(report.name.as_str());
            }
            exit => info!(
                task = %report.name,
                fired = report.fired,
                failures = report.failures,
                ?exit,
                "task finished"
            ),
        }
    }

    if !failed.is_empty() {
        bail!("tasks stopped on error: {}", failed.join(", "));
    }
    Ok(())
}

/// Simple dry-run output: print tasks, commands and trigger plans.
fn print_dry_run(cfg: &ConfigFile, run_for: Option<Duration>) {
    println!("cadence dry-run");
    match run_for {
        Some(limit) => println!("  run_for = {limit:?}"),
        None => println!("  run_for = until Ctrl+C"),
    }
    println!();

    let tasks: Vec<_> = cfg.tasks().collect();
    println!("tasks ({}):", tasks.len());
    for task in tasks {
        println!("  - {}", task.name);
        println!("      cmd: {}", task.cmd);
        println!("      trigger: {}", task.trigger);
        let upstream = task.trigger.upstream_tasks();
        if !upstream.is_empty() {
            println!("      after: {upstream:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
