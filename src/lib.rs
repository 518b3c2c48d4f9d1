// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod parse;
pub mod rule;
pub mod steps;
pub mod types;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{OptionSet, parse_assignment};
use crate::graph::State;

pub use crate::engine::{DiCy, DiCyBuilder, KillSwitch};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - instance options from `-o name=value`
/// - the orchestrator for the given document
/// - Ctrl-C handling through the kill switch
///
/// Returns whether the build succeeded.
pub async fn run(args: CliArgs) -> Result<bool> {
    let mut dicy = DiCy::new(&args.file)
        .with_context(|| format!("cannot set up a build for {}", args.file))?;
    dicy.set_instance_options(instance_options(dicy.state(), &args.options)?);

    // Ctrl-C → cancel the running build.
    {
        let kill = dicy.kill_switch();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            kill.kill("interrupted").await;
        });
    }

    let commands = args.effective_commands();
    let success = dicy.run(&commands).await?;
    for target in dicy.targets() {
        info!(file = %target, "output");
    }
    Ok(success)
}

/// Parse `name=value` assignments against the schema. Unknown names and
/// values of the wrong type are warned about and skipped.
fn instance_options(state: &State, assignments: &[String]) -> Result<OptionSet> {
    let mut options = OptionSet::new();
    for assignment in assignments {
        let (name, value) = parse_assignment(assignment)?;
        if !options.set(state.schema(), &name, value) {
            warn!(option = %name, "option ignored");
        }
    }
    Ok(options)
}
