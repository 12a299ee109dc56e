// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod experiment;
pub mod logging;
pub mod monitor;
pub mod parser;
pub mod sweep;
pub mod template;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::interrupt_channel;
use crate::errors::ProbebenchError;
use crate::experiment::{
    Experiment, ExperimentRegistry, ExperimentRunner, create_experiment_dir, expand_commands,
};
use crate::logging::LOG_FILE_NAME;
use crate::sweep::{Sweep, format_params};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and experiment selection
/// - the experiment directory and logging into it
/// - the experiment runner (samplers + jobs)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let registry = ExperimentRegistry::from_config(&cfg)?;
    let selected = registry.select(&args.experiments)?;

    if args.dry_run {
        logging::init_logging(args.log_level, None)?;
        print_dry_run(&cfg, &selected)?;
        return Ok(());
    }

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| cfg.config.output_dir.clone());
    let exp_dir = create_experiment_dir(&output_dir, cfg.name())?;
    logging::init_logging(args.log_level, Some(&exp_dir.join(LOG_FILE_NAME)))?;
    info!(dir = %exp_dir.display(), "probebench started.");

    let (interrupt_handle, interrupt) = interrupt_channel();
    let runner = ExperimentRunner::from_config(&cfg, &exp_dir)?.with_interrupt(interrupt);
    debug!(?runner, "runner ready");

    // Ctrl-C -> stop the running job and the samplers, keep finished jobs.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        warn!("interrupt received; stopping");
        interrupt_handle.fire();
    });

    match runner.run_all(&selected).await {
        Ok(written) => info!(count = written.len(), "all experiments finished"),
        Err(ProbebenchError::Interrupted) => {
            warn!("interrupted; remaining experiments skipped");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Dry-run output: samplers, experiments, parameter sets and the commands
/// each job would run.
fn print_dry_run(cfg: &ConfigFile, selected: &[&Experiment]) -> Result<()> {
    println!("probebench dry-run: {}", cfg.name());
    println!("  config.output_dir = {}", cfg.config.output_dir.display());
    println!("  config.payload_tag = {}", cfg.config.payload_tag);
    println!();

    println!("samplers ({}):", cfg.sampler.len());
    for sampler in cfg.sampler.iter() {
        println!("  - {} ({:?})", sampler.name, sampler.mode);
        println!("      cmd: {}", sampler.cmd);
    }
    println!();

    println!("experiments ({}):", selected.len());
    for exp in selected {
        println!("  - {}", exp.name());
        let Some(exp_cfg) = cfg.experiment.get(exp.name()) else {
            continue;
        };
        for func_params in exp.params().iter() {
            println!("      params {}", format_params(&func_params));
            for (idx, step) in exp_cfg.step.iter().enumerate() {
                let extra = Sweep::from_map(&step.params);
                let jobs = expand_commands(&step.cmds, exp.cmd_params(), &func_params, &extra)?;
                match &step.timeout {
                    Some(t) => println!("        step {idx} (timeout {t}):"),
                    None => println!("        step {idx}:"),
                }
                for (_, cmds) in jobs {
                    println!("          {}", cmds.join(" & "));
                }
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
