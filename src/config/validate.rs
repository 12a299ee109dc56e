// src/config/validate.rs

use std::collections::HashSet;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, ExperimentConfig, ParamDomains, RawConfigFile};
use crate::errors::{ProbebenchError, Result};
use crate::template::CommandTemplate;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ProbebenchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.sampler, raw.experiment))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_experiments(cfg)?;
    validate_global_config(cfg)?;
    validate_samplers(cfg)?;
    for (name, exp) in cfg.experiment.iter() {
        validate_experiment(name, exp)?;
    }
    Ok(())
}

fn config_error(msg: String) -> ProbebenchError {
    ProbebenchError::ConfigError(msg)
}

fn ensure_has_experiments(cfg: &RawConfigFile) -> Result<()> {
    if cfg.experiment.is_empty() {
        return Err(config_error(
            "config must contain at least one [experiment.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if let Some(name) = &cfg.config.name {
        if name.trim().is_empty() {
            return Err(config_error("[config].name must not be empty".to_string()));
        }
    }

    if cfg.config.payload_tag.is_empty() {
        return Err(config_error(
            "[config].payload_tag must not be empty".to_string(),
        ));
    }

    for (key, value) in [
        ("terminate_grace", &cfg.config.terminate_grace),
        ("stop_timeout", &cfg.config.stop_timeout),
    ] {
        if let Some(s) = value {
            parse_duration(s)
                .map_err(|e| config_error(format!("[config].{key}: {e}")))?;
        }
    }

    Ok(())
}

fn validate_samplers(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for sampler in cfg.sampler.iter() {
        if sampler.name.trim().is_empty() {
            return Err(config_error("sampler name must not be empty".to_string()));
        }
        if sampler.cmd.trim().is_empty() {
            return Err(config_error(format!(
                "sampler '{}' has an empty cmd",
                sampler.name
            )));
        }
        if !seen.insert(sampler.name.as_str()) {
            return Err(config_error(format!(
                "duplicate sampler name '{}'",
                sampler.name
            )));
        }
    }
    Ok(())
}

fn validate_experiment(name: &str, exp: &ExperimentConfig) -> Result<()> {
    if name.trim().is_empty() {
        return Err(config_error("experiment name must not be empty".to_string()));
    }
    if exp.step.is_empty() {
        return Err(config_error(format!(
            "experiment '{}' must contain at least one [[experiment.{}.step]]",
            name, name
        )));
    }

    ensure_domains_non_empty(name, "params", &exp.params)?;
    ensure_domains_non_empty(name, "cmd_params", &exp.cmd_params)?;

    for (idx, step) in exp.step.iter().enumerate() {
        if step.cmds.is_empty() {
            return Err(config_error(format!(
                "experiment '{}' step {} has no cmds",
                name, idx
            )));
        }
        if let Some(t) = &step.timeout {
            parse_duration(t).map_err(|e| {
                config_error(format!("experiment '{}' step {} timeout: {}", name, idx, e))
            })?;
        }
        ensure_domains_non_empty(name, "step params", &step.params)?;

        for cmd in step.cmds.iter() {
            if cmd.trim().is_empty() {
                return Err(config_error(format!(
                    "experiment '{}' step {} has an empty command",
                    name, idx
                )));
            }
            let template = CommandTemplate::parse(cmd)
                .map_err(|e| config_error(format!("experiment '{}': {}", name, e)))?;
            for field in template.fields() {
                let declared = exp.params.contains_key(field)
                    || exp.cmd_params.contains_key(field)
                    || step.params.contains_key(field);
                if !declared {
                    return Err(config_error(format!(
                        "experiment '{}' step {} uses undeclared parameter '{}'",
                        name, idx, field
                    )));
                }
            }
        }
    }
    Ok(())
}

fn ensure_domains_non_empty(exp: &str, section: &str, domains: &ParamDomains) -> Result<()> {
    for (param, values) in domains.iter() {
        if values.is_empty() {
            return Err(config_error(format!(
                "experiment '{}' {} '{}' has no values",
                exp, section, param
            )));
        }
    }
    Ok(())
}
