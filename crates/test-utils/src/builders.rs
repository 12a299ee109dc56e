#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use probebench::config::{
    ConfigFile, ConfigSection, ExperimentConfig, RawConfigFile, SamplerConfig, StepConfig,
};
use probebench::errors::Result;
use probebench::monitor::SamplingMode;
use probebench::sweep::ParamValue;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                sampler: Vec::new(),
                experiment: BTreeMap::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.config.name = Some(name.to_string());
        self
    }

    pub fn output_dir(mut self, dir: &Path) -> Self {
        self.config.config.output_dir = dir.to_path_buf();
        self
    }

    pub fn terminate_grace(mut self, grace: &str) -> Self {
        self.config.config.terminate_grace = Some(grace.to_string());
        self
    }

    pub fn sampler(mut self, name: &str, cmd: &str, mode: SamplingMode) -> Self {
        self.config.sampler.push(SamplerConfig {
            name: name.to_string(),
            cmd: cmd.to_string(),
            mode,
        });
        self
    }

    pub fn experiment(mut self, name: &str, exp: ExperimentConfig) -> Self {
        self.config.experiment.insert(name.to_string(), exp);
        self
    }

    /// The raw config, for tests that exercise validation errors.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ExperimentConfig`.
pub struct ExperimentConfigBuilder {
    exp: ExperimentConfig,
}

impl ExperimentConfigBuilder {
    pub fn new() -> Self {
        Self {
            exp: ExperimentConfig::default(),
        }
    }

    pub fn param<V: Into<ParamValue>>(mut self, name: &str, values: Vec<V>) -> Self {
        self.exp
            .params
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn cmd_param<V: Into<ParamValue>>(mut self, name: &str, values: Vec<V>) -> Self {
        self.exp
            .cmd_params
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn step(mut self, cmds: &[&str]) -> Self {
        self.exp.step.push(StepConfig {
            cmds: cmds.iter().map(|c| c.to_string()).collect(),
            timeout: None,
            params: BTreeMap::new(),
        });
        self
    }

    pub fn step_with_timeout(mut self, cmds: &[&str], timeout: &str) -> Self {
        self.exp.step.push(StepConfig {
            cmds: cmds.iter().map(|c| c.to_string()).collect(),
            timeout: Some(timeout.to_string()),
            params: BTreeMap::new(),
        });
        self
    }

    pub fn build(self) -> ExperimentConfig {
        self.exp
    }
}

impl Default for ExperimentConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
