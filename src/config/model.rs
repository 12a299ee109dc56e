// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::duration::parse_duration;
use crate::engine::DEFAULT_STOP_TIMEOUT;
use crate::exec::DEFAULT_TERMINATE_GRACE;
use crate::monitor::SamplingMode;
use crate::parser::DEFAULT_PAYLOAD_TAG;
use crate::sweep::ParamValue;

/// Parameter name -> values, as written in TOML.
pub type ParamDomains = BTreeMap<String, Vec<ParamValue>>;

/// Raw configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// name = "nvme"
/// output_dir = "results"
///
/// [[sampler]]
/// name = "pcie"
/// cmd = "sudo pcm-pcie.x -csv 2>/dev/null"
/// mode = "batched"
///
/// [experiment.read]
/// params = { bs = ["4k", "128k"] }
/// cmd_params = { depth = [1, 32] }
///
/// [[experiment.read.step]]
/// cmds = ["fio --bs={bs} --iodepth={depth}"]
/// timeout = "30s"
/// ```
///
/// All sections are optional at this stage; [`ConfigFile`] is the validated
/// form.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Background samplers from `[[sampler]]`, in declaration order.
    #[serde(default)]
    pub sampler: Vec<SamplerConfig>,

    /// Experiments from `[experiment.<name>]`.
    #[serde(default)]
    pub experiment: BTreeMap<String, ExperimentConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (see
/// `validate.rs`), so every duration and template in it is known to parse.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub sampler: Vec<SamplerConfig>,
    pub experiment: BTreeMap<String, ExperimentConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        sampler: Vec<SamplerConfig>,
        experiment: BTreeMap<String, ExperimentConfig>,
    ) -> Self {
        Self {
            config,
            sampler,
            experiment,
        }
    }

    /// Experiment set name, used for the output directory.
    pub fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or("experiment")
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Name of the experiment set. Defaults to the config file's stem.
    #[serde(default)]
    pub name: Option<String>,

    /// Directory under which `exp_<name>_<timestamp>/` is created.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Tag of the `TAG:[<base64 json>]` markers extracted from command output.
    #[serde(default = "default_payload_tag")]
    pub payload_tag: String,

    /// How long a timed out or stopped process gets between the terminate
    /// signal and the kill, e.g. `"2s"`.
    #[serde(default)]
    pub terminate_grace: Option<String>,

    /// Upper bound on waiting for samplers to stop, e.g. `"5s"`.
    #[serde(default)]
    pub stop_timeout: Option<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_payload_tag() -> String {
    DEFAULT_PAYLOAD_TAG.to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            name: None,
            output_dir: default_output_dir(),
            payload_tag: default_payload_tag(),
            terminate_grace: None,
            stop_timeout: None,
        }
    }
}

impl ConfigSection {
    pub fn terminate_grace(&self) -> Duration {
        self.terminate_grace
            .as_deref()
            .and_then(|s| parse_duration(s).ok())
            .unwrap_or(DEFAULT_TERMINATE_GRACE)
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
            .as_deref()
            .and_then(|s| parse_duration(s).ok())
            .unwrap_or(DEFAULT_STOP_TIMEOUT)
    }
}

/// `[[sampler]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SamplerConfig {
    /// Key of this sampler's timeline in job records.
    pub name: String,

    /// Long-running command printing a comma-separated table.
    pub cmd: String,

    /// `"batched"` (default) or `"continuous"`.
    #[serde(default)]
    pub mode: SamplingMode,
}

/// `[experiment.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExperimentConfig {
    /// Outer sweep: the whole step list runs once per combination.
    #[serde(default)]
    pub params: ParamDomains,

    /// Inner sweep: each step runs once per combination of the parameters
    /// its commands reference.
    #[serde(default)]
    pub cmd_params: ParamDomains,

    /// Steps from `[[experiment.<name>.step]]`, run in order.
    #[serde(default)]
    pub step: Vec<StepConfig>,
}

/// One step: a group of commands run concurrently as one job.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub cmds: Vec<String>,

    /// Per-command timeout, e.g. `"30s"`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Extra inner-sweep domains for this step only.
    #[serde(default)]
    pub params: ParamDomains,
}

impl StepConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.as_deref().and_then(|s| parse_duration(s).ok())
    }
}
