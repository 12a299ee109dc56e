// src/experiment/registry.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigFile, ExperimentConfig};
use crate::errors::{ProbebenchError, Result};
use crate::experiment::context::ExperimentContext;
use crate::sweep::{ParamValue, Sweep};

/// The work an experiment does for one outer parameter set.
pub trait ExperimentBody: Send + Sync {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ExperimentContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// A configured group of commands, run concurrently as one job per
/// combination of its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub cmds: Vec<String>,
    pub timeout: Option<Duration>,
    pub params: Sweep,
}

impl Step {
    pub fn new<I, S>(cmds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmds: cmds.into_iter().map(Into::into).collect(),
            timeout: None,
            params: Sweep::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn param<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.params = self.params.param(name, values);
        self
    }
}

/// Body that runs a fixed list of steps in order.
#[derive(Debug, Clone, Default)]
pub struct StepBody {
    steps: Vec<Step>,
}

impl StepBody {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl ExperimentBody for StepBody {
    fn run<'a>(
        &'a self,
        ctx: &'a mut ExperimentContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for step in &self.steps {
                ctx.shell(&step.cmds, step.timeout, &step.params).await?;
            }
            Ok(())
        })
    }
}

/// A named experiment: outer sweep, inner sweep and the body to run.
#[derive(Clone)]
pub struct Experiment {
    name: String,
    params: Sweep,
    cmd_params: Sweep,
    body: Arc<dyn ExperimentBody>,
}

impl Experiment {
    pub fn new(name: impl Into<String>, body: impl ExperimentBody + 'static) -> Self {
        Self {
            name: name.into(),
            params: Sweep::new(),
            cmd_params: Sweep::new(),
            body: Arc::new(body),
        }
    }

    /// Declare an outer parameter; the body runs once per combination.
    pub fn param<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.params = self.params.param(name, values);
        self
    }

    /// Declare an inner parameter, swept per command group.
    pub fn cmd_param<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.cmd_params = self.cmd_params.param(name, values);
        self
    }

    pub fn from_config(name: &str, cfg: &ExperimentConfig) -> Self {
        let steps = cfg
            .step
            .iter()
            .map(|s| Step {
                cmds: s.cmds.clone(),
                timeout: s.timeout(),
                params: Sweep::from_map(&s.params),
            })
            .collect();
        Self {
            name: name.to_string(),
            params: Sweep::from_map(&cfg.params),
            cmd_params: Sweep::from_map(&cfg.cmd_params),
            body: Arc::new(StepBody::new(steps)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Sweep {
        &self.params
    }

    pub fn cmd_params(&self) -> &Sweep {
        &self.cmd_params
    }

    pub fn body(&self) -> &dyn ExperimentBody {
        self.body.as_ref()
    }
}

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("cmd_params", &self.cmd_params)
            .finish_non_exhaustive()
    }
}

/// Ordered set of experiments with unique names.
#[derive(Debug, Clone, Default)]
pub struct ExperimentRegistry {
    experiments: Vec<Experiment>,
}

impl ExperimentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut registry = Self::new();
        for (name, exp) in cfg.experiment.iter() {
            registry.register(Experiment::from_config(name, exp))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, experiment: Experiment) -> Result<()> {
        if self.get(experiment.name()).is_some() {
            return Err(ProbebenchError::ConfigError(format!(
                "experiment '{}' registered twice",
                experiment.name()
            )));
        }
        self.experiments.push(experiment);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|e| e.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Experiment> {
        self.experiments.iter()
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Experiments named in `names`, in the order given. An empty list
    /// selects everything in registration order.
    pub fn select(&self, names: &[String]) -> Result<Vec<&Experiment>> {
        if names.is_empty() {
            return Ok(self.experiments.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    ProbebenchError::ConfigError(format!("unknown experiment '{name}'"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ExperimentRegistry {
        let mut reg = ExperimentRegistry::new();
        reg.register(Experiment::new("a", StepBody::default())).unwrap();
        reg.register(Experiment::new("b", StepBody::default())).unwrap();
        reg
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = registry();
        let err = reg
            .register(Experiment::new("a", StepBody::default()))
            .unwrap_err();
        assert!(err.to_string().contains("registered twice"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn select_follows_requested_order() {
        let reg = registry();
        let all: Vec<_> = reg.select(&[]).unwrap().iter().map(|e| e.name()).collect();
        assert_eq!(all, vec!["a", "b"]);

        let picked: Vec<_> = reg
            .select(&["b".to_string(), "a".to_string()])
            .unwrap()
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(picked, vec!["b", "a"]);

        assert!(reg.select(&["nope".to_string()]).is_err());
    }

    #[test]
    fn builder_collects_both_sweeps() {
        let exp = Experiment::new("x", StepBody::new(vec![Step::new(["echo {n}"])]))
            .param("mode", ["r", "w"])
            .cmd_param("n", [1, 2, 3]);
        assert_eq!(exp.params().len(), 2);
        assert_eq!(exp.cmd_params().len(), 3);
    }
}
