// src/experiment/context.rs

use std::time::Duration;

use tracing::info;

use crate::engine::{JobRecord, Orchestrator};
use crate::errors::{ProbebenchError, Result};
use crate::sweep::{ParameterSet, Sweep, format_params};
use crate::template::CommandTemplate;

/// What an experiment body sees while it runs.
///
/// Owns the orchestrator for the duration of one experiment; the runner
/// takes it back with [`ExperimentContext::into_orchestrator`] to stop the
/// samplers and collect the job history.
pub struct ExperimentContext {
    orchestrator: Orchestrator,
    cmd_params: Sweep,
    func_params: ParameterSet,
}

impl ExperimentContext {
    pub fn new(orchestrator: Orchestrator, cmd_params: Sweep) -> Self {
        Self {
            orchestrator,
            cmd_params,
            func_params: ParameterSet::new(),
        }
    }

    /// Fix the outer parameter set for the next body invocation.
    pub fn set_func_params(&mut self, params: ParameterSet) {
        self.func_params = params;
    }

    pub fn func_params(&self) -> &ParameterSet {
        &self.func_params
    }

    pub fn cmd_params(&self) -> &Sweep {
        &self.cmd_params
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn into_orchestrator(self) -> Orchestrator {
        self.orchestrator
    }

    /// Run a group of command templates concurrently, once per combination
    /// of the parameters they reference.
    ///
    /// See [`expand_commands`] for how placeholders are bound. Each
    /// combination is one orchestrator job; the records come back in sweep
    /// order.
    pub async fn shell<S: AsRef<str>>(
        &mut self,
        cmds: &[S],
        timeout: Option<Duration>,
        extra: &Sweep,
    ) -> Result<Vec<JobRecord>> {
        let jobs = expand_commands(cmds, &self.cmd_params, &self.func_params, extra)?;

        let mut records = Vec::with_capacity(jobs.len());
        for (params, rendered) in jobs {
            info!(params = %format_params(&params), cmds = ?rendered, "launching job");
            let record = self.orchestrator.shell(&rendered, timeout).await?;
            records.push(record.clone());
        }
        Ok(records)
    }
}

/// Render a command group for every combination of the parameters it
/// references.
///
/// Placeholders bound by `func_params` are fixed. The rest are swept over
/// `cmd_params` overlaid with `extra`, restricted to the referenced names.
/// A placeholder bound by neither is a `Template` error.
pub fn expand_commands<S: AsRef<str>>(
    cmds: &[S],
    cmd_params: &Sweep,
    func_params: &ParameterSet,
    extra: &Sweep,
) -> Result<Vec<(ParameterSet, Vec<String>)>> {
    let templates = cmds
        .iter()
        .map(|c| CommandTemplate::parse(c.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let mut fields: Vec<&str> = Vec::new();
    for template in &templates {
        for field in template.fields() {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
    }

    let domains = cmd_params.overlay(extra);
    let swept: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| !func_params.contains_key(*f))
        .collect();
    if let Some(missing) = swept.iter().find(|f| !domains.contains(f)) {
        return Err(ProbebenchError::Template(format!(
            "parameter '{missing}' is not bound by the experiment parameters"
        )));
    }

    let sweep = domains.restrict(swept.iter().copied());
    let mut jobs = Vec::with_capacity(sweep.len());
    for mut params in sweep.iter() {
        params.extend(func_params.iter().map(|(k, v)| (k.clone(), v.clone())));
        let rendered = templates
            .iter()
            .map(|t| t.render(&params))
            .collect::<Result<Vec<_>>>()?;
        jobs.push((params, rendered));
    }
    Ok(jobs)
}

impl std::fmt::Debug for ExperimentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentContext")
            .field("orchestrator", &self.orchestrator)
            .field("cmd_params", &self.cmd_params)
            .field("func_params", &self.func_params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::NoopParser;
    use std::sync::Arc;

    fn context(cmd_params: Sweep) -> ExperimentContext {
        let orchestrator = Orchestrator::new(Vec::new()).with_parser(Arc::new(NoopParser));
        ExperimentContext::new(orchestrator, cmd_params)
    }

    #[test]
    fn expansion_is_pure() {
        let mut fixed = ParameterSet::new();
        fixed.insert("bs".into(), "4k".into());
        let jobs = expand_commands(
            &["fio --bs={bs} --depth={depth}", "iostat 1"],
            &Sweep::new().param("depth", [1, 32]),
            &fixed,
            &Sweep::new(),
        )
        .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].1[0], "fio --bs=4k --depth=32");
        assert_eq!(jobs[1].1[1], "iostat 1");
        assert_eq!(jobs[1].0.len(), 2);
    }

    #[tokio::test]
    async fn sweeps_only_referenced_parameters() {
        let mut ctx = context(
            Sweep::new()
                .param("n", [1, 2, 3])
                .param("unused", ["x", "y"]),
        );
        let records = ctx.shell(&["echo {n}"], None, &Sweep::new()).await.unwrap();

        let cmds: Vec<_> = records.iter().map(|r| r.commands[0].clone()).collect();
        assert_eq!(cmds, vec!["echo 1", "echo 2", "echo 3"]);
        assert_eq!(
            records[2].output(0).unwrap().texts(crate::exec::Stream::Stdout),
            vec!["3"]
        );
    }

    #[tokio::test]
    async fn func_params_are_fixed() {
        let mut ctx = context(Sweep::new().param("n", [1, 2]));
        let mut fixed = ParameterSet::new();
        fixed.insert("tag".into(), "a".into());
        ctx.set_func_params(fixed);

        let records = ctx
            .shell(&["echo {tag}-{n}"], None, &Sweep::new())
            .await
            .unwrap();
        let cmds: Vec<_> = records.iter().map(|r| r.commands[0].clone()).collect();
        assert_eq!(cmds, vec!["echo a-1", "echo a-2"]);
    }

    #[tokio::test]
    async fn extra_domains_override_cmd_params() {
        let mut ctx = context(Sweep::new().param("n", [1, 2]));
        let records = ctx
            .shell(&["echo {n}"], None, &Sweep::new().param("n", [9]))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].commands, vec!["echo 9".to_string()]);
    }

    #[tokio::test]
    async fn unbound_placeholder_is_a_template_error() {
        let mut ctx = context(Sweep::new());
        let err = ctx
            .shell(&["echo {missing}"], None, &Sweep::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbebenchError::Template(_)));
        assert!(ctx.orchestrator().history().is_empty());
    }

    #[tokio::test]
    async fn plain_group_runs_once() {
        let mut ctx = context(Sweep::new().param("n", [1, 2]));
        let records = ctx
            .shell(&["echo a", "echo b"], None, &Sweep::new())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outputs.len(), 2);
    }
}
