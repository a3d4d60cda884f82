// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskDefinition};
use crate::config::parse_duration;
use crate::errors::{CadenceError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CadenceError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        let run_for = optional_duration("run_for", raw.config.run_for.as_deref())?;
        let default_jitter =
            optional_duration("default_jitter", raw.config.default_jitter.as_deref())?;
        validate_task_dependencies(&raw)?;
        validate_dag(&raw)?;

        let mut tasks = BTreeMap::new();
        for (name, task) in raw.task {
            let trigger = task
                .trigger
                .to_trigger(default_jitter)
                .map_err(|msg| CadenceError::ConfigError(format!("task '{name}': {msg}")))?;
            tasks.insert(
                name.clone(),
                TaskDefinition {
                    name,
                    cmd: task.cmd,
                    trigger,
                },
            );
        }

        Ok(ConfigFile::new_unchecked(run_for, tasks))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(CadenceError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn optional_duration(field: &str, raw: Option<&str>) -> Result<Option<Duration>> {
    raw.map(|raw| {
        parse_duration(raw)
            .map_err(|e| CadenceError::ConfigError(format!("[config].{field}: {e}")))
    })
    .transpose()
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.trigger.after_targets() {
            if !cfg.task.contains_key(dep) {
                return Err(CadenceError::TaskNotFound(format!(
                    "task '{name}' waits on unknown task '{dep}' in `after`"
                )));
            }
            if dep == name {
                return Err(CadenceError::ConfigError(format!(
                    "task '{name}' cannot wait on itself in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: upstream -> dependent.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.trigger.after_targets() {
            graph.add_edge(dep, name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(CadenceError::DependencyCycle(format!(
            "`after` references form a cycle involving task '{}'",
            cycle.node_id()
        ))),
    }
}
