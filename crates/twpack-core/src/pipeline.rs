//! Stage pipeline execution.
//!
//! Stages form an explicit dependency graph. A run starts from the requested
//! targets, pulls in their hard dependencies, and executes the result in
//! phases: every stage of a phase only waits on stages of earlier phases, so
//! the stages of one phase run concurrently.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};
use twpack_plugin::{BuildContext, PluginError, Stage};

use crate::{CoreError, CoreResult};

/// Ordering constraints of a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageDeps {
    /// Stages that must complete first; requesting this stage runs them too.
    pub depends_on: Vec<String>,

    /// Stages that must complete first when they are part of the same run.
    pub after: Vec<String>,

    /// Every other stage of a run waits for this one.
    pub runs_first: bool,
}

impl StageDeps {
    /// No constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds hard dependencies.
    #[must_use]
    pub fn depends_on<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(stages.into_iter().map(Into::into));
        self
    }

    /// Adds ordering-only constraints.
    #[must_use]
    pub fn after<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after.extend(stages.into_iter().map(Into::into));
        self
    }

    /// Orders the stage before all others in a run.
    #[must_use]
    pub fn runs_first(mut self) -> Self {
        self.runs_first = true;
        self
    }
}

struct StageNode {
    stage: Box<dyn Stage>,
    deps: StageDeps,
}

/// What a pipeline run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Stages that ran to completion, in phase order.
    pub completed: Vec<String>,

    /// Production-only stages skipped in a development build.
    pub skipped: Vec<String>,
}

/// Runs named build stages in dependency order.
pub struct Pipeline {
    nodes: Vec<StageNode>,
    parallel: bool,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            parallel: true,
        }
    }

    /// Adds a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: Box<dyn Stage>, deps: StageDeps) -> Self {
        self.add_stage(stage, deps);
        self
    }

    /// Adds a stage, replacing any stage registered under the same name.
    pub fn add_stage(&mut self, stage: Box<dyn Stage>, deps: StageDeps) {
        let node = StageNode { stage, deps };
        match self.index_of(node.stage.name()) {
            Some(index) => self.nodes[index] = node,
            None => self.nodes.push(node),
        }
    }

    /// Runs the stages of a phase one after another instead of concurrently.
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns the registered stage names in registration order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.stage.name()).collect()
    }

    /// Returns the declared constraints of a stage.
    #[must_use]
    pub fn deps(&self, stage: &str) -> Option<&StageDeps> {
        self.index_of(stage).map(|index| &self.nodes[index].deps)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.stage.name() == name)
    }

    fn require(&self, name: &str) -> CoreResult<usize> {
        self.index_of(name)
            .ok_or_else(|| CoreError::UnknownStage(name.to_string()))
    }

    /// Computes the execution phases for the given targets without running
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownStage`] for a target or constraint naming
    /// no registered stage, and [`CoreError::DependencyCycle`] if the
    /// constraints cannot be satisfied.
    pub fn plan<S: AsRef<str>>(&self, targets: &[S]) -> CoreResult<Vec<Vec<String>>> {
        Ok(self
            .plan_indices(targets)?
            .into_iter()
            .map(|phase| {
                phase
                    .into_iter()
                    .map(|index| self.nodes[index].stage.name().to_string())
                    .collect()
            })
            .collect())
    }

    fn plan_indices<S: AsRef<str>>(&self, targets: &[S]) -> CoreResult<Vec<Vec<usize>>> {
        // Closure over hard dependencies
        let mut selected = BTreeSet::new();
        let mut stack = targets
            .iter()
            .map(|target| self.require(target.as_ref()))
            .collect::<CoreResult<Vec<_>>>()?;
        while let Some(index) = stack.pop() {
            if selected.insert(index) {
                for dep in &self.nodes[index].deps.depends_on {
                    stack.push(self.require(dep)?);
                }
            }
        }

        let barriers: Vec<usize> = selected
            .iter()
            .copied()
            .filter(|&index| self.nodes[index].deps.runs_first)
            .collect();

        let mut predecessors: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        for &index in &selected {
            let deps = &self.nodes[index].deps;
            let mut preds = BTreeSet::new();
            for dep in &deps.depends_on {
                preds.insert(self.require(dep)?);
            }
            for dep in &deps.after {
                let dep = self.require(dep)?;
                if selected.contains(&dep) {
                    preds.insert(dep);
                }
            }
            if !deps.runs_first {
                preds.extend(barriers.iter().copied());
            }
            preds.remove(&index);
            predecessors.insert(index, preds);
        }

        let mut phases = Vec::new();
        let mut remaining = selected;
        while !remaining.is_empty() {
            let ready: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|index| predecessors[index].iter().all(|p| !remaining.contains(p)))
                .collect();

            if ready.is_empty() {
                return Err(CoreError::DependencyCycle(
                    remaining
                        .iter()
                        .map(|&index| self.nodes[index].stage.name().to_string())
                        .collect(),
                ));
            }

            for index in &ready {
                remaining.remove(index);
            }
            phases.push(ready);
        }

        Ok(phases)
    }

    /// Runs the given targets and everything they depend on.
    ///
    /// The first failing stage aborts the run; stages of later phases never
    /// start. Stages already running in the same phase are allowed to finish.
    ///
    /// # Errors
    ///
    /// Returns a planning error, or [`CoreError::StageFailed`] naming the
    /// failed stage.
    pub fn run<S: AsRef<str>>(&self, targets: &[S], ctx: &BuildContext) -> CoreResult<RunReport> {
        let phases = self.plan_indices(targets)?;
        debug!(phases = phases.len(), "planned pipeline");

        let mut report = RunReport::default();
        for phase in phases {
            let mut runnable = Vec::new();
            for index in phase {
                let stage = self.nodes[index].stage.as_ref();
                if stage.production_only() && !ctx.production {
                    info!(stage = stage.name(), "skipping production-only stage");
                    report.skipped.push(stage.name().to_string());
                } else {
                    runnable.push(stage);
                }
            }

            let results = if self.parallel && runnable.len() > 1 {
                std::thread::scope(|scope| {
                    let handles: Vec<_> = runnable
                        .iter()
                        .map(|&stage| scope.spawn(move || run_stage(stage, ctx)))
                        .collect();
                    handles
                        .into_iter()
                        .map(|handle| {
                            handle.join().unwrap_or_else(|_| {
                                Err(PluginError::ExecutionFailed("stage panicked".to_string()))
                            })
                        })
                        .collect::<Vec<_>>()
                })
            } else {
                let mut results = Vec::new();
                for &stage in &runnable {
                    let result = run_stage(stage, ctx);
                    let failed = result.is_err();
                    results.push(result);
                    if failed {
                        break;
                    }
                }
                results
            };

            for (stage, result) in runnable.iter().zip(results) {
                match result {
                    Ok(()) => report.completed.push(stage.name().to_string()),
                    Err(source) => {
                        return Err(CoreError::StageFailed {
                            stage: stage.name().to_string(),
                            source,
                        });
                    }
                }
            }
        }

        info!(
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            "pipeline finished"
        );
        Ok(report)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn run_stage(stage: &dyn Stage, ctx: &BuildContext) -> twpack_plugin::PluginResult<()> {
    info!(stage = stage.name(), "running stage");
    let result = stage.run(ctx);
    match &result {
        Ok(()) => debug!(stage = stage.name(), "stage completed"),
        Err(err) => debug!(stage = stage.name(), error = %err, "stage failed"),
    }
    result
}
