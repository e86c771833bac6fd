//! Step graph engine.
//!
//! Steps are registered by name with an optional fixed dependency. Fixed
//! edges form chains that run one step at a time; a conditional step picks
//! its successor at run time from a declared set of targets, which may point
//! backwards to express retry loops. `compile` validates the graph once.
//! After that the engine is immutable and can serve concurrent runs.

use crate::state::{PipelineError, PipelineState};
use crate::step::{CancellationToken, PipelineStep};
use docpipe_core::{AppError, AppResult};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Route target that ends the run.
pub const END: &str = "__end__";

/// Maximum step executions per run unless configured otherwise.
pub const DEFAULT_STEP_LIMIT: usize = 25;

type Router = Arc<dyn Fn(&PipelineState) -> String + Send + Sync>;

struct Route {
    targets: Vec<String>,
    router: Router,
}

struct StepNode {
    name: String,
    step: Arc<dyn PipelineStep>,
    depends_on: Vec<usize>,
    route: Option<Route>,
}

/// Validated execution plan produced by `compile`.
#[derive(Debug)]
struct Plan {
    entry: usize,
    finish: Option<usize>,
    order: Vec<usize>,
    next: Vec<Option<usize>>,
}

/// Named steps wired into a validated graph.
pub struct PipelineEngine {
    steps: Vec<StepNode>,
    index: HashMap<String, usize>,
    entry: Option<String>,
    finish: Option<String>,
    step_limit: usize,
    plan: Option<Plan>,
}

impl Default for PipelineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEngine")
            .field(
                "steps",
                &self.steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field("entry", &self.entry)
            .field("finish", &self.finish)
            .field("step_limit", &self.step_limit)
            .field("compiled", &self.plan.is_some())
            .finish()
    }
}

impl PipelineEngine {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            index: HashMap::new(),
            entry: None,
            finish: None,
            step_limit: DEFAULT_STEP_LIMIT,
            plan: None,
        }
    }

    /// Register a step that runs after `depends_on` (or has no dependency).
    pub fn register<S>(&mut self, name: &str, step: S, depends_on: Option<&str>) -> AppResult<()>
    where
        S: PipelineStep + 'static,
    {
        self.insert(name, Arc::new(step), depends_on, None)
    }

    /// Register a step whose successor is chosen by `router` after it runs.
    ///
    /// The router must return one of `targets` or [`END`]. Targets may name
    /// steps registered later, including earlier steps in the chain.
    pub fn register_conditional<S, F>(
        &mut self,
        name: &str,
        step: S,
        depends_on: Option<&str>,
        targets: &[&str],
        router: F,
    ) -> AppResult<()>
    where
        S: PipelineStep + 'static,
        F: Fn(&PipelineState) -> String + Send + Sync + 'static,
    {
        if targets.is_empty() {
            return Err(AppError::Config(format!(
                "Conditional step '{}' needs at least one target",
                name
            )));
        }

        let route = Route {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            router: Arc::new(router),
        };
        self.insert(name, Arc::new(step), depends_on, Some(route))
    }

    /// Add a fixed edge between two registered steps.
    pub fn add_dependency(&mut self, step: &str, depends_on: &str) -> AppResult<()> {
        self.ensure_open("add a dependency")?;
        let step_idx = self.lookup(step)?;
        let dep_idx = self.lookup(depends_on)?;

        let node = &mut self.steps[step_idx];
        if !node.depends_on.contains(&dep_idx) {
            node.depends_on.push(dep_idx);
        }
        Ok(())
    }

    /// Designate the step every run starts with.
    pub fn set_entry(&mut self, name: &str) -> AppResult<()> {
        self.ensure_open("set the entry step")?;
        self.lookup(name)?;
        self.entry = Some(name.to_string());
        Ok(())
    }

    /// Designate the step that still runs, once, after another step fails.
    pub fn set_finish(&mut self, name: &str) -> AppResult<()> {
        self.ensure_open("set the finish step")?;
        self.lookup(name)?;
        self.finish = Some(name.to_string());
        Ok(())
    }

    pub fn set_step_limit(&mut self, limit: usize) -> AppResult<()> {
        self.ensure_open("change the step limit")?;
        if limit == 0 {
            return Err(AppError::Config(
                "Step limit must be greater than zero".to_string(),
            ));
        }
        self.step_limit = limit;
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.plan.is_some()
    }

    /// Step names in topological order of the fixed edges, once compiled.
    pub fn execution_order(&self) -> Option<Vec<&str>> {
        self.plan.as_ref().map(|plan| {
            plan.order
                .iter()
                .map(|&idx| self.steps[idx].name.as_str())
                .collect()
        })
    }

    /// Validate the graph and freeze it.
    ///
    /// Fails when there is no entry step, the fixed edges contain a cycle,
    /// the entry has a dependency, a step fans out to several fixed
    /// dependents, a conditional target is unknown, or some step cannot be
    /// reached from the entry.
    pub fn compile(&mut self) -> AppResult<()> {
        if self.plan.is_some() {
            return Ok(());
        }

        let entry_name = self
            .entry
            .as_deref()
            .ok_or_else(|| AppError::Config("No entry step designated".to_string()))?;
        let entry = self.lookup(entry_name)?;
        let finish = self
            .finish
            .as_deref()
            .map(|name| self.lookup(name))
            .transpose()?;

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];
        for (idx, node) in self.steps.iter().enumerate() {
            for &dep in &node.depends_on {
                dependents[dep].push(idx);
            }
        }

        let order = self.topological_order(&dependents)?;

        if !self.steps[entry].depends_on.is_empty() {
            return Err(AppError::Config(format!(
                "Entry step '{}' must not depend on another step",
                entry_name
            )));
        }

        let mut next = vec![None; self.steps.len()];
        for (idx, node) in self.steps.iter().enumerate() {
            match (&node.route, dependents[idx].as_slice()) {
                (_, []) => {}
                (None, [only]) => next[idx] = Some(*only),
                (Some(_), deps) => {
                    return Err(AppError::Config(format!(
                        "Conditional step '{}' cannot also have fixed dependents ({})",
                        node.name,
                        self.names(deps).join(", ")
                    )));
                }
                (None, deps) => {
                    return Err(AppError::Config(format!(
                        "Step '{}' has several dependents ({}); steps run one at a time",
                        node.name,
                        self.names(deps).join(", ")
                    )));
                }
            }

            if let Some(route) = &node.route {
                if let Some(unknown) = route
                    .targets
                    .iter()
                    .find(|t| t.as_str() != END && !self.index.contains_key(t.as_str()))
                {
                    return Err(AppError::Config(format!(
                        "Conditional step '{}' routes to unknown step '{}'",
                        node.name, unknown
                    )));
                }
            }
        }

        let reachable = self.reachable_from(entry, &next);
        let unreachable: Vec<&str> = self
            .steps
            .iter()
            .enumerate()
            .filter(|(idx, _)| !reachable[*idx])
            .map(|(_, node)| node.name.as_str())
            .collect();
        if !unreachable.is_empty() {
            return Err(AppError::Config(format!(
                "Steps not reachable from entry '{}': {}",
                entry_name,
                unreachable.join(", ")
            )));
        }

        info!(
            "Compiled pipeline: {}",
            self.names(&order).join(" -> ")
        );

        self.plan = Some(Plan {
            entry,
            finish,
            order,
            next,
        });
        Ok(())
    }

    /// Run the compiled graph over a fresh state.
    pub async fn run(&self, state: PipelineState) -> AppResult<PipelineState> {
        self.run_with_cancel(state, &CancellationToken::new()).await
    }

    /// Run the compiled graph, checking `cancel` before every step.
    ///
    /// Step failures are recorded on the returned state, never returned as
    /// `Err`. After a failure the remaining steps are skipped and only the
    /// finish step runs. A cancelled run stops immediately.
    pub async fn run_with_cancel(
        &self,
        mut state: PipelineState,
        cancel: &CancellationToken,
    ) -> AppResult<PipelineState> {
        let plan = self.plan.as_ref().ok_or_else(|| {
            AppError::Engine("Pipeline must be compiled before it can run".to_string())
        })?;

        if !state.is_fresh() {
            return Err(AppError::Engine(
                "Pipeline runs require a fresh state without errors or completed steps"
                    .to_string(),
            ));
        }

        let started = Instant::now();
        let mut current = Some(plan.entry);
        let mut executed = 0usize;
        let mut diverted = false;

        while let Some(idx) = current {
            let node = &self.steps[idx];

            if cancel.is_cancelled() {
                warn!("Run cancelled before step '{}'", node.name);
                state.fail(PipelineError::Cancelled {
                    next_step: node.name.clone(),
                });
                break;
            }

            if !diverted && executed >= self.step_limit {
                warn!(
                    "Step limit of {} reached before step '{}'",
                    self.step_limit, node.name
                );
                state.fail(PipelineError::StepLimitExceeded(self.step_limit));
                current = divert_to_finish(plan, None, &mut diverted);
                continue;
            }

            executed += 1;
            let step_started = Instant::now();
            state = node
                .step
                .execute(state)
                .instrument(info_span!("pipeline.step", step = %node.name))
                .await;
            debug!(
                "Step '{}' finished in {}ms",
                node.name,
                step_started.elapsed().as_millis()
            );

            if diverted {
                break;
            }

            if let Some(err) = state.error() {
                warn!("Step '{}' failed: {}", node.name, err);
                current = divert_to_finish(plan, Some(idx), &mut diverted);
                continue;
            }

            state.record_step(&node.name);

            current = match self.successor(plan, idx, &state) {
                Ok(next) => next,
                Err(err) => {
                    warn!("{}", err);
                    state.fail(err);
                    divert_to_finish(plan, Some(idx), &mut diverted)
                }
            };
        }

        debug!(
            "Run finished: {} step executions in {}ms",
            executed,
            started.elapsed().as_millis()
        );

        Ok(state)
    }

    fn insert(
        &mut self,
        name: &str,
        step: Arc<dyn PipelineStep>,
        depends_on: Option<&str>,
        route: Option<Route>,
    ) -> AppResult<()> {
        self.ensure_open(&format!("register step '{}'", name))?;

        if name.trim().is_empty() || name == END {
            return Err(AppError::Config(format!("Invalid step name: '{}'", name)));
        }
        if self.index.contains_key(name) {
            return Err(AppError::Config(format!(
                "Step '{}' is already registered",
                name
            )));
        }

        let depends_on = match depends_on {
            Some(dep) => vec![self.lookup(dep)?],
            None => Vec::new(),
        };

        self.index.insert(name.to_string(), self.steps.len());
        self.steps.push(StepNode {
            name: name.to_string(),
            step,
            depends_on,
            route,
        });

        debug!("Registered step '{}'", name);
        Ok(())
    }

    fn ensure_open(&self, action: &str) -> AppResult<()> {
        if self.plan.is_some() {
            return Err(AppError::Config(format!(
                "Cannot {}: pipeline is already compiled",
                action
            )));
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> AppResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| AppError::Config(format!("Unknown step: '{}'", name)))
    }

    fn names(&self, indices: &[usize]) -> Vec<&str> {
        indices
            .iter()
            .map(|&idx| self.steps[idx].name.as_str())
            .collect()
    }

    /// Kahn's algorithm over the fixed edges; ties go to registration order.
    fn topological_order(&self, dependents: &[Vec<usize>]) -> AppResult<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.steps.iter().map(|s| s.depends_on.len()).collect();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut order = Vec::with_capacity(self.steps.len());
        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.steps.len() {
            let cyclic: Vec<usize> = (0..self.steps.len())
                .filter(|&idx| in_degree[idx] > 0)
                .collect();
            return Err(AppError::Config(format!(
                "Dependency cycle among steps: {}",
                self.names(&cyclic).join(", ")
            )));
        }

        Ok(order)
    }

    fn reachable_from(&self, entry: usize, next: &[Option<usize>]) -> Vec<bool> {
        let mut seen = vec![false; self.steps.len()];
        let mut queue = VecDeque::from([entry]);
        seen[entry] = true;

        while let Some(idx) = queue.pop_front() {
            let mut successors: Vec<usize> = next[idx].into_iter().collect();
            if let Some(route) = &self.steps[idx].route {
                successors.extend(
                    route
                        .targets
                        .iter()
                        .filter_map(|t| self.index.get(t.as_str()).copied()),
                );
            }

            for succ in successors {
                if !seen[succ] {
                    seen[succ] = true;
                    queue.push_back(succ);
                }
            }
        }

        seen
    }

    fn successor(
        &self,
        plan: &Plan,
        idx: usize,
        state: &PipelineState,
    ) -> Result<Option<usize>, PipelineError> {
        let node = &self.steps[idx];
        let Some(route) = &node.route else {
            return Ok(plan.next[idx]);
        };

        let target = (route.router)(state);
        if target == END {
            debug!("Step '{}' routed to end", node.name);
            return Ok(None);
        }

        match self.index.get(&target) {
            Some(&next) if route.targets.contains(&target) => {
                debug!("Step '{}' routed to '{}'", node.name, target);
                Ok(Some(next))
            }
            _ => Err(PipelineError::UnknownRoute {
                step: node.name.clone(),
                target,
            }),
        }
    }
}

/// Next step after a failure: the finish step, unless it already failed.
fn divert_to_finish(plan: &Plan, failed: Option<usize>, diverted: &mut bool) -> Option<usize> {
    match plan.finish {
        Some(finish) if failed != Some(finish) => {
            *diverted = true;
            Some(finish)
        }
        _ => None,
    }
}
