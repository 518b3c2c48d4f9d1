// src/engine/phase.rs

//! The phase loop.
//!
//! One phase of one command alternates between rule discovery and action
//! evaluation until the graph is quiescent:
//!
//! 1. reset per-phase artifact flags and bind the main source to every job
//! 2. prime always-evaluate rules, discover phase-level rules
//! 3. per cycle: discover rules for artifacts not yet analyzed, then
//!    evaluate `parse`, `updateDependencies` and `run` in that order
//! 4. stop when everything is analyzed and nothing is pending, when a cycle
//!    evaluates nothing, or after `phaseCycles` cycles
//!
//! Kill checkpoints sit at the start of the phase, of each cycle, of
//! discovery and before every rule evaluation.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::cache;
use crate::engine::invalidation::check_updates;
use crate::engine::scheduler::evaluation_order;
use crate::engine::{DiCy, KillToken};
use crate::errors::{DicyError, Result};
use crate::exec::{ExecError, ExecRequest, environment};
use crate::rule::{ApplicabilityContext, Rule, StepContext, StepDescriptor, StepType};
use crate::types::{Action, Command, JobName, Phase, Severity};

impl DiCy {
    pub(crate) async fn run_phase(
        &mut self,
        command: Command,
        phase: Phase,
        token: &KillToken,
    ) -> Result<()> {
        token.check()?;
        debug!(%command, %phase, "phase started");

        if (command, phase) == (Command::Load, Phase::Initialize) {
            self.load_cache();
        }

        for file in self.state.files_mut() {
            file.phase_reset();
        }
        let jobs = self.state.job_names();
        let main = self.state.file_path().to_string();
        match self.state.get_file(&main) {
            Some(file) => file.job_names.extend(jobs),
            None => warn!(file = %main, "main source is not readable"),
        }

        self.prime_always_evaluate(command, phase);
        self.discover_phase_rules(command, phase, token)?;

        let cycles = self.state.job_options(None).phase_cycles();
        let mut quiescent = false;
        for cycle in 1..=cycles {
            token.check()?;
            self.discover_file_rules(command, phase, token)?;

            let mut evaluated = false;
            for action in Action::ALL {
                evaluated |= self.evaluate(command, phase, action, token).await?;
            }

            let analyzed = self.state.files().all(|f| f.analyzed);
            let pending = self
                .state
                .rules()
                .any(|r| r.matches(command, phase) && r.needs_evaluation());
            if analyzed && !pending {
                debug!(%command, %phase, cycle, "phase quiescent");
                quiescent = true;
                break;
            }
            if !evaluated {
                debug!(%command, %phase, cycle, "phase stalled");
                quiescent = true;
                break;
            }
        }
        if !quiescent {
            warn!(%command, %phase, cycles, "phase cycle limit reached with work pending");
        }

        match (command, phase) {
            (Command::Save, Phase::Finalize) => self.save_cache(),
            (Command::Scrub, Phase::Finalize) => {
                if let Err(e) = cache::remove(&self.state) {
                    warn!(error = %e, "failed to delete cache file");
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Cache errors are never fatal: an unusable snapshot degrades to a
    /// validation of the in-memory graph.
    fn load_cache(&mut self) {
        let loaded = if self.state.job_options(None).load_cache() {
            match cache::load(&mut self.state, &self.catalog) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(error = %e, "cache load failed");
                    false
                }
            }
        } else {
            false
        };
        if !loaded {
            cache::validate(&mut self.state, &self.catalog);
        }
    }

    fn save_cache(&mut self) {
        if !self.state.job_options(None).save_cache() {
            debug!("cache saving disabled");
            return;
        }
        if let Err(e) = cache::save(&mut self.state) {
            warn!(error = %e, "failed to write cache");
        }
    }

    fn prime_always_evaluate(&mut self, command: Command, phase: Phase) {
        let primed: Vec<(String, Vec<Action>)> = self
            .state
            .rules()
            .filter(|r| r.matches(command, phase))
            .filter_map(|r| {
                self.catalog
                    .get(&r.type_name)
                    .filter(|step| step.always_evaluate())
                    .map(|step| (r.id.clone(), step.default_actions()))
            })
            .collect();
        for (id, actions) in primed {
            if let Some(rule) = self.state.rule_mut(&id) {
                for action in actions {
                    rule.add_action(action, None);
                }
            }
        }
    }

    fn discover_phase_rules(
        &mut self,
        command: Command,
        phase: Phase,
        token: &KillToken,
    ) -> Result<()> {
        token.check()?;
        let jobs = self.state.job_names();
        for step in self.catalog.for_phase(command, phase) {
            if !step.descriptor().parameter_types.is_empty() {
                continue;
            }
            let step_jobs = if step.ignore_job_name() {
                vec![None]
            } else {
                jobs.clone()
            };
            for job in step_jobs {
                self.instantiate(&step, command, phase, job, Vec::new())?;
            }
        }
        Ok(())
    }

    /// Offer every artifact not yet analyzed in this phase to the
    /// file-parameterized step types.
    fn discover_file_rules(
        &mut self,
        command: Command,
        phase: Phase,
        token: &KillToken,
    ) -> Result<()> {
        let mut fresh: Vec<(String, Option<String>, Vec<JobName>)> = Vec::new();
        for file in self.state.files_mut().filter(|f| !f.analyzed) {
            file.analyzed = true;
            let jobs = if file.job_names.is_empty() {
                vec![None]
            } else {
                file.job_names.iter().cloned().collect()
            };
            fresh.push((file.file_path.clone(), file.file_type.clone(), jobs));
        }
        if fresh.is_empty() {
            return Ok(());
        }
        token.check()?;

        for step in self.catalog.for_phase(command, phase) {
            let descriptor = step.descriptor();
            let arity = descriptor.parameter_types.len();
            if arity == 0 {
                continue;
            }
            for (key, file_type, jobs) in &fresh {
                for position in 0..arity {
                    if !descriptor.accepts(position, file_type.as_deref()) {
                        continue;
                    }
                    let slots: Vec<Vec<String>> = (0..arity)
                        .map(|p| {
                            if p == position {
                                vec![key.clone()]
                            } else {
                                self.accepted_files(&descriptor, p)
                            }
                        })
                        .collect();
                    let step_jobs = if step.ignore_job_name() {
                        vec![None]
                    } else {
                        jobs.clone()
                    };
                    for parameters in combinations(&slots) {
                        for job in &step_jobs {
                            self.instantiate(&step, command, phase, job.clone(), parameters.clone())?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn accepted_files(&self, descriptor: &StepDescriptor, position: usize) -> Vec<String> {
        self.state
            .files()
            .filter(|f| descriptor.accepts(position, f.file_type.as_deref()))
            .map(|f| f.file_path.clone())
            .collect()
    }

    /// Create, initialize and arm a rule unless its id already exists or the
    /// step declines. Returns whether a rule was added.
    fn instantiate(
        &mut self,
        step: &Arc<dyn StepType>,
        command: Command,
        phase: Phase,
        job_name: JobName,
        parameters: Vec<String>,
    ) -> Result<bool> {
        let rule = Rule::new(step.name(), command, phase, job_name, parameters);
        if self.state.has_rule(&rule.id) {
            return Ok(false);
        }
        let applicable = step.is_applicable(&ApplicabilityContext {
            state: &self.state,
            command,
            phase,
            job_name: rule.job_name.as_deref(),
            parameters: &rule.parameters,
        });
        if !applicable {
            return Ok(false);
        }

        let id = rule.id.clone();
        self.state.add_rule(rule);
        debug!(rule = %id, "rule discovered");

        match self.with_context(&id, BTreeSet::new(), |ctx| step.initialize(ctx)) {
            Ok(()) => {}
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                error!(rule = %id, error = %e, "rule initialization failed; dropping rule");
                self.state.remove_rule(&id);
                return Ok(false);
            }
        }

        if let Some(rule) = self.state.rule_mut(&id) {
            for action in step.default_actions() {
                rule.add_action(action, None);
            }
        }
        Ok(true)
    }

    /// Evaluate every rule of `command`/`phase` owing `action`, in the order
    /// computed by the scheduler. Returns whether anything was evaluated.
    async fn evaluate(
        &mut self,
        command: Command,
        phase: Phase,
        action: Action,
        token: &KillToken,
    ) -> Result<bool> {
        check_updates(&mut self.state, &self.catalog, Some((command, phase)));
        let candidates: Vec<String> = self
            .state
            .rules()
            .filter(|r| r.matches(command, phase) && r.has_action(action))
            .map(|r| r.id.clone())
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }

        let order = evaluation_order(&self.state, &candidates);
        let mut evaluated = false;
        for id in order {
            token.check()?;
            check_updates(&mut self.state, &self.catalog, Some((command, phase)));
            let still_pending = self
                .state
                .rule(&id)
                .is_some_and(|r| r.has_action(action));
            if !still_pending {
                continue;
            }
            self.evaluate_rule(&id, action, token).await?;
            evaluated = true;
        }
        Ok(evaluated)
    }

    /// Evaluate one pending action and record its outcome.
    ///
    /// Step errors count as a failure of the action; only cancellation
    /// propagates. A cancelled action stays pending for the next build.
    async fn evaluate_rule(&mut self, id: &str, action: Action, token: &KillToken) -> Result<()> {
        let Some(rule) = self.state.rule(id) else {
            return Ok(());
        };
        let triggers = rule.actions.get(&action).cloned().unwrap_or_default();
        let Some(step) = self.catalog.get(&rule.type_name).cloned() else {
            warn!(rule = %id, step = %rule.type_name, "no step type registered");
            self.record(id, action, false);
            return Ok(());
        };

        if let Err(e) = self.with_context(id, triggers.clone(), |ctx| step.pre_evaluate(ctx, action)) {
            if e.is_cancellation() {
                return Err(e);
            }
            error!(rule = %id, %action, error = %e, "pre-evaluation failed");
            self.record(id, action, false);
            return Ok(());
        }
        if !self.state.rule(id).is_some_and(|r| r.has_action(action)) {
            debug!(rule = %id, %action, "action cancelled by step");
            self.record(id, action, true);
            return Ok(());
        }

        if let Some(rule) = self.state.rule_mut(id) {
            rule.remove_action(action);
        }
        debug!(rule = %id, %action, "evaluating");

        let result = match action {
            Action::Parse => self.with_context(id, triggers.clone(), |ctx| step.parse(ctx)),
            Action::UpdateDependencies => {
                self.with_context(id, triggers.clone(), |ctx| step.update_dependencies(ctx))
            }
            Action::Run => self.run_action(&step, id, &triggers, token).await,
        };

        let success = match result {
            Ok(success) => success,
            Err(e) if e.is_cancellation() => {
                if let Some(rule) = self.state.rule_mut(id) {
                    rule.actions.insert(action, triggers);
                }
                return Err(e);
            }
            Err(e) => {
                error!(rule = %id, %action, error = %e, "step raised an error");
                false
            }
        };
        if !success {
            warn!(rule = %id, %action, "action failed");
        }
        self.record(id, action, success);
        Ok(())
    }

    /// `run`: either hand the step's command to the executor and let the step
    /// interpret its output, or call the step's own `run`.
    async fn run_action(
        &mut self,
        step: &Arc<dyn StepType>,
        id: &str,
        triggers: &BTreeSet<String>,
        token: &KillToken,
    ) -> Result<bool> {
        let spec = self.with_context(id, triggers.clone(), |ctx| step.construct_command(ctx))?;
        let Some(spec) = spec else {
            return self.with_context(id, triggers.clone(), |ctx| step.run(ctx));
        };

        let job = self.state.rule(id).and_then(|r| r.job_name.clone());
        let env = environment(&self.state.job_options(job.as_deref()));
        for (input, dependency) in &spec.inputs {
            self.state.add_input(id, input, *dependency);
        }

        info!(rule = %id, command = %spec, "running");
        let root = self.state.root().to_path_buf();
        let result = self
            .executor
            .execute(ExecRequest {
                spec: &spec,
                root: &root,
                env: &env,
                token,
            })
            .await;

        for (output, dependency) in &spec.outputs {
            self.state.add_output(id, output, *dependency);
        }
        for key in self.state.outputs_of(id) {
            if let Some(file) = self.state.file_mut(&key) {
                file.refresh();
            }
        }

        match result {
            Ok(output) => self.with_context(id, triggers.clone(), |ctx| step.process_output(ctx, &output)),
            Err(e) if e.is_cancelled() => {
                token.check()?;
                Err(DicyError::Cancelled(e.to_string()))
            }
            Err(e) => {
                report_failure(spec.severity, id, &e);
                Ok(false)
            }
        }
    }

    /// Call `f` with a context bound to `id`. A rule that has left the graph
    /// yields the default value.
    fn with_context<T: Default>(
        &mut self,
        id: &str,
        triggers: BTreeSet<String>,
        f: impl FnOnce(&mut StepContext<'_>) -> Result<T>,
    ) -> Result<T> {
        match StepContext::new(&mut self.state, id, triggers) {
            Some(mut ctx) => f(&mut ctx),
            None => Ok(T::default()),
        }
    }

    fn record(&mut self, id: &str, action: Action, success: bool) {
        if let Some(rule) = self.state.rule_mut(id) {
            rule.record_outcome(action, success);
        }
    }
}

fn report_failure(severity: Severity, id: &str, err: &ExecError) {
    match severity {
        Severity::Error => error!(rule = %id, error = %err, "command failed"),
        Severity::Warning => warn!(rule = %id, error = %err, "command failed"),
        Severity::Info => info!(rule = %id, error = %err, "command failed"),
    }
}

/// Cartesian product of the parameter slots, in slot order.
fn combinations(slots: &[Vec<String>]) -> Vec<Vec<String>> {
    slots.iter().fold(vec![Vec::new()], |acc, slot| {
        acc.iter()
            .flat_map(|prefix| {
                slot.iter().map(move |item| {
                    let mut next = prefix.clone();
                    next.push(item.clone());
                    next
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn combinations_follow_slot_order() {
        let slots = vec![strings(&["a", "b"]), strings(&["x"]), strings(&["1", "2"])];
        let combos = combinations(&slots);
        assert_eq!(
            combos,
            vec![
                strings(&["a", "x", "1"]),
                strings(&["a", "x", "2"]),
                strings(&["b", "x", "1"]),
                strings(&["b", "x", "2"]),
            ]
        );
    }

    #[test]
    fn empty_slot_yields_nothing() {
        assert!(combinations(&[strings(&["a"]), Vec::new()]).is_empty());
    }
}
