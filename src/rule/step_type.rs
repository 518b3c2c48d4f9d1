// src/rule/step_type.rs

//! The contract between the orchestrator and a step type.
//!
//! The orchestrator only ever calls these hooks; it never looks inside a
//! step. Hooks are synchronous: the one suspension point, running an
//! external command, belongs to the orchestrator, which asks the step for a
//! [`CommandSpec`] and hands the result back through
//! [`StepType::process_output`].

use serde_json::Value;

use crate::errors::Result;
use crate::exec::{CommandSpec, ProcessOutput};
use crate::graph::File;
use crate::rule::Rule;
use crate::rule::context::{ApplicabilityContext, StepContext};
use crate::types::{Action, Command, DependencyType, Phase};

/// Where a step type applies: the commands and phases it participates in,
/// and one set of accepted file types per parameter position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepDescriptor {
    pub commands: Vec<Command>,
    pub phases: Vec<Phase>,
    pub parameter_types: Vec<Vec<String>>,
}

impl StepDescriptor {
    pub fn new(commands: &[Command], phases: &[Phase]) -> Self {
        Self {
            commands: commands.to_vec(),
            phases: phases.to_vec(),
            parameter_types: Vec::new(),
        }
    }

    /// Add a parameter position accepting any of `types`.
    pub fn parameter(mut self, types: &[&str]) -> Self {
        self.parameter_types
            .push(types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn matches(&self, command: Command, phase: Phase) -> bool {
        self.commands.contains(&command) && self.phases.contains(&phase)
    }

    pub fn accepts(&self, position: usize, file_type: Option<&str>) -> bool {
        match (self.parameter_types.get(position), file_type) {
            (Some(types), Some(t)) => types.iter().any(|accepted| accepted == t),
            _ => false,
        }
    }
}

pub trait StepType: Send + Sync {
    /// Registered type name; the first segment of every rule id.
    fn name(&self) -> &str;

    fn descriptor(&self) -> StepDescriptor;

    /// Prime the default actions at the start of every matching phase.
    fn always_evaluate(&self) -> bool {
        false
    }

    /// Instances are created once, not per job.
    fn ignore_job_name(&self) -> bool {
        false
    }

    fn default_actions(&self) -> Vec<Action> {
        vec![Action::Run]
    }

    fn is_applicable(&self, _ctx: &ApplicabilityContext<'_>) -> bool {
        true
    }

    /// One-time setup after instantiation, e.g. declaring implicit inputs.
    fn initialize(&self, _ctx: &mut StepContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Actions owed when `file`, an input of `rule`, has changed.
    fn actions_for(&self, _rule: &Rule, _file: &File) -> Vec<Action> {
        self.default_actions()
    }

    /// Runs before `action` is evaluated. A step may cancel its own pending
    /// action here through [`StepContext::cancel_action`].
    fn pre_evaluate(&self, _ctx: &mut StepContext<'_>, _action: Action) -> Result<()> {
        Ok(())
    }

    /// The external command for `run`, if this step has one.
    fn construct_command(&self, _ctx: &StepContext<'_>) -> Result<Option<CommandSpec>> {
        Ok(None)
    }

    /// Interpret the output of a successful command.
    fn process_output(&self, _ctx: &mut StepContext<'_>, _output: &ProcessOutput) -> Result<bool> {
        Ok(true)
    }

    /// `run` for steps without an external command.
    fn run(&self, _ctx: &mut StepContext<'_>) -> Result<bool> {
        Ok(true)
    }

    fn parse(&self, _ctx: &mut StepContext<'_>) -> Result<bool> {
        Ok(true)
    }

    /// Promote the `inputs` / `outputs` lists found in the triggering
    /// artifacts' payloads to graph edges.
    fn update_dependencies(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let triggers: Vec<String> = ctx.triggers().iter().cloned().collect();
        for key in triggers {
            let Some(value) = ctx.file(&key).and_then(|f| f.value.clone()) else {
                continue;
            };
            for input in string_list(&value, "inputs") {
                ctx.add_input(&input, DependencyType::Default);
            }
            for output in string_list(&value, "outputs") {
                ctx.add_output(&output, DependencyType::Default);
            }
        }
        Ok(true)
    }
}

/// Read `value[field]` as a list of strings, skipping anything else.
pub fn string_list(value: &Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
