// src/rule/context.rs

//! Views of the graph handed to step hooks.
//!
//! Steps never hold the graph themselves. During a hook they get a
//! [`StepContext`] bound to one rule instance whose mutators are phrased as
//! intents ("add this input", "cancel my run") and are routed through
//! [`State`].

use std::collections::BTreeSet;

use serde_json::Value;

use crate::config::{JobOptions, OptionSet};
use crate::errors::Result;
use crate::graph::{File, State};
use crate::types::{Action, Command, DependencyType, JobName, Phase};

/// Read-only view used to decide whether a candidate rule applies.
#[derive(Debug, Clone, Copy)]
pub struct ApplicabilityContext<'a> {
    pub state: &'a State,
    pub command: Command,
    pub phase: Phase,
    pub job_name: Option<&'a str>,
    pub parameters: &'a [String],
}

impl<'a> ApplicabilityContext<'a> {
    pub fn options(&self) -> JobOptions<'a> {
        self.state.job_options(self.job_name)
    }

    pub fn parameter(&self, index: usize) -> Option<&'a File> {
        self.parameters
            .get(index)
            .and_then(|key| self.state.file(key))
    }

    pub fn is_main_source(&self, key: &str) -> bool {
        self.state.file_path() == key
    }

    pub fn resolve(&self, template: &str) -> String {
        self.state.resolve_path(template, self.job_name)
    }
}

/// Mutable view bound to one rule instance.
pub struct StepContext<'a> {
    state: &'a mut State,
    id: String,
    command: Command,
    phase: Phase,
    job_name: JobName,
    parameters: Vec<String>,
    triggers: BTreeSet<String>,
}

impl<'a> StepContext<'a> {
    /// Bind to `rule_id`; `None` if the rule is not in the graph.
    pub fn new(state: &'a mut State, rule_id: &str, triggers: BTreeSet<String>) -> Option<Self> {
        let rule = state.rule(rule_id)?;
        let (command, phase, job_name, parameters) = (
            rule.command,
            rule.phase,
            rule.job_name.clone(),
            rule.parameters.clone(),
        );
        Some(Self {
            state,
            id: rule_id.to_string(),
            command,
            phase,
            job_name,
            parameters,
            triggers,
        })
    }

    pub fn rule_id(&self) -> &str {
        &self.id
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job_name.as_deref()
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn parameter(&self, index: usize) -> Option<&File> {
        self.parameters.get(index).and_then(|key| self.state.file(key))
    }

    /// Artifacts that armed the action being evaluated.
    pub fn triggers(&self) -> &BTreeSet<String> {
        &self.triggers
    }

    pub fn state(&self) -> &State {
        &*self.state
    }

    pub fn options(&self) -> JobOptions<'_> {
        self.state.job_options(self.job_name.as_deref())
    }

    pub fn main_source(&self) -> &str {
        self.state.file_path()
    }

    /// Resolve a path template for this rule's job.
    pub fn resolve(&self, template: &str) -> String {
        self.state.resolve_path(template, self.job_name.as_deref())
    }

    pub fn file(&self, key: &str) -> Option<&File> {
        self.state.file(key)
    }

    /// Bring `key` into the graph if it is available.
    pub fn get_file(&mut self, key: &str) -> Option<&File> {
        self.state.get_file(key).map(|f| &*f)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.state.inputs_of(&self.id)
    }

    pub fn outputs(&self) -> Vec<String> {
        self.state.outputs_of(&self.id)
    }

    pub fn add_input(&mut self, key: &str, dependency: DependencyType) -> bool {
        self.state.add_input(&self.id, key, dependency)
    }

    pub fn add_output(&mut self, key: &str, dependency: DependencyType) -> bool {
        self.state.add_output(&self.id, key, dependency)
    }

    pub fn add_target(&mut self, key: &str) -> bool {
        self.add_output(key, DependencyType::Target)
    }

    /// Store `value` in the artifact `key` and make it an output of this
    /// rule. Returns whether the payload changed.
    pub fn set_output_value(&mut self, key: &str, value: Value) -> bool {
        if !self.add_output(key, DependencyType::Default) {
            return false;
        }
        let key = crate::graph::normalize(key);
        self.state.set_file_value(&key, value)
    }

    /// Drop a pending action of this rule.
    pub fn cancel_action(&mut self, action: Action) {
        if let Some(rule) = self.state.rule_mut(&self.id) {
            rule.remove_action(action);
        }
    }

    /// Release this job's reference to `key`, optionally deleting the file.
    pub fn delete_file(&mut self, key: &str, unlink: bool) -> Result<bool> {
        let job = self.job_name.clone();
        self.state.delete_file(key, &job, unlink)
    }

    /// Drop another rule from the graph; it is rediscovered when its phase
    /// next runs. A rule cannot remove itself.
    pub fn remove_rule(&mut self, id: &str) -> bool {
        if id == self.id {
            return false;
        }
        self.state.remove_rule(id).is_some()
    }

    /// Install options read from option files.
    pub fn assign_user_options(&mut self, options: OptionSet) -> bool {
        self.state.assign_user_options(options)
    }

    pub fn read_to_string(&self, key: &str) -> Result<String> {
        let path = match self.state.file(key) {
            Some(file) => file.real_file_path.clone(),
            None => self.state.root().join(key),
        };
        Ok(std::fs::read_to_string(path)?)
    }
}
