// src/rule/mod.rs

//! Build steps.
//!
//! - [`Rule`]: one instantiated step bound to concrete artifacts, with its
//!   pending actions and failure record.
//! - [`StepType`]: the contract every registered step type implements.
//! - [`StepContext`]: the intent-revealing view of the graph handed to step
//!   hooks.
//! - [`RuleCatalog`]: the explicit registry of step types.

pub mod catalog;
pub mod context;
pub mod step_type;

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::types::{Action, Command, JobName, Phase};

pub use catalog::RuleCatalog;
pub use context::{ApplicabilityContext, StepContext};
pub use step_type::{StepDescriptor, StepType};

/// Lifecycle status of a rule instance as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    /// No pending actions and no recorded failures.
    Settled,
    /// At least one pending action.
    Pending,
    /// No pending actions, but an earlier action failed.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub type_name: String,
    pub command: Command,
    pub phase: Phase,
    pub job_name: JobName,
    pub parameters: Vec<String>,
    /// Pending actions and the artifacts that triggered them. An empty
    /// trigger set means the action was armed without a triggering file.
    pub actions: BTreeMap<Action, BTreeSet<String>>,
    pub failed_actions: BTreeSet<Action>,
}

impl Rule {
    pub fn new(
        type_name: &str,
        command: Command,
        phase: Phase,
        job_name: JobName,
        parameters: Vec<String>,
    ) -> Self {
        let id = rule_id(type_name, command, phase, job_name.as_deref(), &parameters);
        Self {
            id,
            type_name: type_name.to_string(),
            command,
            phase,
            job_name,
            parameters,
            actions: BTreeMap::new(),
            failed_actions: BTreeSet::new(),
        }
    }

    /// Arm `action`, optionally recording the file that triggered it. Arming
    /// clears any earlier failure of the same action.
    pub fn add_action(&mut self, action: Action, trigger: Option<&str>) {
        let triggers = self.actions.entry(action).or_default();
        if let Some(file) = trigger {
            triggers.insert(file.to_string());
        }
        if self.failed_actions.remove(&action) {
            trace!(rule = %self.id, %action, "failure cleared by re-arm");
        }
    }

    pub fn remove_action(&mut self, action: Action) -> Option<BTreeSet<String>> {
        self.actions.remove(&action)
    }

    /// Settle an evaluated action.
    pub fn record_outcome(&mut self, action: Action, success: bool) {
        self.actions.remove(&action);
        if success {
            self.failed_actions.remove(&action);
        } else {
            self.failed_actions.insert(action);
        }
    }

    pub fn has_action(&self, action: Action) -> bool {
        self.actions.contains_key(&action)
    }

    pub fn needs_evaluation(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        !self.failed_actions.is_empty()
    }

    pub fn status(&self) -> RuleStatus {
        if self.needs_evaluation() {
            RuleStatus::Pending
        } else if self.is_failed() {
            RuleStatus::Failed
        } else {
            RuleStatus::Settled
        }
    }

    pub fn matches(&self, command: Command, phase: Phase) -> bool {
        self.command == command && self.phase == phase
    }
}

/// Canonical rule key: `Type(command;phase;job;param1;param2;...)`.
///
/// An unnamed job leaves its segment empty.
pub fn rule_id(
    type_name: &str,
    command: Command,
    phase: Phase,
    job_name: Option<&str>,
    parameters: &[String],
) -> String {
    let mut parts = vec![
        command.as_str().to_string(),
        phase.as_str().to_string(),
        job_name.unwrap_or_default().to_string(),
    ];
    parts.extend(parameters.iter().cloned());
    format!("{type_name}({})", parts.join(";"))
}
