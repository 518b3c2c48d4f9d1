// src/types.rs

//! Small shared vocabulary types: commands, phases, actions and edge kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A top-level build command. The set is fixed; `DiCy::run` rejects anything
/// else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Load,
    Build,
    Log,
    Clean,
    Scrub,
    Graph,
    Save,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Load,
        Command::Build,
        Command::Log,
        Command::Clean,
        Command::Scrub,
        Command::Graph,
        Command::Save,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Load => "load",
            Command::Build => "build",
            Command::Log => "log",
            Command::Clean => "clean",
            Command::Scrub => "scrub",
            Command::Graph => "graph",
            Command::Save => "save",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown command: {s}"))
    }
}

/// Strict sub-ordering within a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initialize,
    Execute,
    Finalize,
}

impl Phase {
    /// Phases in the order every command runs them.
    pub const ALL: [Phase; 3] = [Phase::Initialize, Phase::Execute, Phase::Finalize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initialize => "initialize",
            Phase::Execute => "execute",
            Phase::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| format!("unknown phase: {s}"))
    }
}

/// The kind of work a pending rule instance still owes.
///
/// The derived ordering is also the evaluation order inside a phase cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Parse,
    UpdateDependencies,
    Run,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Parse, Action::UpdateDependencies, Action::Run];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Parse => "parse",
            Action::UpdateDependencies => "updateDependencies",
            Action::Run => "run",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a file/rule edge.
///
/// `Target` marks a rule output that is a final deliverable of its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    #[default]
    Default,
    Target,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyType::Default => f.write_str("default"),
            DependencyType::Target => f.write_str("target"),
        }
    }
}

/// How loudly a failing external command (or a tool diagnostic) is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Error,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!(
                "invalid severity: {other} (expected \"info\", \"warning\" or \"error\")"
            )),
        }
    }
}

/// Job identifier. `None` is the single unnamed job.
pub type JobName = Option<String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parsing_is_case_insensitive_and_strict() {
        assert_eq!("Build".parse::<Command>(), Ok(Command::Build));
        assert_eq!(" save ".parse::<Command>(), Ok(Command::Save));
        assert!("compile".parse::<Command>().is_err());
    }

    #[test]
    fn action_order_matches_cycle_order() {
        let mut actions = vec![Action::Run, Action::Parse, Action::UpdateDependencies];
        actions.sort();
        assert_eq!(actions, Action::ALL.to_vec());
    }

    #[test]
    fn action_serializes_in_camel_case() {
        let json = serde_json::to_string(&Action::UpdateDependencies).unwrap();
        assert_eq!(json, "\"updateDependencies\"");
    }
}
