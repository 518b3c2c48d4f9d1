// src/exec/command.rs

//! Command descriptions handed to the executor, and what comes back.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::config::{JobOptions, OptionValue};
use crate::types::{DependencyType, Severity};

/// How the command is spelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Program followed by its arguments, no shell involved.
    Argv(Vec<String>),
    /// A command string run through the platform shell.
    Shell(String),
}

/// A single external command invocation constructed by a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: CommandLine,
    /// Working directory, relative to the project root.
    pub cwd: String,
    pub severity: Severity,
    pub capture_stdout: bool,
    pub capture_stderr: bool,
    /// Artifacts the command reads, added as rule inputs before running.
    pub inputs: Vec<(String, DependencyType)>,
    /// Artifacts the command writes, added as rule outputs after running.
    pub outputs: Vec<(String, DependencyType)>,
}

impl CommandSpec {
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_line(CommandLine::Argv(args.into_iter().map(Into::into).collect()))
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Self::with_line(CommandLine::Shell(command.into()))
    }

    fn with_line(command: CommandLine) -> Self {
        Self {
            command,
            cwd: ".".to_string(),
            severity: Severity::Error,
            capture_stdout: false,
            capture_stderr: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn capture_stdout(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    pub fn capture_stderr(mut self) -> Self {
        self.capture_stderr = true;
        self
    }

    pub fn input(mut self, path: impl Into<String>) -> Self {
        self.inputs.push((path.into(), DependencyType::Default));
        self
    }

    pub fn output(mut self, path: impl Into<String>) -> Self {
        self.outputs.push((path.into(), DependencyType::Default));
        self
    }

    /// An output that is a final deliverable of the job.
    pub fn target(mut self, path: impl Into<String>) -> Self {
        self.outputs.push((path.into(), DependencyType::Target));
        self
    }

    /// Program name, for logs and errors.
    pub fn program(&self) -> &str {
        match &self.command {
            CommandLine::Argv(args) => args.first().map(String::as_str).unwrap_or(""),
            CommandLine::Shell(line) => line.split_whitespace().next().unwrap_or(""),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            CommandLine::Argv(args) => f.write_str(&args.join(" ")),
            CommandLine::Shell(line) => f.write_str(line),
        }
    }
}

/// Captured output of a successful command. Streams that were not requested
/// are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' failed (exit code {code:?}, signal {signal:?})")]
    Failed {
        program: String,
        code: Option<i32>,
        signal: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("'{program}' cancelled: {reason}")]
    Cancelled { program: String, reason: String },
}

impl ExecError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecError::Cancelled { .. })
    }
}

#[cfg(windows)]
const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: &str = ":";

/// Child environment additions from `$`-prefixed options. List values are
/// joined with the platform path separator.
pub fn environment(options: &JobOptions<'_>) -> Vec<(String, String)> {
    options
        .env_options()
        .into_iter()
        .filter_map(|(name, value)| {
            let text = match value {
                OptionValue::String(s) => s,
                OptionValue::Strings(v) => v.join(PATH_LIST_SEPARATOR),
                _ => return None,
            };
            Some((name, text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OptionSchema, OptionSet};

    #[test]
    fn builder_collects_outputs_and_targets() {
        let spec = CommandSpec::argv(["pdflatex", "doc.tex"])
            .output("doc.log")
            .target("doc.pdf")
            .capture_stdout();
        assert_eq!(spec.program(), "pdflatex");
        assert_eq!(spec.to_string(), "pdflatex doc.tex");
        assert_eq!(
            spec.outputs,
            vec![
                ("doc.log".to_string(), DependencyType::Default),
                ("doc.pdf".to_string(), DependencyType::Target),
            ]
        );
        assert!(spec.capture_stdout && !spec.capture_stderr);
    }

    #[test]
    #[cfg(unix)]
    fn environment_joins_lists() {
        let schema = OptionSchema::builtin();
        let mut set = OptionSet::new();
        set.set(&schema, "$TEXINPUTS", vec!["a".to_string(), "".to_string()].into());
        set.set(&schema, "engine", "xelatex".into());
        let env = environment(&JobOptions::new(&set, &schema, None));
        assert_eq!(env, vec![("TEXINPUTS".to_string(), "a:".to_string())]);
    }
}
