// src/steps/latex_log.rs

//! Typesetting log parsing.
//!
//! The payload stored in `<log>-ParsedLaTeXLog`:
//!
//! ```json
//! {
//!   "messages": [{"severity": "warning", "text": "...", "source": "doc.tex", "line": 3}],
//!   "rerun": true,
//!   "inputs": ["doc.bbl"],
//!   "outputs": ["doc.pdf"],
//!   "calls": [{"command": "bibtex doc", "status": "executed"}]
//! }
//! ```
//!
//! `inputs` holds the files the run looked for and did not find. Once a
//! later step writes one of them, it becomes an input of the engine run.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::graph::paths::project_key;
use crate::parse::{LineParser, LineRule};
use crate::rule::{StepContext, StepDescriptor, StepType};
use crate::types::{Action, Command, Phase, Severity};

pub const PARSED_LOG_SUFFIX: &str = "-ParsedLaTeXLog";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub severity: Severity,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellCall {
    pub command: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLog {
    #[serde(default)]
    pub messages: Vec<LogMessage>,
    #[serde(default)]
    pub rerun: bool,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub calls: Vec<ShellCall>,
}

impl ParsedLog {
    /// Whether a shell-escape call starting with `program` ran to completion.
    pub fn has_executed_call(&self, program: &str) -> bool {
        self.calls.iter().any(|c| {
            c.status.starts_with("executed")
                && c.command.split_whitespace().next() == Some(program)
        })
    }
}

fn log_parser() -> Result<LineParser> {
    Ok(LineParser::new(vec![
        LineRule::new("fileLineError", &[r"^(\S[^:]*):(\d+): (.+)$"])?,
        LineRule::new("error", &[r"^! (.+)$"])?,
        LineRule::new(
            "warning",
            &[r"^(?:LaTeX|Package \S+|Class \S+) Warning: (.+?)(?: on input line (\d+)\.)?$"],
        )?,
        LineRule::new("info", &[r"^(?:LaTeX|Package \S+|Class \S+) Info: (.+)$"])?,
        LineRule::new("output", &[r#"^Output written on "?([^"]+?)"? \("#])?,
        LineRule::new("missingFile", &[r"^No file (.+)\.$"])?,
        LineRule::new(
            "call",
            &[r"^runsystem\((.+)\)\.\.\.(executed safely|executed|disabled(?: \(restricted\))?)\.?$"],
        )?,
    ]))
}

fn rerun_pattern() -> &'static Option<Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(rerun to get|please rerun|rerun latex|may have changed\. rerun)").ok()
    })
}

/// Parse log `text`. Paths reported by the engine are relative to `cwd`, a
/// project key; paths outside the project are dropped.
pub fn parse_log(text: &str, root: &Path, cwd: &str) -> Result<ParsedLog> {
    let mut parsed = ParsedLog::default();
    for m in log_parser()?.parse(text) {
        match m.rule.as_str() {
            "fileLineError" => parsed.messages.push(LogMessage {
                severity: Severity::Error,
                text: m.get(0, 3).unwrap_or_default().to_string(),
                source: m.get(0, 1).and_then(|s| project_key(root, cwd, s)),
                line: m.get(0, 2).and_then(|l| l.parse().ok()),
            }),
            "error" => parsed.messages.push(LogMessage {
                severity: Severity::Error,
                text: m.get(0, 1).unwrap_or_default().to_string(),
                source: None,
                line: None,
            }),
            "warning" => parsed.messages.push(LogMessage {
                severity: Severity::Warning,
                text: m.get(0, 1).unwrap_or_default().to_string(),
                source: None,
                line: m.get(0, 2).and_then(|l| l.parse().ok()),
            }),
            "info" => parsed.messages.push(LogMessage {
                severity: Severity::Info,
                text: m.get(0, 1).unwrap_or_default().to_string(),
                source: None,
                line: None,
            }),
            "output" => {
                if let Some(key) = m.get(0, 1).and_then(|p| project_key(root, cwd, p)) {
                    parsed.outputs.push(key);
                }
            }
            "missingFile" => {
                if let Some(key) = m.get(0, 1).and_then(|p| project_key(root, cwd, p)) {
                    if !parsed.inputs.contains(&key) {
                        parsed.inputs.push(key);
                    }
                }
            }
            "call" => parsed.calls.push(ShellCall {
                command: m.get(0, 1).unwrap_or_default().to_string(),
                status: m.get(0, 2).unwrap_or_default().to_string(),
            }),
            _ => {}
        }
    }
    parsed.rerun = rerun_pattern().as_ref().is_some_and(|re| re.is_match(text));
    Ok(parsed)
}

#[derive(Debug, Default)]
pub struct ParseLaTeXLog;

impl StepType for ParseLaTeXLog {
    fn name(&self) -> &str {
        "ParseLaTeXLog"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Build, Command::Log], &[Phase::Execute])
            .parameter(&["LaTeXLog"])
    }

    fn default_actions(&self) -> Vec<Action> {
        vec![Action::Parse]
    }

    fn parse(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let Some(log) = ctx.parameters().first().cloned() else {
            return Ok(false);
        };
        let text = ctx.read_to_string(&log)?;
        let cwd = ctx.resolve("$DIR");
        let parsed = parse_log(&text, ctx.state().root(), &cwd)?;
        let value = serde_json::to_value(&parsed)?;
        ctx.set_output_value(&format!("{log}{PARSED_LOG_SUFFIX}"), value);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "This is pdfTeX, Version 3.14159265 (TeX Live 2023)\n\
(./doc.tex\n\
LaTeX2e <2022-11-01>\n\
Package hyperref Info: Driver (autodetected): hpdftex.\n\
./doc.tex:12: Undefined control sequence.\n\
LaTeX Warning: Citation `knuth' undefined on input line 7.\n\
No file doc.bbl.\n\
runsystem(bibtex doc)...executed.\n\
LaTeX Warning: Label(s) may have changed. Rerun to get cross-references right.\n\
Output written on doc.pdf (1 page, 12345 bytes).\n";

    #[test]
    fn extracts_messages_outputs_calls_and_rerun() {
        let parsed = parse_log(LOG, Path::new("/work"), ".").unwrap();

        assert!(parsed.rerun);
        assert_eq!(parsed.outputs, vec!["doc.pdf".to_string()]);
        assert!(parsed.has_executed_call("bibtex"));
        assert!(!parsed.has_executed_call("makeindex"));

        let error = &parsed.messages[1];
        assert_eq!(error.severity, Severity::Error);
        assert_eq!(error.source.as_deref(), Some("doc.tex"));
        assert_eq!(error.line, Some(12));

        let warning = &parsed.messages[2];
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.text, "Citation `knuth' undefined");
        assert_eq!(warning.line, Some(7));
        assert_eq!(parsed.messages[0].severity, Severity::Info);
    }

    #[test]
    fn clean_log_needs_no_rerun() {
        let parsed = parse_log(
            "This is pdfTeX, Version 3.14\nOutput written on out/doc.pdf (1 page).\n",
            Path::new("/work"),
            "sub",
        )
        .unwrap();
        assert!(!parsed.rerun);
        assert!(parsed.messages.is_empty());
        assert!(parsed.inputs.is_empty());
        assert_eq!(parsed.outputs, vec!["sub/out/doc.pdf".to_string()]);
    }

    #[test]
    fn missing_files_become_inputs() {
        let parsed = parse_log(LOG, Path::new("/work"), ".").unwrap();
        assert_eq!(parsed.inputs, vec!["doc.bbl".to_string()]);
    }

    #[test]
    fn paths_outside_the_project_are_dropped() {
        let log = "Output written on ../escape.pdf (1 page).\n\
No file ../../shared/refs.bbl.\n\
../other.tex:3: Undefined control sequence.\n\
Output written on /work/out/doc.pdf (1 page).\n";
        let parsed = parse_log(log, Path::new("/work"), ".").unwrap();
        assert_eq!(parsed.outputs, vec!["out/doc.pdf".to_string()]);
        assert!(parsed.inputs.is_empty());
        assert_eq!(parsed.messages[0].source, None);
    }
}
