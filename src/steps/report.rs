// src/steps/report.rs

//! Re-emit messages found in parsed typesetting logs.

use tracing::{error, info, warn};

use crate::errors::Result;
use crate::rule::{StepContext, StepDescriptor, StepType};
use crate::steps::latex_log::{LogMessage, PARSED_LOG_SUFFIX, ParsedLog};
use crate::types::{Command, Phase, Severity};

#[derive(Debug, Default)]
pub struct ReportLogMessages;

impl ReportLogMessages {
    /// Messages at or above `threshold` from every parsed log in the graph.
    pub fn collect(ctx: &StepContext<'_>, threshold: Severity) -> Vec<(String, LogMessage)> {
        let mut out = Vec::new();
        for file in ctx.state().files() {
            let Some(log) = file.file_path.strip_suffix(PARSED_LOG_SUFFIX) else {
                continue;
            };
            let Some(parsed) = file
                .value
                .clone()
                .and_then(|v| serde_json::from_value::<ParsedLog>(v).ok())
            else {
                continue;
            };
            out.extend(
                parsed
                    .messages
                    .into_iter()
                    .filter(|m| m.severity >= threshold)
                    .map(|m| (log.to_string(), m)),
            );
        }
        out
    }
}

impl StepType for ReportLogMessages {
    fn name(&self) -> &str {
        "ReportLogMessages"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Log], &[Phase::Execute])
    }

    fn always_evaluate(&self) -> bool {
        true
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let threshold = ctx.options().severity();
        for (log, m) in Self::collect(ctx, threshold) {
            let source = m.source.as_deref().unwrap_or(log.as_str());
            let line = m.line.map(|l| l.to_string()).unwrap_or_default();
            match m.severity {
                Severity::Error => error!(target: "dicy::diagnostics", file = %source, line = %line, "{}", m.text),
                Severity::Warning => warn!(target: "dicy::diagnostics", file = %source, line = %line, "{}", m.text),
                Severity::Info => info!(target: "dicy::diagnostics", file = %source, line = %line, "{}", m.text),
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    use serde_json::json;

    use crate::config::OptionSchema;
    use crate::graph::{FileTypes, State};
    use crate::rule::Rule;

    #[test]
    fn messages_below_threshold_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc.tex"), "\\documentclass{article}").unwrap();
        let mut state = State::new(
            dir.path(),
            "doc.tex",
            OptionSchema::builtin(),
            FileTypes::builtin().unwrap(),
        );
        state.get_file("doc.log-ParsedLaTeXLog").unwrap();
        state.set_file_value(
            "doc.log-ParsedLaTeXLog",
            json!({"messages": [
                {"severity": "info", "text": "driver loaded"},
                {"severity": "warning", "text": "citation undefined", "line": 7},
                {"severity": "error", "text": "undefined control sequence", "source": "doc.tex", "line": 12}
            ]}),
        );
        let rule = Rule::new("ReportLogMessages", Command::Log, Phase::Execute, None, vec![]);
        let id = rule.id.clone();
        state.add_rule(rule);

        let ctx = StepContext::new(&mut state, &id, BTreeSet::new()).unwrap();
        let warnings = ReportLogMessages::collect(&ctx, Severity::Warning);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|(log, _)| log == "doc.log"));
        let errors = ReportLogMessages::collect(&ctx, Severity::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1.line, Some(12));
    }
}
