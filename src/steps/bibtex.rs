// src/steps/bibtex.rs

//! Bibliography processing for auxiliary files that declare `\bibdata`.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::errors::Result;
use crate::exec::{CommandSpec, ProcessOutput};
use crate::graph::normalize;
use crate::rule::{StepContext, StepDescriptor, StepType};
use crate::steps::latex_log::{PARSED_LOG_SUFFIX, ParsedLog};
use crate::types::{Action, Command, DependencyType, Phase, Severity};

fn database_pattern() -> &'static Option<Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^Database file #\d+: (.+?)\s*$").ok())
}

/// Directory and stem of an auxiliary file key.
fn split_aux(key: &str) -> (String, String) {
    let path = Path::new(key);
    let dir = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| ".".to_string());
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, stem)
}

/// Databases named in a bibliography log, as project keys.
pub fn databases(blg: &str, cwd: &str) -> Vec<String> {
    let Some(re) = database_pattern() else {
        return Vec::new();
    };
    re.captures_iter(blg)
        .map(|c| normalize(&format!("{cwd}/{}", &c[1])))
        .filter(|key| !key.starts_with(".."))
        .collect()
}

#[derive(Debug, Default)]
pub struct BibTeX;

impl StepType for BibTeX {
    fn name(&self) -> &str {
        "BibTeX"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Build], &[Phase::Execute]).parameter(&["LaTeXAuxilary"])
    }

    /// Skip the run when the document has no bibliography, or when the
    /// engine already ran the processor through shell escape.
    fn pre_evaluate(&self, ctx: &mut StepContext<'_>, action: Action) -> Result<()> {
        if action != Action::Run {
            return Ok(());
        }
        let Some(aux) = ctx.parameters().first().cloned() else {
            return Ok(());
        };

        let text = ctx.read_to_string(&aux).unwrap_or_default();
        if !text.contains("\\bibdata") {
            debug!(file = %aux, "no bibliography data");
            ctx.cancel_action(Action::Run);
            return Ok(());
        }

        let log = ctx.resolve(&format!("$OUTDIR/$JOB.log{PARSED_LOG_SUFFIX}"));
        let engine = ctx.options().bibtex_engine().to_string();
        let ran = ctx
            .file(&log)
            .and_then(|f| f.value.clone())
            .and_then(|v| serde_json::from_value::<ParsedLog>(v).ok())
            .is_some_and(|parsed| parsed.has_executed_call(&engine));
        if ran {
            debug!(engine = %engine, "bibliography already processed by the engine");
            ctx.cancel_action(Action::Run);
        }
        Ok(())
    }

    fn construct_command(&self, ctx: &StepContext<'_>) -> Result<Option<CommandSpec>> {
        let Some(aux) = ctx.parameters().first() else {
            return Ok(None);
        };
        let (dir, stem) = split_aux(aux);
        let spec = CommandSpec::argv([ctx.options().bibtex_engine().to_string(), stem.clone()])
            .cwd(dir.clone())
            .severity(Severity::Warning)
            .output(normalize(&format!("{dir}/{stem}.bbl")))
            .output(normalize(&format!("{dir}/{stem}.blg")));
        Ok(Some(spec))
    }

    /// The databases read during the run become inputs.
    fn process_output(&self, ctx: &mut StepContext<'_>, _output: &ProcessOutput) -> Result<bool> {
        let Some(aux) = ctx.parameters().first().cloned() else {
            return Ok(true);
        };
        let (dir, stem) = split_aux(&aux);
        let blg = normalize(&format!("{dir}/{stem}.blg"));
        let Ok(text) = ctx.read_to_string(&blg) else {
            return Ok(true);
        };
        for database in databases(&text, &dir) {
            ctx.add_input(&database, DependencyType::Default);
        }
        Ok(true)
    }
}
