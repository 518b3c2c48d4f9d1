// src/steps/options.rs

//! Option files: discovery, parsing and application.
//!
//! `dicy.toml` (project) and `$NAME.dicy.toml` (document) next to the main
//! source are ordinary graph inputs, so editing one invalidates exactly like
//! editing a source file. Document options override project options;
//! instance options override both.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{OptionSet, load_from_str};
use crate::errors::Result;
use crate::rule::{StepContext, StepDescriptor, StepType};
use crate::types::{Action, Command, DependencyType, Phase};

/// Option files in increasing precedence.
const OPTION_FILES: [&str; 2] = ["$DIR/dicy.toml", "$DIR/$NAME.dicy.toml"];

const PARSED_SUFFIX: &str = "-ParsedOptions";

#[derive(Debug, Default)]
pub struct LoadOptions;

impl StepType for LoadOptions {
    fn name(&self) -> &str {
        "LoadOptions"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Load], &[Phase::Initialize])
    }

    fn always_evaluate(&self) -> bool {
        true
    }

    fn ignore_job_name(&self) -> bool {
        true
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        if !ctx.options().load_user_options() {
            debug!("option files disabled");
            return Ok(true);
        }
        for template in OPTION_FILES {
            let path = ctx.resolve(template);
            if ctx.add_input(&path, DependencyType::Default) {
                debug!(file = %path, "option file found");
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct ParseOptionsFile;

impl StepType for ParseOptionsFile {
    fn name(&self) -> &str {
        "ParseOptionsFile"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Load], &[Phase::Initialize]).parameter(&["OptionsFile"])
    }

    fn ignore_job_name(&self) -> bool {
        true
    }

    fn default_actions(&self) -> Vec<Action> {
        vec![Action::Parse]
    }

    fn parse(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let Some(source) = ctx.parameters().first().cloned() else {
            return Ok(false);
        };
        let text = ctx.read_to_string(&source)?;
        let options = match load_from_str(ctx.state().schema(), &text) {
            Ok(options) => options,
            Err(e) => {
                warn!(file = %source, error = %e, "unreadable option file ignored");
                OptionSet::new()
            }
        };
        let value = serde_json::to_value(&options)?;
        ctx.set_output_value(&format!("{source}{PARSED_SUFFIX}"), value);
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct ApplyOptions;

impl StepType for ApplyOptions {
    fn name(&self) -> &str {
        "ApplyOptions"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Load], &[Phase::Finalize])
    }

    fn always_evaluate(&self) -> bool {
        true
    }

    fn ignore_job_name(&self) -> bool {
        true
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let mut user = OptionSet::new();
        if ctx.options().load_user_options() {
            for template in OPTION_FILES {
                let source = ctx.resolve(template);
                if ctx.file(&source).is_none() {
                    continue;
                }
                let parsed = format!("{source}{PARSED_SUFFIX}");
                let Some(value) = ctx.file(&parsed).and_then(|f| f.value.clone()) else {
                    continue;
                };
                ctx.add_input(&parsed, DependencyType::Default);
                user.merge(&parsed_options(&value));
            }
        }

        if ctx.assign_user_options(user) {
            info!("option change invalidated the build");
        }
        Ok(true)
    }
}

fn parsed_options(value: &Value) -> OptionSet {
    serde_json::from_value(value.clone()).unwrap_or_else(|e| {
        warn!(error = %e, "malformed parsed options ignored");
        OptionSet::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    use crate::config::OptionSchema;
    use crate::graph::{FileTypes, State};
    use crate::rule::Rule;

    fn state(dir: &tempfile::TempDir) -> State {
        fs::write(dir.path().join("doc.tex"), "\\documentclass{article}").unwrap();
        State::new(
            dir.path(),
            "doc.tex",
            OptionSchema::builtin(),
            FileTypes::builtin().unwrap(),
        )
    }

    #[test]
    fn document_options_override_project_options() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dicy.toml"), "engine = \"xelatex\"\nsynctex = true\n").unwrap();
        fs::write(dir.path().join("doc.dicy.toml"), "engine = \"lualatex\"\n").unwrap();
        let mut state = state(&dir);

        for file in ["dicy.toml", "doc.dicy.toml"] {
            state.get_file(file).unwrap();
            let rule = Rule::new(
                "ParseOptionsFile",
                Command::Load,
                Phase::Initialize,
                None,
                vec![file.to_string()],
            );
            let id = rule.id.clone();
            state.add_rule(rule);
            let mut ctx = StepContext::new(&mut state, &id, BTreeSet::new()).unwrap();
            assert!(ParseOptionsFile.parse(&mut ctx).unwrap());
        }

        let apply = Rule::new("ApplyOptions", Command::Load, Phase::Finalize, None, vec![]);
        let id = apply.id.clone();
        state.add_rule(apply);
        let mut ctx = StepContext::new(&mut state, &id, BTreeSet::new()).unwrap();
        assert!(ApplyOptions.run(&mut ctx).unwrap());

        let options = state.job_options(None);
        assert_eq!(options.engine(), "lualatex");
        assert!(options.synctex());
    }

    #[test]
    fn load_options_adds_existing_option_files_as_inputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc.dicy.toml"), "synctex = true\n").unwrap();
        let mut state = state(&dir);
        let rule = Rule::new("LoadOptions", Command::Load, Phase::Initialize, None, vec![]);
        let id = rule.id.clone();
        state.add_rule(rule);

        let mut ctx = StepContext::new(&mut state, &id, BTreeSet::new()).unwrap();
        assert!(LoadOptions.run(&mut ctx).unwrap());
        assert_eq!(state.inputs_of(&id), vec!["doc.dicy.toml".to_string()]);
    }
}
