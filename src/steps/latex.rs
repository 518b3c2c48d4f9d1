// src/steps/latex.rs

//! The typesetting engine run on the main source.

use crate::errors::Result;
use crate::exec::{CommandSpec, ProcessOutput};
use crate::graph::File;
use crate::rule::{ApplicabilityContext, Rule, StepContext, StepDescriptor, StepType};
use crate::steps::file_listing::PARSED_LISTING_SUFFIX;
use crate::steps::latex_log::PARSED_LOG_SUFFIX;
use crate::types::{Action, Command, DependencyType, Phase, Severity};

#[derive(Debug, Default)]
pub struct LaTeX;

impl LaTeX {
    fn artifact(ctx: &StepContext<'_>, ext: &str) -> String {
        ctx.resolve(&format!("$OUTDIR/$JOB.{ext}"))
    }
}

impl StepType for LaTeX {
    fn name(&self) -> &str {
        "LaTeX"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Build], &[Phase::Execute]).parameter(&["LaTeX"])
    }

    fn is_applicable(&self, ctx: &ApplicabilityContext<'_>) -> bool {
        ctx.parameters
            .first()
            .is_some_and(|source| ctx.is_main_source(source))
    }

    /// The parsed log and file listing feed back into this rule.
    fn initialize(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let log = format!("{}{PARSED_LOG_SUFFIX}", Self::artifact(ctx, "log"));
        let fls = format!("{}{PARSED_LISTING_SUFFIX}", Self::artifact(ctx, "fls"));
        ctx.add_input(&log, DependencyType::Default);
        ctx.add_input(&fls, DependencyType::Default);
        Ok(())
    }

    fn actions_for(&self, _rule: &Rule, file: &File) -> Vec<Action> {
        match file.file_type.as_deref() {
            Some("ParsedLaTeXLog") => {
                let rerun = file
                    .value
                    .as_ref()
                    .and_then(|v| v.get("rerun"))
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if rerun {
                    vec![Action::UpdateDependencies, Action::Run]
                } else {
                    vec![Action::UpdateDependencies]
                }
            }
            Some("ParsedLaTeXFileListing") => vec![Action::UpdateDependencies],
            _ => vec![Action::Run],
        }
    }

    fn construct_command(&self, ctx: &StepContext<'_>) -> Result<Option<CommandSpec>> {
        let options = ctx.options();
        let Some(source) = ctx.parameter(0) else {
            return Ok(None);
        };

        let mut args = vec![
            options.engine().to_string(),
            "-file-line-error".to_string(),
            "-interaction=batchmode".to_string(),
            "-recorder".to_string(),
        ];
        if let Some(job) = ctx.job_name() {
            args.push(format!("-jobname={job}"));
        }
        let outdir = options.output_directory();
        if outdir != "." {
            args.push(format!("-output-directory={outdir}"));
        }
        let dvi = matches!(options.output_format(), "dvi" | "ps");
        if dvi {
            args.push("-output-format=dvi".to_string());
        }
        if options.synctex() {
            args.push("-synctex=1".to_string());
        }
        match options.shell_escape() {
            Some("enabled") => args.push("-shell-escape".to_string()),
            Some("disabled") => args.push("-no-shell-escape".to_string()),
            Some("restricted") => args.push("-shell-restricted".to_string()),
            _ => {}
        }
        args.push(source.file_name().to_string());

        let target_ext = if dvi { "dvi" } else { "pdf" };
        let spec = CommandSpec::argv(args)
            .cwd(ctx.resolve("$DIR"))
            .severity(Severity::Error)
            .output(Self::artifact(ctx, "log"))
            .output(Self::artifact(ctx, "fls"))
            .output(Self::artifact(ctx, "aux"))
            .target(Self::artifact(ctx, target_ext));
        Ok(Some(spec))
    }

    fn process_output(&self, _ctx: &mut StepContext<'_>, _output: &ProcessOutput) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    use serde_json::json;

    use crate::config::{OptionSchema, OptionSet};
    use crate::exec::CommandLine;
    use crate::graph::{FileTypes, State};

    fn setup(options: OptionSet, job: Option<&str>) -> (tempfile::TempDir, State, String) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc.tex"), "\\documentclass{article}").unwrap();
        let mut state = State::new(
            dir.path(),
            "doc.tex",
            OptionSchema::builtin(),
            FileTypes::builtin().unwrap(),
        );
        state.set_instance_options(options);
        state.get_file("doc.tex").unwrap();
        let rule = Rule::new(
            "LaTeX",
            Command::Build,
            Phase::Execute,
            job.map(str::to_string),
            vec!["doc.tex".to_string()],
        );
        let id = rule.id.clone();
        state.add_rule(rule);
        (dir, state, id)
    }

    #[test]
    fn command_line_follows_options() {
        let schema = OptionSchema::builtin();
        let mut options = OptionSet::new();
        options.set(&schema, "engine", "xelatex".into());
        options.set(&schema, "synctex", true.into());
        options.set(&schema, "outputDirectory", "out".into());
        let (_dir, mut state, id) = setup(options, Some("draft"));

        let ctx = StepContext::new(&mut state, &id, BTreeSet::new()).unwrap();
        let spec = LaTeX.construct_command(&ctx).unwrap().unwrap();
        let CommandLine::Argv(args) = &spec.command else {
            panic!("expected argv");
        };
        assert_eq!(args[0], "xelatex");
        assert!(args.contains(&"-jobname=draft".to_string()));
        assert!(args.contains(&"-output-directory=out".to_string()));
        assert!(args.contains(&"-synctex=1".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("doc.tex"));
        assert!(spec
            .outputs
            .contains(&("out/draft.pdf".to_string(), DependencyType::Target)));
    }

    #[test]
    fn parsed_log_with_rerun_notice_rearms_run() {
        let (_dir, mut state, id) = setup(OptionSet::new(), None);
        let mut ctx = StepContext::new(&mut state, &id, BTreeSet::new()).unwrap();
        LaTeX.initialize(&mut ctx).unwrap();
        assert_eq!(
            state.inputs_of(&id),
            vec![
                "doc.fls-ParsedLaTeXFileListing".to_string(),
                "doc.log-ParsedLaTeXLog".to_string(),
                "doc.tex".to_string(),
            ]
        );

        state.set_file_value("doc.log-ParsedLaTeXLog", json!({"rerun": true}));
        let rule = state.rule(&id).unwrap();
        let log = state.file("doc.log-ParsedLaTeXLog").unwrap();
        assert_eq!(
            LaTeX.actions_for(rule, log),
            vec![Action::UpdateDependencies, Action::Run]
        );
        let listing = state.file("doc.fls-ParsedLaTeXFileListing").unwrap();
        assert_eq!(LaTeX.actions_for(rule, listing), vec![Action::UpdateDependencies]);
        let source = state.file("doc.tex").unwrap();
        assert_eq!(LaTeX.actions_for(rule, source), vec![Action::Run]);
    }
}
