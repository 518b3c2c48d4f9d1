// src/steps/clean.rs

//! Removal of generated files.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::errors::Result;
use crate::rule::{StepContext, StepDescriptor, StepType};
use crate::types::{Command, DependencyType, Phase};

/// `clean` deletes the job's intermediate files; `scrub` deletes its
/// deliverables as well. The rules that produced them are dropped so the
/// next build starts from scratch.
#[derive(Debug, Default)]
pub struct Clean;

impl StepType for Clean {
    fn name(&self) -> &str {
        "Clean"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Clean, Command::Scrub], &[Phase::Execute])
    }

    fn always_evaluate(&self) -> bool {
        true
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let keep_targets = ctx.command() == Command::Clean;
        let job = ctx.job_name().map(str::to_string);
        let main = ctx.main_source().to_string();

        let mut doomed = BTreeSet::new();
        let mut producers = BTreeSet::new();
        {
            let state = ctx.state();
            for rule in state.rules() {
                if rule.command != Command::Build || rule.job_name != job {
                    continue;
                }
                for (key, dependency) in state.output_edges(&rule.id) {
                    if key == main || (keep_targets && dependency == DependencyType::Target) {
                        continue;
                    }
                    if state.file(&key).is_some_and(|f| f.is_virtual || f.read_only) {
                        continue;
                    }
                    doomed.insert(key);
                    producers.insert(rule.id.clone());
                }
            }
        }

        let mut deleted = 0usize;
        for key in &doomed {
            if ctx.delete_file(key, true)? {
                deleted += 1;
            }
        }
        for id in &producers {
            ctx.remove_rule(id);
            debug!(rule = %id, "rule dropped");
        }
        info!(job = ?job, files = deleted, "cleaned");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::config::OptionSchema;
    use crate::graph::{FileTypes, State};
    use crate::rule::Rule;

    fn setup(command: Command) -> (tempfile::TempDir, State, String, String) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [
            ("doc.tex", "\\documentclass{article}"),
            ("doc.aux", "\\relax"),
            ("doc.log", "This is pdfTeX, Version 3.14"),
            ("doc.pdf", "%PDF-1.5"),
        ] {
            fs::write(dir.path().join(name), body).unwrap();
        }
        let mut state = State::new(
            dir.path(),
            "doc.tex",
            OptionSchema::builtin(),
            FileTypes::builtin().unwrap(),
        );
        state.get_file("doc.tex").unwrap();
        let build = Rule::new(
            "LaTeX",
            Command::Build,
            Phase::Execute,
            None,
            vec!["doc.tex".to_string()],
        );
        let build_id = build.id.clone();
        state.add_rule(build);
        state.add_output(&build_id, "doc.aux", DependencyType::Default);
        state.add_output(&build_id, "doc.log", DependencyType::Default);
        state.add_output(&build_id, "doc.pdf", DependencyType::Target);

        let clean = Rule::new("Clean", command, Phase::Execute, None, vec![]);
        let clean_id = clean.id.clone();
        state.add_rule(clean);
        (dir, state, build_id, clean_id)
    }

    #[test]
    fn clean_keeps_targets_and_sources() {
        let (dir, mut state, build_id, clean_id) = setup(Command::Clean);
        let mut ctx = StepContext::new(&mut state, &clean_id, BTreeSet::new()).unwrap();
        assert!(Clean.run(&mut ctx).unwrap());

        assert!(!dir.path().join("doc.aux").exists());
        assert!(!dir.path().join("doc.log").exists());
        assert!(dir.path().join("doc.pdf").exists());
        assert!(dir.path().join("doc.tex").exists());
        assert!(!state.has_rule(&build_id));
        assert!(state.has_rule(&clean_id));
    }

    #[test]
    fn scrub_removes_targets_too() {
        let (dir, mut state, _build_id, clean_id) = setup(Command::Scrub);
        let mut ctx = StepContext::new(&mut state, &clean_id, BTreeSet::new()).unwrap();
        assert!(Clean.run(&mut ctx).unwrap());

        assert!(!dir.path().join("doc.pdf").exists());
        assert!(dir.path().join("doc.tex").exists());
        assert!(state.file("doc.pdf").is_none());
    }
}
