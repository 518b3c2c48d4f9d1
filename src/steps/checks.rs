// src/steps/checks.rs

//! End-of-build sanity checks.

use tracing::error;

use crate::errors::Result;
use crate::rule::{StepContext, StepDescriptor, StepType};
use crate::types::{Command, Phase};

/// Fails when nothing knows how to build the main source.
#[derive(Debug, Default)]
pub struct CheckForMissingBuildRule;

impl StepType for CheckForMissingBuildRule {
    fn name(&self) -> &str {
        "CheckForMissingBuildRule"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Build], &[Phase::Finalize])
    }

    fn always_evaluate(&self) -> bool {
        true
    }

    fn ignore_job_name(&self) -> bool {
        true
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let source = ctx.main_source().to_string();
        let state = ctx.state();
        let found = state.dependents_of(&source).iter().any(|id| {
            state
                .rule(id)
                .is_some_and(|r| r.matches(Command::Build, Phase::Execute))
        });
        if !found {
            error!(file = %source, "no build rule for the main source");
        }
        Ok(found)
    }
}

/// Fails when a job produced no deliverable, or a deliverable is missing
/// on disk.
#[derive(Debug, Default)]
pub struct CheckForOutput;

impl StepType for CheckForOutput {
    fn name(&self) -> &str {
        "CheckForOutput"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Build], &[Phase::Finalize])
    }

    fn always_evaluate(&self) -> bool {
        true
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let job = ctx.job_name().map(str::to_string);
        let state = ctx.state();
        let targets = state.targets_for(job.as_deref());
        if targets.is_empty() {
            error!(job = ?job, "no output produced");
            return Ok(false);
        }
        let missing: Vec<&String> = targets
            .iter()
            .filter(|key| {
                state
                    .file(key)
                    .is_some_and(|f| !f.is_virtual && !f.real_file_path.is_file())
            })
            .collect();
        for key in &missing {
            error!(job = ?job, file = %key, "output is missing");
        }
        Ok(missing.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    use crate::config::OptionSchema;
    use crate::graph::{FileTypes, State};
    use crate::rule::Rule;
    use crate::types::DependencyType;

    fn state(dir: &tempfile::TempDir) -> State {
        fs::write(dir.path().join("doc.tex"), "\\documentclass{article}").unwrap();
        let mut state = State::new(
            dir.path(),
            "doc.tex",
            OptionSchema::builtin(),
            FileTypes::builtin().unwrap(),
        );
        state.get_file("doc.tex").unwrap();
        state
    }

    fn add(state: &mut State, rule: Rule) -> String {
        let id = rule.id.clone();
        state.add_rule(rule);
        id
    }

    #[test]
    fn missing_build_rule_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        let check = add(
            &mut state,
            Rule::new("CheckForMissingBuildRule", Command::Build, Phase::Finalize, None, vec![]),
        );
        let mut ctx = StepContext::new(&mut state, &check, BTreeSet::new()).unwrap();
        assert!(!CheckForMissingBuildRule.run(&mut ctx).unwrap());

        add(
            &mut state,
            Rule::new(
                "LaTeX",
                Command::Build,
                Phase::Execute,
                None,
                vec!["doc.tex".to_string()],
            ),
        );
        let mut ctx = StepContext::new(&mut state, &check, BTreeSet::new()).unwrap();
        assert!(CheckForMissingBuildRule.run(&mut ctx).unwrap());
    }

    #[test]
    fn output_check_follows_targets_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        let build = add(
            &mut state,
            Rule::new(
                "LaTeX",
                Command::Build,
                Phase::Execute,
                None,
                vec!["doc.tex".to_string()],
            ),
        );
        let check = add(
            &mut state,
            Rule::new("CheckForOutput", Command::Build, Phase::Finalize, None, vec![]),
        );

        let mut ctx = StepContext::new(&mut state, &check, BTreeSet::new()).unwrap();
        assert!(!CheckForOutput.run(&mut ctx).unwrap());

        fs::write(dir.path().join("doc.pdf"), "%PDF-1.5").unwrap();
        assert!(state.add_output(&build, "doc.pdf", DependencyType::Target));
        let mut ctx = StepContext::new(&mut state, &check, BTreeSet::new()).unwrap();
        assert!(CheckForOutput.run(&mut ctx).unwrap());

        fs::remove_file(dir.path().join("doc.pdf")).unwrap();
        let mut ctx = StepContext::new(&mut state, &check, BTreeSet::new()).unwrap();
        assert!(!CheckForOutput.run(&mut ctx).unwrap());
    }
}
