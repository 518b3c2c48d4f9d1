// src/steps/graph_dot.rs

//! Graphviz dump of the dependency graph.

use std::fs;

use tracing::info;

use crate::errors::Result;
use crate::rule::{StepContext, StepDescriptor, StepType};
use crate::types::{Command, DependencyType, Phase};

#[derive(Debug, Default)]
pub struct GraphDot;

impl StepType for GraphDot {
    fn name(&self) -> &str {
        "GraphDot"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Graph], &[Phase::Execute])
    }

    fn always_evaluate(&self) -> bool {
        true
    }

    fn run(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let key = ctx.resolve("$OUTDIR/$JOB-graph.dot");
        let path = ctx.state().root().join(&key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, ctx.state().to_dot())?;
        ctx.add_output(&key, DependencyType::Target);
        info!(file = %key, "graph written");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::config::OptionSchema;
    use crate::graph::{FileTypes, State};
    use crate::rule::Rule;

    #[test]
    fn writes_dot_file_as_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc.tex"), "\\documentclass{article}").unwrap();
        let mut state = State::new(
            dir.path(),
            "doc.tex",
            OptionSchema::builtin(),
            FileTypes::builtin().unwrap(),
        );
        state.get_file("doc.tex").unwrap();
        let rule = Rule::new("GraphDot", Command::Graph, Phase::Execute, None, vec![]);
        let id = rule.id.clone();
        state.add_rule(rule);

        let mut ctx = StepContext::new(&mut state, &id, BTreeSet::new()).unwrap();
        assert!(GraphDot.run(&mut ctx).unwrap());

        let dot = fs::read_to_string(dir.path().join("doc-graph.dot")).unwrap();
        assert!(dot.starts_with("digraph"));
        assert_eq!(state.outputs_of(&id), vec!["doc-graph.dot".to_string()]);
        assert_eq!(state.file("doc-graph.dot").unwrap().file_type.as_deref(), Some("GraphvizDot"));
    }
}
