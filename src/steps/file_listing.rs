// src/steps/file_listing.rs

//! Recorder file listing (`-recorder` `.fls`) parsing.
//!
//! Only paths inside the project are kept. A file the run both read and
//! wrote (the `.aux` file, typically) is reported as an output only, so the
//! typesetting rule does not depend on its own product.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::json;

use crate::errors::Result;
use crate::graph::paths::project_key;
use crate::rule::{StepContext, StepDescriptor, StepType};
use crate::types::{Action, Command, Phase};

pub const PARSED_LISTING_SUFFIX: &str = "-ParsedLaTeXFileListing";

/// Inputs and outputs recorded in `text`, as project keys.
///
/// Relative entries are taken relative to `cwd`, a project key.
pub fn parse_listing(text: &str, root: &Path, cwd: &str) -> (Vec<String>, Vec<String>) {
    let mut inputs = BTreeSet::new();
    let mut outputs = BTreeSet::new();
    for line in text.lines() {
        let (set, path) = if let Some(path) = line.strip_prefix("INPUT ") {
            (&mut inputs, path)
        } else if let Some(path) = line.strip_prefix("OUTPUT ") {
            (&mut outputs, path)
        } else {
            continue;
        };
        if let Some(key) = project_key(root, cwd, path) {
            set.insert(key);
        }
    }
    let inputs = inputs.difference(&outputs).cloned().collect();
    (inputs, outputs.into_iter().collect())
}

#[derive(Debug, Default)]
pub struct ParseLaTeXFileListing;

impl StepType for ParseLaTeXFileListing {
    fn name(&self) -> &str {
        "ParseLaTeXFileListing"
    }

    fn descriptor(&self) -> StepDescriptor {
        StepDescriptor::new(&[Command::Build], &[Phase::Execute]).parameter(&["LaTeXFileListing"])
    }

    fn default_actions(&self) -> Vec<Action> {
        vec![Action::Parse]
    }

    fn parse(&self, ctx: &mut StepContext<'_>) -> Result<bool> {
        let Some(listing) = ctx.parameters().first().cloned() else {
            return Ok(false);
        };
        let text = ctx.read_to_string(&listing)?;
        let cwd = ctx.resolve("$DIR");
        let (inputs, outputs) = parse_listing(&text, ctx.state().root(), &cwd);
        ctx.set_output_value(
            &format!("{listing}{PARSED_LISTING_SUFFIX}"),
            json!({ "inputs": inputs, "outputs": outputs }),
        );
        Ok(true)
    }
}
