// src/engine/invalidation.rs

//! Incremental invalidation: turn artifact changes into pending actions.
//!
//! A rule's "last output" time is the newest timestamp among its physical
//! outputs; virtual outputs never count towards it. A changed input, virtual
//! or physical, is compared against that time. Virtual payloads carry the
//! system clock at assignment and file mtimes come from the same clock on a
//! local filesystem, so the comparison holds for both.

use std::time::SystemTime;

use tracing::trace;

use crate::graph::State;
use crate::rule::RuleCatalog;
use crate::types::{Action, Command, Phase};

/// Newest timestamp among the rule's physical outputs; `None` if it has not
/// produced any.
pub fn rule_timestamp(state: &State, rule_id: &str) -> Option<SystemTime> {
    state
        .outputs_of(rule_id)
        .iter()
        .filter_map(|key| state.file(key))
        .filter(|f| !f.is_virtual)
        .filter_map(|f| f.timestamp)
        .max()
}

/// Arm the actions `rule_id` owes for a change of `file_key`.
///
/// Actions are armed when the rule never produced output or its output
/// predates the artifact. `updateDependencies` is armed regardless. Arming
/// clears an earlier failure of the same action. Returns whether anything was
/// armed.
pub fn add_file_actions(
    state: &mut State,
    catalog: &RuleCatalog,
    rule_id: &str,
    file_key: &str,
) -> bool {
    let (Some(rule), Some(file)) = (state.rule(rule_id), state.file(file_key)) else {
        return false;
    };
    let Some(step) = catalog.get(&rule.type_name) else {
        return false;
    };
    if state.outputs_of(rule_id).iter().any(|o| o == file_key) {
        return false;
    }

    let actions = step.actions_for(rule, file);
    let stale = match (rule_timestamp(state, rule_id), file.timestamp) {
        (Some(produced), Some(changed)) => changed > produced,
        _ => true,
    };

    let Some(rule) = state.rule_mut(rule_id) else {
        return false;
    };
    let mut armed = false;
    for action in actions {
        if stale || action == Action::UpdateDependencies {
            trace!(rule = %rule_id, file = %file_key, %action, "armed");
            rule.add_action(action, Some(file_key));
            armed = true;
        }
    }
    armed
}

/// Run the invalidation pass over every artifact updated since the last
/// pass. With a `filter`, only rules of that command/phase are armed.
///
/// Consumes the per-pass updated flag; the per-build flag is kept.
pub fn check_updates(state: &mut State, catalog: &RuleCatalog, filter: Option<(Command, Phase)>) {
    let updated: Vec<String> = state
        .files()
        .filter(|f| f.has_been_updated)
        .map(|f| f.file_path.clone())
        .collect();

    for key in updated {
        for rule_id in state.dependents_of(&key) {
            let in_scope = match (filter, state.rule(&rule_id)) {
                (Some((command, phase)), Some(rule)) => rule.matches(command, phase),
                (None, Some(_)) => true,
                (_, None) => false,
            };
            if in_scope {
                add_file_actions(state, catalog, &rule_id, &key);
            }
        }
        if let Some(file) = state.file_mut(&key) {
            file.has_been_updated = false;
        }
    }
}
