// src/engine/scheduler.rs

//! Serial evaluation order for the rules owing one action.
//!
//! Rules are grouped by weakly connected component. Inside a component only
//! the most upstream rules are kept: those with the fewest other pending
//! rules among their two-hop producers. Ties are broken by ascending input
//! count. Components run in ascending order of how many parameters bind the
//! main source, so side work comes before work on the root document.
//!
//! Rules dropped here stay pending and are picked up by a later cycle.

use std::collections::BTreeSet;

use crate::graph::State;

/// Order `candidates` for sequential evaluation. Deterministic for a given
/// graph.
pub fn evaluation_order(state: &State, candidates: &[String]) -> Vec<String> {
    let pending: BTreeSet<&str> = candidates.iter().map(String::as_str).collect();

    let mut groups: Vec<(usize, Vec<String>)> = Vec::new();
    for component in state.weakly_connected_components() {
        let members: Vec<&String> = component
            .iter()
            .filter(|id| pending.contains(id.as_str()))
            .collect();
        if members.is_empty() {
            continue;
        }

        let ranked: Vec<(usize, &String)> = members
            .iter()
            .map(|&id| {
                let rank = members
                    .iter()
                    .filter(|&&other| other != id && state.is_grandparent_of(other, id))
                    .count();
                (rank, id)
            })
            .collect();
        let Some(min_rank) = ranked.iter().map(|(rank, _)| *rank).min() else {
            continue;
        };

        let mut retained: Vec<String> = ranked
            .into_iter()
            .filter(|(rank, _)| *rank == min_rank)
            .map(|(_, id)| id.clone())
            .collect();
        retained.sort_by_key(|id| state.inputs_of(id).len());

        groups.push((primary_count(state, &members), retained));
    }

    groups.sort_by_key(|(primary, _)| *primary);
    groups.into_iter().flat_map(|(_, ids)| ids).collect()
}

/// Number of parameters across `rules` bound to the main source.
fn primary_count(state: &State, rules: &[&String]) -> usize {
    let main = state.file_path();
    rules
        .iter()
        .filter_map(|id| state.rule(id))
        .flat_map(|rule| rule.parameters.iter())
        .filter(|p| p.as_str() == main)
        .count()
}
