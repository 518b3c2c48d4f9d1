// src/cache/snapshot.rs

//! On-disk projection of the graph.

use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::OptionSet;
use crate::graph::State;
use crate::types::{Command, DependencyType, JobName, Phase};

/// Format version written by this build.
pub const CACHE_VERSION: &str = "1.0.0";

/// Same major component as [`CACHE_VERSION`].
pub fn is_compatible(version: &str) -> bool {
    major(version).is_some_and(|m| Some(m) == major(CACHE_VERSION))
}

fn major(version: &str) -> Option<u64> {
    version.split('.').next()?.trim().parse().ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    #[serde(default)]
    pub version: Option<String>,
    pub file_path: String,
    #[serde(default)]
    pub options: OptionSet,
    #[serde(default)]
    pub files: BTreeMap<String, CachedFile>,
    #[serde(default)]
    pub rules: Vec<CachedRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFile {
    #[serde(default)]
    pub timestamp: Option<SystemTime>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, rename = "type")]
    pub file_type: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub job_names: BTreeSet<JobName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRule {
    pub name: String,
    pub command: Command,
    pub phase: Phase,
    #[serde(default)]
    pub job_name: JobName,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<CachedEdge>,
    #[serde(default)]
    pub outputs: Vec<CachedEdge>,
    /// Inputs declared before their file existed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub awaiting: Vec<CachedEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEdge {
    pub file: String,
    #[serde(default)]
    pub dependency: DependencyType,
}

impl CacheSnapshot {
    /// Walk the whole graph.
    pub fn capture(state: &State) -> Self {
        let files = state
            .files()
            .map(|f| {
                (
                    f.file_path.clone(),
                    CachedFile {
                        timestamp: f.timestamp,
                        hash: f.hash.clone(),
                        file_type: f.file_type.clone(),
                        sub_type: f.sub_type.clone(),
                        is_virtual: f.is_virtual,
                        value: f.value.clone(),
                        job_names: f.job_names.clone(),
                    },
                )
            })
            .collect();

        let edges = |list: Vec<(String, DependencyType)>| -> Vec<CachedEdge> {
            list.into_iter()
                .map(|(file, dependency)| CachedEdge { file, dependency })
                .collect()
        };
        let rules = state
            .rules()
            .map(|r| CachedRule {
                name: r.type_name.clone(),
                command: r.command,
                phase: r.phase,
                job_name: r.job_name.clone(),
                parameters: r.parameters.clone(),
                inputs: edges(state.input_edges(&r.id)),
                outputs: edges(state.output_edges(&r.id)),
                awaiting: edges(state.awaited_inputs(&r.id)),
            })
            .collect();

        Self {
            version: Some(CACHE_VERSION.to_string()),
            file_path: state.file_path().to_string(),
            options: state.options().clone(),
            files,
            rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_version_decides_compatibility() {
        assert!(is_compatible("1.0.0"));
        assert!(is_compatible("1.7.2"));
        assert!(!is_compatible("2.0.0"));
        assert!(!is_compatible("one"));
    }

    #[test]
    fn missing_version_deserializes_as_none() {
        let snapshot: CacheSnapshot = serde_json::from_str(r#"{"filePath":"doc.tex"}"#).unwrap();
        assert_eq!(snapshot.version, None);
        assert!(snapshot.rules.is_empty());
    }
}
