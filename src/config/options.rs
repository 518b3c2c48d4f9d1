// src/config/options.rs

//! Option values and the option set (global values plus per-job overrides).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::schema::{JOBS_KEY, OptionSchema};
use crate::config::validate::coerce;

/// A single option value. Serialized untagged so option files and the cache
/// read naturally (`engine = "xelatex"`, `jobNames = ["a", "b"]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    Number(f64),
    String(String),
    Strings(Vec<String>),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Strings view: a lone string reads as a one-element list.
    pub fn as_strings(&self) -> Option<Vec<String>> {
        match self {
            OptionValue::String(s) => Some(vec![s.clone()]),
            OptionValue::Strings(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Boolean(_) => "boolean",
            OptionValue::Number(_) => "number",
            OptionValue::String(_) => "string",
            OptionValue::Strings(_) => "strings",
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Boolean(b) => write!(f, "{b}"),
            OptionValue::Number(n) => write!(f, "{n}"),
            OptionValue::String(s) => f.write_str(s),
            OptionValue::Strings(v) => f.write_str(&v.join(", ")),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Boolean(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::Strings(value)
    }
}

impl TryFrom<toml::Value> for OptionValue {
    type Error = String;

    fn try_from(value: toml::Value) -> Result<Self, Self::Error> {
        match value {
            toml::Value::Boolean(b) => Ok(OptionValue::Boolean(b)),
            toml::Value::Integer(i) => Ok(OptionValue::Number(i as f64)),
            toml::Value::Float(f) => Ok(OptionValue::Number(f)),
            toml::Value::String(s) => Ok(OptionValue::String(s)),
            toml::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    toml::Value::String(s) => Ok(s),
                    other => Err(format!("list items must be strings, got {}", other.type_str())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(OptionValue::Strings),
            other => Err(format!("unsupported value type {}", other.type_str())),
        }
    }
}

type OptionMap = BTreeMap<String, OptionValue>;

/// Global option values plus per-job override tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionSet {
    #[serde(default)]
    values: OptionMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    jobs: BTreeMap<String, OptionMap>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single typed setter. Rejected assignments are logged and ignored.
    /// Returns whether the value was stored.
    pub fn set(&mut self, schema: &OptionSchema, name: &str, value: OptionValue) -> bool {
        match checked(schema, name, value) {
            Some(v) => {
                self.values.insert(name.to_string(), v);
                true
            }
            None => false,
        }
    }

    /// Typed setter for a job override.
    pub fn set_job(
        &mut self,
        schema: &OptionSchema,
        job: &str,
        name: &str,
        value: OptionValue,
    ) -> bool {
        match checked(schema, name, value) {
            Some(v) => {
                self.jobs
                    .entry(job.to_string())
                    .or_default()
                    .insert(name.to_string(), v);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn job_value(&self, job: &str, name: &str) -> Option<&OptionValue> {
        self.jobs.get(job).and_then(|m| m.get(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<OptionValue> {
        self.values.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.jobs.is_empty()
    }

    /// Keys of the per-job override tables.
    pub fn job_keys(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overrides declared for `job`.
    pub fn job_iter(&self, job: &str) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.jobs
            .get(job)
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Layer `other` on top of `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &OptionSet) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
        for (job, overrides) in &other.jobs {
            let target = self.jobs.entry(job.clone()).or_default();
            for (k, v) in overrides {
                target.insert(k.clone(), v.clone());
            }
        }
    }

    /// Names of options whose value differs between `self` and `other`,
    /// globally or in any job table, and whose change invalidates the build.
    pub fn invalidating_changes(&self, other: &OptionSet, schema: &OptionSchema) -> Vec<String> {
        let mut changed = BTreeSet::new();
        diff_maps(&self.values, &other.values, &mut changed);

        let jobs: BTreeSet<&String> = self.jobs.keys().chain(other.jobs.keys()).collect();
        let empty = OptionMap::new();
        for job in jobs {
            let a = self.jobs.get(job).unwrap_or(&empty);
            let b = other.jobs.get(job).unwrap_or(&empty);
            diff_maps(a, b, &mut changed);
        }

        changed
            .into_iter()
            .filter(|name| schema.invalidates(name))
            .collect()
    }
}

fn diff_maps(a: &OptionMap, b: &OptionMap, out: &mut BTreeSet<String>) {
    for key in a.keys().chain(b.keys()) {
        if a.get(key) != b.get(key) {
            out.insert(key.clone());
        }
    }
}

fn checked(schema: &OptionSchema, name: &str, value: OptionValue) -> Option<OptionValue> {
    if name == JOBS_KEY {
        warn!(option = name, "'jobs' is reserved for per-job override tables; ignored");
        return None;
    }
    let Some(spec) = schema.lookup(name) else {
        warn!(option = name, "unknown option; ignored");
        return None;
    };
    match coerce(&spec, value) {
        Ok(v) => Some(v),
        Err(reason) => {
            warn!(option = name, %reason, "invalid option value; ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setter_rejects_without_failing() {
        let schema = OptionSchema::builtin();
        let mut set = OptionSet::new();

        assert!(!set.set(&schema, "engine", OptionValue::Number(3.0)));
        assert!(!set.set(&schema, "engine", "troff".into()));
        assert!(!set.set(&schema, "noSuchOption", true.into()));
        assert!(set.set(&schema, "engine", "xelatex".into()));

        assert_eq!(set.get("engine"), Some(&OptionValue::from("xelatex")));
    }

    #[test]
    fn lone_string_becomes_a_list() {
        let schema = OptionSchema::builtin();
        let mut set = OptionSet::new();
        assert!(set.set(&schema, "jobNames", "draft".into()));
        assert_eq!(
            set.get("jobNames"),
            Some(&OptionValue::Strings(vec!["draft".to_string()]))
        );
    }

    #[test]
    fn only_invalidating_changes_are_reported() {
        let schema = OptionSchema::builtin();
        let mut a = OptionSet::new();
        a.set(&schema, "phaseCycles", 5.0.into());
        let mut b = a.clone();
        b.set(&schema, "phaseCycles", 7.0.into());
        assert!(a.invalidating_changes(&b, &schema).is_empty());

        b.set_job(&schema, "draft", "engine", "lualatex".into());
        assert_eq!(a.invalidating_changes(&b, &schema), vec!["engine".to_string()]);
    }

    #[test]
    fn serde_shape_is_plain() {
        let schema = OptionSchema::builtin();
        let mut set = OptionSet::new();
        set.set(&schema, "synctex", true.into());
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json, serde_json::json!({ "values": { "synctex": true } }));
        let back: OptionSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }
}
