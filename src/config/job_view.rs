// src/config/job_view.rs

//! Per-job read view over the option set.
//!
//! Lookup order: the job's override table, then the global value, then the
//! schema default.

use std::collections::BTreeSet;

use crate::config::options::{OptionSet, OptionValue};
use crate::config::schema::{ENV_PREFIX, OptionSchema};
use crate::types::{JobName, Severity};

#[derive(Debug, Clone, Copy)]
pub struct JobOptions<'a> {
    options: &'a OptionSet,
    schema: &'a OptionSchema,
    job_name: Option<&'a str>,
}

impl<'a> JobOptions<'a> {
    pub fn new(options: &'a OptionSet, schema: &'a OptionSchema, job_name: Option<&'a str>) -> Self {
        Self {
            options,
            schema,
            job_name,
        }
    }

    pub fn job_name(&self) -> Option<&'a str> {
        self.job_name
    }

    pub fn get(&self, name: &str) -> Option<&'a OptionValue> {
        self.job_name
            .and_then(|job| self.options.job_value(job, name))
            .or_else(|| self.options.get(name))
            .or_else(|| self.schema.default_of(name))
    }

    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(OptionValue::as_str)
    }

    pub fn get_strings(&self, name: &str) -> Vec<String> {
        self.get(name)
            .and_then(OptionValue::as_strings)
            .unwrap_or_default()
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).and_then(OptionValue::as_bool).unwrap_or(false)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(OptionValue::as_number)
    }

    /// Active job names: `jobNames`, else the keys of `jobs`, else `jobName`,
    /// else a single unnamed job.
    pub fn job_names(&self) -> Vec<JobName> {
        if let Some(names) = self.options.get("jobNames").and_then(OptionValue::as_strings) {
            if !names.is_empty() {
                return dedup(names);
            }
        }
        let keys: Vec<String> = self.options.job_keys().map(str::to_string).collect();
        if !keys.is_empty() {
            return dedup(keys);
        }
        if let Some(name) = self.options.get("jobName").and_then(OptionValue::as_str) {
            return vec![Some(name.to_string())];
        }
        vec![None]
    }

    pub fn engine(&self) -> &'a str {
        self.get_str("engine").unwrap_or("pdflatex")
    }

    pub fn bibtex_engine(&self) -> &'a str {
        self.get_str("bibtexEngine").unwrap_or("bibtex")
    }

    pub fn output_format(&self) -> &'a str {
        self.get_str("outputFormat").unwrap_or("pdf")
    }

    pub fn output_directory(&self) -> &'a str {
        self.get_str("outputDirectory").unwrap_or(".")
    }

    pub fn shell_escape(&self) -> Option<&'a str> {
        self.get_str("shellEscape")
    }

    pub fn synctex(&self) -> bool {
        self.get_bool("synctex")
    }

    pub fn phase_cycles(&self) -> usize {
        self.get_number("phaseCycles")
            .filter(|n| n.is_finite() && *n >= 1.0)
            .map(|n| n as usize)
            .unwrap_or(20)
    }

    pub fn severity(&self) -> Severity {
        self.get_str("severity")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn load_user_options(&self) -> bool {
        self.get("loadUserOptions")
            .and_then(OptionValue::as_bool)
            .unwrap_or(true)
    }

    pub fn load_cache(&self) -> bool {
        self.get("loadCache").and_then(OptionValue::as_bool).unwrap_or(true)
    }

    pub fn save_cache(&self) -> bool {
        self.get("saveCache").and_then(OptionValue::as_bool).unwrap_or(true)
    }

    /// `$`-prefixed options visible to this job, with the prefix stripped.
    pub fn env_options(&self) -> Vec<(String, OptionValue)> {
        let mut names: BTreeSet<&str> = self
            .options
            .iter()
            .map(|(k, _)| k)
            .filter(|k| k.starts_with(ENV_PREFIX))
            .collect();
        if let Some(job) = self.job_name {
            names.extend(
                self.options
                    .job_iter(job)
                    .map(|(k, _)| k)
                    .filter(|k| k.starts_with(ENV_PREFIX)),
            );
        }
        names
            .into_iter()
            .filter_map(|name| {
                let value = self.get(name)?;
                Some((name.trim_start_matches(ENV_PREFIX).to_string(), value.clone()))
            })
            .collect()
    }
}

fn dedup(names: Vec<String>) -> Vec<JobName> {
    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .filter(|n| seen.insert(n.clone()))
        .map(Some)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_override_then_global_then_default() {
        let schema = OptionSchema::builtin();
        let mut set = OptionSet::new();
        set.set(&schema, "engine", "xelatex".into());
        set.set_job(&schema, "draft", "engine", "lualatex".into());

        let draft = JobOptions::new(&set, &schema, Some("draft"));
        let other = JobOptions::new(&set, &schema, Some("final"));
        let none = JobOptions::new(&set, &schema, None);

        assert_eq!(draft.engine(), "lualatex");
        assert_eq!(other.engine(), "xelatex");
        assert_eq!(none.output_format(), "pdf");
        assert_eq!(none.phase_cycles(), 20);
    }

    #[test]
    fn job_names_precedence() {
        let schema = OptionSchema::builtin();
        let mut set = OptionSet::new();
        assert_eq!(JobOptions::new(&set, &schema, None).job_names(), vec![None]);

        set.set(&schema, "jobName", "single".into());
        assert_eq!(
            JobOptions::new(&set, &schema, None).job_names(),
            vec![Some("single".to_string())]
        );

        set.set_job(&schema, "b", "synctex", true.into());
        set.set_job(&schema, "a", "synctex", true.into());
        assert_eq!(
            JobOptions::new(&set, &schema, None).job_names(),
            vec![Some("a".to_string()), Some("b".to_string())]
        );

        set.set(&schema, "jobNames", vec!["z".to_string(), "z".to_string()].into());
        assert_eq!(
            JobOptions::new(&set, &schema, None).job_names(),
            vec![Some("z".to_string())]
        );
    }

    #[test]
    fn env_options_strip_the_prefix_and_honour_overrides() {
        let schema = OptionSchema::builtin();
        let mut set = OptionSet::new();
        set.set(&schema, "$TEXINPUTS", "styles".into());
        set.set_job(&schema, "draft", "$BIBINPUTS", "refs".into());

        let draft = JobOptions::new(&set, &schema, Some("draft")).env_options();
        assert_eq!(
            draft,
            vec![
                ("BIBINPUTS".to_string(), OptionValue::from("refs")),
                ("TEXINPUTS".to_string(), OptionValue::from("styles")),
            ]
        );
        assert_eq!(JobOptions::new(&set, &schema, None).env_options().len(), 1);
    }
}
