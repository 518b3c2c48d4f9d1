// src/config/schema.rs

//! Option schema: the side table mapping option name to type, enumeration,
//! default value and invalidation flag.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::options::OptionValue;

/// Key reserved for per-job override tables.
pub const JOBS_KEY: &str = "jobs";

/// Prefix marking an option that is exported to child processes as an
/// environment variable (e.g. `$TEXINPUTS`).
pub const ENV_PREFIX: char = '$';

/// Declared type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    String,
    Strings,
    Number,
    Boolean,
    /// A string or a list of strings.
    Variable,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionType::String => "string",
            OptionType::Strings => "strings",
            OptionType::Number => "number",
            OptionType::Boolean => "boolean",
            OptionType::Variable => "variable",
        };
        f.write_str(name)
    }
}

/// Schema entry for a single option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub name: String,
    pub option_type: OptionType,
    /// Allowed values; empty means unrestricted.
    pub values: Vec<String>,
    pub default: Option<OptionValue>,
    /// Changing this option does not invalidate existing rules.
    pub no_invalidate: bool,
    pub description: String,
}

impl OptionSpec {
    pub fn new(name: &str, option_type: OptionType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            option_type,
            values: Vec::new(),
            default: None,
            no_invalidate: false,
            description: description.to_string(),
        }
    }

    pub fn values(mut self, values: &[&str]) -> Self {
        self.values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn default_value(mut self, value: impl Into<OptionValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn no_invalidate(mut self) -> Self {
        self.no_invalidate = true;
        self
    }

    /// Spec used for `$`-prefixed environment options.
    fn environment(name: &str) -> Self {
        OptionSpec::new(
            name,
            OptionType::Variable,
            "Environment variable passed to external commands.",
        )
    }
}

/// The full option schema.
#[derive(Debug, Clone, Default)]
pub struct OptionSchema {
    specs: BTreeMap<String, OptionSpec>,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: OptionSpec) -> Self {
        self.specs.insert(spec.name.clone(), spec);
        self
    }

    /// Look up the spec for `name`. Environment options are accepted under
    /// any name with a synthesized `Variable` spec.
    pub fn lookup(&self, name: &str) -> Option<Cow<'_, OptionSpec>> {
        if let Some(spec) = self.specs.get(name) {
            return Some(Cow::Borrowed(spec));
        }
        if name.len() > 1 && name.starts_with(ENV_PREFIX) {
            return Some(Cow::Owned(OptionSpec::environment(name)));
        }
        None
    }

    pub fn default_of(&self, name: &str) -> Option<&OptionValue> {
        self.specs.get(name).and_then(|s| s.default.as_ref())
    }

    /// Whether changing `name` invalidates the build. Unknown names are
    /// treated as invalidating.
    pub fn invalidates(&self, name: &str) -> bool {
        self.specs.get(name).map(|s| !s.no_invalidate).unwrap_or(true)
    }

    pub fn specs(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.values()
    }

    /// Options understood by the built-in rule catalog.
    pub fn builtin() -> Self {
        OptionSchema::new()
            .with(
                OptionSpec::new("engine", OptionType::String, "Typesetting engine.")
                    .values(&["pdflatex", "xelatex", "lualatex", "latex", "uplatex", "platex"])
                    .default_value("pdflatex"),
            )
            .with(OptionSpec::new("jobName", OptionType::String, "Name of the single job."))
            .with(OptionSpec::new("jobNames", OptionType::Strings, "Names of all jobs."))
            .with(
                OptionSpec::new("outputFormat", OptionType::String, "Final output format.")
                    .values(&["dvi", "pdf", "ps"])
                    .default_value("pdf"),
            )
            .with(
                OptionSpec::new(
                    "outputDirectory",
                    OptionType::String,
                    "Directory for generated files, relative to the source.",
                )
                .default_value("."),
            )
            .with(
                OptionSpec::new("bibtexEngine", OptionType::String, "Bibliography processor.")
                    .values(&["bibtex", "bibtex8", "upbibtex", "pbibtex"])
                    .default_value("bibtex"),
            )
            .with(
                OptionSpec::new(
                    "phaseCycles",
                    OptionType::Number,
                    "Maximum discovery/evaluation cycles per phase.",
                )
                .default_value(20.0)
                .no_invalidate(),
            )
            .with(
                OptionSpec::new("severity", OptionType::String, "Minimum reported severity.")
                    .values(&["info", "warning", "error"])
                    .default_value("warning")
                    .no_invalidate(),
            )
            .with(
                OptionSpec::new("shellEscape", OptionType::String, "Shell escape mode.")
                    .values(&["disabled", "restricted", "enabled"]),
            )
            .with(
                OptionSpec::new("synctex", OptionType::Boolean, "Generate SyncTeX data.")
                    .default_value(false),
            )
            .with(
                OptionSpec::new(
                    "loadUserOptions",
                    OptionType::Boolean,
                    "Read dicy.toml and <name>.dicy.toml.",
                )
                .default_value(true)
                .no_invalidate(),
            )
            .with(
                OptionSpec::new("loadCache", OptionType::Boolean, "Load the cache file.")
                    .default_value(true)
                    .no_invalidate(),
            )
            .with(
                OptionSpec::new("saveCache", OptionType::Boolean, "Write the cache file.")
                    .default_value(true)
                    .no_invalidate(),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_options_get_a_variable_spec() {
        let schema = OptionSchema::builtin();
        let spec = schema.lookup("$TEXINPUTS").expect("env spec");
        assert_eq!(spec.option_type, OptionType::Variable);
        assert!(schema.lookup("$").is_none());
        assert!(schema.lookup("notAnOption").is_none());
    }

    #[test]
    fn no_invalidate_flag_is_reported() {
        let schema = OptionSchema::builtin();
        assert!(!schema.invalidates("phaseCycles"));
        assert!(schema.invalidates("engine"));
        assert!(schema.invalidates("$TEXINPUTS"));
    }
}
