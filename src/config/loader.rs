// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::config::options::{OptionSet, OptionValue};
use crate::config::schema::{JOBS_KEY, OptionSchema};
use crate::errors::{DicyError, Result};

/// Read an option file written in TOML.
///
/// Only a syntactically broken file is an error. Individual entries go
/// through the typed setter, so bad values are warned about and dropped.
pub fn load_from_path(schema: &OptionSchema, path: impl AsRef<Path>) -> Result<OptionSet> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(schema, &contents)
}

/// Parse TOML option text.
///
/// ```toml
/// engine = "xelatex"
/// "$TEXINPUTS" = ["styles", ""]
///
/// [jobs.draft]
/// synctex = true
/// ```
pub fn load_from_str(schema: &OptionSchema, contents: &str) -> Result<OptionSet> {
    let table: toml::Table = toml::from_str(contents)?;
    let mut options = OptionSet::new();

    for (name, value) in table {
        if name == JOBS_KEY {
            load_jobs(schema, &mut options, value);
            continue;
        }
        match OptionValue::try_from(value) {
            Ok(v) => {
                options.set(schema, &name, v);
            }
            Err(reason) => warn!(option = %name, %reason, "invalid option value; ignored"),
        }
    }

    Ok(options)
}

fn load_jobs(schema: &OptionSchema, options: &mut OptionSet, value: toml::Value) {
    let toml::Value::Table(jobs) = value else {
        warn!("'jobs' must be a table of per-job tables; ignored");
        return;
    };
    for (job, overrides) in jobs {
        let toml::Value::Table(overrides) = overrides else {
            warn!(job = %job, "job overrides must be a table; ignored");
            continue;
        };
        for (name, value) in overrides {
            match OptionValue::try_from(value) {
                Ok(v) => {
                    options.set_job(schema, &job, &name, v);
                }
                Err(reason) => {
                    warn!(job = %job, option = %name, %reason, "invalid option value; ignored")
                }
            }
        }
    }
}

/// Parse a `key=value` assignment as given on the command line.
///
/// The value is read as a TOML scalar or array when possible and as a plain
/// string otherwise, so `-o synctex=true` and `-o engine=xelatex` both work.
pub fn parse_assignment(text: &str) -> Result<(String, OptionValue)> {
    let (name, raw) = text.split_once('=').ok_or_else(|| {
        DicyError::ConfigError(format!("expected key=value, got '{text}'"))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(DicyError::ConfigError(format!("missing option name in '{text}'")));
    }
    let raw = raw.trim();

    let value = toml::from_str::<toml::Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .and_then(|v| OptionValue::try_from(v).ok())
        .unwrap_or_else(|| OptionValue::String(raw.to_string()));

    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_globals_and_job_tables() {
        let schema = OptionSchema::builtin();
        let set = load_from_str(
            &schema,
            r#"
                engine = "xelatex"
                phaseCycles = 4
                bogus = 1
                "$TEXINPUTS" = ["a", "b"]

                [jobs.draft]
                synctex = true
                engine = 12
            "#,
        )
        .unwrap();

        assert_eq!(set.get("engine"), Some(&OptionValue::from("xelatex")));
        assert_eq!(set.get("phaseCycles"), Some(&OptionValue::Number(4.0)));
        assert_eq!(set.get("bogus"), None);
        assert_eq!(set.job_value("draft", "synctex"), Some(&OptionValue::Boolean(true)));
        assert_eq!(set.job_value("draft", "engine"), None);
        assert!(set.get("$TEXINPUTS").is_some());
    }

    #[test]
    fn broken_toml_is_an_error() {
        let schema = OptionSchema::builtin();
        assert!(load_from_str(&schema, "engine = ").is_err());
    }

    #[test]
    fn assignments_parse_typed_values() {
        assert_eq!(
            parse_assignment("synctex=true").unwrap(),
            ("synctex".to_string(), OptionValue::Boolean(true))
        );
        assert_eq!(
            parse_assignment("engine=xelatex").unwrap(),
            ("engine".to_string(), OptionValue::from("xelatex"))
        );
        assert_eq!(
            parse_assignment("jobNames=[\"a\",\"b\"]").unwrap().1,
            OptionValue::Strings(vec!["a".to_string(), "b".to_string()])
        );
        assert!(parse_assignment("novalue").is_err());
    }
}
