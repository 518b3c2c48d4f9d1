// src/config/validate.rs

//! Type coercion for option assignments.
//!
//! Every assignment goes through [`coerce`]; the caller decides what to do
//! with a rejection (the option set logs and drops it).

use crate::config::options::OptionValue;
use crate::config::schema::{OptionSpec, OptionType};

/// Check `value` against `spec`, returning the value to store.
///
/// The only conversion performed is string → one-element list for list-typed
/// options.
pub fn coerce(spec: &OptionSpec, value: OptionValue) -> Result<OptionValue, String> {
    let value = match (spec.option_type, value) {
        (OptionType::String, v @ OptionValue::String(_)) => v,
        (OptionType::Strings, OptionValue::String(s)) => OptionValue::Strings(vec![s]),
        (OptionType::Strings, v @ OptionValue::Strings(_)) => v,
        (OptionType::Number, v @ OptionValue::Number(_)) => v,
        (OptionType::Boolean, v @ OptionValue::Boolean(_)) => v,
        (OptionType::Variable, v @ (OptionValue::String(_) | OptionValue::Strings(_))) => v,
        (expected, got) => {
            return Err(format!(
                "expected {expected}, got {} ({got})",
                got.type_name()
            ));
        }
    };

    check_enumeration(spec, &value)?;
    Ok(value)
}

fn check_enumeration(spec: &OptionSpec, value: &OptionValue) -> Result<(), String> {
    if spec.values.is_empty() {
        return Ok(());
    }
    let candidates: Vec<&str> = match value {
        OptionValue::String(s) => vec![s.as_str()],
        OptionValue::Strings(v) => v.iter().map(String::as_str).collect(),
        _ => return Ok(()),
    };
    for candidate in candidates {
        if !spec.values.iter().any(|allowed| allowed == candidate) {
            return Err(format!(
                "'{candidate}' is not one of: {}",
                spec.values.join(", ")
            ));
        }
    }
    Ok(())
}
