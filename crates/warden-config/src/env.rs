//! `${VAR}` / `${VAR:-default}` expansion for config scalar values.
//!
//! Applied only to string values parsed from YAML, never to the secrets
//! store (spec.md §6: "Secrets are never sourced from environment
//! variables"). Walking stops at the first unresolved reference per
//! string; an unset variable with no default is left as the literal
//! `${VAR}` text rather than failing the load, matching the donor's
//! tolerant env-fallback behavior.

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").expect("static regex is valid"));

/// Expand `${VAR}` and `${VAR:-default}` references in every string scalar
/// reachable from `value`, using `lookup` to resolve variable names.
pub fn expand_env(value: &mut Value, lookup: &impl Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => {
            *s = expand_str(s, lookup);
        }
        Value::Sequence(seq) => {
            for item in seq {
                expand_env(item, lookup);
            }
        }
        Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_env(v, lookup);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::Tagged(_) => {}
    }
}

fn expand_str(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    VAR_RE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let default = caps.get(3).map(|m| m.as_str());
            match lookup(name) {
                Some(value) => value,
                None => default.map_or_else(|| caps[0].to_string(), ToString::to_string),
            }
        })
        .into_owned()
}

/// Resolve variables against the real process environment.
#[must_use]
pub fn from_process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_fixed(name: &str) -> Option<String> {
        match name {
            "SET" => Some("value".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_set_variable() {
        assert_eq!(expand_str("${SET}", &lookup_fixed), "value");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        assert_eq!(expand_str("${UNSET:-fallback}", &lookup_fixed), "fallback");
    }

    #[test]
    fn leaves_unresolved_reference_with_no_default_untouched() {
        assert_eq!(expand_str("${UNSET}", &lookup_fixed), "${UNSET}");
    }

    #[test]
    fn expands_inside_a_larger_string() {
        assert_eq!(
            expand_str("prefix-${SET}-suffix", &lookup_fixed),
            "prefix-value-suffix"
        );
    }

    #[test]
    fn walks_nested_mappings_and_sequences() {
        let mut value: Value = serde_yaml::from_str(
            "a: ${SET}\nb:\n  - ${UNSET:-x}\n  - plain\nc:\n  d: ${SET}\n",
        )
        .expect("valid yaml");
        expand_env(&mut value, &lookup_fixed);
        let rendered = serde_yaml::to_string(&value).expect("serializes");
        assert!(rendered.contains("a: value"));
        assert!(rendered.contains("- x"));
        assert!(rendered.contains("d: value"));
    }
}
