//! `$NAME` / `${NAME}` expansion against an injected environment map.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Read-only snapshot of the environment a run sees.
pub type EnvironmentMap = BTreeMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:([A-Za-z0-9_]+)|\{([^}]*)\})").expect("placeholder regex is valid")
});

/// Replaces every placeholder whose name is present in `env`.
///
/// Unknown names are left exactly as written. Substituted values are not
/// scanned again.
pub fn expand_vars(text: &str, env: &EnvironmentMap) -> String {
    if !text.contains('$') {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match env.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Expands placeholders in every string value of `value`, at any depth.
/// Object keys are not touched.
pub fn substitute(value: &mut Value, env: &EnvironmentMap) {
    match value {
        Value::String(s) => {
            let expanded = expand_vars(s, env);
            if expanded != *s {
                *s = expanded;
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute(item, env);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                substitute(item, env);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> EnvironmentMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_braced_and_bare_forms() {
        let env = env(&[("CIRCLE_BRANCH", "main"), ("CIRCLE_JOB", "build")]);
        assert_eq!(
            expand_vars("${CIRCLE_JOB} on $CIRCLE_BRANCH", &env),
            "build on main"
        );
        assert_eq!(expand_vars("${CIRCLE_BRANCH}-x", &env), "main-x");
    }

    #[test]
    fn test_unknown_names_are_left_literal() {
        let env = env(&[("KNOWN", "yes")]);
        assert_eq!(
            expand_vars("$UNKNOWN ${ALSO_UNKNOWN} $KNOWN", &env),
            "$UNKNOWN ${ALSO_UNKNOWN} yes"
        );
        assert_eq!(expand_vars("costs $5", &env), "costs $5");
        assert_eq!(expand_vars("trailing $", &env), "trailing $");
        assert_eq!(expand_vars("${unterminated", &env), "${unterminated");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let env = env(&[("A", "$B"), ("B", "nope")]);
        assert_eq!(expand_vars("${A}", &env), "$B");
    }

    #[test]
    fn test_substitute_walks_nested_values_only() {
        let env = env(&[("URL", "http://circleci.com"), ("KEY", "replaced")]);
        let mut value = json!({
            "text": "",
            "${KEY}": "kept key",
            "blocks": [
                {"type": "section", "text": {"type": "mrkdwn", "text": "<${URL}|LINK >"}},
                {"type": "divider", "count": 2, "flag": true, "none": null}
            ]
        });
        substitute(&mut value, &env);
        assert_eq!(value["blocks"][0]["text"]["text"], "<http://circleci.com|LINK >");
        assert_eq!(value["${KEY}"], "kept key");
        assert_eq!(value["blocks"][1]["count"], 2);
    }
}
