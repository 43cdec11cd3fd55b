//! Message builder: turns a template into the final payload for one channel.

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::gate::BuildStatus;
use crate::interpolate::{EnvironmentMap, substitute};
use crate::json_format::to_canonical_string;
use crate::template::{BuiltinTemplate, ensure_text, parse_template};

/// Builds the payload for `channel`.
///
/// Without a custom template the built-in default for `build_status` is used.
/// Placeholders in every string value are expanded from `env`; JSON escaping
/// happens once, when the finished object is serialized.
pub fn build_message_body(
    custom_template: Option<&str>,
    build_status: &BuildStatus,
    channel: &str,
    env: &EnvironmentMap,
) -> Result<String> {
    match custom_template {
        Some(raw) => render_payload(raw, channel, env),
        None => {
            let builtin = BuiltinTemplate::for_status(build_status);
            debug!(template = %builtin, "Using built-in template");
            render_payload(builtin.source(), channel, env)
        }
    }
}

/// Resolves `raw`, expands placeholders and injects `channel` at the top level.
pub fn render_payload(raw: &str, channel: &str, env: &EnvironmentMap) -> Result<String> {
    let mut template = parse_template(raw)?;
    ensure_text(&mut template)?;

    let mut body = Value::Object(template);
    substitute(&mut body, env);

    if let Value::Object(map) = &mut body {
        map.insert("channel".to_string(), Value::String(channel.to_string()));
    }

    let payload = to_canonical_string(&body)?;
    debug!(channel, bytes = payload.len(), "Built message body");
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;

    fn env(pairs: &[(&str, &str)]) -> EnvironmentMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_channel_is_appended_last() {
        let out = render_payload(r#"{"text": "hi", "blocks": []}"#, "xyz", &env(&[])).unwrap();
        assert_eq!(out, r#"{"text": "hi", "blocks": [], "channel": "xyz"}"#);
    }

    #[test]
    fn test_existing_channel_is_overwritten_in_place() {
        let out = render_payload(
            r#"{"channel": "old", "text": "hi"}"#,
            "new",
            &env(&[]),
        )
        .unwrap();
        assert_eq!(out, r#"{"channel": "new", "text": "hi"}"#);
    }

    #[test]
    fn test_substituted_values_are_json_escaped() {
        let out = render_payload(
            r#"{"text": "Commit: ${MSG}"}"#,
            "c",
            &env(&[("MSG", "fix \"quotes\" and `ticks`\nnext line")]),
        )
        .unwrap();
        assert_eq!(
            out,
            r#"{"text": "Commit: fix \"quotes\" and `ticks`\nnext line", "channel": "c"}"#
        );
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["text"], "Commit: fix \"quotes\" and `ticks`\nnext line");
    }

    #[test]
    fn test_default_template_follows_status() {
        let env = env(&[
            ("CIRCLE_JOB", "build"),
            ("CIRCLE_BRANCH", "main"),
            ("CIRCLE_BUILD_URL", "https://circleci.com/gh/o/r/1"),
        ]);
        let failed = build_message_body(None, &BuildStatus::Failed, "ops", &env).unwrap();
        let parsed: Value = serde_json::from_str(&failed).unwrap();
        assert_eq!(parsed["text"], "CircleCI job failed.");
        assert_eq!(parsed["channel"], "ops");
        assert!(failed.contains("*Job*: build"));
        assert!(failed.contains("*Branch*:\\nmain"));
        assert!(failed.contains("\"url\": \"https://circleci.com/gh/o/r/1\""));

        let passed = build_message_body(None, &BuildStatus::Success, "ops", &env).unwrap();
        let parsed: Value = serde_json::from_str(&passed).unwrap();
        assert_eq!(parsed["text"], "CircleCI job succeeded!");
    }

    #[test]
    fn test_output_is_deterministic() {
        let env = env(&[("A", "1")]);
        let raw = r#"{"z": "${A}", "a": {"y": 1, "b": [true, null]}}"#;
        let first = build_message_body(Some(raw), &BuildStatus::Success, "c", &env).unwrap();
        let second = build_message_body(Some(raw), &BuildStatus::Success, "c", &env).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            r#"{"z": "1", "a": {"y": 1, "b": [true, null]}, "text": "", "channel": "c"}"#
        );
    }

    #[test]
    fn test_numeric_text_never_reaches_payload() {
        let err = render_payload(r#"{"text": 5, "blocks": []}"#, "c", &env(&[])).unwrap_err();
        assert!(matches!(err, NotifyError::TemplateParseError(_)));
    }

    #[test]
    fn test_invalid_custom_template() {
        let err =
            build_message_body(Some("not json"), &BuildStatus::Success, "c", &env(&[])).unwrap_err();
        assert!(matches!(err, NotifyError::TemplateParseError(_)));
    }
}
