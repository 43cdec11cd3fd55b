//! Template resolution: built-in templates and custom template normalization.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::gate::BuildStatus;
use crate::json_format::to_canonical_string;

/// Templates shipped with the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTemplate {
    BasicSuccess1,
    BasicFail1,
    SuccessTaggedDeploy1,
    BasicOnHold1,
}

impl BuiltinTemplate {
    pub const ALL: [BuiltinTemplate; 4] = [
        BuiltinTemplate::BasicSuccess1,
        BuiltinTemplate::BasicFail1,
        BuiltinTemplate::SuccessTaggedDeploy1,
        BuiltinTemplate::BasicOnHold1,
    ];

    /// Default template for a build outcome.
    pub fn for_status(status: &BuildStatus) -> Self {
        match status {
            BuildStatus::Failed => BuiltinTemplate::BasicFail1,
            _ => BuiltinTemplate::BasicSuccess1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinTemplate::BasicSuccess1 => "basic_success_1",
            BuiltinTemplate::BasicFail1 => "basic_fail_1",
            BuiltinTemplate::SuccessTaggedDeploy1 => "success_tagged_deploy_1",
            BuiltinTemplate::BasicOnHold1 => "basic_on_hold_1",
        }
    }

    /// Raw JSON source of the template.
    pub fn source(&self) -> &'static str {
        match self {
            BuiltinTemplate::BasicSuccess1 => include_str!("../templates/basic_success_1.json"),
            BuiltinTemplate::BasicFail1 => include_str!("../templates/basic_fail_1.json"),
            BuiltinTemplate::SuccessTaggedDeploy1 => {
                include_str!("../templates/success_tagged_deploy_1.json")
            }
            BuiltinTemplate::BasicOnHold1 => include_str!("../templates/basic_on_hold_1.json"),
        }
    }
}

impl fmt::Display for BuiltinTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinTemplate {
    type Err = NotifyError;

    fn from_str(name: &str) -> Result<Self> {
        let name = name.trim();
        BuiltinTemplate::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| NotifyError::ConfigError(format!("Unknown template '{}'", name)))
    }
}

/// Parses template text into a JSON object.
pub(crate) fn parse_template(raw: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| NotifyError::TemplateParseError(format!("Invalid JSON: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(NotifyError::TemplateParseError(format!(
            "Template must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Guarantees a string `text` key. A missing key is appended, a null one
/// is replaced where it stands, an existing string is left alone.
pub(crate) fn ensure_text(template: &mut Map<String, Value>) -> Result<()> {
    match template.get("text") {
        Some(Value::Null) | None => {
            debug!("Template has no text key, defaulting to empty string");
            template.insert("text".to_string(), Value::String(String::new()));
            Ok(())
        }
        Some(Value::String(_)) => Ok(()),
        Some(other) => Err(NotifyError::TemplateParseError(format!(
            "Template text must be a string, got {}",
            json_kind(other)
        ))),
    }
}

/// Normalizes a custom template so it always carries a `text` field.
pub fn modify_custom_template(raw: &str) -> Result<String> {
    let mut template = parse_template(raw)?;
    ensure_text(&mut template)?;
    to_canonical_string(&template)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
