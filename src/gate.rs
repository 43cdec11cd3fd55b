//! Decision gate: should this run attempt a notification at all?

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Event marker that suppresses the notification whatever the build outcome.
pub const SUPPRESS_EVENT: &str = "fail";

/// Outcome of the CI run as reported by the invoking job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildStatus {
    Success,
    Failed,
    /// Anything the CI system reports that we do not interpret.
    Other(String),
}

impl BuildStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "pass" => BuildStatus::Success,
            "failed" | "fail" => BuildStatus::Failed,
            _ => BuildStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BuildStatus::Success => "success",
            BuildStatus::Failed => "failed",
            BuildStatus::Other(raw) => raw,
        }
    }
}

impl From<&str> for BuildStatus {
    fn from(raw: &str) -> Self {
        BuildStatus::parse(raw)
    }
}

impl From<String> for BuildStatus {
    fn from(raw: String) -> Self {
        BuildStatus::parse(&raw)
    }
}

impl From<BuildStatus> for String {
    fn from(status: BuildStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns false when the triggering event is the suppress marker, true otherwise.
///
/// The build status is not validated here; unrecognized values still post.
pub fn should_post(build_status: &BuildStatus, event_name: &str) -> bool {
    let post = event_name != SUPPRESS_EVENT;
    debug!(
        status = %build_status,
        event = event_name,
        post,
        "Evaluated notification gate"
    );
    post
}
