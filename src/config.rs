//! Run configuration: optional TOML file, overridden by environment variables.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::gate::BuildStatus;
use crate::interpolate::EnvironmentMap;
use crate::logging::LoggingConfig;

pub const DEFAULT_API_URL: &str = "https://slack.com/api/chat.postMessage";
pub const DEFAULT_PATTERN: &str = ".+";
pub const DEFAULT_EVENT: &str = "always";

/// Environment variable holding the path of an optional TOML config file.
pub const ENV_CONFIG_PATH: &str = "SLACK_NOTIFY_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub access_token: Option<String>,
    /// One channel or a comma-separated list.
    pub channel: Option<String>,
    pub default_channel: Option<String>,
    pub event: String,
    pub build_status: BuildStatus,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub branch_pattern: Option<String>,
    pub branch_pattern_file: Option<PathBuf>,
    pub tag_pattern: Option<String>,
    pub tag_pattern_file: Option<PathBuf>,
    /// Name of a built-in template.
    pub template: Option<String>,
    pub custom: Option<String>,
    pub custom_file: Option<PathBuf>,
    /// Text for the `${SLACK_PARAM_MENTIONS}` placeholder of the built-in templates.
    pub mentions: Option<String>,
    pub ignore_errors: bool,
    pub debug: bool,
    pub api_url: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            channel: None,
            default_channel: None,
            event: DEFAULT_EVENT.to_string(),
            build_status: BuildStatus::Success,
            branch: None,
            tag: None,
            branch_pattern: Some(DEFAULT_PATTERN.to_string()),
            branch_pattern_file: None,
            tag_pattern: Some(DEFAULT_PATTERN.to_string()),
            tag_pattern_file: None,
            template: None,
            custom: None,
            custom_file: None,
            mentions: None,
            ignore_errors: true,
            debug: false,
            api_url: DEFAULT_API_URL.to_string(),
            log_dir: None,
        }
    }
}

impl NotifyConfig {
    /// Load and parse a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|e| {
            NotifyError::ConfigError(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: NotifyConfig = toml::from_str(&config_str)?;
        debug!("Loaded config file {:?}", path);
        Ok(config)
    }

    /// Builds the config for a run: the file named by `SLACK_NOTIFY_CONFIG`
    /// (if any) is the base, environment variables win over it.
    pub fn from_env(env: &EnvironmentMap) -> Result<Self> {
        let base = match env.get(ENV_CONFIG_PATH).filter(|p| !p.trim().is_empty()) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        base.with_env_overrides(env)
    }

    pub fn with_env_overrides(mut self, env: &EnvironmentMap) -> Result<Self> {
        override_opt(env, "SLACK_ACCESS_TOKEN", &mut self.access_token);
        override_opt(env, "SLACK_PARAM_CHANNEL", &mut self.channel);
        override_opt(env, "SLACK_DEFAULT_CHANNEL", &mut self.default_channel);
        override_opt(env, "CIRCLE_BRANCH", &mut self.branch);
        override_opt(env, "CIRCLE_TAG", &mut self.tag);
        override_opt(env, "SLACK_PARAM_BRANCHPATTERN", &mut self.branch_pattern);
        override_opt(env, "SLACK_PARAM_TAGPATTERN", &mut self.tag_pattern);
        override_opt(env, "SLACK_PARAM_TEMPLATE", &mut self.template);
        override_opt(env, "SLACK_PARAM_CUSTOM", &mut self.custom);
        override_opt(env, "SLACK_PARAM_MENTIONS", &mut self.mentions);

        override_path(env, "SLACK_PARAM_BRANCHPATTERN_FILE", &mut self.branch_pattern_file);
        override_path(env, "SLACK_PARAM_TAGPATTERN_FILE", &mut self.tag_pattern_file);
        override_path(env, "SLACK_PARAM_CUSTOM_FILE", &mut self.custom_file);
        override_path(env, "SLACK_NOTIFY_LOG_DIR", &mut self.log_dir);

        if let Some(event) = non_empty(env, "SLACK_PARAM_EVENT") {
            self.event = event.to_string();
        }
        if let Some(status) = non_empty(env, "CCI_STATUS") {
            self.build_status = BuildStatus::parse(status);
        }
        if let Some(url) = non_empty(env, "SLACK_API_URL") {
            self.api_url = url.to_string();
        }
        if let Some(raw) = non_empty(env, "SLACK_PARAM_IGNORE_ERRORS") {
            self.ignore_errors = parse_bool("SLACK_PARAM_IGNORE_ERRORS", raw)?;
        }
        if let Some(raw) = non_empty(env, "SLACK_PARAM_DEBUG") {
            self.debug = parse_bool("SLACK_PARAM_DEBUG", raw)?;
        }

        Ok(self)
    }

    /// Channels to post to, falling back to the default channel.
    pub fn channels(&self) -> Result<Vec<String>> {
        let from_list = |list: &Option<String>| -> Vec<String> {
            list.as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect()
        };

        let channels = from_list(&self.channel);
        if !channels.is_empty() {
            return Ok(channels);
        }
        let channels = from_list(&self.default_channel);
        if channels.is_empty() {
            return Err(NotifyError::ConfigError(
                "No channel configured; set SLACK_PARAM_CHANNEL or SLACK_DEFAULT_CHANNEL"
                    .to_string(),
            ));
        }
        Ok(channels)
    }

    pub fn access_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                NotifyError::ConfigError("SLACK_ACCESS_TOKEN is not set".to_string())
            })
    }

    pub fn branch_pattern_source(&self) -> Result<Option<String>> {
        text_source(self.branch_pattern_file.as_deref(), self.branch_pattern.as_deref())
    }

    pub fn tag_pattern_source(&self) -> Result<Option<String>> {
        text_source(self.tag_pattern_file.as_deref(), self.tag_pattern.as_deref())
    }

    pub fn custom_template_source(&self) -> Result<Option<String>> {
        text_source(self.custom_file.as_deref(), self.custom.as_deref())
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            debug: self.debug,
            log_dir: self.log_dir.clone(),
        }
    }
}

/// Reads a whole file into memory.
pub fn load_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    debug!("Reading {:?}", path);
    Ok(fs::read_to_string(path)?)
}

/// File contents win over the inline value.
fn text_source(file: Option<&Path>, inline: Option<&str>) -> Result<Option<String>> {
    match file {
        Some(path) => load_text(path).map(Some),
        None => Ok(inline.map(String::from)),
    }
}

fn non_empty<'a>(env: &'a EnvironmentMap, key: &str) -> Option<&'a str> {
    env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// A present but blank variable clears the setting.
fn override_opt(env: &EnvironmentMap, key: &str, slot: &mut Option<String>) {
    if let Some(value) = env.get(key) {
        *slot = if value.trim().is_empty() {
            None
        } else {
            Some(value.clone())
        };
    }
}

fn override_path(env: &EnvironmentMap, key: &str, slot: &mut Option<PathBuf>) {
    if let Some(value) = env.get(key) {
        *slot = if value.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(value.trim()))
        };
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(NotifyError::ConfigError(format!(
            "{} must be a boolean, got '{}'",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> EnvironmentMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = NotifyConfig::from_env(&env(&[])).unwrap();
        assert_eq!(config.event, "always");
        assert_eq!(config.build_status, BuildStatus::Success);
        assert_eq!(config.branch_pattern.as_deref(), Some(".+"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.ignore_errors);
        assert!(!config.debug);
    }

    #[test]
    fn test_env_overrides() {
        let config = NotifyConfig::from_env(&env(&[
            ("SLACK_ACCESS_TOKEN", "xoxb-1"),
            ("SLACK_PARAM_CHANNEL", "a, b,,c "),
            ("CCI_STATUS", "fail"),
            ("SLACK_PARAM_EVENT", "fail"),
            ("CIRCLE_BRANCH", "main"),
            ("SLACK_PARAM_BRANCHPATTERN", ""),
            ("SLACK_PARAM_IGNORE_ERRORS", "False"),
            ("SLACK_PARAM_DEBUG", "1"),
            ("SLACK_PARAM_MENTIONS", "<@U123>"),
        ]))
        .unwrap();
        assert_eq!(config.mentions.as_deref(), Some("<@U123>"));
        assert_eq!(config.access_token.as_deref(), Some("xoxb-1"));
        assert_eq!(config.channels().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(config.build_status, BuildStatus::Failed);
        assert_eq!(config.event, "fail");
        assert_eq!(config.branch.as_deref(), Some("main"));
        assert_eq!(config.branch_pattern, None);
        assert!(!config.ignore_errors);
        assert!(config.debug);
    }

    #[test]
    fn test_invalid_bool() {
        let err =
            NotifyConfig::from_env(&env(&[("SLACK_PARAM_DEBUG", "maybe")])).unwrap_err();
        assert!(matches!(err, NotifyError::ConfigError(msg) if msg.contains("SLACK_PARAM_DEBUG")));
    }

    #[test]
    fn test_channel_fallback() {
        let config =
            NotifyConfig::from_env(&env(&[("SLACK_DEFAULT_CHANNEL", "general")])).unwrap();
        assert_eq!(config.channels().unwrap(), vec!["general"]);

        let config = NotifyConfig::from_env(&env(&[])).unwrap();
        assert!(matches!(config.channels(), Err(NotifyError::ConfigError(_))));
    }

    #[test]
    fn test_toml_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "channel = \"from-file\"\nevent = \"pass\"\nignore_errors = false\nbranch_pattern = \"main\""
        )
        .unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = NotifyConfig::from_env(&env(&[
            (ENV_CONFIG_PATH, path.as_str()),
            ("SLACK_PARAM_EVENT", "always"),
        ]))
        .unwrap();
        assert_eq!(config.channel.as_deref(), Some("from-file"));
        assert_eq!(config.event, "always");
        assert!(!config.ignore_errors);
        assert_eq!(config.branch_pattern.as_deref(), Some("main"));
        assert_eq!(config.tag_pattern.as_deref(), Some(".+"));
    }

    #[test]
    fn test_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "channel = [").unwrap();
        let err = NotifyConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, NotifyError::TomlParseError(_)));
    }

    #[test]
    fn test_file_sources_win_over_inline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "main\nrelease/.*\n").unwrap();
        let config = NotifyConfig {
            branch_pattern: Some("ignored".to_string()),
            branch_pattern_file: Some(file.path().to_path_buf()),
            ..NotifyConfig::default()
        };
        assert_eq!(
            config.branch_pattern_source().unwrap().as_deref(),
            Some("main\nrelease/.*\n")
        );

        let missing = NotifyConfig {
            custom_file: Some(PathBuf::from("/definitely/not/here.json")),
            ..NotifyConfig::default()
        };
        assert!(matches!(
            missing.custom_template_source(),
            Err(NotifyError::IoError(_))
        ));
    }
}
