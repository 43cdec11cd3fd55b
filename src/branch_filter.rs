//! Branch and tag filtering against a newline-separated list of regexes.

use regex::Regex;
use std::fmt;
use std::io::{self, Write};
use tracing::{debug, info, warn};

use crate::error::{NotifyError, Result};

/// What a pattern list is being matched against. Only affects the diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    Branch,
    Tag,
}

impl FilterTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterTarget::Branch => "branch",
            FilterTarget::Tag => "tag",
        }
    }
}

impl fmt::Display for FilterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled list of full-match patterns.
#[derive(Debug, Clone)]
pub struct PatternList {
    patterns: Vec<Regex>,
}

impl PatternList {
    /// Compiles every non-blank, non-comment line. All lines are compiled
    /// before any matching happens, so a bad line is reported up front.
    pub fn parse(source: &str) -> Result<Self> {
        let mut patterns = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            let pattern = line.trim();
            if pattern.is_empty() || pattern.starts_with('#') {
                continue;
            }
            let anchored = format!("^(?:{})$", pattern);
            let regex = Regex::new(&anchored).map_err(|e| {
                NotifyError::ConfigError(format!(
                    "Invalid pattern on line {} ({:?}): {}",
                    idx + 1,
                    pattern,
                    e
                ))
            })?;
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True if any pattern matches `value` in full.
    pub fn matches(&self, value: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(value))
    }
}

/// Checks `branch` against the patterns in `source`, printing the
/// `NO SLACK ALERT` diagnostic to stdout when nothing matches.
pub fn filter_by(source: Option<&str>, branch: Option<&str>) -> Result<bool> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    filter_by_with(source, branch, FilterTarget::Branch, &mut out)
}

/// Same as [`filter_by`] but for any target, writing the diagnostic to `out`.
///
/// A missing or blank pattern source, or a missing or empty value, always passes.
pub fn filter_by_with<W: Write>(
    source: Option<&str>,
    value: Option<&str>,
    target: FilterTarget,
    out: &mut W,
) -> Result<bool> {
    let Some(source) = source.filter(|s| !s.trim().is_empty()) else {
        debug!(%target, "No pattern configured, not filtering");
        return Ok(true);
    };
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        debug!(%target, "No value to filter on, not filtering");
        return Ok(true);
    };

    let patterns = PatternList::parse(source)?;
    if patterns.is_empty() {
        debug!(%target, "Pattern source has only comments, not filtering");
        return Ok(true);
    }
    if patterns.matches(value) {
        debug!(%target, value, "Matched configured pattern");
        return Ok(true);
    }

    info!(%target, value, "No pattern matched, notification suppressed");
    // The diagnostic is informational; a failed write must not change the outcome.
    if let Err(e) = write_no_match(out, target, value) {
        warn!("Could not write filter diagnostic: {}", e);
    }
    Ok(false)
}

fn write_no_match<W: Write>(out: &mut W, target: FilterTarget, value: &str) -> io::Result<()> {
    writeln!(out, "NO SLACK ALERT")?;
    writeln!(out)?;
    writeln!(
        out,
        "Current {target} does not match any item from the '{target}_pattern' parameter"
    )?;
    writeln!(out, "Current {target}: {value}")?;
    out.flush()
}
