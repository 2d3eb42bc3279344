//! Wildcard path patterns
//!
//! `*` matches any run of characters (including none). Everything else is
//! literal. A pattern matches the whole path, and its leading `/` is
//! optional on both sides: `/images/*` matches `/images/a.png` and
//! `images/a.png`.

use regex::Regex;

use crate::error::{ProxyError, Result};

/// Compiled wildcard pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a wildcard pattern
    pub fn compile(pattern: &str) -> Result<Self> {
        let body = pattern.strip_prefix('/').unwrap_or(pattern);
        let literal: Vec<String> = body.split('*').map(regex::escape).collect();
        let expr = format!("(?s)^/?{}$", literal.join(".*"));

        let regex = Regex::new(&expr).map_err(|e| {
            ProxyError::Config(format!("Invalid pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Test a path against the pattern
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The pattern as written in the configuration
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// True if any of `patterns` matches `path`; false when there are none
pub fn matches_any(path: &str, patterns: Option<&[Pattern]>) -> bool {
    patterns
        .map(|patterns| patterns.iter().any(|p| p.matches(path)))
        .unwrap_or(false)
}
