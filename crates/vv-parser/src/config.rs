//! Sectioned key/value configuration files.
//!
//! The model writes its run configuration in an INI dialect:
//!
//! ```text
//! [grid]
//! ewn = 31
//! dew = 2000   # metres
//!
//! [options]
//! dycore: 2
//! ```
//!
//! Keys are case-insensitive (stored lowercased), values keep their case. A
//! trailing `#` comment is stripped from every value.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

/// Parsed configuration: section name -> variable name -> raw value.
pub type ConfigTable = BTreeMap<String, BTreeMap<String, String>>;

/// Errors raised while reading a configuration file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: key `{key}` appears before any section header")]
    MissingSectionHeader { line: usize, key: String },

    #[error("line {line}: malformed section header `{text}`")]
    BadSectionHeader { line: usize, text: String },

    #[error("line {line}: expected `key = value`, found `{text}`")]
    MalformedLine { line: usize, text: String },
}

/// Read and parse a configuration file.
pub fn parse_config_file(path: impl AsRef<Path>) -> Result<ConfigTable, ParseError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse configuration text into a [`ConfigTable`].
///
/// Repeated sections merge and later assignments win. An indented line right
/// after an assignment continues that value on a new line; a blank line ends
/// the continuation.
pub fn parse_config(text: &str) -> Result<ConfigTable, ParseError> {
    let mut table = ConfigTable::new();
    let mut section: Option<String> = None;
    let mut last_key: Option<String> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            last_key = None;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indented = raw.starts_with(char::is_whitespace);
        if indented
            && let (Some(name), Some(key)) = (&section, &last_key)
        {
            let extra = strip_comment(trimmed);
            if let Some(value) = table.get_mut(name).and_then(|vars| vars.get_mut(key))
                && !extra.is_empty()
            {
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(extra);
            }
            continue;
        }

        if trimmed.starts_with('[') {
            let header = strip_comment(trimmed);
            let name = header
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| ParseError::BadSectionHeader {
                    line,
                    text: trimmed.to_string(),
                })?;
            table.entry(name.to_string()).or_default();
            section = Some(name.to_string());
            last_key = None;
            continue;
        }

        let Some(split) = trimmed.find(['=', ':']) else {
            return Err(ParseError::MalformedLine {
                line,
                text: trimmed.to_string(),
            });
        };
        let key = trimmed[..split].trim().to_lowercase();
        if key.is_empty() {
            return Err(ParseError::MalformedLine {
                line,
                text: trimmed.to_string(),
            });
        }
        let Some(name) = &section else {
            return Err(ParseError::MissingSectionHeader { line, key });
        };
        let value = strip_comment(&trimmed[split + 1..]).to_string();
        table
            .entry(name.clone())
            .or_default()
            .insert(key.clone(), value);
        last_key = Some(key);
    }

    Ok(table)
}

fn strip_comment(value: &str) -> &str {
    value.split('#').next().unwrap_or_default().trim()
}
