//! YAML front-matter at the head of a post
//!
//! A post may start with a block delimited by `---` lines:
//!
//! ```text
//! ---
//! title: Hello
//! author: Jane
//! date: 2024-03-01
//! ---
//! Body text
//! ```
//!
//! Anything else is treated as a post without metadata.

use serde_yaml::{Mapping, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

const MARKER: &str = "---";

/// Metadata fields consumed from a post's front-matter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<Date>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("front matter is not valid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("front matter is not a key/value mapping")]
    NotAMapping,
}

/// Split `text` into its front-matter block (if any) and the body that follows.
///
/// The opening marker must be the very first line and the block must be
/// closed; an unclosed block means there is no front-matter at all.
pub fn extract(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = strip_marker_line(text) else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == MARKER {
            let front = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(front), body);
        }
        offset += line.len();
    }

    (None, text)
}

/// The body of a post with any front-matter removed
pub fn body(text: &str) -> &str {
    extract(text).1
}

/// Parse the front-matter of `text`.
///
/// A missing or empty block yields an empty [`FrontMatter`]. A date that
/// cannot be understood is dropped so callers can fall back to their own.
pub fn parse(text: &str) -> Result<FrontMatter, FrontMatterError> {
    let front = match extract(text) {
        (Some(front), _) if !front.trim().is_empty() => front,
        _ => return Ok(FrontMatter::default()),
    };

    let value: Value = serde_yaml::from_str(front)?;
    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(FrontMatter::default()),
        _ => return Err(FrontMatterError::NotAMapping),
    };

    let date = scalar(&mapping, "date").and_then(|raw| {
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            tracing::warn!("ignoring unrecognized front matter date {:?}", raw);
        }
        parsed
    });

    Ok(FrontMatter {
        title: scalar(&mapping, "title"),
        author: scalar(&mapping, "author"),
        date,
    })
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn parse_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(|dt| dt.date()))
}

fn strip_marker_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(MARKER)?;
    let rest = rest.strip_prefix('\r').unwrap_or(rest);
    rest.strip_prefix('\n')
}

fn scalar(mapping: &Mapping, key: &str) -> Option<String> {
    let value = match mapping.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}
