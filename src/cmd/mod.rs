use askama::{Html, MarkupDisplay};
use chrono::{DateTime, FixedOffset};
use std::fmt::Write;

use crate::errors::*;

pub mod index;
pub mod repo;

/// Replaces every `{key}` of `template` with its value. Values are not
/// scanned again, and unknown keys are left as they are.
pub fn fill(template: &str, fields: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            fields
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escapes text for use in HTML, the same way askama templates do.
pub fn escape_html(text: &str) -> String {
    MarkupDisplay::new_unsafe(text, Html).to_string()
}

/// Formats a commit time, rejecting a bad format string instead of
/// panicking on it.
pub fn format_time(time: &DateTime<FixedOffset>, format: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", time.format(format))
        .map_err(|_| Error::from(format!("invalid date format {:?}", format)))?;
    Ok(out)
}

/// First line of a commit message.
pub fn subject(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}
