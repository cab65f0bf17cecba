//! Reader and writer for the INI-style configuration file.
//!
//! ```ini
//! version = 2.0.0
//! timeout = 30
//!
//! [network]
//! proxy =
//!
//! [network:proxy]
//! host = localhost:8080
//! ```
//!
//! Keys before the first header form the global block. `[DEFAULT]` and `[]`
//! headers also open the global block. Indented lines continue the previous
//! value; `#` and `;` start comment lines.
//!
//! Values are stored unquoted, so a value does not keep leading or trailing
//! whitespace on any of its lines, trailing newlines, or `\r\n` line breaks
//! (they read back as `\n`).

use cfgtree_core::{ConfigError, Result};

/// A `[header]` block and its key/value pairs, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniBlock {
    pub header: String,
    pub line: usize,
    pub entries: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    pub global: Vec<(String, String)>,
    pub blocks: Vec<IniBlock>,
}

impl IniDocument {
    pub fn global_value(&self, key: &str) -> Option<&str> {
        self.global
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.blocks.is_empty()
    }
}

fn is_global_header(name: &str) -> bool {
    name.is_empty() || name.eq_ignore_ascii_case("default")
}

pub fn parse(text: &str) -> Result<IniDocument> {
    let mut doc = IniDocument::default();
    // None = global block, Some(i) = doc.blocks[i]
    let mut current: Option<usize> = None;
    let mut continuing = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        let indented = raw.starts_with([' ', '\t']);

        if indented && continuing {
            let entries = entries_mut(&mut doc, current);
            if let Some((_, value)) = entries.last_mut() {
                value.push('\n');
                value.push_str(trimmed);
            }
            continue;
        }
        if continuing {
            finish_value(entries_mut(&mut doc, current));
        }
        continuing = false;

        if trimmed.is_empty() || trimmed.starts_with(['#', ';']) {
            continue;
        }

        if let Some(inner) = trimmed.strip_prefix('[') {
            let name = inner
                .strip_suffix(']')
                .ok_or_else(|| parse_error(line, "unterminated section header"))?
                .trim();
            if is_global_header(name) {
                current = None;
                continue;
            }
            if doc.blocks.iter().any(|b| b.header.eq_ignore_ascii_case(name)) {
                return Err(parse_error(line, format!("duplicate section `{name}`")));
            }
            doc.blocks.push(IniBlock {
                header: name.to_string(),
                line,
                entries: Vec::new(),
            });
            current = Some(doc.blocks.len() - 1);
            continue;
        }

        let (key, value) = match trimmed.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (trimmed, ""),
        };
        if key.is_empty() {
            return Err(parse_error(line, "missing key before `=`"));
        }
        let entries = entries_mut(&mut doc, current);
        if entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)) {
            return Err(parse_error(line, format!("duplicate key `{key}`")));
        }
        entries.push((key.to_string(), value.to_string()));
        continuing = true;
    }
    if continuing {
        finish_value(entries_mut(&mut doc, current));
    }

    Ok(doc)
}

fn entries_mut(doc: &mut IniDocument, current: Option<usize>) -> &mut Vec<(String, String)> {
    match current {
        Some(i) => &mut doc.blocks[i].entries,
        None => &mut doc.global,
    }
}

/// Continuation lines may leave blank trailing lines behind.
fn finish_value(entries: &mut [(String, String)]) {
    if let Some((_, value)) = entries.last_mut() {
        let kept = value.trim_end_matches('\n').len();
        value.truncate(kept);
    }
}

fn parse_error(line: usize, reason: impl Into<String>) -> ConfigError {
    ConfigError::Parse {
        line,
        reason: reason.into(),
    }
}

pub fn write(doc: &IniDocument) -> String {
    let mut out = String::new();
    for (key, value) in &doc.global {
        write_pair(&mut out, key, value);
    }
    for block in &doc.blocks {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push('[');
        out.push_str(&block.header);
        out.push_str("]\n");
        for (key, value) in &block.entries {
            write_pair(&mut out, key, value);
        }
    }
    out
}

fn write_pair(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(" =");
    let mut lines = value.split('\n');
    if let Some(first) = lines.next().filter(|first| !first.is_empty()) {
        out.push(' ');
        out.push_str(first);
    }
    out.push('\n');
    for rest in lines {
        out.push_str("    ");
        out.push_str(rest);
        out.push('\n');
    }
}
