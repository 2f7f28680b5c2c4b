//! `key=value` lines as CubeMX writes them (Java properties syntax)

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Property {
    pub(crate) key: String,
    pub(crate) value: String,
}

/// Splits `input` into properties, skipping comments and blank lines and
/// joining continuation lines.
pub(crate) fn parse(input: &str) -> Vec<Property> {
    let mut properties = Vec::new();
    let mut pending = String::new();

    for line in input.lines() {
        let line = line.trim_start();
        let comment = line.starts_with('#') || line.starts_with('!');
        if pending.is_empty() && (line.is_empty() || comment) {
            continue;
        }
        if ends_with_continuation(line) {
            pending.push_str(&line[..line.len() - 1]);
            continue;
        }
        pending.push_str(line);
        if let Some(property) = split(&pending) {
            properties.push(property);
        }
        pending.clear();
    }
    if !pending.is_empty() {
        if let Some(property) = split(&pending) {
            properties.push(property);
        }
    }
    properties
}

fn ends_with_continuation(line: &str) -> bool {
    line.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

fn split(line: &str) -> Option<Property> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '=' if !escaped => {
                let key = unescape(line[..i].trim_end());
                let value = unescape(line[i + 1..].trim_start());
                return Some(Property { key, value });
            }
            _ => escaped = false,
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
