//! Java `.properties` reading.
//!
//! Supports comments, `=`/`:`/whitespace separators, line continuations and
//! the usual escapes (including `\uXXXX`). Later keys replace earlier ones.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut properties = Properties::new();
        let chars: Vec<char> = text.chars().collect();
        let mut offset = 0usize;
        while offset < chars.len() {
            let start = offset;
            let line = read_logical_line(&chars, &mut offset);
            if let Some((key, value)) = parse_logical_line(&line) {
                properties.entries.insert(key, value);
            }
            if offset == start {
                offset += 1;
            }
        }
        properties
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn read_logical_line(chars: &[char], offset: &mut usize) -> Vec<char> {
    let mut out = Vec::new();
    loop {
        let segment_start = *offset;
        let mut line_end = segment_start;
        while line_end < chars.len() && chars[line_end] != '\n' {
            line_end += 1;
        }
        let mut content_end = line_end;
        if content_end > segment_start && chars[content_end - 1] == '\r' {
            content_end -= 1;
        }

        let segment = &chars[segment_start..content_end];
        // A comment line never continues.
        let is_comment = segment
            .iter()
            .find(|c| !is_whitespace(**c))
            .is_some_and(|c| *c == '#' || *c == '!');
        let continues = !is_comment && ends_with_unescaped_backslash(segment);
        let copy_end = if continues { content_end - 1 } else { content_end };
        out.extend_from_slice(&chars[segment_start..copy_end]);

        *offset = if line_end < chars.len() { line_end + 1 } else { line_end };
        if !continues {
            break;
        }
        while *offset < chars.len() && is_whitespace(chars[*offset]) {
            *offset += 1;
        }
    }
    out
}

fn ends_with_unescaped_backslash(line: &[char]) -> bool {
    line.iter().rev().take_while(|c| **c == '\\').count() % 2 == 1
}

fn parse_logical_line(line: &[char]) -> Option<(String, String)> {
    let mut i = 0usize;
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }
    if i >= line.len() || line[i] == '#' || line[i] == '!' {
        return None;
    }

    let key_start = i;
    while i < line.len() {
        match line[i] {
            '\\' => i += 2,
            '=' | ':' => break,
            c if is_whitespace(c) => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(line.len());

    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }
    if i < line.len() && (line[i] == '=' || line[i] == ':') {
        i += 1;
    }
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    Some((unescape(&line[key_start..key_end]), unescape(&line[i.min(line.len())..])))
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0C')
}

fn unescape(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }
        i += 1;
        let Some(&escaped) = chars.get(i) else {
            break;
        };
        match escaped {
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\x0C'),
            'u' => {
                let hex: String = chars.iter().skip(i + 1).take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        i += 4;
                    }
                    _ => out.push('u'),
                }
            }
            other => out.push(other),
        }
        i += 1;
    }
    out
}
