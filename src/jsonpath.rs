//! Minimal JSONPath evaluator for record and cursor locations.
//!
//! Supported syntax: `$`, `.field`, `.*`, `['field']`, `[*]`, `[n]`, `[-n]`
//! and slices `[start:end]` with optional, possibly negative bounds.
//!
//! A field holding an explicit `null` is a match (the value is `null`); a
//! missing field is not.

use crate::error::{Result, TapError};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Field(String),
    Wildcard,
    Index(i64),
    Slice(Option<i64>, Option<i64>),
}

/// A parsed path expression.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expr: &str) -> Result<Self> {
        let invalid = |why: &str| TapError::Config(format!("invalid JSON path '{}': {}", expr, why));

        let rest = expr
            .trim()
            .strip_prefix('$')
            .ok_or_else(|| invalid("must start with '$'"))?;
        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    if name.is_empty() {
                        return Err(invalid("empty field name"));
                    }
                    segments.push(if name == "*" {
                        Segment::Wildcard
                    } else {
                        Segment::Field(name)
                    });
                    i = end;
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|p| i + p)
                        .ok_or_else(|| invalid("unclosed '['"))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    segments.push(parse_bracket(inner.trim()).ok_or_else(|| invalid("bad subscript"))?);
                    i = close + 1;
                }
                _ => return Err(invalid("expected '.' or '['")),
            }
        }

        Ok(Self { segments })
    }

    /// Returns every value the path matches, in document order.
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                apply(segment, value, &mut next);
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// First match, if any.
    pub fn first<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.select(root).into_iter().next()
    }
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    if let Some(quoted) = inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
    {
        return Some(Segment::Field(quoted.to_string()));
    }
    if let Some((start, end)) = inner.split_once(':') {
        let bound = |s: &str| -> Option<Option<i64>> {
            let s = s.trim();
            if s.is_empty() {
                Some(None)
            } else {
                s.parse().ok().map(Some)
            }
        };
        return Some(Segment::Slice(bound(start)?, bound(end)?));
    }
    inner.parse().ok().map(Segment::Index)
}

fn apply<'a>(segment: &Segment, value: &'a Value, out: &mut Vec<&'a Value>) {
    match (segment, value) {
        (Segment::Field(name), Value::Object(map)) => {
            if let Some(v) = map.get(name) {
                out.push(v);
            }
        }
        (Segment::Wildcard, Value::Array(items)) => out.extend(items.iter()),
        (Segment::Wildcard, Value::Object(map)) => out.extend(map.values()),
        (Segment::Index(idx), Value::Array(items)) => {
            if let Some(i) = normalize(*idx, items.len()) {
                out.push(&items[i]);
            }
        }
        (Segment::Slice(start, end), Value::Array(items)) => {
            let len = items.len() as i64;
            let clamp = |b: i64| if b < 0 { (len + b).max(0) } else { b.min(len) };
            let from = start.map(clamp).unwrap_or(0);
            let to = end.map(clamp).unwrap_or(len);
            if from < to {
                out.extend(items[from as usize..to as usize].iter());
            }
        }
        _ => {}
    }
}

fn normalize(idx: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if idx < 0 { len + idx } else { idx };
    (0..len).contains(&i).then_some(i as usize)
}
