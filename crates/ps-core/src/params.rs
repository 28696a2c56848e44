//! Namespaced key → value configuration lookup.
//!
//! Components are configured from a flat map of dotted keys.  A component
//! declared as `dynamics.churn` reads its own settings under that prefix:
//!
//! ```text
//! dynamics.churn        DynamicNetwork
//! dynamics.churn.add    0.1
//! dynamics.churn.down
//! dynamics.churn.step   5
//! ```
//!
//! A key with no value is a presence flag.  Lookups distinguish a missing
//! key ([`PsError::MissingParameter`]) from one whose value does not parse
//! ([`PsError::IllegalParameter`]).
//!
//! # Text form
//!
//! [`Params::parse`] accepts one `key value` (or `key = value`) pair per
//! line; `#` starts a comment.  The file syntax is a convenience for the
//! entry point, not a stable format.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::{PsError, PsResult};

/// Join a component prefix and a key name: `key("dynamics.churn", "add")`.
pub fn key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Flat configuration map.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: BTreeMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the line-oriented text form.
    pub fn parse(text: &str) -> PsResult<Self> {
        let mut params = Self::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let (k, v) = split_pair(line);
            if k.is_empty() {
                return Err(PsError::illegal(
                    format!("line {}", lineno + 1),
                    format!("missing key in {raw:?}"),
                ));
            }
            params.set(k, v);
        }
        Ok(params)
    }

    /// Like [`parse`](Self::parse) but reads from any `Read` source.
    pub fn from_reader<R: Read>(mut reader: R) -> PsResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    pub fn from_path(path: &Path) -> PsResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Insert or overwrite a key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a presence flag.
    pub fn with_flag(self, key: impl Into<String>) -> Self {
        self.with(key, "")
    }

    /// Apply a `key=value` override (as given on a command line).
    pub fn apply_override(&mut self, assignment: &str) -> PsResult<()> {
        let (k, v) = split_pair(assignment.trim());
        if k.is_empty() {
            return Err(PsError::illegal("override", format!("missing key in {assignment:?}")));
        }
        self.set(k, v);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    // ── Typed lookups ─────────────────────────────────────────────────────

    pub fn get_str(&self, key: &str) -> PsResult<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| PsError::MissingParameter(key.to_string()))
    }

    pub fn get_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.values.get(key).map(String::as_str).unwrap_or(default)
    }

    pub fn get_i64(&self, key: &str) -> PsResult<i64> {
        self.parse_value(key)
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> PsResult<i64> {
        self.parse_value_or(key, default)
    }

    pub fn get_u64(&self, key: &str) -> PsResult<u64> {
        self.parse_value(key)
    }

    pub fn get_u64_or(&self, key: &str, default: u64) -> PsResult<u64> {
        self.parse_value_or(key, default)
    }

    pub fn get_usize(&self, key: &str) -> PsResult<usize> {
        self.parse_value(key)
    }

    pub fn get_usize_or(&self, key: &str, default: usize) -> PsResult<usize> {
        self.parse_value_or(key, default)
    }

    pub fn get_f64(&self, key: &str) -> PsResult<f64> {
        let v: f64 = self.parse_value(key)?;
        if v.is_finite() { Ok(v) } else { Err(PsError::illegal(key, "value must be finite")) }
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> PsResult<f64> {
        if self.contains(key) { self.get_f64(key) } else { Ok(default) }
    }

    /// Whitespace- or comma-separated list value.  A missing key is an empty
    /// list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .map(|v| {
                v.split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Component enumeration ─────────────────────────────────────────────

    /// Full keys of the direct children of `prefix`, in declaration order.
    ///
    /// `names("protocol")` returns `["protocol.avg", "protocol.link"]` for
    /// the keys `protocol.avg`, `protocol.avg.step`, `protocol.link`.  The
    /// order is given by `order.<prefix>` (a list of short names, which are
    /// emitted first) and is lexicographic otherwise.
    pub fn names(&self, prefix: &str) -> PsResult<Vec<String>> {
        let head = format!("{prefix}.");
        let mut found: Vec<String> = self
            .values
            .keys()
            .filter_map(|k| k.strip_prefix(&head))
            .filter(|rest| !rest.is_empty() && !rest.contains('.'))
            .map(|rest| key(prefix, rest))
            .collect();

        let order_key = key("order", prefix);
        let order = self.get_list(&order_key);
        if order.is_empty() {
            return Ok(found);
        }

        let mut ordered = Vec::with_capacity(found.len());
        for short in &order {
            let full = key(prefix, short);
            match found.iter().position(|f| *f == full) {
                Some(pos) => ordered.push(found.remove(pos)),
                None => {
                    return Err(PsError::illegal(
                        order_key,
                        format!("{full:?} is listed but not defined"),
                    ));
                }
            }
        }
        ordered.extend(found);
        Ok(ordered)
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn parse_value<T: FromStr>(&self, key: &str) -> PsResult<T> {
        let raw = self.get_str(key)?;
        let cleaned: String = raw.trim().chars().filter(|c| *c != '_').collect();
        cleaned.parse::<T>().map_err(|_| {
            PsError::illegal(
                key,
                format!("cannot parse {raw:?} as {}", std::any::type_name::<T>()),
            )
        })
    }

    fn parse_value_or<T: FromStr>(&self, key: &str, default: T) -> PsResult<T> {
        if self.contains(key) { self.parse_value(key) } else { Ok(default) }
    }
}

/// Split `key value` or `key = value` at the first separator.
fn split_pair(line: &str) -> (&str, &str) {
    let sep = line.find(|c: char| c.is_whitespace() || c == '=');
    match sep {
        None => (line, ""),
        Some(pos) => {
            let k = line[..pos].trim();
            let rest = line[pos..].trim_start();
            let v = rest.strip_prefix('=').unwrap_or(rest).trim();
            (k, v)
        }
    }
}
