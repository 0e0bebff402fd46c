//! Setting values and the built-in defaults table.
//!
//! Every setting the library recognizes is listed in [`Defaults::builtin`].
//! The table doubles as the whitelist of valid names: a name absent from it
//! is never resolved.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

/// Reserved namespace holding this library's overrides in the host settings.
pub const NAMESPACE: &str = "DRF_REVPROXY";

/// Minimal response size (bytes) before a response is streamed.
pub const MIN_STREAMING_LENGTH: &str = "MIN_STREAMING_LENGTH";
/// Fallback response charset.
pub const DEFAULT_CHARSET: &str = "DEFAULT_CHARSET";
/// Request headers excluded from forwarding.
pub const IGNORE_HEADERS: &str = "IGNORE_HEADERS";
/// Content types treated as HTML.
pub const HTML_CONTENT_TYPES: &str = "HTML_CONTENT_TYPES";
/// Bytes read per chunk when streaming a response body.
pub const DEFAULT_AMT: &str = "DEFAULT_AMT";

/// A single setting value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Integer(n) => write!(f, "{}", n),
            SettingValue::Text(s) => write!(f, "{:?}", s),
            SettingValue::List(items) => write!(f, "{:?}", items),
        }
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Integer(n)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Text(s)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(items: Vec<String>) -> Self {
        SettingValue::List(items)
    }
}

impl From<&[&str]> for SettingValue {
    fn from(items: &[&str]) -> Self {
        SettingValue::List(items.iter().map(|s| s.to_string()).collect())
    }
}

/// User-supplied overrides for one namespace, keyed by setting name.
pub type OverrideMapping = BTreeMap<String, SettingValue>;

/// Immutable table of recognized settings and their default values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    table: BTreeMap<&'static str, SettingValue>,
}

impl Defaults {
    /// The library's built-in defaults.
    pub fn builtin() -> Self {
        let mut table = BTreeMap::new();
        table.insert(MIN_STREAMING_LENGTH, SettingValue::Integer(4 * 1024));
        // RFC 2616 section 3.7.1
        table.insert(DEFAULT_CHARSET, SettingValue::from("latin-1"));
        // Accept-Encoding is dropped so upstream content arrives uncompressed.
        table.insert(
            IGNORE_HEADERS,
            SettingValue::from(&["HTTP_ACCEPT_ENCODING", "HTTP_HOST", "HTTP_REMOTE_USER"][..]),
        );
        table.insert(
            HTML_CONTENT_TYPES,
            SettingValue::from(&["text/html", "application/xhtml+xml"][..]),
        );
        table.insert(DEFAULT_AMT, SettingValue::Integer(1 << 16));
        Self { table }
    }

    /// Build a table from arbitrary entries.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, SettingValue)>,
    {
        Self {
            table: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SettingValue> {
        self.table.get(name)
    }

    /// The canonical name and default for `name`.
    pub fn entry(&self, name: &str) -> Option<(&'static str, &SettingValue)> {
        self.table.get_key_value(name).map(|(key, value)| (*key, value))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Recognized setting names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Process-wide defaults, built on first use.
pub static DEFAULTS: LazyLock<Arc<Defaults>> = LazyLock::new(|| Arc::new(Defaults::builtin()));
