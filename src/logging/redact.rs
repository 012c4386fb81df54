//! Recursive masking of secret-bearing values before they reach a log sink.
//!
//! Any mapping key whose normalized form contains one of the sensitive
//! keywords has its value replaced by [`REDACTED`]. Everything else is copied
//! through, with nested mappings and sequences redacted in turn.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Marker written in place of a sensitive value
pub const REDACTED: &str = "***REDACTED***";

const SENSITIVE_KEYWORDS: &[&str] = &[
    "api_key",
    "apikey",
    "auth",
    "authorization",
    "cookie",
    "hf_token",
    "password",
    "passwd",
    "refresh_token",
    "secret",
    "set_cookie",
    "token",
];

/// Produce a redacted JSON copy of a value.
///
/// Lists and tuples both become JSON arrays. Sets become arrays sorted by the
/// string form of their elements so output is stable across runs.
pub trait RedactSensitive {
    fn redact_sensitive(&self) -> Value;
}

/// Redact any supported value
pub fn redact_sensitive<T: RedactSensitive + ?Sized>(value: &T) -> Value {
    value.redact_sensitive()
}

/// Redact any serializable value.
///
/// Values serde_json cannot represent are coerced to their debug string.
pub fn redact_serializable<T: Serialize + fmt::Debug + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(json) => json.redact_sensitive(),
        Err(_) => Value::String(format!("{:?}", value)),
    }
}

/// Whether a mapping key names a secret
pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = normalize_key(key);
    if normalized.is_empty() {
        return false;
    }
    SENSITIVE_KEYWORDS
        .iter()
        .any(|keyword| normalized.contains(keyword))
}

/// Lowercase, collapse each non-alphanumeric run to `_`, trim `_` at both ends
fn normalize_key(key: &str) -> String {
    let mut normalized = String::with_capacity(key.len());
    let mut pending_separator = false;

    for c in key.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !normalized.is_empty() {
                normalized.push('_');
            }
            pending_separator = false;
            normalized.push(c);
        } else {
            pending_separator = true;
        }
    }

    normalized
}

fn redact_entries<'a, K, V, I>(entries: I) -> Value
where
    I: IntoIterator<Item = (&'a K, &'a V)>,
    K: fmt::Display + ?Sized + 'a,
    V: RedactSensitive + ?Sized + 'a,
{
    let mut redacted = Map::new();
    for (raw_key, raw_value) in entries {
        let key = raw_key.to_string();
        let value = if is_sensitive_key(&key) {
            Value::String(REDACTED.to_string())
        } else {
            raw_value.redact_sensitive()
        };
        redacted.insert(key, value);
    }
    Value::Object(redacted)
}

fn redact_items<'a, T, I>(items: I) -> Value
where
    I: IntoIterator<Item = &'a T>,
    T: RedactSensitive + 'a,
{
    Value::Array(items.into_iter().map(RedactSensitive::redact_sensitive).collect())
}

fn redact_set<'a, T, I>(items: I) -> Value
where
    I: IntoIterator<Item = &'a T>,
    T: RedactSensitive + 'a,
{
    let mut redacted: Vec<Value> = items
        .into_iter()
        .map(RedactSensitive::redact_sensitive)
        .collect();
    redacted.sort_by_cached_key(sort_key);
    Value::Array(redacted)
}

/// Set elements order by their plain string form: `None`, `True`, `False`
/// for null and booleans, raw text for strings, JSON for the rest
fn sort_key(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl RedactSensitive for Value {
    fn redact_sensitive(&self) -> Value {
        match self {
            Value::Object(map) => redact_entries(map.iter()),
            Value::Array(items) => redact_items(items.iter()),
            scalar => scalar.clone(),
        }
    }
}

impl RedactSensitive for Map<String, Value> {
    fn redact_sensitive(&self) -> Value {
        redact_entries(self.iter())
    }
}

impl<K, V, S> RedactSensitive for HashMap<K, V, S>
where
    K: fmt::Display,
    V: RedactSensitive,
{
    fn redact_sensitive(&self) -> Value {
        redact_entries(self.iter())
    }
}

impl<K, V> RedactSensitive for BTreeMap<K, V>
where
    K: fmt::Display,
    V: RedactSensitive,
{
    fn redact_sensitive(&self) -> Value {
        redact_entries(self.iter())
    }
}

impl<T: RedactSensitive> RedactSensitive for Vec<T> {
    fn redact_sensitive(&self) -> Value {
        redact_items(self.iter())
    }
}

impl<T: RedactSensitive> RedactSensitive for [T] {
    fn redact_sensitive(&self) -> Value {
        redact_items(self.iter())
    }
}

impl<T: RedactSensitive, const N: usize> RedactSensitive for [T; N] {
    fn redact_sensitive(&self) -> Value {
        redact_items(self.iter())
    }
}

impl<T: RedactSensitive, S> RedactSensitive for HashSet<T, S> {
    fn redact_sensitive(&self) -> Value {
        redact_set(self.iter())
    }
}

impl<T: RedactSensitive> RedactSensitive for BTreeSet<T> {
    fn redact_sensitive(&self) -> Value {
        redact_set(self.iter())
    }
}

impl<T: RedactSensitive> RedactSensitive for Option<T> {
    fn redact_sensitive(&self) -> Value {
        match self {
            Some(value) => value.redact_sensitive(),
            None => Value::Null,
        }
    }
}

impl<T: RedactSensitive + ?Sized> RedactSensitive for &T {
    fn redact_sensitive(&self) -> Value {
        (**self).redact_sensitive()
    }
}

impl<T: RedactSensitive + ?Sized> RedactSensitive for Box<T> {
    fn redact_sensitive(&self) -> Value {
        (**self).redact_sensitive()
    }
}

macro_rules! impl_redact_tuple {
    ($($name:ident => $index:tt),+) => {
        impl<$($name: RedactSensitive),+> RedactSensitive for ($($name,)+) {
            fn redact_sensitive(&self) -> Value {
                Value::Array(vec![$(self.$index.redact_sensitive()),+])
            }
        }
    };
}

impl_redact_tuple!(A => 0);
impl_redact_tuple!(A => 0, B => 1);
impl_redact_tuple!(A => 0, B => 1, C => 2);
impl_redact_tuple!(A => 0, B => 1, C => 2, D => 3);

macro_rules! impl_redact_scalar {
    ($($ty:ty),+) => {
        $(
            impl RedactSensitive for $ty {
                fn redact_sensitive(&self) -> Value {
                    Value::from(self.clone())
                }
            }
        )+
    };
}

impl_redact_scalar!(String, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl RedactSensitive for str {
    fn redact_sensitive(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl RedactSensitive for char {
    fn redact_sensitive(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl RedactSensitive for f64 {
    fn redact_sensitive(&self) -> Value {
        // NaN and infinities have no JSON form
        if self.is_finite() {
            Value::from(*self)
        } else {
            Value::String(self.to_string())
        }
    }
}

impl RedactSensitive for f32 {
    fn redact_sensitive(&self) -> Value {
        f64::from(*self).redact_sensitive()
    }
}

impl RedactSensitive for () {
    fn redact_sensitive(&self) -> Value {
        Value::Null
    }
}

/// Sanitized context ready to attach to a log record.
///
/// Attach it to a `tracing` event as `context = %extra`; the logging layer
/// parses the rendered JSON back into the record's context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogExtra {
    context: Option<Value>,
}

impl LogExtra {
    /// The redacted context, if any
    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_none()
    }

    /// `{"context": <redacted>}`, or an empty map when no context was given
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(context) = self.context {
            map.insert("context".to_string(), context);
        }
        map
    }
}

impl fmt::Display for LogExtra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{}", context),
            None => Ok(()),
        }
    }
}

/// Build sanitized log context from an optional mapping
pub fn log_extra<T: RedactSensitive + ?Sized>(context: Option<&T>) -> LogExtra {
    LogExtra {
        context: context.map(RedactSensitive::redact_sensitive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redact_sensitive_recurses_nested_structures() {
        let source = json!({
            "token": "abc123",
            "nested": {"password": "secret", "safe": "value"},
            "items": [{"api_key": "key-1"}, {"value": 7}],
        });

        let redacted = redact_sensitive(&source);
        assert_eq!(redacted["token"], REDACTED);
        assert_eq!(redacted["nested"]["password"], REDACTED);
        assert_eq!(redacted["nested"]["safe"], "value");
        assert_eq!(redacted["items"][0]["api_key"], REDACTED);
        assert_eq!(redacted["items"][1]["value"], 7);
    }

    #[test]
    fn test_redaction_applies_at_any_depth() {
        let source = json!({"a": {"b": [{"c": {"Refresh-Token": "r"}}]}});
        let redacted = redact_sensitive(&source);
        assert_eq!(redacted["a"]["b"][0]["c"]["Refresh-Token"], REDACTED);
    }

    #[test]
    fn test_sensitive_value_is_replaced_whole() {
        let source = json!({"auth": {"user": "bob", "pass": "x"}});
        assert_eq!(redact_sensitive(&source), json!({"auth": REDACTED}));
    }

    #[test]
    fn test_non_sensitive_values_pass_through() {
        assert_eq!(redact_sensitive(&json!({"safe": "value"})), json!({"safe": "value"}));
        assert_eq!(redact_sensitive(&json!(42)), json!(42));
        assert_eq!(redact_sensitive("plain"), json!("plain"));
        assert_eq!(redact_sensitive(&json!(null)), json!(null));
    }

    #[test]
    fn test_is_sensitive_key_normalizes() {
        assert!(is_sensitive_key("API-Key"));
        assert!(is_sensitive_key("  x-auth-header "));
        assert!(is_sensitive_key("Set-Cookie"));
        assert!(is_sensitive_key("github_access_token"));
        assert!(is_sensitive_key("HF__TOKEN"));
        assert!(is_sensitive_key("client.secret"));
        assert!(!is_sensitive_key("safe"));
        assert!(!is_sensitive_key("path"));
        assert!(!is_sensitive_key("---"));
        assert!(!is_sensitive_key(""));
    }

    #[test]
    fn test_hf_token_presence_flag_is_redacted() {
        // Keys that merely contain a keyword are masked too
        let source = json!({"has_hf_token": true});
        assert_eq!(redact_sensitive(&source)["has_hf_token"], REDACTED);
    }

    #[test]
    fn test_sets_are_sorted_by_string_form() {
        let set: HashSet<&str> = ["b", "a"].into_iter().collect();
        assert_eq!(redact_sensitive(&set), json!(["a", "b"]));
        assert_eq!(redact_sensitive(&set), json!(["a", "b"]));

        let numbers: HashSet<i32> = [10, 9, 100].into_iter().collect();
        assert_eq!(redact_sensitive(&numbers), json!([10, 100, 9]));
    }

    #[test]
    fn test_set_ordering_names_null_and_booleans() {
        let optional: HashSet<Option<&str>> = [Some("Z"), None].into_iter().collect();
        assert_eq!(redact_sensitive(&optional), json!([null, "Z"]));

        let flags: BTreeSet<bool> = [true, false].into_iter().collect();
        assert_eq!(redact_sensitive(&flags), json!([false, true]));
    }

    #[test]
    fn test_tuples_and_vectors_become_lists() {
        let tuple = ("a", 1, true);
        assert_eq!(redact_sensitive(&tuple), json!(["a", 1, true]));

        let list = vec![HashMap::from([("password", "p")])];
        assert_eq!(redact_sensitive(&list), json!([{"password": REDACTED}]));
    }

    #[test]
    fn test_map_keys_are_stringified() {
        let map = BTreeMap::from([(1, "one"), (2, "two")]);
        assert_eq!(redact_sensitive(&map), json!({"1": "one", "2": "two"}));
    }

    #[test]
    fn test_non_finite_floats_become_strings() {
        assert_eq!(redact_sensitive(&f64::NAN), json!("NaN"));
        assert_eq!(redact_sensitive(&1.5f64), json!(1.5));
    }

    #[test]
    fn test_redact_serializable() {
        #[derive(Debug, Serialize)]
        struct Request {
            url: String,
            authorization: String,
        }

        let request = Request {
            url: "https://example.com/feed".to_string(),
            authorization: "Bearer abc".to_string(),
        };
        assert_eq!(
            redact_serializable(&request),
            json!({"url": "https://example.com/feed", "authorization": REDACTED})
        );
    }

    #[test]
    fn test_log_extra_wraps_redacted_context() {
        let extra = log_extra(Some(&json!({"api_key": "v", "safe": "ok"})));
        let map = extra.clone().into_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map["context"], json!({"api_key": REDACTED, "safe": "ok"}));
        assert_eq!(extra.to_string(), r#"{"api_key":"***REDACTED***","safe":"ok"}"#);
    }

    #[test]
    fn test_log_extra_without_context_is_empty() {
        let extra = log_extra::<Value>(None);
        assert!(extra.is_empty());
        assert!(extra.clone().into_map().is_empty());
        assert_eq!(extra.to_string(), "");
    }
}
