//! Record validation and normalization.
//!
//! A record is a JSON object describing one catalogued item, identified
//! by its `url`. The gateway validates only `url` and `saved_at`; every
//! other field passes through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the record identifier.
pub const URL_FIELD: &str = "url";

/// Field holding the client write timestamp (epoch milliseconds).
pub const SAVED_AT_FIELD: &str = "saved_at";

/// Normalizes a raw `saved_at` value.
///
/// Returns the floored timestamp when the value coerces to a finite number
/// greater than zero, and `None` when the field must be stripped. Blank
/// strings never coerce to a zero timestamp.
pub fn normalize_saved_at(raw: &Value) -> Option<i64> {
    let ts = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            parse_numeric_literal(trimmed)?
        }
        Value::Bool(true) => 1.0,
        _ => return None,
    };

    if !ts.is_finite() || ts <= 0.0 {
        return None;
    }

    let floored = ts.floor();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if floored >= i64::MAX as f64 {
        return None;
    }
    Some(floored as i64)
}

/// Parses a trimmed numeric literal the way a loose string-to-number
/// coercion does: decimal with optional sign and exponent, or an unsigned
/// `0x` / `0o` / `0b` integer.
fn parse_numeric_literal(s: &str) -> Option<f64> {
    let radix_prefixed = |prefix_lower: &str, prefix_upper: &str, radix: u32| {
        s.strip_prefix(prefix_lower)
            .or_else(|| s.strip_prefix(prefix_upper))
            .map(|digits| u64::from_str_radix(digits, radix).ok().map(|v| v as f64))
    };

    if let Some(parsed) = radix_prefixed("0x", "0X", 16)
        .or_else(|| radix_prefixed("0o", "0O", 8))
        .or_else(|| radix_prefixed("0b", "0B", 2))
    {
        return parsed;
    }

    // Rust accepts "inf"/"nan" spellings; they are non-finite and rejected
    // by the caller either way.
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Validates and normalizes a single list entry.
///
/// Returns `None` when the entry is not an object or its `url` is missing,
/// not a string, or blank after trimming. Surviving entries keep all their
/// fields, with `url` trimmed and `saved_at` normalized or removed.
pub fn sanitize_record(entry: &Value) -> Option<Map<String, Value>> {
    let obj = entry.as_object()?;
    let url = obj.get(URL_FIELD)?.as_str()?.trim();
    if url.is_empty() {
        return None;
    }

    let mut out = obj.clone();
    out.insert(URL_FIELD.to_string(), Value::String(url.to_string()));

    match obj.get(SAVED_AT_FIELD).and_then(normalize_saved_at) {
        Some(ts) => {
            out.insert(SAVED_AT_FIELD.to_string(), Value::from(ts));
        }
        None => {
            out.shift_remove(SAVED_AT_FIELD);
        }
    }

    Some(out)
}

/// Validates a list destined for one key.
///
/// The first `max_items` raw entries are considered; invalid ones are
/// dropped. Order of the survivors is preserved.
pub fn sanitize_list(items: &[Value], max_items: usize) -> Vec<Value> {
    items
        .iter()
        .take(max_items)
        .filter_map(sanitize_record)
        .map(Value::Object)
        .collect()
}

/// Typed view of a record, used by clients when merging lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within a list.
    pub url: String,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Poster image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Write timestamp in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<i64>,
    /// Fields the gateway does not interpret (year, list type, notes...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Creates a record with only a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            poster: None,
            saved_at: None,
            extra: Map::new(),
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the poster URL.
    pub fn with_poster(mut self, poster: impl Into<String>) -> Self {
        self.poster = Some(poster.into());
        self
    }

    /// Sets the write timestamp.
    pub fn with_saved_at(mut self, saved_at: i64) -> Self {
        self.saved_at = Some(saved_at);
        self
    }

    /// Sets an uninterpreted field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Builds a record from loosely-typed JSON.
    ///
    /// Returns `None` unless the value is an object with a string `url`.
    /// Numeric titles and posters are stringified; other non-string values
    /// for those fields are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let url = obj.get(URL_FIELD)?.as_str()?.to_string();

        let mut record = Record::new(url);
        for (name, field) in obj {
            match name.as_str() {
                URL_FIELD => {}
                "title" => record.title = loose_string(field),
                "poster" => record.poster = loose_string(field),
                SAVED_AT_FIELD => record.saved_at = normalize_saved_at(field),
                _ => {
                    record.extra.insert(name.clone(), field.clone());
                }
            }
        }
        Some(record)
    }

    /// Converts the record back to JSON.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(URL_FIELD.to_string(), Value::String(self.url.clone()));
        if let Some(title) = &self.title {
            obj.insert("title".to_string(), Value::String(title.clone()));
        }
        if let Some(poster) = &self.poster {
            obj.insert("poster".to_string(), Value::String(poster.clone()));
        }
        if let Some(ts) = self.saved_at {
            obj.insert(SAVED_AT_FIELD.to_string(), Value::from(ts));
        }
        for (name, field) in &self.extra {
            obj.insert(name.clone(), field.clone());
        }
        Value::Object(obj)
    }
}

fn loose_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn saved_at_keeps_positive_integers() {
        assert_eq!(normalize_saved_at(&json!(1_700_000_000_000i64)), Some(1_700_000_000_000));
    }

    #[test]
    fn saved_at_strips_blank_strings() {
        assert_eq!(normalize_saved_at(&json!("")), None);
        assert_eq!(normalize_saved_at(&json!("   ")), None);
    }

    #[test]
    fn saved_at_strips_non_positive() {
        assert_eq!(normalize_saved_at(&json!(-5)), None);
        assert_eq!(normalize_saved_at(&json!(0)), None);
        assert_eq!(normalize_saved_at(&json!("-12")), None);
    }

    #[test]
    fn saved_at_coerces_numeric_strings() {
        assert_eq!(normalize_saved_at(&json!(" 1700000000000 ")), Some(1_700_000_000_000));
        assert_eq!(normalize_saved_at(&json!("1.7e12")), Some(1_700_000_000_000));
        assert_eq!(normalize_saved_at(&json!("0x10")), Some(16));
        assert_eq!(normalize_saved_at(&json!("12abc")), None);
        assert_eq!(normalize_saved_at(&json!("Infinity")), None);
    }

    #[test]
    fn saved_at_floors_fractions() {
        assert_eq!(normalize_saved_at(&json!(1234.9)), Some(1234));
    }

    #[test]
    fn saved_at_rejects_other_types() {
        assert_eq!(normalize_saved_at(&Value::Null), None);
        assert_eq!(normalize_saved_at(&json!(false)), None);
        assert_eq!(normalize_saved_at(&json!([5])), None);
        assert_eq!(normalize_saved_at(&json!({"ts": 5})), None);
        assert_eq!(normalize_saved_at(&json!(true)), Some(1));
    }

    #[test]
    fn saved_at_rejects_out_of_range() {
        assert_eq!(normalize_saved_at(&json!(1e30)), None);
    }

    #[test]
    fn sanitize_trims_url_and_keeps_extra_fields() {
        let entry = json!({"url": "  https://x/a  ", "title": "A", "year": 2020});
        let out = sanitize_record(&entry).unwrap();
        assert_eq!(out["url"], "https://x/a");
        assert_eq!(out["title"], "A");
        assert_eq!(out["year"], 2020);
        assert!(!out.contains_key("saved_at"));
    }

    #[test]
    fn sanitize_strips_empty_saved_at() {
        let entry = json!({"url": "https://x/a", "saved_at": ""});
        let out = sanitize_record(&entry).unwrap();
        assert!(!out.contains_key("saved_at"));
    }

    #[test]
    fn sanitize_rewrites_saved_at_in_place() {
        let entry = json!({"url": "u", "saved_at": "42", "title": "t"});
        let out = sanitize_record(&entry).unwrap();
        let keys: Vec<_> = out.keys().cloned().collect();
        assert_eq!(keys, vec!["url", "saved_at", "title"]);
        assert_eq!(out["saved_at"], 42);
    }

    #[test]
    fn sanitize_rejects_bad_entries() {
        assert!(sanitize_record(&json!({})).is_none());
        assert!(sanitize_record(&json!({"url": "   "})).is_none());
        assert!(sanitize_record(&json!({"url": 5})).is_none());
        assert!(sanitize_record(&json!("https://x/a")).is_none());
        assert!(sanitize_record(&Value::Null).is_none());
    }

    #[test]
    fn sanitize_list_truncates_before_filtering() {
        let items = vec![json!({}), json!({"url": "b"}), json!({"url": "c"})];
        let out = sanitize_list(&items, 2);
        assert_eq!(out, vec![json!({"url": "b"})]);
    }

    #[test]
    fn record_from_loose_json() {
        let record = Record::from_value(&json!({
            "url": "https://x/a",
            "title": 1984,
            "poster": null,
            "saved_at": "",
            "filmin_extra_field": "note"
        }))
        .unwrap();
        assert_eq!(record.title.as_deref(), Some("1984"));
        assert_eq!(record.poster, None);
        assert_eq!(record.saved_at, None);
        assert_eq!(record.extra["filmin_extra_field"], "note");
    }

    #[test]
    fn record_to_value_omits_missing_fields() {
        let value = Record::new("https://x/a").with_field("year", 2001).to_value();
        assert_eq!(value, json!({"url": "https://x/a", "year": 2001}));
    }

    #[test]
    fn record_serde_flattens_extra() {
        let record = Record::new("u").with_title("T").with_saved_at(7).with_field("k", "v");
        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded, json!({"url": "u", "title": "T", "saved_at": 7, "k": "v"}));
        let decoded: Record = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, record);
    }

    proptest! {
        #[test]
        fn positive_integers_survive(ts in 1i64..=9_007_199_254_740_991i64) {
            prop_assert_eq!(normalize_saved_at(&json!(ts)), Some(ts));
        }

        #[test]
        fn non_positive_integers_are_stripped(ts in i64::MIN..=0i64) {
            prop_assert_eq!(normalize_saved_at(&json!(ts)), None);
        }

        #[test]
        fn sanitized_urls_are_trimmed_and_non_blank(
            urls in prop::collection::vec("[ \\t]{0,2}[a-z/:.]{0,8}[ \\t]{0,2}", 0..20),
            max in 0usize..25,
        ) {
            let items: Vec<Value> = urls.iter().map(|u| json!({"url": u})).collect();
            let out = sanitize_list(&items, max);
            prop_assert!(out.len() <= max.min(items.len()));
            for entry in &out {
                let url = entry["url"].as_str().unwrap();
                prop_assert!(!url.is_empty());
                prop_assert_eq!(url, url.trim());
            }
        }
    }
}
