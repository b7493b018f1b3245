//! Extracted records and content hashing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// One extracted record: field name → string or list of strings.
///
/// Backed by an insertion-ordered JSON map so user fields serialize in
/// FieldSpec order, after the built-in `item_index`/`url`/`scraped_at`
/// keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record pre-populated with the built-in fields every record carries.
    pub fn with_builtins(url: &str, scraped_at: DateTime<Utc>) -> Self {
        let mut record = Self::new();
        record.insert_text("url", url);
        record.insert_text("scraped_at", scraped_at.to_rfc3339());
        record
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), Value::String(value.into()));
    }

    pub fn insert_list(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.fields.insert(
            name.into(),
            Value::Array(values.into_iter().map(Value::String).collect()),
        );
    }

    pub fn insert_number(&mut self, name: impl Into<String>, value: u64) {
        self.fields.insert(name.into(), Value::Number(value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Collapse runs of whitespace in every string value, recursively over
    /// list values.
    pub fn clean(&mut self) {
        for value in self.fields.values_mut() {
            clean_value(value);
        }
    }

    /// SHA-256 over the key-sorted serialization.
    ///
    /// Key order is irrelevant: two records with the same content hash
    /// identically regardless of insertion order.
    pub fn canonical_hash(&self) -> String {
        let mut entries: Vec<(&String, &Value)> = self.fields.iter().collect();
        entries.sort_by_key(|(k, _)| k.as_str());

        let mut canonical = String::new();
        for (key, value) in entries {
            canonical.push_str(key);
            canonical.push('=');
            canonical.push_str(&value.to_string());
            canonical.push('\u{1f}');
        }
        compute_hash(&canonical)
    }
}

fn clean_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = normalize_whitespace(s),
        Value::Array(items) => {
            for item in items {
                clean_value(item);
            }
        }
        _ => {}
    }
}

/// Collapse internal whitespace runs to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_come_first_and_user_fields_keep_order() {
        let mut record = Record::with_builtins("https://example.com", Utc::now());
        record.insert_text("zeta", "1");
        record.insert_text("alpha", "2");

        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, vec!["url", "scraped_at", "zeta", "alpha"]);
    }

    #[test]
    fn clean_normalizes_strings_and_lists() {
        let mut record = Record::new();
        record.insert_text("title", "  Hello \n\t World  ");
        record.insert_list("tags", vec!["  a  b ".into(), "c".into()]);
        record.clean();

        assert_eq!(record.get_text("title"), Some("Hello World"));
        assert_eq!(
            record.get("tags").unwrap(),
            &serde_json::json!(["a b", "c"])
        );
    }

    #[test]
    fn canonical_hash_is_key_order_independent() {
        let mut a = Record::new();
        a.insert_text("x", "1");
        a.insert_text("y", "2");

        let mut b = Record::new();
        b.insert_text("y", "2");
        b.insert_text("x", "1");

        assert_eq!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn canonical_hash_differs_on_content() {
        let mut a = Record::new();
        a.insert_text("x", "1");
        let mut b = Record::new();
        b.insert_text("x", "2");
        assert_ne!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}
