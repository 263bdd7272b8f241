//! Records, record keys and translation maps.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Result, TranslatableError};

/// Reserved attribute name carrying translations on records.
pub const TRANSLATIONS_FIELD: &str = "translations";

/// A row as a JSON object keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Primary key of a base record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(i64),
    Text(String),
}

impl RecordKey {
    /// Read a key out of a JSON value.
    ///
    /// Numeric strings are kept as text: the store decides how to compare.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordKey::Int).ok_or_else(|| {
                TranslatableError::Store(format!("record key {n} is not an integer"))
            }),
            Value::String(s) => Ok(RecordKey::Text(s.clone())),
            other => Err(TranslatableError::Store(format!(
                "unsupported record key value: {other}"
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordKey::Int(i) => Value::from(*i),
            RecordKey::Text(s) => Value::String(s.clone()),
        }
    }

    /// True when the JSON value denotes this key.
    ///
    /// Integers and their decimal string form compare equal, matching how a
    /// SQL store coerces literals.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (RecordKey::Int(i), Value::Number(n)) => n.as_i64() == Some(*i),
            (RecordKey::Int(i), Value::String(s)) => s.parse::<i64>().ok() == Some(*i),
            (RecordKey::Text(t), Value::String(s)) => t == s,
            (RecordKey::Text(t), Value::Number(n)) => n.to_string() == *t,
            _ => false,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Int(i) => write!(f, "{i}"),
            RecordKey::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        RecordKey::Int(value)
    }
}

impl From<i32> for RecordKey {
    fn from(value: i32) -> Self {
        RecordKey::Int(i64::from(value))
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        RecordKey::Text(value.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        RecordKey::Text(value)
    }
}

/// Per-entity translations keyed by locale, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationMap {
    entries: Vec<(String, Record)>,
}

impl TranslationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, locale: &str) -> Option<&Record> {
        self.entries
            .iter()
            .find(|(code, _)| code == locale)
            .map(|(_, row)| row)
    }

    pub fn contains(&self, locale: &str) -> bool {
        self.get(locale).is_some()
    }

    /// Insert or replace the row for a locale. Replacing keeps the position.
    pub fn insert(&mut self, locale: impl Into<String>, row: Record) {
        let locale = locale.into();
        match self.entries.iter_mut().find(|(code, _)| *code == locale) {
            Some(entry) => entry.1 = row,
            None => self.entries.push((locale, row)),
        }
    }

    pub fn remove(&mut self, locale: &str) -> Option<Record> {
        let pos = self.entries.iter().position(|(code, _)| code == locale)?;
        Some(self.entries.remove(pos).1)
    }

    /// Locales in map order.
    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(code, _)| code.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.entries.iter().map(|(code, row)| (code.as_str(), row))
    }

    /// Reorder entries to follow `order`; locales not listed keep their
    /// relative order at the end.
    pub fn sort_by_locales(&mut self, order: &[String]) {
        self.entries.sort_by_key(|(code, _)| {
            order
                .iter()
                .position(|o| o == code)
                .unwrap_or(order.len())
        });
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (code, row) in &self.entries {
            map.insert(code.clone(), Value::Object(row.clone()));
        }
        Value::Object(map)
    }
}

impl Serialize for TranslationMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (code, row) in &self.entries {
            map.serialize_entry(code, row)?;
        }
        map.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(title: &str) -> Record {
        json!({ "title": title }).as_object().cloned().unwrap()
    }

    #[test]
    fn key_from_json_values() {
        assert_eq!(RecordKey::from_value(&json!(3)).unwrap(), RecordKey::Int(3));
        assert_eq!(
            RecordKey::from_value(&json!("a-1")).unwrap(),
            RecordKey::Text("a-1".to_string())
        );
        assert!(RecordKey::from_value(&json!(null)).is_err());
        assert!(RecordKey::from_value(&json!(1.5)).is_err());
    }

    #[test]
    fn key_matching_coerces_numeric_strings() {
        assert!(RecordKey::Int(7).matches(&json!(7)));
        assert!(RecordKey::Int(7).matches(&json!("7")));
        assert!(!RecordKey::Int(7).matches(&json!("07x")));
        assert!(RecordKey::Text("7".to_string()).matches(&json!(7)));
    }

    #[test]
    fn map_keeps_insertion_order_and_replaces_in_place() {
        let mut map = TranslationMap::new();
        map.insert("pl", row("B"));
        map.insert("en", row("A"));
        map.insert("pl", row("C"));

        assert_eq!(map.locales().collect::<Vec<_>>(), ["pl", "en"]);
        assert_eq!(map.get("pl").unwrap()["title"], "C");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn sort_follows_requested_order() {
        let mut map = TranslationMap::new();
        map.insert("pl", row("B"));
        map.insert("de", row("D"));
        map.insert("en", row("A"));
        map.sort_by_locales(&["en".to_string(), "pl".to_string()]);
        assert_eq!(map.locales().collect::<Vec<_>>(), ["en", "pl", "de"]);
    }

    #[test]
    fn serializes_as_object_in_order() {
        let mut map = TranslationMap::new();
        map.insert("pl", row("B"));
        map.insert("en", row("A"));
        let text = serde_json::to_string(&map).unwrap();
        assert_eq!(text, r#"{"pl":{"title":"B"},"en":{"title":"A"}}"#);
    }
}
