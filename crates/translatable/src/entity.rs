//! Read results.
//!
//! An [`Entity`] is a base record together with the translation map that was
//! loaded for it. Serialising an entity yields the base attributes plus a
//! `translations` object in loaded-locale order.

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{Result, TranslatableError};
use crate::locale::LocaleRegistry;
use crate::record::{Record, RecordKey, TRANSLATIONS_FIELD, TranslationMap};

/// A base record with its loaded translations.
#[derive(Debug, Clone)]
pub struct Entity {
    attributes: Record,
    translations: TranslationMap,
    /// Locale `translate(None)` resolves to.
    current_locale: String,
    registry: Arc<LocaleRegistry>,
}

impl Entity {
    pub fn new(attributes: Record, current_locale: &str, registry: Arc<LocaleRegistry>) -> Self {
        Self {
            attributes,
            translations: TranslationMap::new(),
            current_locale: current_locale.to_string(),
            registry,
        }
    }

    /// Base (non-translated) attributes.
    pub fn attributes(&self) -> &Record {
        &self.attributes
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Primary key value, if the record carries one.
    pub fn key(&self, primary_key: &str) -> Option<RecordKey> {
        self.attributes
            .get(primary_key)
            .and_then(|v| RecordKey::from_value(v).ok())
    }

    pub fn translations(&self) -> &TranslationMap {
        &self.translations
    }

    pub fn set_translations(&mut self, translations: TranslationMap) {
        self.translations = translations;
    }

    /// Translation row for `locale`, or for the current locale when `None`.
    ///
    /// Unsupported locales fail with `LocaleNotSupported`; supported locales
    /// that were not loaded fail with `TranslationNotLoaded`.
    pub fn translate(&self, locale: Option<&str>) -> Result<&Record> {
        let locale = locale.unwrap_or(&self.current_locale);
        self.registry.ensure_supported(locale)?;
        self.translations
            .get(locale)
            .ok_or_else(|| TranslatableError::TranslationNotLoaded(locale.to_string()))
    }

    pub fn has_translation(&self, locale: &str) -> bool {
        self.translations.contains(locale)
    }

    /// Locales present in the translation map, in map order.
    pub fn loaded_locales(&self) -> Vec<String> {
        self.translations.locales().map(str::to_string).collect()
    }

    /// Base attributes with the translation map under `translations`.
    pub fn into_record(self) -> Record {
        let mut record = self.attributes;
        record.insert(TRANSLATIONS_FIELD.to_string(), self.translations.to_value());
        record
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len() + 1))?;
        for (field, value) in &self.attributes {
            if field != TRANSLATIONS_FIELD {
                map.serialize_entry(field, value)?;
            }
        }
        map.serialize_entry(TRANSLATIONS_FIELD, &self.translations)?;
        map.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn entity() -> Entity {
        let registry = Arc::new(LocaleRegistry::new(["en", "pl"], "en").unwrap());
        let attributes = record(json!({"id": 1, "author": "Test User 1"}));
        let mut entity = Entity::new(attributes, "en", registry);
        let mut map = TranslationMap::new();
        map.insert("en", record(json!({"id": 1, "title": "Sample title 1"})));
        entity.set_translations(map);
        entity
    }

    #[test]
    fn translate_defaults_to_current_locale() {
        let entity = entity();
        assert_eq!(entity.translate(None).unwrap()["title"], "Sample title 1");
        assert_eq!(entity.get("author").unwrap(), "Test User 1");
        assert_eq!(entity.key("id"), Some(RecordKey::Int(1)));
    }

    #[test]
    fn unsupported_locale_is_rejected() {
        let err = entity().translate(Some("jp")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The \"jp\" locale is not in the list of supported locales."
        );
    }

    #[test]
    fn unloaded_locale_is_reported() {
        let entity = entity();
        assert!(!entity.has_translation("pl"));
        let err = entity.translate(Some("pl")).unwrap_err();
        assert!(matches!(err, TranslatableError::TranslationNotLoaded(code) if code == "pl"));
    }

    #[test]
    fn serializes_attributes_and_translations() {
        let text = serde_json::to_string(&entity()).unwrap();
        assert!(text.contains(r#""author":"Test User 1""#), "{text}");
        assert!(
            text.ends_with(r#""translations":{"en":{"id":1,"title":"Sample title 1"}}}"#),
            "{text}"
        );
    }

    #[test]
    fn into_record_attaches_translations() {
        let record = entity().into_record();
        assert_eq!(record["translations"]["en"]["title"], "Sample title 1");
        assert_eq!(entity().loaded_locales(), ["en"]);
    }
}
