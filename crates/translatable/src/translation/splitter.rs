//! Write splitting.
//!
//! A combined payload carries base attributes plus an optional
//! `translations` object (`locale → fields`). The payload is split before the
//! base write; locale rows are written once the base record exists.

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TranslatableError};
use crate::locale::LocaleRegistry;
use crate::record::{Record, RecordKey, TRANSLATIONS_FIELD, TranslationMap};
use crate::schema::TranslationSchema;
use crate::store::{RowLocator, TranslationStore, write_checked};

/// Remove `translations` from `data` and return the supported locales' fields.
///
/// Entries for unsupported locales are dropped whatever their value. A
/// `translations` value that is not an object, or a supported locale whose
/// fields are not an object, is rejected before any write.
pub fn before_write(data: &mut Record, registry: &LocaleRegistry) -> Result<TranslationMap> {
    let mut buffered = TranslationMap::new();
    let Some(payload) = data.remove(TRANSLATIONS_FIELD) else {
        return Ok(buffered);
    };

    let locales = match payload {
        Value::Object(locales) => locales,
        other => {
            return Err(TranslatableError::MalformedTranslations(format!(
                "expected an object keyed by locale, got {}",
                kind(&other)
            )));
        }
    };

    for (locale, fields) in locales {
        if !registry.is_supported(&locale) {
            debug!(locale = %locale, "dropping translation for unsupported locale");
            continue;
        }
        let fields = match fields {
            Value::Object(fields) => fields,
            other => {
                return Err(TranslatableError::MalformedTranslations(format!(
                    "fields for locale \"{locale}\" must be an object, got {}",
                    kind(&other)
                )));
            }
        };
        buffered.insert(locale, fields);
    }

    Ok(buffered)
}

/// Insert one translation row per buffered locale for a new base record.
pub async fn after_insert<T>(store: &T, key: &RecordKey, buffered: &TranslationMap) -> Result<()>
where
    T: TranslationStore + ?Sized,
{
    for (locale, fields) in buffered.iter() {
        let row = translation_row(store.schema(), key, locale, fields);
        store.insert(row).await?;
        debug!(foreign_key = %key, locale = %locale, "translation inserted");
    }
    Ok(())
}

/// Write buffered locales for every updated base record.
///
/// With `atomic` the store's single-statement upsert is used; otherwise each
/// pair is counted and then updated or inserted.
pub async fn after_update<T>(
    store: &T,
    keys: &[RecordKey],
    buffered: &TranslationMap,
    atomic: bool,
) -> Result<()>
where
    T: TranslationStore + ?Sized,
{
    for (locale, fields) in buffered.iter() {
        for key in keys {
            let locator = RowLocator::new(key.clone(), locale);
            let row = translation_row(store.schema(), key, locale, fields);
            if atomic {
                store.upsert(&locator, row).await?;
            } else {
                write_checked(store, &locator, row).await?;
            }
        }
    }
    Ok(())
}

/// Buffered fields restricted to the writable value columns, with the
/// foreign key and locale merged in.
fn translation_row(
    schema: &TranslationSchema,
    key: &RecordKey,
    locale: &str,
    fields: &Record,
) -> Record {
    let mut row = Record::new();
    for (field, value) in fields {
        if schema.value_fields().any(|f| f == field.as_str()) {
            row.insert(field.clone(), value.clone());
        } else {
            debug!(
                field = %field,
                table = %schema.table,
                "ignoring non-writable translation field"
            );
        }
    }
    row.insert(schema.foreign_key.clone(), key.to_value());
    row.insert(schema.locale_field.clone(), Value::String(locale.to_string()));
    row
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
