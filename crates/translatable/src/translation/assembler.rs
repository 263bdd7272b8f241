//! Read assembly: fetch translation rows and build per-entity maps.

use std::collections::HashMap;

use serde_json::Value;

use super::policy::fill_missing;
use super::{LocaleSelection, ReadOptions};
use crate::error::Result;
use crate::locale::LocaleRegistry;
use crate::record::{Record, RecordKey, TranslationMap};
use crate::schema::TranslationSchema;
use crate::store::TranslationStore;

/// Locales the caller asked for.
///
/// An empty explicit list means the current locale. Duplicates are dropped;
/// the first unsupported code fails the read.
pub fn resolve_active_locales(
    options: &ReadOptions,
    registry: &LocaleRegistry,
) -> Result<Vec<String>> {
    match &options.locales {
        LocaleSelection::All => Ok(registry.supported_locales().to_vec()),
        LocaleSelection::Only(list) if !list.is_empty() => {
            let mut active: Vec<String> = Vec::with_capacity(list.len());
            for code in list {
                registry.ensure_supported(code)?;
                if !active.contains(code) {
                    active.push(code.clone());
                }
            }
            Ok(active)
        }
        LocaleSelection::Current | LocaleSelection::Only(_) => {
            let current = options.effective_locale(registry);
            registry.ensure_supported(current)?;
            Ok(vec![current.to_string()])
        }
    }
}

/// The active set plus the fallback locale when fallback is on.
pub fn queried_locales(active: &[String], options: &ReadOptions) -> Vec<String> {
    let mut queried = active.to_vec();
    if options.use_fallback_locale && !queried.contains(&options.fallback_locale) {
        queried.push(options.fallback_locale.clone());
    }
    queried
}

/// Translation map for one base record.
pub async fn fetch_for_one<T>(
    store: &T,
    key: &RecordKey,
    active: &[String],
    options: &ReadOptions,
) -> Result<TranslationMap>
where
    T: TranslationStore + ?Sized,
{
    let queried = queried_locales(active, options);
    let rows = store.find_by_foreign_key(key, &queried).await?;
    let schema = store.schema();

    let mut map = TranslationMap::new();
    for row in rows {
        if let Some((locale, row)) = strip(schema, row) {
            map.insert(locale, row);
        }
    }
    fill_missing(&mut map, &queried, active, options, schema);
    Ok(map)
}

/// Translation maps for many base records from a single store read.
///
/// Every requested key gets an entry, even when it has no rows.
pub async fn fetch_for_many<T>(
    store: &T,
    keys: &[RecordKey],
    active: &[String],
    options: &ReadOptions,
) -> Result<HashMap<RecordKey, TranslationMap>>
where
    T: TranslationStore + ?Sized,
{
    let queried = queried_locales(active, options);
    let rows = if keys.is_empty() {
        Vec::new()
    } else {
        store.find_by_foreign_keys(keys, &queried).await?
    };
    let schema = store.schema();

    let mut grouped: HashMap<RecordKey, TranslationMap> = keys
        .iter()
        .map(|k| (k.clone(), TranslationMap::new()))
        .collect();

    for row in rows {
        let Some(owner) = row
            .get(&schema.foreign_key)
            .and_then(|fk| keys.iter().find(|k| k.matches(fk)))
        else {
            continue;
        };
        if let Some((locale, row)) = strip(schema, row)
            && let Some(map) = grouped.get_mut(owner)
        {
            map.insert(locale, row);
        }
    }

    for map in grouped.values_mut() {
        fill_missing(map, &queried, active, options, schema);
    }
    Ok(grouped)
}

/// Drop the foreign key and locale columns; returns the row's locale.
fn strip(schema: &TranslationSchema, mut row: Record) -> Option<(String, Record)> {
    row.remove(&schema.foreign_key);
    match row.remove(&schema.locale_field) {
        Some(Value::String(locale)) => Some((locale, row)),
        _ => None,
    }
}
