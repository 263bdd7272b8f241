//! Fallback and fill policy for missing locales.

use serde_json::Value;

use super::ReadOptions;
use crate::record::{Record, TranslationMap};
use crate::schema::TranslationSchema;

/// Complete one entity's translation map.
///
/// `queried` is what was fetched (the active set, plus the fallback locale
/// when it was appended implicitly); `active` is what the caller asked for.
///
/// Missing locales are filled from the fallback locale's row (identity
/// nulled) when fallback is on and that row exists, otherwise with an empty
/// placeholder when either policy is on. An implicitly queried fallback
/// locale is then dropped from the map. Entries end up in `queried` order.
pub fn fill_missing(
    map: &mut TranslationMap,
    queried: &[String],
    active: &[String],
    options: &ReadOptions,
    schema: &TranslationSchema,
) {
    if options.use_fallback_locale || options.fill_with_empty {
        let missing: Vec<&String> = queried.iter().filter(|l| !map.contains(l)).collect();
        let fallback_row = if options.use_fallback_locale {
            map.get(&options.fallback_locale).cloned()
        } else {
            None
        };

        for locale in missing {
            let row = match &fallback_row {
                Some(row) => {
                    let mut row = row.clone();
                    row.insert(schema.primary_key.clone(), Value::Null);
                    row
                }
                None => placeholder(schema),
            };
            map.insert(locale.clone(), row);
        }
    }

    if options.use_fallback_locale && active.len() < queried.len() {
        map.remove(&options.fallback_locale);
    }

    map.sort_by_locales(queried);
}

/// Empty row: identity `null`, every value column `""`.
fn placeholder(schema: &TranslationSchema) -> Record {
    let mut row = Record::new();
    row.insert(schema.primary_key.clone(), Value::Null);
    for field in schema.value_fields() {
        row.insert(field.to_string(), Value::String(String::new()));
    }
    row
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::translation::LocaleSelection;
    use serde_json::json;

    fn schema() -> TranslationSchema {
        TranslationSchema::new(
            "article_translations",
            "article_id",
            ["article_id", "locale", "title", "content"],
        )
        .unwrap()
    }

    fn options(fallback: bool, fill: bool) -> ReadOptions {
        ReadOptions {
            locales: LocaleSelection::Current,
            current_locale: None,
            use_fallback_locale: fallback,
            fallback_locale: "en".to_string(),
            fill_with_empty: fill,
        }
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    fn english() -> TranslationMap {
        let mut map = TranslationMap::new();
        map.insert(
            "en",
            json!({"id": 5, "title": "Sample title 3", "content": "Sample content 3"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        map
    }

    #[test]
    fn missing_locales_stay_absent_without_policy() {
        let mut map = TranslationMap::new();
        fill_missing(&mut map, &codes(&["pl"]), &codes(&["pl"]), &options(false, false), &schema());
        assert!(map.is_empty());
    }

    #[test]
    fn fallback_row_copied_with_null_identity_and_pruned() {
        let mut map = english();
        let queried = codes(&["pl", "en"]);
        fill_missing(&mut map, &queried, &codes(&["pl"]), &options(true, false), &schema());

        assert_eq!(map.locales().collect::<Vec<_>>(), ["pl"]);
        let pl = map.get("pl").unwrap();
        assert_eq!(pl["id"], Value::Null);
        assert_eq!(pl["title"], "Sample title 3");
    }

    #[test]
    fn fallback_kept_when_requested_explicitly() {
        let mut map = english();
        let queried = codes(&["en", "pl"]);
        fill_missing(&mut map, &queried, &queried, &options(true, false), &schema());
        assert_eq!(map.locales().collect::<Vec<_>>(), ["en", "pl"]);
        assert_eq!(map.get("en").unwrap()["id"], 5);
    }

    #[test]
    fn placeholder_identity_stays_null_when_listed_writable() {
        let schema = TranslationSchema::new(
            "article_translations",
            "article_id",
            ["id", "article_id", "locale", "title"],
        )
        .unwrap();
        let mut map = TranslationMap::new();
        fill_missing(&mut map, &codes(&["pl"]), &codes(&["pl"]), &options(false, true), &schema);
        assert_eq!(
            Value::Object(map.get("pl").unwrap().clone()),
            json!({"id": null, "title": ""})
        );
    }

    #[test]
    fn placeholder_excludes_foreign_key_and_locale() {
        let mut map = TranslationMap::new();
        fill_missing(&mut map, &codes(&["pl"]), &codes(&["pl"]), &options(false, true), &schema());
        assert_eq!(
            Value::Object(map.get("pl").unwrap().clone()),
            json!({"id": null, "title": "", "content": ""})
        );
    }

    #[test]
    fn placeholder_used_when_fallback_row_absent() {
        let mut map = TranslationMap::new();
        let queried = codes(&["pl", "en"]);
        fill_missing(&mut map, &queried, &codes(&["pl"]), &options(true, false), &schema());

        assert_eq!(map.locales().collect::<Vec<_>>(), ["pl"]);
        assert_eq!(map.get("pl").unwrap()["title"], "");
    }

    #[test]
    fn entries_follow_queried_order() {
        let mut map = TranslationMap::new();
        map.insert("pl", english().get("en").cloned().unwrap());
        map.insert("en", english().get("en").cloned().unwrap());
        let queried = codes(&["en", "pl"]);
        fill_missing(&mut map, &queried, &queried, &options(false, false), &schema());
        assert_eq!(map.locales().collect::<Vec<_>>(), ["en", "pl"]);
    }
}
