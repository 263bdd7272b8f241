//! Translatable test utilities.
//!
//! Article fixtures mirroring a typical two-table layout (`articles` plus
//! `article_translations`), seeded in-memory models, and JSON assertion
//! helpers.

use serde_json::{Value, json};
use translatable::store::{MemoryBaseStore, MemoryTranslationStore};
use translatable::{
    BaseSchema, LocaleRegistry, MemoryDatabase, Record, RecordKey, Result, Translatable,
    TranslatableConfig, TranslationSchema,
};

/// Model type used by the article fixtures.
pub type ArticleModel = Translatable<MemoryBaseStore, MemoryTranslationStore>;

/// `articles(id, author)` and `article_translations(id, article_id, locale,
/// title, content)`.
pub fn article_schemas() -> Result<(BaseSchema, TranslationSchema)> {
    let base = BaseSchema::new("articles", "id")?;
    let translations =
        TranslationSchema::for_base(&base, ["article_id", "locale", "title", "content"])?;
    Ok((base, translations))
}

/// Registry with `en` and `pl`, defaulting to `default_locale`.
pub fn registry(default_locale: &str) -> Result<LocaleRegistry> {
    LocaleRegistry::new(["en", "pl"], default_locale)
}

/// Create a test article payload.
pub fn test_article(author: &str) -> TestArticle {
    TestArticle {
        author: author.to_string(),
        translations: Vec::new(),
    }
}

/// Builder for combined article payloads.
#[derive(Debug, Clone)]
pub struct TestArticle {
    pub author: String,
    pub translations: Vec<(String, String, String)>,
}

impl TestArticle {
    /// Add a locale's title and content.
    pub fn with_translation(mut self, locale: &str, title: &str, content: &str) -> Self {
        self.translations
            .push((locale.to_string(), title.to_string(), content.to_string()));
        self
    }

    /// Payload with a `translations` object, as passed to insert or update.
    pub fn into_record(self) -> Record {
        let mut translations = serde_json::Map::new();
        for (locale, title, content) in self.translations {
            translations.insert(locale, json!({ "title": title, "content": content }));
        }
        let mut record = Record::new();
        record.insert("author".to_string(), Value::String(self.author));
        if !translations.is_empty() {
            record.insert("translations".to_string(), Value::Object(translations));
        }
        record
    }
}

/// The three seed articles.
///
/// Translation rows are created in this order, so their ids are:
/// article 1 `en` = 1, `pl` = 2; article 2 `en` = 3, `pl` = 4;
/// article 3 `en` = 5 (no Polish row).
pub fn seed_articles() -> Vec<TestArticle> {
    vec![
        test_article("Test User 1")
            .with_translation("en", "Sample title 1", "Sample content 1")
            .with_translation("pl", "Przykładowy tytuł 1", "Przykładowa treść 1"),
        test_article("Test User 2")
            .with_translation("en", "Sample title 2", "Sample content 2")
            .with_translation("pl", "Przykładowy tytuł 2", "Przykładowa treść 2"),
        test_article("Test User 3").with_translation("en", "Sample title 3", "Sample content 3"),
    ]
}

/// In-memory article model, unseeded.
pub fn article_model(
    default_locale: &str,
    config: TranslatableConfig,
) -> Result<(MemoryDatabase, ArticleModel)> {
    let (base, translations) = article_schemas()?;
    let db = MemoryDatabase::new();
    let model = Translatable::new(
        db.base_store(base),
        db.translation_store(translations),
        registry(default_locale)?,
        config,
    )?;
    Ok((db, model))
}

/// In-memory article model holding [`seed_articles`].
pub async fn seeded_articles(
    default_locale: &str,
    config: TranslatableConfig,
) -> Result<(MemoryDatabase, ArticleModel)> {
    let (db, model) = article_model(default_locale, config)?;
    for article in seed_articles() {
        model.insert(article.into_record()).await?;
    }
    Ok((db, model))
}

/// Seeded model with English default and configuration defaults.
pub async fn seeded() -> Result<(MemoryDatabase, ArticleModel)> {
    seeded_articles("en", TranslatableConfig::default()).await
}

/// Key of seed article `n` (1-based).
pub fn article_key(n: i64) -> RecordKey {
    RecordKey::Int(n)
}

/// Assertion helpers for records and JSON.
pub mod assert {
    use serde_json::Value;
    use translatable::Record;

    /// Assert that a record has exactly these fields and values.
    pub fn record_eq(actual: &Record, expected: &Value) {
        let actual = Value::Object(actual.clone());
        assert_eq!(
            &actual,
            expected,
            "record mismatch:\nactual: {}\nexpected: {}",
            serde_json::to_string_pretty(&actual).unwrap_or_default(),
            serde_json::to_string_pretty(expected).unwrap_or_default()
        );
    }

    /// Assert that some row in `rows` contains every field of `fields`.
    pub fn seen_in(rows: &[Record], fields: &Value) {
        assert!(
            contains_row(rows, fields),
            "no row matches {fields}\nrows: {rows:?}"
        );
    }

    /// Assert that no row in `rows` contains every field of `fields`.
    pub fn not_seen_in(rows: &[Record], fields: &Value) {
        assert!(
            !contains_row(rows, fields),
            "unexpected row matching {fields}\nrows: {rows:?}"
        );
    }

    fn contains_row(rows: &[Record], fields: &Value) -> bool {
        let Some(fields) = fields.as_object() else {
            return false;
        };
        rows.iter()
            .any(|row| fields.iter().all(|(k, v)| row.get(k) == Some(v)))
    }
}
