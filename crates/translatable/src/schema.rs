//! Schema descriptors for base and translation tables.
//!
//! Descriptors are built once, when a model is assembled, and validated up
//! front so that every name reaching the query builder is a plain SQL
//! identifier.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, TranslatableError};

/// Regex for valid SQL identifiers (table/column names).
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static VALID_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid regex literal"));

/// Reject anything that is not a plain SQL identifier.
pub fn validate_identifier(name: &str) -> Result<()> {
    if VALID_IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(TranslatableError::InvalidIdentifier(name.to_string()))
    }
}

/// Base (non-translated) table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSchema {
    pub table: String,
    pub primary_key: String,
}

impl BaseSchema {
    pub fn new(table: &str, primary_key: &str) -> Result<Self> {
        validate_identifier(table)?;
        validate_identifier(primary_key)?;
        Ok(Self {
            table: table.to_string(),
            primary_key: primary_key.to_string(),
        })
    }

    /// Conventional foreign key naming this table: `articles` → `article_id`.
    pub fn foreign_key_name(&self) -> String {
        format!("{}_id", singular(&self.table))
    }

    /// Conventional translation table: `articles` → `article_translations`.
    pub fn translation_table_name(&self) -> String {
        format!("{}_translations", singular(&self.table))
    }
}

/// Translation (per-locale) table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationSchema {
    pub table: String,
    /// Identity column of a translation row.
    pub primary_key: String,
    /// Column referencing the base record's primary key.
    pub foreign_key: String,
    /// Locale discriminator column.
    pub locale_field: String,
    /// Translatable value columns.
    pub writable_fields: Vec<String>,
}

impl TranslationSchema {
    /// Describe a translation table with `id` identity and `locale` discriminator.
    pub fn new<I, S>(table: &str, foreign_key: &str, writable_fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = Self {
            table: table.to_string(),
            primary_key: "id".to_string(),
            foreign_key: foreign_key.to_string(),
            locale_field: "locale".to_string(),
            writable_fields: writable_fields.into_iter().map(Into::into).collect(),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Describe the conventionally named translation table of `base`.
    pub fn for_base<I, S>(base: &BaseSchema, writable_fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            &base.translation_table_name(),
            &base.foreign_key_name(),
            writable_fields,
        )
    }

    pub fn with_primary_key(mut self, primary_key: &str) -> Result<Self> {
        validate_identifier(primary_key)?;
        self.primary_key = primary_key.to_string();
        Ok(self)
    }

    pub fn with_locale_field(mut self, locale_field: &str) -> Result<Self> {
        validate_identifier(locale_field)?;
        self.locale_field = locale_field.to_string();
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;
        validate_identifier(&self.primary_key)?;
        validate_identifier(&self.foreign_key)?;
        validate_identifier(&self.locale_field)?;
        for field in &self.writable_fields {
            validate_identifier(field)?;
        }
        Ok(())
    }

    /// Writable columns that carry translated values (identity, foreign key
    /// and locale columns excluded).
    pub fn value_fields(&self) -> impl Iterator<Item = &str> {
        self.writable_fields
            .iter()
            .map(String::as_str)
            .filter(|f| *f != self.primary_key && *f != self.foreign_key && *f != self.locale_field)
    }
}

/// Naive English singular for conventional table names.
fn singular(table: &str) -> String {
    if let Some(stem) = table.strip_suffix("ies") {
        format!("{stem}y")
    } else if table.ends_with("sses") || table.ends_with("xes") || table.ends_with("ches") {
        table[..table.len() - 2].to_string()
    } else if let Some(stem) = table.strip_suffix('s')
        && !stem.ends_with('s')
    {
        stem.to_string()
    } else {
        table.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_validated() {
        assert!(validate_identifier("article_translations").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("title; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn conventional_names() {
        let base = BaseSchema::new("articles", "id").unwrap();
        assert_eq!(base.foreign_key_name(), "article_id");
        assert_eq!(base.translation_table_name(), "article_translations");

        let base = BaseSchema::new("categories", "id").unwrap();
        assert_eq!(base.foreign_key_name(), "category_id");

        let base = BaseSchema::new("boxes", "id").unwrap();
        assert_eq!(base.foreign_key_name(), "box_id");
    }

    #[test]
    fn value_fields_skip_identity_foreign_key_and_locale() {
        let schema = TranslationSchema::new(
            "article_translations",
            "article_id",
            ["id", "article_id", "locale", "title", "content"],
        )
        .unwrap();
        assert_eq!(schema.value_fields().collect::<Vec<_>>(), ["title", "content"]);
    }

    #[test]
    fn invalid_field_rejected() {
        let err = TranslationSchema::new("t", "fk", ["title", "bad name"]).unwrap_err();
        assert!(matches!(err, TranslatableError::InvalidIdentifier(name) if name == "bad name"));
    }

    #[test]
    fn overrides_validated() {
        let schema = TranslationSchema::new("t", "fk", ["title"]).unwrap();
        assert_eq!(
            schema.clone().with_primary_key("uid").unwrap().primary_key,
            "uid"
        );
        assert!(schema.with_locale_field("lang-code").is_err());
    }
}
