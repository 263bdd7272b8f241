//! Error types for the translation engine.

use thiserror::Error;

/// Errors surfaced by the translation engine and its store adapters.
#[derive(Debug, Error)]
pub enum TranslatableError {
    /// Misconfiguration detected while building the registry or model.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A locale outside the supported set was requested.
    #[error("The \"{0}\" locale is not in the list of supported locales.")]
    LocaleNotSupported(String),

    /// The locale is supported but no translation for it was loaded.
    #[error("no translation loaded for locale \"{0}\"")]
    TranslationNotLoaded(String),

    /// The `translations` attribute of a write payload has the wrong shape.
    #[error("malformed translations payload: {0}")]
    MalformedTranslations(String),

    /// A table or column name is not a plain SQL identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A translation row for this (foreign key, locale) pair already exists.
    #[error("translation for {foreign_key} in locale \"{locale}\" already exists")]
    Conflict { foreign_key: String, locale: String },

    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failure reported by a non-SQL store backend.
    #[error("store error: {0}")]
    Store(String),
}

/// Result type alias using [`TranslatableError`].
pub type Result<T> = std::result::Result<T, TranslatableError>;
