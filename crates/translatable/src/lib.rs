//! Per-locale translations for row-oriented entity stores.
//!
//! Translated attributes live in a secondary table with one row per
//! (record, locale); everything else stays in the base row. A
//! [`Translatable`] model splits combined writes into a base write plus
//! locale rows, and assembles locale rows back into a translation map on
//! every read, applying fallback and empty-fill policies for missing
//! locales. Reads can also filter on translated fields through a join.
//!
//! ```no_run
//! # async fn demo() -> translatable::Result<()> {
//! use serde_json::json;
//! use translatable::{
//!     BaseSchema, LocaleRegistry, MemoryDatabase, Translatable, TranslatableConfig,
//!     TranslationSchema,
//! };
//!
//! let db = MemoryDatabase::new();
//! let base = BaseSchema::new("articles", "id")?;
//! let translations = TranslationSchema::for_base(&base, ["title", "content"])?;
//! let model = Translatable::new(
//!     db.base_store(base),
//!     db.translation_store(translations),
//!     LocaleRegistry::new(["en", "pl"], "en")?,
//!     TranslatableConfig::default(),
//! )?;
//!
//! let payload = json!({
//!     "author": "Ada",
//!     "translations": { "en": { "title": "Hello" }, "pl": { "title": "Cześć" } },
//! });
//! let key = model.insert(payload.as_object().cloned().unwrap_or_default()).await?;
//!
//! let article = model.query().with_all_translations().find(key).await?;
//! # let _ = article;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod locale;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod schema;
pub mod store;
pub mod translation;

pub use config::{Settings, TranslatableConfig};
pub use entity::Entity;
pub use error::{Result, TranslatableError};
pub use locale::LocaleRegistry;
pub use model::{Finder, Translatable};
pub use pipeline::{Event, Hook, Pipeline, Stage};
pub use query::{LikeSide, SortDirection};
pub use record::{Record, RecordKey, TranslationMap};
pub use schema::{BaseSchema, TranslationSchema};
pub use store::{BaseStore, MemoryDatabase, TranslationStore};
pub use translation::{LocaleSelection, ReadOptions};
