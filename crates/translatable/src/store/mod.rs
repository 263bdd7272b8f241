//! Store backends.
//!
//! Two capability traits separate the engine from the record store:
//! [`BaseStore`] for the primary table and [`TranslationStore`] for the
//! per-locale table. Backends:
//! - [`pg`]: PostgreSQL through sqlx, SQL built with SeaQuery
//! - [`memory`]: in-process tables behind a mutex

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::query::FindQuery;
use crate::record::{Record, RecordKey};
use crate::schema::{BaseSchema, TranslationSchema};

pub use memory::{MemoryBaseStore, MemoryDatabase, MemoryTranslationStore};
pub use pg::{PgBaseStore, PgTranslationStore};

/// Identifies one translation row by its unique (foreign key, locale) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLocator {
    pub foreign_key: RecordKey,
    pub locale: String,
}

impl RowLocator {
    pub fn new(foreign_key: RecordKey, locale: &str) -> Self {
        Self {
            foreign_key,
            locale: locale.to_string(),
        }
    }
}

/// Primary table access.
#[async_trait]
pub trait BaseStore: Send + Sync {
    fn schema(&self) -> &BaseSchema;

    /// Insert a record and return its primary key.
    async fn insert(&self, record: Record) -> Result<RecordKey>;

    /// Update every record whose primary key is in `keys`; returns rows affected.
    async fn update(&self, keys: &[RecordKey], record: Record) -> Result<u64>;

    /// Run a read and return the matching base rows.
    async fn select(&self, query: &FindQuery) -> Result<Vec<Record>>;
}

/// Translation table access.
#[async_trait]
pub trait TranslationStore: Send + Sync {
    fn schema(&self) -> &TranslationSchema;

    /// Rows for one base record restricted to `locales`.
    async fn find_by_foreign_key(&self, key: &RecordKey, locales: &[String])
    -> Result<Vec<Record>>;

    /// Rows for many base records restricted to `locales`, in one read.
    async fn find_by_foreign_keys(
        &self,
        keys: &[RecordKey],
        locales: &[String],
    ) -> Result<Vec<Record>>;

    /// Insert a row and return its identity.
    async fn insert(&self, row: Record) -> Result<RecordKey>;

    /// Update the row(s) at `locator`; returns rows affected.
    async fn update_where(&self, locator: &RowLocator, row: Record) -> Result<u64>;

    /// Count rows at `locator`.
    async fn count_where(&self, locator: &RowLocator) -> Result<u64>;

    /// Update the row at `locator` if it exists, otherwise insert, as one
    /// atomic operation where the backend supports it.
    ///
    /// The default falls back to [`write_checked`].
    async fn upsert(&self, locator: &RowLocator, row: Record) -> Result<()> {
        write_checked(self, locator, row).await
    }
}

/// Update the row at `locator` if exactly one exists, otherwise insert.
///
/// The count and the write are separate store operations, so two writers
/// racing on the same pair can both insert; the unique (foreign key, locale)
/// constraint then rejects the loser with a conflict error.
pub async fn write_checked<T>(store: &T, locator: &RowLocator, row: Record) -> Result<()>
where
    T: TranslationStore + ?Sized,
{
    let found = store.count_where(locator).await?;
    if found == 1 {
        store.update_where(locator, row).await?;
    } else {
        debug!(
            foreign_key = %locator.foreign_key,
            locale = %locator.locale,
            found,
            "no existing translation row, inserting"
        );
        store.insert(row).await?;
    }
    Ok(())
}
