//! PostgreSQL store backend.
//!
//! Statements are built with SeaQuery and executed through sqlx. Reads are
//! wrapped in `row_to_json` so rows come back as JSON objects regardless of
//! column types.

use async_trait::async_trait;
use sea_query::{
    Alias, Asterisk, Expr, ExprTrait, OnConflict, Order, PostgresQueryBuilder, Query, SimpleExpr,
};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Column as _, PgPool, Row, TypeInfo};
use tracing::debug;

use super::{BaseStore, RowLocator, TranslationStore};
use crate::error::{Result, TranslatableError};
use crate::query::Column;
use crate::query::FindQuery;
use crate::query::builder::{column_expr, key_expr, render, value_expr};
use crate::record::{Record, RecordKey};
use crate::schema::{BaseSchema, TranslationSchema};

/// [`BaseStore`] over a PostgreSQL table.
#[derive(Debug, Clone)]
pub struct PgBaseStore {
    pool: PgPool,
    schema: BaseSchema,
}

impl PgBaseStore {
    pub fn new(pool: PgPool, schema: BaseSchema) -> Self {
        Self { pool, schema }
    }
}

#[async_trait]
impl BaseStore for PgBaseStore {
    fn schema(&self) -> &BaseSchema {
        &self.schema
    }

    async fn insert(&self, record: Record) -> Result<RecordKey> {
        let sql = insert_sql(&self.schema.table, &self.schema.primary_key, &record, None)?;
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        returned_key(&row, &self.schema.primary_key)
    }

    async fn update(&self, keys: &[RecordKey], record: Record) -> Result<u64> {
        if keys.is_empty() || record.is_empty() {
            return Ok(0);
        }
        let pk = Column::new(&self.schema.table, &self.schema.primary_key);
        let sql = update_sql(
            &self.schema.table,
            &record,
            column_expr(&pk).is_in(keys.iter().map(key_expr)),
        );
        let done = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    async fn select(&self, query: &FindQuery) -> Result<Vec<Record>> {
        let sql = render(query, &self.schema);
        debug!(sql = %sql, "base select");
        fetch_records(&self.pool, &sql).await
    }
}

/// [`TranslationStore`] over a PostgreSQL table with a unique
/// (foreign key, locale) constraint.
#[derive(Debug, Clone)]
pub struct PgTranslationStore {
    pool: PgPool,
    schema: TranslationSchema,
}

impl PgTranslationStore {
    pub fn new(pool: PgPool, schema: TranslationSchema) -> Self {
        Self { pool, schema }
    }

    fn column(&self, name: &str) -> SimpleExpr {
        column_expr(&Column::new(&self.schema.table, name))
    }

    fn at(&self, locator: &RowLocator) -> SimpleExpr {
        self.column(&self.schema.foreign_key)
            .eq(key_expr(&locator.foreign_key))
            .and(
                self.column(&self.schema.locale_field)
                    .eq(locator.locale.as_str()),
            )
    }

    fn find_sql(&self, keys: &[RecordKey], locales: &[String]) -> String {
        Query::select()
            .column(Asterisk)
            .from(Alias::new(&self.schema.table))
            .and_where(
                self.column(&self.schema.foreign_key)
                    .is_in(keys.iter().map(key_expr)),
            )
            .and_where(
                self.column(&self.schema.locale_field)
                    .is_in(locales.iter().map(String::as_str)),
            )
            .order_by(Alias::new(&self.schema.primary_key), Order::Asc)
            .to_string(PostgresQueryBuilder)
    }

    fn count_sql(&self, locator: &RowLocator) -> String {
        Query::select()
            .expr(Expr::col(Asterisk).count())
            .from(Alias::new(&self.schema.table))
            .and_where(self.at(locator))
            .to_string(PostgresQueryBuilder)
    }

    fn upsert_sql(&self, row: &Record) -> Result<String> {
        let value_columns: Vec<Alias> = self
            .schema
            .value_fields()
            .filter(|f| row.contains_key(*f))
            .map(Alias::new)
            .collect();
        let mut on_conflict = OnConflict::columns([
            Alias::new(&self.schema.foreign_key),
            Alias::new(&self.schema.locale_field),
        ]);
        if value_columns.is_empty() {
            on_conflict.do_nothing();
        } else {
            on_conflict.update_columns(value_columns);
        }
        insert_sql(
            &self.schema.table,
            &self.schema.primary_key,
            row,
            Some(on_conflict),
        )
    }

    fn conflict_or(&self, err: sqlx::Error, row: &Record) -> TranslatableError {
        if let sqlx::Error::Database(db) = &err
            && db.is_unique_violation()
        {
            let field = |name: &str| match row.get(name) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            return TranslatableError::Conflict {
                foreign_key: field(&self.schema.foreign_key),
                locale: field(&self.schema.locale_field),
            };
        }
        TranslatableError::Database(err)
    }
}

#[async_trait]
impl TranslationStore for PgTranslationStore {
    fn schema(&self) -> &TranslationSchema {
        &self.schema
    }

    async fn find_by_foreign_key(
        &self,
        key: &RecordKey,
        locales: &[String],
    ) -> Result<Vec<Record>> {
        self.find_by_foreign_keys(std::slice::from_ref(key), locales)
            .await
    }

    async fn find_by_foreign_keys(
        &self,
        keys: &[RecordKey],
        locales: &[String],
    ) -> Result<Vec<Record>> {
        if keys.is_empty() || locales.is_empty() {
            return Ok(Vec::new());
        }
        fetch_records(&self.pool, &self.find_sql(keys, locales)).await
    }

    async fn insert(&self, row: Record) -> Result<RecordKey> {
        let sql = insert_sql(&self.schema.table, &self.schema.primary_key, &row, None)?;
        let inserted = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.conflict_or(e, &row))?;
        returned_key(&inserted, &self.schema.primary_key)
    }

    async fn update_where(&self, locator: &RowLocator, row: Record) -> Result<u64> {
        if row.is_empty() {
            return Ok(0);
        }
        let sql = update_sql(&self.schema.table, &row, self.at(locator));
        let done = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| self.conflict_or(e, &row))?;
        Ok(done.rows_affected())
    }

    async fn count_where(&self, locator: &RowLocator) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&self.count_sql(locator))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Single `INSERT .. ON CONFLICT (fk, locale) DO UPDATE` statement.
    async fn upsert(&self, locator: &RowLocator, row: Record) -> Result<()> {
        let sql = self.upsert_sql(&row)?;
        debug!(
            foreign_key = %locator.foreign_key,
            locale = %locator.locale,
            "atomic translation upsert"
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| self.conflict_or(e, &row))?;
        Ok(())
    }
}

fn insert_sql(
    table: &str,
    primary_key: &str,
    row: &Record,
    on_conflict: Option<OnConflict>,
) -> Result<String> {
    let mut insert = Query::insert();
    insert.into_table(Alias::new(table));
    if row.is_empty() {
        insert.or_default_values();
    } else {
        insert
            .columns(row.keys().map(Alias::new))
            .values(row.values().map(value_expr))
            .map_err(|e| TranslatableError::Store(e.to_string()))?;
    }
    if let Some(on_conflict) = on_conflict {
        insert.on_conflict(on_conflict);
    }
    insert.returning_col(Alias::new(primary_key));
    Ok(insert.to_string(PostgresQueryBuilder))
}

fn update_sql(table: &str, row: &Record, filter: SimpleExpr) -> String {
    Query::update()
        .table(Alias::new(table))
        .values(row.iter().map(|(k, v)| (Alias::new(k), value_expr(v))))
        .and_where(filter)
        .to_string(PostgresQueryBuilder)
}

async fn fetch_records(pool: &PgPool, sql: &str) -> Result<Vec<Record>> {
    let rows: Vec<Value> = sqlx::query_scalar(&format!("SELECT row_to_json(t) FROM ({sql}) t"))
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

fn returned_key(row: &PgRow, primary_key: &str) -> Result<RecordKey> {
    let record = row_to_record(row);
    let value = record.get(primary_key).ok_or_else(|| {
        TranslatableError::Store(format!("insert did not return {primary_key}"))
    })?;
    RecordKey::from_value(value)
}

/// Convert a dynamic row to a JSON record by column type.
fn row_to_record(row: &PgRow) -> Record {
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        let value = match col.type_info().name() {
            "INT2" => row
                .try_get::<i16, _>(name)
                .ok()
                .map(|v| Value::Number(v.into())),
            "INT4" => row
                .try_get::<i32, _>(name)
                .ok()
                .map(|v| Value::Number(v.into())),
            "INT8" => row
                .try_get::<i64, _>(name)
                .ok()
                .map(|v| Value::Number(v.into())),
            "UUID" => row
                .try_get::<uuid::Uuid, _>(name)
                .ok()
                .map(|v| Value::String(v.to_string())),
            _ => row.try_get::<String, _>(name).ok().map(Value::String),
        };
        map.insert(name.to_string(), value.unwrap_or(Value::Null));
    }
    map
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn store() -> PgTranslationStore {
        let pool = PgPool::connect_lazy("postgres://localhost/translatable").unwrap();
        let schema = TranslationSchema::new(
            "article_translations",
            "article_id",
            ["title", "content"],
        )
        .unwrap();
        PgTranslationStore::new(pool, schema)
    }

    #[test]
    fn insert_returns_primary_key() {
        let sql = insert_sql(
            "articles",
            "id",
            &record(json!({"author": "Test User 1"})),
            None,
        )
        .unwrap();
        assert_eq!(
            sql,
            r#"INSERT INTO "articles" ("author") VALUES ('Test User 1') RETURNING "id""#
        );
    }

    #[test]
    fn empty_insert_uses_default_values() {
        let sql = insert_sql("articles", "id", &Record::new(), None).unwrap();
        assert!(sql.starts_with(r#"INSERT INTO "articles""#), "{sql}");
        assert!(sql.contains("DEFAULT"), "{sql}");
        assert!(!sql.contains("VALUES ()"), "{sql}");
        assert!(sql.ends_with(r#"RETURNING "id""#), "{sql}");
    }

    #[tokio::test]
    async fn write_errors_other_than_unique_violation_stay_database_errors() {
        let row = record(json!({"article_id": 1, "locale": "en"}));
        let err = store().conflict_or(sqlx::Error::RowNotFound, &row);
        assert!(matches!(err, TranslatableError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn update_is_scoped_by_filter() {
        let pk = Column::new("articles", "id");
        let sql = update_sql(
            "articles",
            &record(json!({"author": "X"})),
            column_expr(&pk).is_in([key_expr(&RecordKey::Int(2))]),
        );
        assert_eq!(
            sql,
            r#"UPDATE "articles" SET "author" = 'X' WHERE "articles"."id" IN (2)"#
        );
    }

    #[tokio::test]
    async fn count_targets_key_and_locale() {
        let sql = store().count_sql(&RowLocator::new(RecordKey::Int(1), "pl"));
        assert!(sql.starts_with("SELECT COUNT(*)"), "{sql}");
        assert!(
            sql.contains(r#""article_translations"."article_id" = 1"#),
            "{sql}"
        );
        assert!(
            sql.contains(r#""article_translations"."locale" = 'pl'"#),
            "{sql}"
        );
    }

    #[tokio::test]
    async fn batch_find_uses_in_lists() {
        let sql = store().find_sql(
            &[RecordKey::Int(1), RecordKey::Int(2)],
            &["en".to_string(), "pl".to_string()],
        );
        assert!(sql.contains(r#""article_id" IN (1, 2)"#), "{sql}");
        assert!(sql.contains(r#""locale" IN ('en', 'pl')"#), "{sql}");
    }

    #[tokio::test]
    async fn upsert_updates_value_columns_on_conflict() {
        let row = record(json!({
            "article_id": 1,
            "locale": "en",
            "title": "T",
        }));
        let sql = store().upsert_sql(&row).unwrap();
        assert!(
            sql.contains(r#"ON CONFLICT ("article_id", "locale") DO UPDATE SET"#),
            "{sql}"
        );
        assert!(sql.contains(r#""excluded"."title""#), "{sql}");
        assert!(!sql.contains(r#""excluded"."content""#), "{sql}");
        assert!(sql.ends_with(r#"RETURNING "id""#), "{sql}");
    }
}
