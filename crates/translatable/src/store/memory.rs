//! In-process store backend.
//!
//! Tables live in a shared map behind a mutex. Reads evaluate [`FindQuery`]
//! directly, including the translation join, `DISTINCT` and grouped
//! predicates, so the engine behaves the same as against PostgreSQL. The
//! translation table enforces the unique (foreign key, locale) pair.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::{BaseStore, RowLocator, TranslationStore};
use crate::error::{Result, TranslatableError};
use crate::query::{Clause, Column, Conjunction, FindQuery, Predicate, SortDirection};
use crate::record::{Record, RecordKey};
use crate::schema::{BaseSchema, TranslationSchema};

#[derive(Debug, Default)]
struct MemoryTable {
    primary_key: String,
    rows: Vec<Record>,
    /// Next identity to assign; `None` once the sequence is exhausted.
    next_id: Option<i64>,
    /// Columns that must be unique together.
    unique: Option<(String, String)>,
    reject_writes: bool,
}

impl MemoryTable {
    fn new(primary_key: &str) -> Self {
        Self {
            primary_key: primary_key.to_string(),
            next_id: Some(1),
            ..Default::default()
        }
    }

    fn check_writable(&self, table: &str) -> Result<()> {
        if self.reject_writes {
            return Err(TranslatableError::Store(format!(
                "writes to {table} are rejected"
            )));
        }
        Ok(())
    }

    /// Assign the identity if missing and append the row.
    fn insert(&mut self, table: &str, mut row: Record) -> Result<RecordKey> {
        self.check_writable(table)?;

        let key = match row.get(&self.primary_key) {
            None | Some(Value::Null) => {
                let id = self.next_id.ok_or_else(|| {
                    TranslatableError::Store(format!("id sequence exhausted in {table}"))
                })?;
                let key = RecordKey::Int(id);
                row.insert(self.primary_key.clone(), key.to_value());
                key
            }
            Some(value) => RecordKey::from_value(value)?,
        };

        if self
            .rows
            .iter()
            .any(|r| r.get(&self.primary_key).is_some_and(|v| key.matches(v)))
        {
            return Err(TranslatableError::Store(format!(
                "duplicate primary key {key} in {table}"
            )));
        }

        if let Some((a, b)) = &self.unique {
            let clash = self.rows.iter().any(|r| {
                matches!((r.get(a), row.get(a)), (Some(x), Some(y)) if values_equal(x, y))
                    && matches!((r.get(b), row.get(b)), (Some(x), Some(y)) if values_equal(x, y))
            });
            if clash {
                return Err(TranslatableError::Conflict {
                    foreign_key: row.get(a).map(display_value).unwrap_or_default(),
                    locale: row.get(b).map(display_value).unwrap_or_default(),
                });
            }
        }

        if let (RecordKey::Int(i), Some(next)) = (&key, self.next_id)
            && *i >= next
        {
            self.next_id = i.checked_add(1);
        }
        self.rows.push(row);
        Ok(key)
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, MemoryTable>,
}

/// Shared in-process database.
///
/// Cloning is cheap; clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
    operations: Arc<AtomicU64>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reuse) the base table and return a store over it.
    pub fn base_store(&self, schema: BaseSchema) -> MemoryBaseStore {
        self.inner
            .lock()
            .tables
            .entry(schema.table.clone())
            .or_insert_with(|| MemoryTable::new(&schema.primary_key));
        MemoryBaseStore {
            db: self.clone(),
            schema,
        }
    }

    /// Create (or reuse) the translation table and return a store over it.
    pub fn translation_store(&self, schema: TranslationSchema) -> MemoryTranslationStore {
        let mut inner = self.inner.lock();
        let table = inner
            .tables
            .entry(schema.table.clone())
            .or_insert_with(|| MemoryTable::new(&schema.primary_key));
        table.unique = Some((schema.foreign_key.clone(), schema.locale_field.clone()));
        drop(inner);
        MemoryTranslationStore {
            db: self.clone(),
            schema,
        }
    }

    /// Snapshot of a table's rows, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.inner
            .lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Number of store operations executed so far.
    pub fn operations(&self) -> u64 {
        self.operations.load(AtomicOrdering::SeqCst)
    }

    /// Make every write to `table` fail with a store error.
    pub fn reject_writes(&self, table: &str, reject: bool) {
        if let Some(t) = self.inner.lock().tables.get_mut(table) {
            t.reject_writes = reject;
        }
    }

    fn tick(&self) {
        self.operations.fetch_add(1, AtomicOrdering::SeqCst);
    }

    fn with_table<R>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemoryTable) -> Result<R>,
    ) -> Result<R> {
        self.tick();
        let mut inner = self.inner.lock();
        let t = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| TranslatableError::Store(format!("no such table: {table}")))?;
        f(t)
    }
}

/// [`BaseStore`] over a [`MemoryDatabase`] table.
#[derive(Debug, Clone)]
pub struct MemoryBaseStore {
    db: MemoryDatabase,
    schema: BaseSchema,
}

#[async_trait]
impl BaseStore for MemoryBaseStore {
    fn schema(&self) -> &BaseSchema {
        &self.schema
    }

    async fn insert(&self, record: Record) -> Result<RecordKey> {
        let table = &self.schema.table;
        self.db.with_table(table, |t| t.insert(table, record))
    }

    async fn update(&self, keys: &[RecordKey], record: Record) -> Result<u64> {
        let table = &self.schema.table;
        self.db.with_table(table, |t| {
            t.check_writable(table)?;
            let pk = t.primary_key.clone();
            let mut affected = 0;
            for row in &mut t.rows {
                let hit = row
                    .get(&pk)
                    .is_some_and(|v| keys.iter().any(|k| k.matches(v)));
                if hit {
                    for (field, value) in &record {
                        row.insert(field.clone(), value.clone());
                    }
                    affected += 1;
                }
            }
            Ok(affected)
        })
    }

    async fn select(&self, query: &FindQuery) -> Result<Vec<Record>> {
        self.db.tick();
        let inner = self.db.inner.lock();
        let table = &self.schema.table;
        let base = inner
            .tables
            .get(table)
            .ok_or_else(|| TranslatableError::Store(format!("no such table: {table}")))?;
        let joined = match &query.join {
            Some(join) => Some((
                join,
                inner.tables.get(&join.table).ok_or_else(|| {
                    TranslatableError::Store(format!("no such table: {}", join.table))
                })?,
            )),
            None => None,
        };

        let pk = &self.schema.primary_key;
        let mut out: Vec<Record> = Vec::new();

        for row in &base.rows {
            if let Some(keys) = &query.keys
                && !row.get(pk).is_some_and(|v| keys.iter().any(|k| k.matches(v)))
            {
                continue;
            }

            let hits = match joined {
                Some((join, table)) => table
                    .rows
                    .iter()
                    .filter(|t| match (t.get(&join.foreign_key), row.get(pk)) {
                        (Some(fk), Some(id)) => values_equal(fk, id),
                        _ => false,
                    })
                    .filter(|t| {
                        let lookup = |col: &Column| {
                            if col.table == self.schema.table {
                                row.get(&col.name)
                            } else if col.table == join.table {
                                t.get(&col.name)
                            } else {
                                None
                            }
                        };
                        chain_matches(query.conditions.clauses(), &lookup)
                    })
                    .count(),
                None => {
                    let lookup = |col: &Column| {
                        if col.table == self.schema.table {
                            row.get(&col.name)
                        } else {
                            None
                        }
                    };
                    usize::from(chain_matches(query.conditions.clauses(), &lookup))
                }
            };

            let copies = if query.distinct { hits.min(1) } else { hits };
            for _ in 0..copies {
                out.push(row.clone());
            }
        }

        for (column, direction) in query.order_by.iter().rev() {
            if column.table != self.schema.table {
                continue;
            }
            out.sort_by(|a, b| {
                let ord = compare_values(a.get(&column.name), b.get(&column.name));
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        let out: Vec<Record> = out.into_iter().skip(offset).take(limit).collect();

        debug!(table = %self.schema.table, rows = out.len(), "memory select");
        Ok(out)
    }
}

/// [`TranslationStore`] over a [`MemoryDatabase`] table.
#[derive(Debug, Clone)]
pub struct MemoryTranslationStore {
    db: MemoryDatabase,
    schema: TranslationSchema,
}

impl MemoryTranslationStore {
    fn at(&self, row: &Record, locator: &RowLocator) -> bool {
        row.get(&self.schema.foreign_key)
            .is_some_and(|v| locator.foreign_key.matches(v))
            && row
                .get(&self.schema.locale_field)
                .and_then(Value::as_str)
                .is_some_and(|l| l == locator.locale)
    }

    fn in_locales(&self, row: &Record, locales: &[String]) -> bool {
        row.get(&self.schema.locale_field)
            .and_then(Value::as_str)
            .is_some_and(|l| locales.iter().any(|c| c == l))
    }
}

#[async_trait]
impl TranslationStore for MemoryTranslationStore {
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
        let fk = &self.schema.foreign_key;
        self.db.with_table(&self.schema.table, |t| {
            Ok(t.rows
                .iter()
                .filter(|r| r.get(fk).is_some_and(|v| keys.iter().any(|k| k.matches(v))))
                .filter(|r| self.in_locales(r, locales))
                .cloned()
                .collect())
        })
    }

    async fn insert(&self, row: Record) -> Result<RecordKey> {
        let table = &self.schema.table;
        self.db.with_table(table, |t| t.insert(table, row))
    }

    async fn update_where(&self, locator: &RowLocator, row: Record) -> Result<u64> {
        let table = &self.schema.table;
        self.db.with_table(table, |t| {
            t.check_writable(table)?;
            let mut affected = 0;
            for existing in t.rows.iter_mut().filter(|r| self.at(r, locator)) {
                for (field, value) in &row {
                    existing.insert(field.clone(), value.clone());
                }
                affected += 1;
            }
            Ok(affected)
        })
    }

    async fn count_where(&self, locator: &RowLocator) -> Result<u64> {
        self.db.with_table(&self.schema.table, |t| {
            Ok(t.rows.iter().filter(|r| self.at(r, locator)).count() as u64)
        })
    }

    /// Atomic: the lookup and the write happen under one lock.
    async fn upsert(&self, locator: &RowLocator, row: Record) -> Result<()> {
        let table = &self.schema.table;
        self.db.with_table(table, |t| {
            t.check_writable(table)?;
            match t.rows.iter_mut().find(|r| self.at(r, locator)) {
                Some(existing) => {
                    for (field, value) in &row {
                        existing.insert(field.clone(), value.clone());
                    }
                    Ok(())
                }
                None => t.insert(table, row).map(|_| ()),
            }
        })
    }
}

/// Evaluate a clause chain: OR of AND runs. An empty chain matches.
fn chain_matches<'a, F>(clauses: &[Clause], lookup: &F) -> bool
where
    F: Fn(&Column) -> Option<&'a Value>,
{
    if clauses.is_empty() {
        return true;
    }
    let mut any = false;
    let mut run = true;
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 && clause.conjunction == Conjunction::Or {
            any |= run;
            run = true;
        }
        run = run && predicate_matches(&clause.predicate, lookup);
    }
    any || run
}

fn predicate_matches<'a, F>(predicate: &Predicate, lookup: &F) -> bool
where
    F: Fn(&Column) -> Option<&'a Value>,
{
    match predicate {
        Predicate::Eq(column, Value::Null) => lookup(column).is_none_or(Value::is_null),
        Predicate::Eq(column, expected) => {
            lookup(column).is_some_and(|v| values_equal(v, expected))
        }
        Predicate::In(column, values) => lookup(column)
            .is_some_and(|v| !v.is_null() && values.iter().any(|e| values_equal(v, e))),
        Predicate::NotIn(column, values) => lookup(column)
            .is_some_and(|v| !v.is_null() && !values.iter().any(|e| values_equal(v, e))),
        Predicate::Like(column, needle, side) => {
            lookup(column).and_then(like_text).is_some_and(|h| side.matches(&h, needle))
        }
        Predicate::NotLike(column, needle, side) => {
            lookup(column).and_then(like_text).is_some_and(|h| !side.matches(&h, needle))
        }
        Predicate::Group(inner) => chain_matches(inner, lookup),
    }
}

/// Text a LIKE compares against; NULL never matches.
fn like_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Equality with SQL-style coercion between numbers and numeric text.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => a == b,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), Some(v)) if !v.is_null() => Ordering::Less,
        (Some(v), None | Some(Value::Null)) if !v.is_null() => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::query::{Conditions, Join, LikeSide};
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn stores() -> (MemoryDatabase, MemoryBaseStore, MemoryTranslationStore) {
        let db = MemoryDatabase::new();
        let base = db.base_store(BaseSchema::new("articles", "id").unwrap());
        let tr = db.translation_store(
            TranslationSchema::new("article_translations", "article_id", ["title"]).unwrap(),
        );
        (db, base, tr)
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let (_db, base, _) = stores();
        let a = base.insert(record(json!({"author": "A"}))).await.unwrap();
        let b = base.insert(record(json!({"author": "B"}))).await.unwrap();
        assert_eq!(a, RecordKey::Int(1));
        assert_eq!(b, RecordKey::Int(2));
    }

    #[tokio::test]
    async fn explicit_max_id_exhausts_sequence() {
        let (_db, base, _) = stores();
        let max = base
            .insert(record(json!({"id": i64::MAX, "author": "A"})))
            .await
            .unwrap();
        assert_eq!(max, RecordKey::Int(i64::MAX));

        let err = base.insert(record(json!({"author": "B"}))).await.unwrap_err();
        assert!(err.to_string().contains("id sequence exhausted"), "{err}");

        let low = base
            .insert(record(json!({"id": 7, "author": "C"})))
            .await
            .unwrap();
        assert_eq!(low, RecordKey::Int(7));
    }

    #[tokio::test]
    async fn unique_pair_enforced() {
        let (_db, _, tr) = stores();
        tr.insert(record(json!({"article_id": 1, "locale": "en", "title": "A"})))
            .await
            .unwrap();
        let err = tr
            .insert(record(json!({"article_id": 1, "locale": "en", "title": "B"})))
            .await
            .unwrap_err();
        assert!(matches!(err, TranslatableError::Conflict { locale, .. } if locale == "en"));

        tr.insert(record(json!({"article_id": 1, "locale": "pl", "title": "C"})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn locator_update_and_count() {
        let (db, _, tr) = stores();
        tr.insert(record(json!({"article_id": 1, "locale": "en", "title": "A"})))
            .await
            .unwrap();
        let at = RowLocator::new(RecordKey::Int(1), "en");
        assert_eq!(tr.count_where(&at).await.unwrap(), 1);
        assert_eq!(
            tr.update_where(&at, record(json!({"title": "Z"})))
                .await
                .unwrap(),
            1
        );
        assert_eq!(db.rows("article_translations")[0]["title"], "Z");
        assert_eq!(
            tr.count_where(&RowLocator::new(RecordKey::Int(1), "pl"))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn atomic_upsert_updates_in_place() {
        let (db, _, tr) = stores();
        let at = RowLocator::new(RecordKey::Int(1), "en");
        let row = record(json!({"article_id": 1, "locale": "en", "title": "A"}));
        tr.upsert(&at, row.clone()).await.unwrap();
        let mut changed = row;
        changed.insert("title".to_string(), json!("B"));
        tr.upsert(&at, changed).await.unwrap();

        let rows = db.rows("article_translations");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "B");
    }

    #[tokio::test]
    async fn join_select_is_distinct() {
        let (_db, base, tr) = stores();
        base.insert(record(json!({"author": "A"}))).await.unwrap();
        for locale in ["en", "pl"] {
            tr.insert(record(json!({"article_id": 1, "locale": locale, "title": "Same"})))
                .await
                .unwrap();
        }

        let mut conditions = Conditions::default();
        conditions.push(
            Conjunction::And,
            Predicate::Eq(Column::new("article_translations", "title"), json!("Same")),
        );
        let mut query = FindQuery {
            conditions,
            join: Some(Join {
                table: "article_translations".to_string(),
                foreign_key: "article_id".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(base.select(&query).await.unwrap().len(), 2);

        query.distinct = true;
        assert_eq!(base.select(&query).await.unwrap().len(), 1);
    }

    #[test]
    fn chains_follow_sql_precedence() {
        let row = record(json!({"a": 1, "b": 2, "c": "x"}));
        let lookup = |col: &Column| row.get(&col.name);
        let col = |name: &str| Column::new("t", name);
        let clause = |conjunction, predicate| Clause {
            conjunction,
            predicate,
        };

        // a = 9 AND b = 2 OR c LIKE 'x'  →  (false AND true) OR true
        let clauses = vec![
            clause(Conjunction::And, Predicate::Eq(col("a"), json!(9))),
            clause(Conjunction::And, Predicate::Eq(col("b"), json!(2))),
            clause(
                Conjunction::Or,
                Predicate::Like(col("c"), "x".to_string(), LikeSide::Both),
            ),
        ];
        assert!(chain_matches(&clauses, &lookup));

        // a = 1 AND (b = 9 OR c NOT LIKE 'x')  →  true AND (false OR false)
        let clauses = vec![
            clause(Conjunction::And, Predicate::Eq(col("a"), json!("1"))),
            clause(
                Conjunction::And,
                Predicate::Group(vec![
                    clause(Conjunction::And, Predicate::Eq(col("b"), json!(9))),
                    clause(
                        Conjunction::Or,
                        Predicate::NotLike(col("c"), "x".to_string(), LikeSide::Both),
                    ),
                ]),
            ),
        ];
        assert!(!chain_matches(&clauses, &lookup));
    }

    #[test]
    fn null_semantics() {
        let row = record(json!({"a": null}));
        let lookup = |col: &Column| row.get(&col.name);
        let a = Column::new("t", "a");
        assert!(predicate_matches(&Predicate::Eq(a.clone(), json!(null)), &lookup));
        assert!(!predicate_matches(
            &Predicate::NotIn(a.clone(), vec![json!(1)]),
            &lookup
        ));
        assert!(!predicate_matches(
            &Predicate::NotLike(a, "x".to_string(), LikeSide::Both),
            &lookup
        ));
    }

    #[tokio::test]
    async fn rejected_writes_surface_as_store_errors() {
        let (db, _, tr) = stores();
        db.reject_writes("article_translations", true);
        let err = tr
            .insert(record(json!({"article_id": 1, "locale": "en"})))
            .await
            .unwrap_err();
        assert!(matches!(err, TranslatableError::Store(_)));
    }
}
