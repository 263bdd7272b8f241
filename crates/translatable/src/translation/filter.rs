//! Query-time filtering on translated fields.
//!
//! Translated-field predicates are collected inside one predicate group that
//! opens with the first such predicate. Before the read runs, the group is
//! closed, the join to the translation table is added and the joined rows are
//! restricted to the queried locales. `DISTINCT base.*` collapses the
//! duplicates a multi-locale match would otherwise produce.

use serde_json::Value;

use crate::query::{Column, Conjunction, FindQuery, Join, Predicate};
use crate::schema::TranslationSchema;

/// Add a predicate on a translated field, opening the isolating group on
/// first use.
pub fn push_translation_predicate(
    query: &mut FindQuery,
    filtered: &mut bool,
    conjunction: Conjunction,
    predicate: Predicate,
) {
    if !*filtered {
        *filtered = true;
        query.conditions.open_group(Conjunction::And);
    }
    query.conditions.push(conjunction, predicate);
}

/// Close the group and join the translation table restricted to `locales`.
pub fn apply(query: &mut FindQuery, schema: &TranslationSchema, locales: &[String]) {
    query.conditions.close_group();
    query.conditions.push(
        Conjunction::And,
        Predicate::In(
            Column::new(&schema.table, &schema.locale_field),
            locales.iter().cloned().map(Value::String).collect(),
        ),
    );
    query.distinct = true;
    query.join = Some(Join {
        table: schema.table.clone(),
        foreign_key: schema.foreign_key.clone(),
    });
}
