//! SQL rendering of [`FindQuery`] using SeaQuery.
//!
//! Predicate chains become `OR` of `AND` runs so that SQL precedence matches
//! the order clauses were added in.

use sea_query::{
    Alias, Asterisk, Cond, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr,
};
use serde_json::Value;

use super::types::{Clause, Column, Conjunction, FindQuery, Predicate, SortDirection};
use crate::record::RecordKey;
use crate::schema::BaseSchema;

/// Build the SELECT statement for a read against `base`.
pub fn build_select(query: &FindQuery, base: &BaseSchema) -> SelectStatement {
    let mut select = Query::select();

    if query.distinct {
        select.distinct();
    }
    select.column((Alias::new(&base.table), Asterisk));
    select.from(Alias::new(&base.table));

    if let Some(join) = &query.join {
        select.inner_join(
            Alias::new(&join.table),
            Expr::col((Alias::new(&join.table), Alias::new(&join.foreign_key)))
                .equals((Alias::new(&base.table), Alias::new(&base.primary_key))),
        );
    }

    if let Some(keys) = &query.keys {
        let pk = column_expr(&Column::new(&base.table, &base.primary_key));
        select.and_where(pk.is_in(keys.iter().map(key_expr)));
    }

    if !query.conditions.clauses().is_empty() {
        select.cond_where(chain_cond(query.conditions.clauses()));
    }

    for (column, direction) in &query.order_by {
        let order = match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        select.order_by((Alias::new(&column.table), Alias::new(&column.name)), order);
    }

    if let Some(limit) = query.limit {
        select.limit(limit);
    }
    if let Some(offset) = query.offset {
        select.offset(offset);
    }

    select
}

/// Render a read as Postgres SQL.
pub fn render(query: &FindQuery, base: &BaseSchema) -> String {
    build_select(query, base).to_string(PostgresQueryBuilder)
}

/// Turn a clause chain into `(a AND b) OR (c AND d)`.
pub(crate) fn chain_cond(clauses: &[Clause]) -> Cond {
    let mut any = Cond::any();
    let mut run = Cond::all();
    let mut run_len = 0usize;

    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 && clause.conjunction == Conjunction::Or {
            any = any.add(run);
            run = Cond::all();
            run_len = 0;
        }
        run = run.add(predicate_cond(&clause.predicate));
        run_len += 1;
    }
    if run_len > 0 {
        any = any.add(run);
    }
    any
}

fn predicate_cond(predicate: &Predicate) -> SimpleExpr {
    match predicate {
        Predicate::Eq(column, Value::Null) => column_expr(column).is_null(),
        Predicate::Eq(column, value) => column_expr(column).eq(value_expr(value)),
        Predicate::In(column, values) => {
            if values.is_empty() {
                return Expr::cust("FALSE");
            }
            column_expr(column).is_in(values.iter().map(value_expr))
        }
        Predicate::NotIn(column, values) => {
            if values.is_empty() {
                return Expr::cust("TRUE");
            }
            column_expr(column).is_not_in(values.iter().map(value_expr))
        }
        Predicate::Like(column, value, side) => column_expr(column).like(side.pattern(value)),
        Predicate::NotLike(column, value, side) => {
            column_expr(column).not_like(side.pattern(value))
        }
        Predicate::Group(inner) => chain_cond(inner).into(),
    }
}

pub(crate) fn column_expr(column: &Column) -> SimpleExpr {
    Expr::col((Alias::new(&column.table), Alias::new(&column.name))).into()
}

/// Convert a JSON scalar into a bound SQL value.
///
/// Arrays and objects are sent as their JSON text.
pub(crate) fn value_expr(value: &Value) -> SimpleExpr {
    match value {
        Value::Null => SimpleExpr::Value(Option::<String>::None.into()),
        Value::Bool(b) => SimpleExpr::Value((*b).into()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SimpleExpr::Value(i.into()),
            None => SimpleExpr::Value(n.as_f64().unwrap_or_default().into()),
        },
        Value::String(s) => SimpleExpr::Value(s.clone().into()),
        other => SimpleExpr::Value(other.to_string().into()),
    }
}

pub(crate) fn key_expr(key: &RecordKey) -> SimpleExpr {
    match key {
        RecordKey::Int(i) => SimpleExpr::Value((*i).into()),
        RecordKey::Text(s) => SimpleExpr::Value(s.clone().into()),
    }
}
