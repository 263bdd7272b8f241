//! Read query definition shared by every store backend.
//!
//! A [`FindQuery`] is a small predicate tree over qualified columns plus an
//! optional join. Backends either render it to SQL (see
//! [`super::builder`]) or evaluate it directly.

use serde_json::Value;

use crate::record::RecordKey;

/// A column qualified by its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub table: String,
    pub name: String,
}

impl Column {
    pub fn new(table: &str, name: &str) -> Self {
        Self {
            table: table.to_string(),
            name: name.to_string(),
        }
    }
}

/// Where the wildcard goes in a LIKE pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LikeSide {
    /// `%value`
    Before,
    /// `value%`
    After,
    /// `%value%`
    #[default]
    Both,
}

impl LikeSide {
    /// SQL LIKE pattern for `value`, with wildcards in the value escaped.
    pub fn pattern(self, value: &str) -> String {
        let escaped = escape_like_wildcards(value);
        match self {
            LikeSide::Before => format!("%{escaped}"),
            LikeSide::After => format!("{escaped}%"),
            LikeSide::Both => format!("%{escaped}%"),
        }
    }

    /// Literal (unescaped) match of `needle` against `haystack`.
    pub fn matches(self, haystack: &str, needle: &str) -> bool {
        match self {
            LikeSide::Before => haystack.ends_with(needle),
            LikeSide::After => haystack.starts_with(needle),
            LikeSide::Both => haystack.contains(needle),
        }
    }
}

/// Escape SQL LIKE wildcards (`%`, `_`) and the escape character itself.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// A single condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = value`; a JSON `null` value means `IS NULL`.
    Eq(Column, Value),
    In(Column, Vec<Value>),
    NotIn(Column, Vec<Value>),
    Like(Column, String, LikeSide),
    NotLike(Column, String, LikeSide),
    /// Parenthesised sub-chain.
    Group(Vec<Clause>),
}

/// How a clause joins the chain before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

/// A predicate with its conjunction. The first clause's conjunction is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub conjunction: Conjunction,
    pub predicate: Predicate,
}

/// A predicate chain with an explicit group stack.
///
/// Clauses pushed while a group is open land inside that group. AND binds
/// tighter than OR, as in SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    clauses: Vec<Clause>,
    open: Vec<(Conjunction, Vec<Clause>)>,
}

impl Conditions {
    pub fn push(&mut self, conjunction: Conjunction, predicate: Predicate) {
        let clause = Clause {
            conjunction,
            predicate,
        };
        match self.open.last_mut() {
            Some((_, inner)) => inner.push(clause),
            None => self.clauses.push(clause),
        }
    }

    /// Open a group joined to the chain with `conjunction`.
    pub fn open_group(&mut self, conjunction: Conjunction) {
        self.open.push((conjunction, Vec::new()));
    }

    /// Close the innermost group. Empty groups are dropped.
    pub fn close_group(&mut self) {
        if let Some((conjunction, inner)) = self.open.pop()
            && !inner.is_empty()
        {
            self.push(conjunction, Predicate::Group(inner));
        }
    }

    pub fn close_all(&mut self) {
        while !self.open.is_empty() {
            self.close_group();
        }
    }

    pub fn has_open_group(&self) -> bool {
        !self.open.is_empty()
    }

    /// Closed top-level clauses.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.open.iter().all(|(_, inner)| inner.is_empty())
    }
}

/// `INNER JOIN table ON table.foreign_key = base.primary_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    pub foreign_key: String,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A read against the base table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub conditions: Conditions,
    /// Restrict to these primary keys.
    pub keys: Option<Vec<RecordKey>>,
    pub join: Option<Join>,
    /// Project `DISTINCT base.*`.
    pub distinct: bool,
    pub order_by: Vec<(Column, SortDirection)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eq(name: &str, value: &str) -> Predicate {
        Predicate::Eq(Column::new("t", name), json!(value))
    }

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(LikeSide::Both.pattern("2"), "%2%");
        assert_eq!(LikeSide::Before.pattern("x"), "%x");
        assert_eq!(LikeSide::After.pattern("100%"), "100\\%%");
        assert_eq!(LikeSide::Both.pattern("a_b"), "%a\\_b%");
        assert_eq!(LikeSide::Both.pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn like_matching_is_literal() {
        assert!(LikeSide::Both.matches("Sample title 2", "2"));
        assert!(LikeSide::After.matches("Sample", "Sam"));
        assert!(!LikeSide::After.matches("Sample", "ple"));
        assert!(LikeSide::Before.matches("Sample", "ple"));
        assert!(!LikeSide::Both.matches("Sample", "%"));
    }

    #[test]
    fn clauses_go_into_the_open_group() {
        let mut conditions = Conditions::default();
        conditions.push(Conjunction::And, eq("a", "1"));
        conditions.open_group(Conjunction::And);
        conditions.push(Conjunction::And, eq("b", "2"));
        conditions.push(Conjunction::Or, eq("c", "3"));
        assert_eq!(conditions.clauses().len(), 1);
        assert!(conditions.has_open_group());

        conditions.close_all();
        assert!(!conditions.has_open_group());
        assert_eq!(conditions.clauses().len(), 2);
        match &conditions.clauses()[1].predicate {
            Predicate::Group(inner) => {
                assert_eq!(inner.len(), 2);
                assert_eq!(inner[1].conjunction, Conjunction::Or);
            }
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn empty_group_is_dropped() {
        let mut conditions = Conditions::default();
        conditions.open_group(Conjunction::And);
        assert!(conditions.is_empty());
        conditions.close_group();
        assert!(conditions.clauses().is_empty());
    }
}
