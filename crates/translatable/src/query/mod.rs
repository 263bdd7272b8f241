//! Read queries: definition and SQL rendering.

pub mod builder;
mod types;

pub use types::{
    Clause, Column, Conditions, Conjunction, FindQuery, Join, LikeSide, Predicate, SortDirection,
};
