//! Lifecycle pipeline.
//!
//! Writes and reads pass through named stages. At each stage the registered
//! hooks run in weight order (lower first) against a mutable event, and the
//! first error aborts the operation.

mod registry;

use std::fmt;

use async_trait::async_trait;

use crate::entity::Entity;
use crate::error::Result;
use crate::query::FindQuery;
use crate::record::{Record, RecordKey, TranslationMap};
use crate::translation::ReadOptions;

pub use registry::Pipeline;

/// Lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeFind,
    AfterFind,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::BeforeInsert => "before_insert",
            Stage::AfterInsert => "after_insert",
            Stage::BeforeUpdate => "before_update",
            Stage::AfterUpdate => "after_update",
            Stage::BeforeFind => "before_find",
            Stage::AfterFind => "after_find",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insert or update in flight.
#[derive(Debug, Clone, Default)]
pub struct WriteEvent {
    /// Payload for the base store.
    pub data: Record,
    /// Affected base keys: the new key after an insert, the targets of an
    /// update.
    pub keys: Vec<RecordKey>,
    /// Whether the base write went through. Only meaningful in after stages.
    pub succeeded: bool,
    /// Translations buffered for this operation only.
    pub translations: TranslationMap,
}

impl WriteEvent {
    pub fn new(data: Record) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }
}

/// Read in flight.
#[derive(Debug, Clone)]
pub struct FindEvent {
    pub query: FindQuery,
    pub options: ReadOptions,
    /// Set once a translated-field filter has been added to `query`.
    pub translation_filtered: bool,
    /// Single-record lookup by key.
    pub singleton: bool,
    /// Results, filled after the base read.
    pub results: Vec<Entity>,
}

/// Context handed to hooks.
#[derive(Debug, Clone)]
pub enum Event {
    Write(WriteEvent),
    Find(FindEvent),
}

impl Event {
    pub fn as_write_mut(&mut self) -> Option<&mut WriteEvent> {
        match self {
            Event::Write(write) => Some(write),
            Event::Find(_) => None,
        }
    }

    pub fn as_find_mut(&mut self) -> Option<&mut FindEvent> {
        match self {
            Event::Find(find) => Some(find),
            Event::Write(_) => None,
        }
    }
}

/// A named handler attached to one or more stages.
#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    fn stages(&self) -> &[Stage];

    /// Ordering weight; lower runs first.
    fn weight(&self) -> i32 {
        0
    }

    async fn run(&self, stage: Stage, event: &mut Event) -> Result<()>;
}
