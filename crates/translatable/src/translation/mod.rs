//! Translation engine.
//!
//! - [`splitter`]: separates `translations` from write payloads and writes
//!   locale rows after the base write
//! - [`assembler`]: resolves the active locale set and builds per-entity
//!   translation maps
//! - [`policy`]: fallback and empty-fill rules for missing locales
//! - [`filter`]: translated-field predicates and the translation join
//! - [`hooks`]: the pipeline hooks wiring the above into a model

pub mod assembler;
pub mod filter;
pub mod hooks;
mod options;
pub mod policy;
pub mod splitter;

pub use hooks::{AttachTranslations, FilterTranslations, PersistTranslations, SplitTranslations};
pub use options::{LocaleSelection, ReadOptions};
