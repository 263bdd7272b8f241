//! Pipeline hooks registered by every translatable model.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{assembler, filter, splitter};
use crate::error::Result;
use crate::locale::LocaleRegistry;
use crate::pipeline::{Event, Hook, Stage};
use crate::store::TranslationStore;

/// Pulls `translations` out of insert and update payloads.
pub struct SplitTranslations {
    registry: Arc<LocaleRegistry>,
}

impl SplitTranslations {
    pub fn new(registry: Arc<LocaleRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Hook for SplitTranslations {
    fn name(&self) -> &str {
        "translations.split"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::BeforeInsert, Stage::BeforeUpdate]
    }

    async fn run(&self, _stage: Stage, event: &mut Event) -> Result<()> {
        let Some(write) = event.as_write_mut() else {
            return Ok(());
        };
        write.translations = splitter::before_write(&mut write.data, &self.registry)?;
        Ok(())
    }
}

/// Writes buffered translations once the base write has gone through.
pub struct PersistTranslations<T> {
    store: Arc<T>,
    atomic_upserts: bool,
}

impl<T> PersistTranslations<T> {
    pub fn new(store: Arc<T>, atomic_upserts: bool) -> Self {
        Self {
            store,
            atomic_upserts,
        }
    }
}

#[async_trait]
impl<T: TranslationStore + 'static> Hook for PersistTranslations<T> {
    fn name(&self) -> &str {
        "translations.persist"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::AfterInsert, Stage::AfterUpdate]
    }

    async fn run(&self, stage: Stage, event: &mut Event) -> Result<()> {
        let Some(write) = event.as_write_mut() else {
            return Ok(());
        };
        if !write.succeeded || write.translations.is_empty() {
            return Ok(());
        }
        let buffered = std::mem::take(&mut write.translations);

        match stage {
            Stage::AfterInsert => {
                for key in &write.keys {
                    splitter::after_insert(self.store.as_ref(), key, &buffered).await?;
                }
            }
            Stage::AfterUpdate => {
                splitter::after_update(
                    self.store.as_ref(),
                    &write.keys,
                    &buffered,
                    self.atomic_upserts,
                )
                .await?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Joins the translation table when a read filters on translated fields.
pub struct FilterTranslations<T> {
    store: Arc<T>,
    registry: Arc<LocaleRegistry>,
}

impl<T> FilterTranslations<T> {
    pub fn new(store: Arc<T>, registry: Arc<LocaleRegistry>) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl<T: TranslationStore + 'static> Hook for FilterTranslations<T> {
    fn name(&self) -> &str {
        "translations.filter"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::BeforeFind]
    }

    async fn run(&self, _stage: Stage, event: &mut Event) -> Result<()> {
        let Some(find) = event.as_find_mut() else {
            return Ok(());
        };
        if !find.translation_filtered {
            return Ok(());
        }
        let active = assembler::resolve_active_locales(&find.options, &self.registry)?;
        let queried = assembler::queried_locales(&active, &find.options);
        filter::apply(&mut find.query, self.store.schema(), &queried);
        Ok(())
    }
}

/// Attaches translation maps to read results.
pub struct AttachTranslations<T> {
    store: Arc<T>,
    registry: Arc<LocaleRegistry>,
    primary_key: String,
}

impl<T> AttachTranslations<T> {
    pub fn new(store: Arc<T>, registry: Arc<LocaleRegistry>, primary_key: &str) -> Self {
        Self {
            store,
            registry,
            primary_key: primary_key.to_string(),
        }
    }
}

#[async_trait]
impl<T: TranslationStore + 'static> Hook for AttachTranslations<T> {
    fn name(&self) -> &str {
        "translations.attach"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::AfterFind]
    }

    async fn run(&self, _stage: Stage, event: &mut Event) -> Result<()> {
        let Some(find) = event.as_find_mut() else {
            return Ok(());
        };
        if find.results.is_empty() {
            return Ok(());
        }
        let active = assembler::resolve_active_locales(&find.options, &self.registry)?;
        let store = self.store.as_ref();

        if find.singleton {
            for entity in &mut find.results {
                if let Some(key) = entity.key(&self.primary_key) {
                    let map =
                        assembler::fetch_for_one(store, &key, &active, &find.options).await?;
                    entity.set_translations(map);
                }
            }
            return Ok(());
        }

        let keys: Vec<_> = find
            .results
            .iter()
            .filter_map(|e| e.key(&self.primary_key))
            .collect();
        let maps = assembler::fetch_for_many(store, &keys, &active, &find.options).await?;
        for entity in &mut find.results {
            if let Some(map) = entity
                .key(&self.primary_key)
                .and_then(|key| maps.get(&key).cloned())
            {
                entity.set_translations(map);
            }
        }
        debug!(
            results = find.results.len(),
            locales = ?active,
            "translations attached"
        );
        Ok(())
    }
}
