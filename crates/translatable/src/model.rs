//! Translatable model: base store + translation store + lifecycle pipeline.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::TranslatableConfig;
use crate::entity::Entity;
use crate::error::{Result, TranslatableError};
use crate::locale::LocaleRegistry;
use crate::pipeline::{Event, FindEvent, Hook, Pipeline, Stage, WriteEvent};
use crate::query::{Column, Conjunction, FindQuery, LikeSide, Predicate, SortDirection};
use crate::record::{Record, RecordKey};
use crate::schema::validate_identifier;
use crate::store::{BaseStore, TranslationStore};
use crate::translation::filter::push_translation_predicate;
use crate::translation::{
    AttachTranslations, FilterTranslations, LocaleSelection, PersistTranslations, ReadOptions,
    SplitTranslations,
};

/// A base store whose records carry per-locale translation rows.
///
/// Built once per model and shared; every read takes its own
/// [`ReadOptions`] snapshot through [`Translatable::query`].
pub struct Translatable<B, T> {
    base: Arc<B>,
    translations: Arc<T>,
    registry: Arc<LocaleRegistry>,
    config: TranslatableConfig,
    defaults: ReadOptions,
    pipeline: Pipeline,
}

impl<B, T> Translatable<B, T>
where
    B: BaseStore + 'static,
    T: TranslationStore + 'static,
{
    /// Assemble a model and register the translation hooks.
    ///
    /// Fails when the configured fallback locale is not supported.
    pub fn new(
        base: B,
        translations: T,
        registry: LocaleRegistry,
        config: TranslatableConfig,
    ) -> Result<Self> {
        let registry = Arc::new(registry);
        let translations = Arc::new(translations);
        let defaults = ReadOptions::from_config(&config, &registry)?;

        let mut pipeline = Pipeline::new();
        pipeline.register(Arc::new(SplitTranslations::new(Arc::clone(&registry))));
        pipeline.register(Arc::new(PersistTranslations::new(
            Arc::clone(&translations),
            config.atomic_upserts,
        )));
        pipeline.register(Arc::new(FilterTranslations::new(
            Arc::clone(&translations),
            Arc::clone(&registry),
        )));
        pipeline.register(Arc::new(AttachTranslations::new(
            Arc::clone(&translations),
            Arc::clone(&registry),
            &base.schema().primary_key,
        )));

        info!(
            table = %base.schema().table,
            translations = %translations.schema().table,
            locales = ?registry.supported_locales(),
            fallback = %defaults.fallback_locale,
            "translatable model ready"
        );

        Ok(Self {
            base: Arc::new(base),
            translations,
            registry,
            config,
            defaults,
            pipeline,
        })
    }

    /// Add a hook to the lifecycle pipeline.
    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.pipeline.register(hook);
        self
    }

    pub fn registry(&self) -> &LocaleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TranslatableConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn base_store(&self) -> &B {
        &self.base
    }

    pub fn translation_store(&self) -> &T {
        &self.translations
    }

    /// Insert a combined record and its translations; returns the new key.
    ///
    /// Translation rows are written after the base record. A failure there
    /// is returned as is; the base record stays written.
    pub async fn insert(&self, data: Record) -> Result<RecordKey> {
        let mut event = Event::Write(WriteEvent::new(data));
        self.pipeline.dispatch(Stage::BeforeInsert, &mut event).await?;

        let mut write = into_write(event)?;
        let key = self.base.insert(write.data.clone()).await?;
        debug!(key = %key, table = %self.base.schema().table, "base record inserted");
        write.keys = vec![key.clone()];
        write.succeeded = true;

        let mut event = Event::Write(write);
        self.pipeline.dispatch(Stage::AfterInsert, &mut event).await?;
        Ok(key)
    }

    /// Update records by key with a combined payload.
    ///
    /// Translations are upserted per (key, locale). When only translations
    /// are supplied the base write is skipped.
    pub async fn update(&self, keys: &[RecordKey], data: Record) -> Result<()> {
        let mut event = Event::Write(WriteEvent::new(data));
        if let Some(write) = event.as_write_mut() {
            write.keys = keys.to_vec();
        }
        self.pipeline.dispatch(Stage::BeforeUpdate, &mut event).await?;

        let mut write = into_write(event)?;
        if write.data.is_empty() {
            debug!(keys = keys.len(), "no base attributes to update");
        } else {
            let affected = self.base.update(&write.keys, write.data.clone()).await?;
            debug!(affected, table = %self.base.schema().table, "base records updated");
        }
        write.succeeded = true;

        let mut event = Event::Write(write);
        self.pipeline.dispatch(Stage::AfterUpdate, &mut event).await
    }

    /// Start a read with the configured defaults.
    pub fn query(&self) -> Finder<'_, B, T> {
        Finder {
            model: self,
            options: self.defaults.clone(),
            query: FindQuery::default(),
            translation_filtered: false,
        }
    }

    /// Shorthand for `query().find(key)`.
    pub async fn find(&self, key: impl Into<RecordKey>) -> Result<Option<Entity>> {
        self.query().find(key).await
    }

    /// Shorthand for `query().find_all()`.
    pub async fn find_all(&self) -> Result<Vec<Entity>> {
        self.query().find_all().await
    }
}

impl<B: BaseStore, T: TranslationStore> std::fmt::Debug for Translatable<B, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translatable")
            .field("table", &self.base.schema().table)
            .field("translations", &self.translations.schema().table)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

/// One read against a [`Translatable`] model.
///
/// Options and predicates set here apply to this read only. Methods that
/// take a locale or field name validate it immediately and return an error
/// before any store access.
pub struct Finder<'m, B, T> {
    model: &'m Translatable<B, T>,
    options: ReadOptions,
    query: FindQuery,
    translation_filtered: bool,
}

impl<B, T> Finder<'_, B, T>
where
    B: BaseStore + 'static,
    T: TranslationStore + 'static,
{
    /// Load exactly these locales.
    pub fn with_translations<I, S>(mut self, locales: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locales: Vec<String> = locales.into_iter().map(Into::into).collect();
        for code in &locales {
            self.model.registry.ensure_supported(code)?;
        }
        self.options.locales = LocaleSelection::Only(locales);
        Ok(self)
    }

    /// Load every supported locale.
    pub fn with_all_translations(mut self) -> Self {
        self.options.locales = LocaleSelection::All;
        self
    }

    pub fn use_fallback_locale(mut self, enabled: bool) -> Self {
        self.options.use_fallback_locale = enabled;
        self
    }

    /// Set the fallback locale and turn fallback on.
    pub fn set_fallback_locale(mut self, locale: &str) -> Result<Self> {
        self.model.registry.ensure_supported(locale)?;
        self.options.fallback_locale = locale.to_string();
        self.options.use_fallback_locale = true;
        Ok(self)
    }

    pub fn use_fill_on_empty(mut self, enabled: bool) -> Self {
        self.options.fill_with_empty = enabled;
        self
    }

    /// Set the request locale used for default reads and `translate(None)`.
    pub fn for_locale(mut self, locale: &str) -> Result<Self> {
        self.model.registry.ensure_supported(locale)?;
        self.options.current_locale = Some(locale.to_string());
        Ok(self)
    }

    /// Set the request locale from an `Accept-Language` header value.
    pub fn for_accept_language(mut self, header: &str) -> Self {
        let locale = self.model.registry.negotiate(header).to_string();
        self.options.current_locale = Some(locale);
        self
    }

    /// Options this read will run with.
    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        let column = self.base_column(field)?;
        Ok(self.push(Conjunction::And, Predicate::Eq(column, value.into())))
    }

    pub fn or_where_eq(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        let column = self.base_column(field)?;
        Ok(self.push(Conjunction::Or, Predicate::Eq(column, value.into())))
    }

    pub fn where_in<I, V>(self, field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let column = self.base_column(field)?;
        let values = values.into_iter().map(Into::into).collect();
        Ok(self.push(Conjunction::And, Predicate::In(column, values)))
    }

    pub fn where_not_in<I, V>(self, field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let column = self.base_column(field)?;
        let values = values.into_iter().map(Into::into).collect();
        Ok(self.push(Conjunction::And, Predicate::NotIn(column, values)))
    }

    pub fn like(self, field: &str, value: &str, side: LikeSide) -> Result<Self> {
        let column = self.base_column(field)?;
        Ok(self.push(
            Conjunction::And,
            Predicate::Like(column, value.to_string(), side),
        ))
    }

    pub fn where_translation(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        let column = self.translation_column(field)?;
        Ok(self.push_translation(Conjunction::And, Predicate::Eq(column, value.into())))
    }

    pub fn or_where_translation(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        let column = self.translation_column(field)?;
        Ok(self.push_translation(Conjunction::Or, Predicate::Eq(column, value.into())))
    }

    pub fn where_in_translation<I, V>(self, field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let column = self.translation_column(field)?;
        let values = values.into_iter().map(Into::into).collect();
        Ok(self.push_translation(Conjunction::And, Predicate::In(column, values)))
    }

    pub fn where_not_in_translation<I, V>(self, field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let column = self.translation_column(field)?;
        let values = values.into_iter().map(Into::into).collect();
        Ok(self.push_translation(Conjunction::And, Predicate::NotIn(column, values)))
    }

    pub fn like_translation(self, field: &str, value: &str, side: LikeSide) -> Result<Self> {
        let column = self.translation_column(field)?;
        let predicate = Predicate::Like(column, value.to_string(), side);
        Ok(self.push_translation(Conjunction::And, predicate))
    }

    pub fn or_like_translation(self, field: &str, value: &str, side: LikeSide) -> Result<Self> {
        let column = self.translation_column(field)?;
        let predicate = Predicate::Like(column, value.to_string(), side);
        Ok(self.push_translation(Conjunction::Or, predicate))
    }

    pub fn not_like_translation(self, field: &str, value: &str, side: LikeSide) -> Result<Self> {
        let column = self.translation_column(field)?;
        let predicate = Predicate::NotLike(column, value.to_string(), side);
        Ok(self.push_translation(Conjunction::And, predicate))
    }

    pub fn or_not_like_translation(
        self,
        field: &str,
        value: &str,
        side: LikeSide,
    ) -> Result<Self> {
        let column = self.translation_column(field)?;
        let predicate = Predicate::NotLike(column, value.to_string(), side);
        Ok(self.push_translation(Conjunction::Or, predicate))
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Result<Self> {
        let column = self.base_column(field)?;
        self.query.order_by.push((column, direction));
        Ok(self)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Read one record by primary key.
    pub async fn find(mut self, key: impl Into<RecordKey>) -> Result<Option<Entity>> {
        self.query.keys = Some(vec![key.into()]);
        Ok(self.run(true).await?.into_iter().next())
    }

    /// Read several records by primary key.
    pub async fn find_many(mut self, keys: &[RecordKey]) -> Result<Vec<Entity>> {
        self.query.keys = Some(keys.to_vec());
        self.run(false).await
    }

    /// Read every matching record.
    pub async fn find_all(self) -> Result<Vec<Entity>> {
        self.run(false).await
    }

    /// Read the first matching record, by primary key unless ordered.
    pub async fn first(mut self) -> Result<Option<Entity>> {
        if self.query.order_by.is_empty() {
            let pk = &self.model.base.schema().primary_key;
            let column = Column::new(&self.model.base.schema().table, pk);
            self.query.order_by.push((column, SortDirection::Asc));
        }
        self.query.limit = Some(1);
        Ok(self.run(true).await?.into_iter().next())
    }

    async fn run(self, singleton: bool) -> Result<Vec<Entity>> {
        let model = self.model;
        let mut event = Event::Find(FindEvent {
            query: self.query,
            options: self.options,
            translation_filtered: self.translation_filtered,
            singleton,
            results: Vec::new(),
        });
        model.pipeline.dispatch(Stage::BeforeFind, &mut event).await?;

        let mut find = into_find(event)?;
        find.query.conditions.close_all();
        let rows = model.base.select(&find.query).await?;
        debug!(
            table = %model.base.schema().table,
            rows = rows.len(),
            filtered = find.translation_filtered,
            "base read"
        );

        let locale = find.options.effective_locale(&model.registry).to_string();
        find.results = rows
            .into_iter()
            .map(|row| Entity::new(row, &locale, Arc::clone(&model.registry)))
            .collect();

        let mut event = Event::Find(find);
        model.pipeline.dispatch(Stage::AfterFind, &mut event).await?;
        Ok(into_find(event)?.results)
    }

    fn push(mut self, conjunction: Conjunction, predicate: Predicate) -> Self {
        self.query.conditions.push(conjunction, predicate);
        self
    }

    fn push_translation(mut self, conjunction: Conjunction, predicate: Predicate) -> Self {
        push_translation_predicate(
            &mut self.query,
            &mut self.translation_filtered,
            conjunction,
            predicate,
        );
        self
    }

    fn base_column(&self, field: &str) -> Result<Column> {
        validate_identifier(field)?;
        Ok(Column::new(&self.model.base.schema().table, field))
    }

    fn translation_column(&self, field: &str) -> Result<Column> {
        validate_identifier(field)?;
        Ok(Column::new(&self.model.translations.schema().table, field))
    }
}

fn into_write(event: Event) -> Result<WriteEvent> {
    match event {
        Event::Write(write) => Ok(write),
        Event::Find(_) => Err(TranslatableError::Store(
            "a hook replaced the write event".to_string(),
        )),
    }
}

fn into_find(event: Event) -> Result<FindEvent> {
    match event {
        Event::Find(find) => Ok(find),
        Event::Write(_) => Err(TranslatableError::Store(
            "a hook replaced the read event".to_string(),
        )),
    }
}
