//! Per-call read options.

use crate::config::TranslatableConfig;
use crate::error::Result;
use crate::locale::LocaleRegistry;

/// Which locales a read loads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LocaleSelection {
    /// The request locale, or the default locale when none is known.
    #[default]
    Current,
    /// Every supported locale, in registry order.
    All,
    /// Exactly these locales, validated when selected.
    Only(Vec<String>),
}

/// Immutable policy snapshot for one read.
///
/// Seeded from [`TranslatableConfig`] and overridden per call. Nothing here
/// is written back to the model, so consecutive reads never see each other's
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    pub locales: LocaleSelection,
    /// Locale of the current request, if known.
    pub current_locale: Option<String>,
    pub use_fallback_locale: bool,
    /// Resolved fallback locale; always supported.
    pub fallback_locale: String,
    pub fill_with_empty: bool,
}

impl ReadOptions {
    /// Defaults for a read under `config`.
    pub fn from_config(config: &TranslatableConfig, registry: &LocaleRegistry) -> Result<Self> {
        Ok(Self {
            locales: LocaleSelection::Current,
            current_locale: None,
            use_fallback_locale: config.use_fallback_locale,
            fallback_locale: config.resolve_fallback(registry)?,
            fill_with_empty: config.fill_with_empty,
        })
    }

    /// Locale used when a read or `translate` does not name one.
    pub fn effective_locale<'a>(&'a self, registry: &'a LocaleRegistry) -> &'a str {
        self.current_locale
            .as_deref()
            .unwrap_or_else(|| registry.default_locale())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn registry() -> LocaleRegistry {
        LocaleRegistry::new(["en", "pl"], "en").unwrap()
    }

    #[test]
    fn seeded_from_config() {
        let config = TranslatableConfig {
            use_fallback_locale: true,
            fallback_locale: Some("pl".to_string()),
            fill_with_empty: true,
            atomic_upserts: false,
        };
        let options = ReadOptions::from_config(&config, &registry()).unwrap();
        assert_eq!(options.locales, LocaleSelection::Current);
        assert!(options.use_fallback_locale);
        assert!(options.fill_with_empty);
        assert_eq!(options.fallback_locale, "pl");
    }

    #[test]
    fn fallback_defaults_to_registry_default() {
        let options =
            ReadOptions::from_config(&TranslatableConfig::default(), &registry()).unwrap();
        assert_eq!(options.fallback_locale, "en");
    }

    #[test]
    fn effective_locale_prefers_request_locale() {
        let registry = registry();
        let mut options =
            ReadOptions::from_config(&TranslatableConfig::default(), &registry).unwrap();
        assert_eq!(options.effective_locale(&registry), "en");
        options.current_locale = Some("pl".to_string());
        assert_eq!(options.effective_locale(&registry), "pl");
    }
}
