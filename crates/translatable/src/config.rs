//! Configuration loaded from environment variables or a TOML file.

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::TranslatableError;
use crate::locale::LocaleRegistry;

/// Default contents written by `translatable publish`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# Translatable configuration.

[locales]
# Locales that may carry translations. Order is used for "all translations" reads.
supported_locales = ["en"]
# Locale used when a read does not name one and no request locale is known.
default_locale = "en"

[translatable]
# Substitute the fallback locale's row when a requested locale is missing.
use_fallback_locale = false
# Fallback locale. Leave unset to use the default locale.
# fallback_locale = "en"
# Produce empty placeholder rows for missing locales.
fill_with_empty = false
# Write updates with a single INSERT .. ON CONFLICT statement instead of
# count-then-write.
atomic_upserts = false
"#;

/// Translation policy defaults.
///
/// Every read starts from these values; per-call overrides never write back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatableConfig {
    /// Substitute the fallback locale's row for missing locales.
    pub use_fallback_locale: bool,

    /// Fallback locale. `None` means the registry default locale.
    pub fallback_locale: Option<String>,

    /// Produce empty placeholder rows for missing locales.
    pub fill_with_empty: bool,

    /// Use the store's atomic upsert on the update path.
    pub atomic_upserts: bool,
}

impl TranslatableConfig {
    /// Resolve the effective fallback locale against a registry.
    pub fn resolve_fallback(
        &self,
        registry: &LocaleRegistry,
    ) -> std::result::Result<String, TranslatableError> {
        match &self.fallback_locale {
            None => Ok(registry.default_locale().to_string()),
            Some(code) if registry.is_supported(code) => Ok(code.clone()),
            Some(code) => Err(TranslatableError::Configuration(format!(
                "fallback locale \"{code}\" is not a supported locale"
            ))),
        }
    }
}

/// Supported locale set and default locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    pub supported_locales: Vec<String>,
    pub default_locale: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            supported_locales: vec!["en".to_string()],
            default_locale: "en".to_string(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub locales: LocaleConfig,
    pub translatable: TranslatableConfig,
}

impl Settings {
    /// Load configuration from environment variables.
    ///
    /// `SUPPORTED_LOCALES` (comma-separated), `DEFAULT_LOCALE`,
    /// `TRANSLATABLE_USE_FALLBACK_LOCALE`, `TRANSLATABLE_FALLBACK_LOCALE`,
    /// `TRANSLATABLE_FILL_WITH_EMPTY`, `TRANSLATABLE_ATOMIC_UPSERTS`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration through a variable lookup function.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LocaleConfig::default();

        let supported_locales = lookup("SUPPORTED_LOCALES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.supported_locales);

        let default_locale = lookup("DEFAULT_LOCALE")
            .map(|v| v.trim().to_string())
            .unwrap_or(defaults.default_locale);

        let fallback_locale = lookup("TRANSLATABLE_FALLBACK_LOCALE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            locales: LocaleConfig {
                supported_locales,
                default_locale,
            },
            translatable: TranslatableConfig {
                use_fallback_locale: flag(&lookup, "TRANSLATABLE_USE_FALLBACK_LOCALE")?,
                fallback_locale,
                fill_with_empty: flag(&lookup, "TRANSLATABLE_FILL_WITH_EMPTY")?,
                atomic_upserts: flag(&lookup, "TRANSLATABLE_ATOMIC_UPSERTS")?,
            },
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse translatable configuration")
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Build the locale registry and check the fallback locale against it.
    pub fn registry(&self) -> std::result::Result<LocaleRegistry, TranslatableError> {
        let registry = LocaleRegistry::new(
            self.locales.supported_locales.iter().cloned(),
            &self.locales.default_locale,
        )?;
        self.translatable.resolve_fallback(&registry)?;
        Ok(registry)
    }
}

/// Outcome of [`publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    Written,
    Overwritten,
    /// The file exists and `force` was not given.
    Skipped,
}

/// Write [`DEFAULT_CONFIG_TOML`] to `path`.
///
/// An existing file is left alone unless `force` is set.
pub fn publish(path: &Path, force: bool) -> Result<Published> {
    let existed = path.exists();
    if existed && !force {
        return Ok(Published::Skipped);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(if existed {
        Published::Overwritten
    } else {
        Published::Written
    })
}

/// Parse a boolean environment flag. Unset means `false`.
fn flag<F>(lookup: &F, name: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{name} must be a boolean, got '{other}'"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let settings = Settings::from_vars(vars(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.locales.supported_locales, ["en"]);
        assert!(!settings.translatable.use_fallback_locale);
    }

    #[test]
    fn environment_overrides() {
        let settings = Settings::from_vars(vars(&[
            ("SUPPORTED_LOCALES", "en, pl ,,de"),
            ("DEFAULT_LOCALE", "pl"),
            ("TRANSLATABLE_USE_FALLBACK_LOCALE", "yes"),
            ("TRANSLATABLE_FALLBACK_LOCALE", "en"),
            ("TRANSLATABLE_FILL_WITH_EMPTY", "1"),
        ]))
        .unwrap();

        assert_eq!(settings.locales.supported_locales, ["en", "pl", "de"]);
        assert_eq!(settings.locales.default_locale, "pl");
        assert!(settings.translatable.use_fallback_locale);
        assert_eq!(settings.translatable.fallback_locale.as_deref(), Some("en"));
        assert!(settings.translatable.fill_with_empty);
        assert!(!settings.translatable.atomic_upserts);
    }

    #[test]
    fn bad_flag_is_rejected() {
        let err = Settings::from_vars(vars(&[("TRANSLATABLE_FILL_WITH_EMPTY", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("TRANSLATABLE_FILL_WITH_EMPTY"));
    }

    #[test]
    fn published_defaults_parse() {
        let settings = Settings::from_toml_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.registry().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [locales]
            supported_locales = ["en", "pl"]

            [translatable]
            fill_with_empty = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.locales.default_locale, "en");
        assert!(settings.translatable.fill_with_empty);
        assert!(settings.translatable.fallback_locale.is_none());
    }

    #[test]
    fn publish_respects_existing_files() {
        let dir = std::env::temp_dir().join(format!("translatable-publish-{}", std::process::id()));
        let path = dir.join("config").join("translatable.toml");
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(publish(&path, false).unwrap(), Published::Written);
        std::fs::write(&path, "# edited").unwrap();
        assert_eq!(publish(&path, false).unwrap(), Published::Skipped);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited");
        assert_eq!(publish(&path, true).unwrap(), Published::Overwritten);
        assert!(Settings::load(&path).is_ok());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn fallback_resolves_to_default_when_unset() {
        let settings = Settings::from_vars(vars(&[("SUPPORTED_LOCALES", "en,pl")])).unwrap();
        let registry = settings.registry().unwrap();
        assert_eq!(
            settings.translatable.resolve_fallback(&registry).unwrap(),
            "en"
        );
    }

    #[test]
    fn unsupported_fallback_is_a_configuration_error() {
        let settings = Settings::from_vars(vars(&[
            ("SUPPORTED_LOCALES", "en,pl"),
            ("TRANSLATABLE_FALLBACK_LOCALE", "jp"),
        ]))
        .unwrap();
        assert!(matches!(
            settings.registry(),
            Err(TranslatableError::Configuration(_))
        ));
    }
}
