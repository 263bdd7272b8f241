//! Locale registry.
//!
//! Holds the ordered set of supported locale codes and the default locale.
//! Every locale a caller names (active sets, fallback targets, entity lookups)
//! is checked against this registry before any store I/O happens.

use crate::error::{Result, TranslatableError};

/// Supported locales and the process default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleRegistry {
    supported: Vec<String>,
    default_locale: String,
}

impl LocaleRegistry {
    /// Build a registry.
    ///
    /// Fails when the supported set is empty, contains a malformed or
    /// duplicate code, or does not contain the default locale.
    pub fn new<I, S>(supported: I, default_locale: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut codes: Vec<String> = Vec::new();
        for code in supported {
            let code = code.into().trim().to_string();
            validate_locale_code(&code)?;
            if codes.contains(&code) {
                return Err(TranslatableError::Configuration(format!(
                    "locale \"{code}\" is listed more than once"
                )));
            }
            codes.push(code);
        }

        if codes.is_empty() {
            return Err(TranslatableError::Configuration(
                "the supported locale set must not be empty".to_string(),
            ));
        }

        let default_locale = default_locale.trim().to_string();
        if !codes.contains(&default_locale) {
            return Err(TranslatableError::Configuration(format!(
                "default locale \"{default_locale}\" is not a supported locale"
            )));
        }

        Ok(Self {
            supported: codes,
            default_locale,
        })
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.supported.iter().any(|c| c == code)
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Supported locales in configuration order.
    pub fn supported_locales(&self) -> &[String] {
        &self.supported
    }

    /// Return the code unchanged if supported, or a `LocaleNotSupported` error.
    pub fn ensure_supported<'a>(&self, code: &'a str) -> Result<&'a str> {
        if self.is_supported(code) {
            Ok(code)
        } else {
            Err(TranslatableError::LocaleNotSupported(code.to_string()))
        }
    }

    /// Resolve the request locale from an `Accept-Language` header value.
    ///
    /// Candidates are tried in quality order; an exact (case-insensitive)
    /// match wins, then the primary subtag (`pl-PL` → `pl`). Falls back to
    /// the default locale when nothing matches.
    pub fn negotiate(&self, accept_language: &str) -> &str {
        for (candidate, _quality) in parse_accept_language(accept_language) {
            if let Some(code) = self.lookup_ignore_case(&candidate) {
                return code;
            }
            if let Some(primary) = candidate.split('-').next()
                && let Some(code) = self.lookup_ignore_case(primary)
            {
                return code;
            }
        }
        &self.default_locale
    }

    fn lookup_ignore_case(&self, candidate: &str) -> Option<&str> {
        self.supported
            .iter()
            .find(|c| c.eq_ignore_ascii_case(candidate))
            .map(String::as_str)
    }
}

/// Validate a locale code: a 2-3 letter primary subtag, optionally followed
/// by `-` or `_` separated alphanumeric subtags (`en`, `pt-BR`, `zh_Hans`).
fn validate_locale_code(code: &str) -> Result<()> {
    if code.is_empty() || code.len() > 12 {
        return Err(TranslatableError::Configuration(format!(
            "locale code must be 1-12 characters, got \"{code}\""
        )));
    }

    let mut parts = code.split(['-', '_']);

    match parts.next() {
        Some(primary)
            if (2..=3).contains(&primary.len())
                && primary.bytes().all(|b| b.is_ascii_alphabetic()) => {}
        _ => {
            return Err(TranslatableError::Configuration(format!(
                "locale code must start with a 2-3 letter primary subtag, got \"{code}\""
            )));
        }
    }

    for subtag in parts {
        if subtag.is_empty()
            || subtag.len() > 8
            || !subtag.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(TranslatableError::Configuration(format!(
                "locale subtag must be 1-8 alphanumeric characters, got \"{subtag}\" in \"{code}\""
            )));
        }
    }

    Ok(())
}

/// Parse an `Accept-Language` value into (tag, quality) pairs, highest
/// quality first. Ties keep header order.
fn parse_accept_language(header: &str) -> Vec<(String, f32)> {
    let mut tags: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }

            let mut segments = part.split(';');
            let tag = segments.next()?.trim().to_string();
            if tag.is_empty() || tag == "*" {
                return None;
            }

            let quality = segments
                .find_map(|s| {
                    s.trim()
                        .strip_prefix("q=")
                        .and_then(|q| q.trim().parse::<f32>().ok())
                })
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);

            // q=0 marks the tag as not acceptable.
            (quality > 0.0).then_some((tag, quality))
        })
        .collect();

    tags.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    tags
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn registry() -> LocaleRegistry {
        LocaleRegistry::new(["en", "pl", "pt-BR"], "en").unwrap()
    }

    #[test]
    fn lookups_reflect_configuration() {
        let reg = registry();
        assert!(reg.is_supported("pl"));
        assert!(!reg.is_supported("de"));
        assert_eq!(reg.default_locale(), "en");
        assert_eq!(reg.supported_locales(), ["en", "pl", "pt-BR"]);
    }

    #[test]
    fn empty_set_is_a_configuration_error() {
        let err = LocaleRegistry::new(Vec::<String>::new(), "en").unwrap_err();
        assert!(matches!(err, TranslatableError::Configuration(_)));
    }

    #[test]
    fn default_must_be_supported() {
        let err = LocaleRegistry::new(["en", "pl"], "de").unwrap_err();
        assert!(matches!(err, TranslatableError::Configuration(_)));
    }

    #[test]
    fn duplicates_and_malformed_codes_rejected() {
        assert!(LocaleRegistry::new(["en", "en"], "en").is_err());
        assert!(LocaleRegistry::new(["e"], "e").is_err());
        assert!(LocaleRegistry::new(["en-"], "en-").is_err());
        assert!(LocaleRegistry::new(["../x"], "../x").is_err());
    }

    #[test]
    fn ensure_supported_names_offending_code() {
        let reg = registry();
        assert_eq!(reg.ensure_supported("pl").unwrap(), "pl");
        match reg.ensure_supported("xx") {
            Err(TranslatableError::LocaleNotSupported(code)) => assert_eq!(code, "xx"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn negotiate_prefers_quality_order() {
        let reg = registry();
        assert_eq!(reg.negotiate("de;q=1.0, pl;q=0.8, en;q=0.5"), "pl");
        assert_eq!(reg.negotiate("en;q=0.2, pl;q=0.9"), "pl");
    }

    #[test]
    fn negotiate_matches_primary_subtag_and_case() {
        let reg = registry();
        assert_eq!(reg.negotiate("pl-PL"), "pl");
        assert_eq!(reg.negotiate("pt-br"), "pt-BR");
    }

    #[test]
    fn negotiate_skips_zero_quality() {
        let reg = registry();
        assert_eq!(reg.negotiate("pl;q=0, pt-BR;q=0.3"), "pt-BR");
        assert_eq!(reg.negotiate("pl;q=0.0"), "en");
    }

    #[test]
    fn negotiate_falls_back_to_default() {
        let reg = registry();
        assert_eq!(reg.negotiate(""), "en");
        assert_eq!(reg.negotiate("fr, *;q=0.1"), "en");
    }
}
