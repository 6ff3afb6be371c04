// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Message catalog.
//!
//! User-facing text lives in YAML catalogs embedded into the binary, one per
//! locale, keyed by dotted names such as `process.summary_failed`. Values use
//! the same `{field}` placeholders as path templates.

use crate::template::Template;

use std::{collections::BTreeMap, fmt::Display};
use tracing::warn;

const FALLBACK: &str = "en";

const CATALOGS: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en.yaml")),
    ("zh-CN", include_str!("../locales/zh-CN.yaml")),
];

/// Localized messages for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    language: String,
    entries: BTreeMap<String, String>,
    fallback: BTreeMap<String, String>,
}

impl Messages {
    /// Load catalog for `language`.
    ///
    /// Matching ignores case and accepts `_` for `-`, and a bare language
    /// like `zh` picks the first catalog of that language. Anything else
    /// falls back to English.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::Deserialize`] if an embedded catalog is
    ///   malformed.
    pub fn load(language: &str) -> Result<Self> {
        let fallback = parse_catalog(FALLBACK)?;
        let selected = match select(language) {
            Some(selected) => selected,
            None => {
                warn!("no messages for language {language:?}, using {FALLBACK:?}");
                FALLBACK
            }
        };
        let entries = if selected == FALLBACK {
            fallback.clone()
        } else {
            parse_catalog(selected)?
        };

        Ok(Self {
            language: selected.into(),
            entries,
            fallback,
        })
    }

    /// Locale that was selected.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Translate `key`, filling placeholders from `args`.
    ///
    /// Keys missing from the selected catalog come from the English one.
    /// Keys missing from both come back as the key itself.
    pub fn t(&self, key: &str, args: &[(&str, &dyn Display)]) -> String {
        let Some(raw) = self.entries.get(key).or_else(|| self.fallback.get(key)) else {
            return key.into();
        };

        match raw.parse::<Template>() {
            Ok(template) => template.render_lenient(|name| {
                args.iter()
                    .find(|(arg, _)| *arg == name)
                    .map(|(_, value)| value.to_string())
            }),
            Err(_) => raw.clone(),
        }
    }
}

/// List locales that have a catalog.
pub fn available() -> impl Iterator<Item = &'static str> {
    CATALOGS.iter().map(|(language, _)| *language)
}

fn select(language: &str) -> Option<&'static str> {
    let wanted = language.replace('_', "-");
    available()
        .find(|known| known.eq_ignore_ascii_case(&wanted))
        .or_else(|| {
            let base = wanted.split('-').next().unwrap_or_default();
            available().find(|known| {
                known
                    .split('-')
                    .next()
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(base))
            })
        })
}

fn parse_catalog(language: &'static str) -> Result<BTreeMap<String, String>> {
    let source = CATALOGS
        .iter()
        .find(|(known, _)| *known == language)
        .map(|(_, source)| *source)
        .unwrap_or_default();

    serde_yaml::from_str(source).map_err(|err| CatalogError::Deserialize {
        language,
        source: err,
    })
}

/// Message catalog error types.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Embedded catalog is not a flat YAML mapping of strings.
    #[error("message catalog {language:?} is malformed")]
    Deserialize {
        language: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
