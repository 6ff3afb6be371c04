// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filename naming rules.
//!
//! A __naming rule__ pairs a regular expression with a path template. The
//! expression describes one accepted filename convention, and its named
//! capture groups become the __template fields__ that path and commit
//! message templates can refer to.
//!
//! # Rule Ordering
//!
//! Rules are tried strictly in the order they were configured. The first
//! rule whose pattern matches the _whole_ filename wins, so overlapping
//! conventions should be listed from most specific to least specific.
//!
//! # Extension Group
//!
//! Every rule must define a named capture called `ext` or `extension`. A rule
//! without one is rejected when the rule set is compiled.

use crate::config::RuleSpec;

use regex::Regex;
use tracing::debug;

/// Compiled naming rule.
#[derive(Debug, Clone)]
pub struct NamingRule {
    pattern: Regex,
    source: String,
    path_template: String,
    example: String,
}

impl NamingRule {
    /// Compile a rule specification.
    ///
    /// The pattern is anchored on both ends regardless of how it was written,
    /// so only full filename matches count.
    ///
    /// # Errors
    ///
    /// - Return [`ParseError::InvalidPattern`] if pattern syntax is invalid.
    /// - Return [`ParseError::MissingExtensionGroup`] if the pattern lacks an
    ///   `ext` or `extension` named capture.
    pub fn compile(spec: &RuleSpec) -> Result<Self> {
        let pattern = Regex::new(&format!("^(?:{})$", spec.pattern)).map_err(|err| {
            ParseError::InvalidPattern {
                pattern: spec.pattern.clone(),
                source: err,
            }
        })?;

        let has_extension = pattern
            .capture_names()
            .flatten()
            .any(|name| name == "ext" || name == "extension");
        if !has_extension {
            return Err(ParseError::MissingExtensionGroup {
                pattern: spec.pattern.clone(),
            });
        }

        Ok(Self {
            pattern,
            source: spec.pattern.clone(),
            path_template: spec.path_template.clone().unwrap_or_default(),
            example: spec.example.clone().unwrap_or_default(),
        })
    }

    /// Pattern as written in configuration.
    pub fn pattern(&self) -> &str {
        &self.source
    }

    fn capture(&self, filename: &str) -> Option<ParsedFilename> {
        let captures = self.pattern.captures(filename)?;
        let captured_fields = self
            .pattern
            .capture_names()
            .flatten()
            .map(|name| {
                let value = captures.name(name).map_or("", |m| m.as_str());
                (name.to_string(), value.to_string())
            })
            .collect();

        Some(ParsedFilename {
            original_name: filename.into(),
            captured_fields,
            path_template: self.path_template.clone(),
        })
    }
}

/// Ordered set of compiled naming rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<NamingRule>,
}

impl RuleSet {
    /// Compile rule specifications, preserving their order.
    ///
    /// # Errors
    ///
    /// - Return [`ParseError`] for the first rule that fails to compile.
    pub fn compile<'a>(specs: impl IntoIterator<Item = &'a RuleSpec>) -> Result<Self> {
        let rules = specs
            .into_iter()
            .map(NamingRule::compile)
            .collect::<Result<Vec<_>>>()?;
        debug!("compiled {} naming rules", rules.len());

        Ok(Self { rules })
    }
}

/// Filename parsing capability.
pub trait ParseFilename {
    /// Match a bare filename against the configured conventions.
    fn parse(&self, filename: &str) -> ParseOutcome;

    /// Example filenames for diagnostics.
    fn examples(&self) -> Vec<String>;
}

impl ParseFilename for RuleSet {
    fn parse(&self, filename: &str) -> ParseOutcome {
        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(parsed) = rule.capture(filename) {
                debug!("{filename:?} matched rule #{index} {:?}", rule.pattern());
                return ParseOutcome::Matched(parsed);
            }
        }

        ParseOutcome::NoMatch {
            examples: self.examples(),
        }
    }

    fn examples(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| !rule.example.is_empty())
            .map(|rule| rule.example.clone())
            .collect()
    }
}

/// Result of matching a filename against a rule set.
///
/// Not matching is an ordinary outcome. Batch processing keeps going past
/// files that no rule accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// First rule that matched.
    Matched(ParsedFilename),

    /// No rule matched; carries configured examples.
    NoMatch { examples: Vec<String> },
}

impl ParseOutcome {
    /// Convert into a result, turning a miss into [`ParseError::NoMatch`].
    ///
    /// # Errors
    ///
    /// - Return [`ParseError::NoMatch`] if no rule matched.
    pub fn into_result(self, filename: impl Into<String>) -> Result<ParsedFilename> {
        match self {
            Self::Matched(parsed) => Ok(parsed),
            Self::NoMatch { examples } => Err(ParseError::NoMatch {
                filename: filename.into(),
                examples,
            }),
        }
    }
}

/// Fields captured from a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    /// Filename that was parsed.
    pub original_name: String,

    /// Named captures in pattern order. Groups that did not take part in the
    /// match hold an empty string.
    pub captured_fields: Vec<(String, String)>,

    /// Template of the matching rule, empty for the default template.
    pub path_template: String,
}

impl ParsedFilename {
    /// Look up a captured field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.captured_fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Names of all captured fields.
    pub fn field_names(&self) -> Vec<String> {
        self.captured_fields
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// File extension from the `ext` capture, or `extension` as fallback.
    pub fn extension(&self) -> &str {
        self.field("ext")
            .filter(|ext| !ext.is_empty())
            .or_else(|| self.field("extension"))
            .unwrap_or_default()
    }
}

/// Filename parsing error types.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Rule pattern does not compile.
    #[error("invalid naming pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Rule pattern lacks the extension capture.
    #[error("naming pattern {pattern:?} must define a named group 'ext' or 'extension'")]
    MissingExtensionGroup { pattern: String },

    /// No configured rule accepts the filename.
    #[error("filename {filename:?} does not match any naming rule")]
    NoMatch {
        filename: String,
        examples: Vec<String>,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ParseError> = std::result::Result<T, E>;
