// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Placeholder templates.
//!
//! Path templates, commit message templates, and message catalog entries all
//! share one tiny substitution language. A __placeholder__ is a field name
//! wrapped in braces, e.g., `{type}/{name}.{ext}`. Field names follow the same
//! rules as named capture groups: an ASCII letter or underscore followed by
//! ASCII letters, digits, or underscores. Literal braces are written doubled,
//! i.e., `{{` and `}}`.
//!
//! Nothing else is accepted. Positional fields, attribute access, format
//! specs, unterminated placeholders, and stray closing braces are all
//! rejected when the template is parsed, never at render time.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Parsed placeholder template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

impl Template {
    /// Iterate over referenced field names in order of appearance.
    ///
    /// Duplicates are yielded once per occurrence.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Expand all placeholders through `lookup`.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError::UndefinedField`] for the first placeholder
    ///   that `lookup` cannot supply a value for.
    pub fn render<'a, F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match lookup(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(TemplateError::UndefinedField {
                            field: name.clone(),
                        })
                    }
                },
            }
        }

        Ok(out)
    }

    /// Expand placeholders through `lookup`, leaving unknown ones verbatim.
    pub fn render_lenient<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                },
            }
        }

        out
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().is_some_and(|(_, next)| *next == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().is_some_and(|(_, next)| *next == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(TemplateError::StrayBrace {
                        template: source.into(),
                        offset,
                    })
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }

                    if !closed {
                        return Err(TemplateError::Unterminated {
                            template: source.into(),
                            offset,
                        });
                    }

                    if !is_field_name(&name) {
                        return Err(TemplateError::InvalidPlaceholder {
                            template: source.into(),
                            placeholder: name,
                        });
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name));
                }
                _ => literal.push(ch),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.into(),
            segments,
        })
    }
}

impl Display for Template {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.source)
    }
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

/// Template error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Opening brace never closed.
    #[error("unterminated placeholder at byte {offset} in template {template:?}")]
    Unterminated { template: String, offset: usize },

    /// Closing brace without an opening brace.
    #[error("unmatched '}}' at byte {offset} in template {template:?}")]
    StrayBrace { template: String, offset: usize },

    /// Placeholder is not a plain field name.
    #[error("invalid placeholder {{{placeholder}}} in template {template:?}")]
    InvalidPlaceholder {
        template: String,
        placeholder: String,
    },

    /// No value available for referenced field.
    #[error("template uses undefined field {field:?}")]
    UndefinedField { field: String },
}

/// Friendly result alias :3
pub type Result<T, E = TemplateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;
    use std::collections::HashMap;

    fn fields() -> HashMap<&'static str, &'static str> {
        HashMap::from([("type", "Character"), ("name", "Hero"), ("ext", "fbx")])
    }

    #[test]
    fn render_substitutes_fields() -> anyhow::Result<()> {
        let fields = fields();
        let template: Template = "{type}/{name}.{ext}".parse()?;
        let result = template.render(|name| fields.get(name).copied())?;
        pretty_assertions::assert_eq!(result, "Character/Hero.fbx");
        pretty_assertions::assert_eq!(template.fields().collect::<Vec<_>>(), vec!["type", "name", "ext"]);
        Ok(())
    }

    #[test]
    fn render_keeps_escaped_braces() -> anyhow::Result<()> {
        let fields = fields();
        let template: Template = "{{literal}}/{name}".parse()?;
        let result = template.render(|name| fields.get(name).copied())?;
        pretty_assertions::assert_eq!(result, "{literal}/Hero");
        Ok(())
    }

    #[test]
    fn render_reports_first_undefined_field() -> anyhow::Result<()> {
        let fields = fields();
        let template: Template = "{module}/{name}/{variant}".parse()?;
        let result = template.render(|name| fields.get(name).copied());
        pretty_assertions::assert_eq!(
            result,
            Err(TemplateError::UndefinedField {
                field: "module".into()
            })
        );
        Ok(())
    }

    #[test]
    fn render_lenient_leaves_unknown_placeholders() -> anyhow::Result<()> {
        let template: Template = "{count} files in {path}".parse()?;
        let result =
            template.render_lenient(|name| (name == "count").then(|| "3".to_string()));
        pretty_assertions::assert_eq!(result, "3 files in {path}");
        Ok(())
    }

    #[test_case("{0}/{name}"; "positional field")]
    #[test_case("{name.upper}"; "attribute access")]
    #[test_case("{name!r}"; "conversion")]
    #[test_case("{name:>10}"; "format spec")]
    #[test_case("{}"; "empty placeholder")]
    #[test_case("{9lives}"; "leading digit")]
    #[test]
    fn parse_rejects_non_field_placeholders(input: &str) {
        let result = input.parse::<Template>();
        assert!(matches!(
            result,
            Err(TemplateError::InvalidPlaceholder { .. })
        ));
    }

    #[test]
    fn parse_rejects_unbalanced_braces() {
        assert!(matches!(
            "{name".parse::<Template>(),
            Err(TemplateError::Unterminated { offset: 0, .. })
        ));
        assert!(matches!(
            "name}".parse::<Template>(),
            Err(TemplateError::StrayBrace { offset: 4, .. })
        ));
    }
}
