// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Destination path resolution.
//!
//! Turns captured filename fields into an absolute destination inside the
//! repository checkout. Resolution is a pure query: it never touches the file
//! system, so the same code backs previews, status listings, and the actual
//! handoff. Parent directories are created later, by whoever moves the file.
//!
//! # Directory Templates
//!
//! A template whose expansion ends in a path separator names a directory. The
//! original filename is appended to it, e.g., `{type}/` turns
//! `Character_Hero.fbx` into `Character/Character_Hero.fbx`. Any other
//! template names the full destination file.

use crate::{
    naming::ParsedFilename,
    path::normalize,
    template::{Template, TemplateError},
};

use std::path::{Path, PathBuf};

/// Path resolution capability.
pub trait ResolvePath {
    /// Compute absolute destination for parsed filename.
    fn resolve(&self, parsed: &ParsedFilename) -> Result<PathBuf>;
}

/// Template-driven path resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateResolver {
    default_template: String,
    asset_root: PathBuf,
    repo_base: PathBuf,
}

impl TemplateResolver {
    /// Construct new template resolver.
    pub fn new(
        default_template: impl Into<String>,
        asset_root: impl Into<PathBuf>,
        repo_base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            default_template: default_template.into(),
            asset_root: asset_root.into(),
            repo_base: repo_base.into(),
        }
    }
}

impl ResolvePath for TemplateResolver {
    fn resolve(&self, parsed: &ParsedFilename) -> Result<PathBuf> {
        resolve(
            parsed,
            &self.default_template,
            &self.asset_root,
            &self.repo_base,
        )
    }
}

/// Compute `repo_base / asset_root / expanded_template`.
///
/// The rule's own template is used when set, otherwise `default_template`.
///
/// # Errors
///
/// - Return [`ResolveError::EmptyTemplate`] if neither template is set.
/// - Return [`ResolveError::Template`] if template syntax is invalid.
/// - Return [`ResolveError::UndefinedField`] if template references a field
///   that was not captured.
/// - Return [`ResolveError::OutsideRepository`] if the result escapes
///   `repo_base`.
pub fn resolve(
    parsed: &ParsedFilename,
    default_template: &str,
    asset_root: impl AsRef<Path>,
    repo_base: impl AsRef<Path>,
) -> Result<PathBuf> {
    let source = if parsed.path_template.is_empty() {
        default_template
    } else {
        parsed.path_template.as_str()
    };
    if source.is_empty() {
        return Err(ResolveError::EmptyTemplate {
            filename: parsed.original_name.clone(),
        });
    }

    let template: Template = source.parse()?;
    let relative = template
        .render(|name| parsed.field(name))
        .map_err(|err| match err {
            TemplateError::UndefinedField { field } => ResolveError::UndefinedField {
                field,
                available: parsed.field_names(),
            },
            other => ResolveError::Template(other),
        })?;

    let mut destination = repo_base.as_ref().join(asset_root.as_ref());
    if relative.ends_with(['/', std::path::MAIN_SEPARATOR]) {
        destination.push(relative.trim_end_matches(['/', std::path::MAIN_SEPARATOR]));
        destination.push(&parsed.original_name);
    } else {
        destination.push(&relative);
    }

    let destination = normalize(destination);
    let repo_base = normalize(repo_base.as_ref());
    let inside = destination
        .strip_prefix(&repo_base)
        .ok()
        .and_then(|relative| relative.components().next())
        .is_some_and(|first| first.as_os_str() != ".git");
    if !inside {
        return Err(ResolveError::OutsideRepository { path: destination });
    }

    Ok(destination)
}

/// Resolved destination for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Absolute destination path.
    pub absolute_path: PathBuf,

    /// Destination already holds a file that will be overwritten.
    pub is_override: bool,
}

impl ResolvedTarget {
    /// Inspect destination path to see whether it would be overridden.
    pub fn probe(absolute_path: PathBuf) -> Self {
        let is_override = absolute_path.is_file();
        Self {
            absolute_path,
            is_override,
        }
    }
}

/// Path resolution error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Template syntax is invalid.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Template refers to a field the filename did not provide.
    #[error("path template uses undefined field {field:?} (available: {})", .available.join(", "))]
    UndefinedField {
        field: String,
        available: Vec<String>,
    },

    /// Neither rule nor configuration supplies a template.
    #[error("no path template configured for {filename:?}")]
    EmptyTemplate { filename: String },

    /// Expanded path leaves the repository checkout.
    #[error("resolved path {path:?} is outside of the repository")]
    OutsideRepository { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = ResolveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::RuleSpec, naming::{ParseFilename, RuleSet}};
    use pretty_assertions::assert_eq;

    const TYPE_NAME: &str = r"^(?P<type>[^_]+)_(?P<name>[^_]+)\.(?P<ext>\w+)$";

    fn parse(filename: &str, path_template: &str) -> anyhow::Result<ParsedFilename> {
        let rules = RuleSet::compile(&[RuleSpec {
            pattern: TYPE_NAME.into(),
            path_template: Some(path_template.into()),
            example: None,
        }])?;
        Ok(rules.parse(filename).into_result(filename)?)
    }

    #[test]
    fn resolve_full_file_template() -> anyhow::Result<()> {
        let parsed = parse("Character_Hero.fbx", "{type}/{name}.{ext}")?;
        let result = resolve(&parsed, "", "Assets/GameRes", "/work/.repo")?;
        assert_eq!(result, PathBuf::from("/work/.repo/Assets/GameRes/Character/Hero.fbx"));
        Ok(())
    }

    #[test]
    fn resolve_directory_template_keeps_original_filename() -> anyhow::Result<()> {
        let parsed = parse("Character_Hero.fbx", "{type}/{name}/")?;
        let result = resolve(&parsed, "", "Assets/GameRes/", "/work/.repo")?;
        assert_eq!(
            result,
            PathBuf::from("/work/.repo/Assets/GameRes/Character/Hero/Character_Hero.fbx")
        );
        Ok(())
    }

    #[test]
    fn resolve_falls_back_to_default_template() -> anyhow::Result<()> {
        let parsed = parse("Character_Hero.fbx", "")?;
        let result = resolve(&parsed, "{type}/", "Assets", "/work/.repo")?;
        assert_eq!(result, PathBuf::from("/work/.repo/Assets/Character/Character_Hero.fbx"));

        let result = resolve(&parsed, "", "Assets", "/work/.repo");
        assert!(matches!(result, Err(ResolveError::EmptyTemplate { .. })));
        Ok(())
    }

    #[test]
    fn resolve_reports_undefined_field_once() -> anyhow::Result<()> {
        let parsed = parse("Character_Hero.fbx", "{module}/{module}/{name}/")?;
        let result = resolve(&parsed, "", "Assets", "/work/.repo");
        assert_eq!(
            result,
            Err(ResolveError::UndefinedField {
                field: "module".into(),
                available: vec!["type".into(), "name".into(), "ext".into()],
            })
        );

        let message = result.unwrap_err().to_string();
        assert_eq!(message.matches("module").count(), 1);
        Ok(())
    }

    #[test]
    fn resolve_rejects_escaping_repository() -> anyhow::Result<()> {
        let parsed = parse("Character_Hero.fbx", "../../{name}.{ext}")?;
        let result = resolve(&parsed, "", "Assets", "/work/.repo");
        assert!(matches!(result, Err(ResolveError::OutsideRepository { .. })));

        let parsed = parse("Character_Hero.fbx", "/etc/{name}")?;
        let result = resolve(&parsed, "", "Assets", "/work/.repo");
        assert!(matches!(result, Err(ResolveError::OutsideRepository { .. })));

        let parsed = parse("Character_Hero.fbx", "{name}.{ext}")?;
        let result = resolve(&parsed, "", ".git/hooks", "/work/.repo");
        assert!(matches!(result, Err(ResolveError::OutsideRepository { .. })));
        Ok(())
    }

    #[test]
    fn resolve_is_pure() -> anyhow::Result<()> {
        let sandbox = tempfile::tempdir()?;
        let repo = sandbox.path().join(".repo");
        let resolver = TemplateResolver::new("{type}/{name}/", "Assets", &repo);
        let parsed = parse("Character_Hero.fbx", "")?;

        let first = resolver.resolve(&parsed)?;
        let second = resolver.resolve(&parsed)?;
        assert_eq!(first, second);
        assert!(!repo.exists());
        Ok(())
    }

    #[test]
    fn probe_flags_existing_destination() -> anyhow::Result<()> {
        let sandbox = tempfile::tempdir()?;
        let existing = sandbox.path().join("Hero.fbx");
        std::fs::write(&existing, b"mesh")?;

        assert!(ResolvedTarget::probe(existing).is_override);
        assert!(!ResolvedTarget::probe(sandbox.path().join("Villain.fbx")).is_override);
        Ok(())
    }
}
