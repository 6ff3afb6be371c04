// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the YAML configuration file that a developer hands
//! to the operator. The layout is parsed and validated once, up front; every
//! optional key has a documented default.
//!
//! # General Layout
//!
//! ```yaml
//! workspace: "./"                 # or { root, inbox, repo, failed }
//! git:
//!   repository: "https://git.example.com/org/game.git"
//!   branch: "main"
//!   token: ""                     # falls back to $GIT_TOKEN, $GITHUB_TOKEN
//!   user: { name: "Asset Handoffer", email: "asset-handoffer@local" }
//!   commit_message: "Update: {name}"
//!   push: "batch"                 # or "per_file"
//! asset_root: "Assets/GameRes/"
//! path_template: "{type}/{name}/"
//! naming:
//!   rules:
//!     - pattern: '^(?P<type>[^_]+)_(?P<name>[^_]+)\.(?P<ext>\w+)$'
//!       path_template: "{type}/{name}.{ext}"
//!       example: "Character_Hero.fbx"
//! language: "en"
//! ```
//!
//! Instead of `naming.rules`, a single rule may be written as
//! `naming.pattern` plus `naming.example`, using the top-level
//! `path_template`.

use crate::{
    path::{Workspace, WorkspaceError},
    template::{Template, TemplateError},
};

use serde::{Deserialize, Serialize};
use std::{
    env,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Handoff settings as written in the configuration file.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Workspace layout.
    #[serde(default)]
    pub workspace: WorkspaceLayout,

    /// Target repository settings.
    #[serde(default)]
    pub git: GitSettings,

    /// Directory inside the repository that all assets go under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_root: Option<String>,

    /// Path template for rules that do not bring their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_template: Option<String>,

    /// Filename conventions.
    #[serde(default)]
    pub naming: NamingSettings,

    /// Message catalog locale.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Settings {
    /// Construct settings for a fresh configuration file.
    pub fn template(url: impl Into<String>, asset_root: impl Into<String>) -> Self {
        Self {
            workspace: WorkspaceLayout::default(),
            git: GitSettings {
                repository: Some(url.into()),
                ..GitSettings::default()
            },
            asset_root: Some(asset_root.into()),
            path_template: None,
            naming: NamingSettings {
                rules: Some(vec![RuleSpec {
                    pattern: r"^(?P<type>[^_]+)_(?P<name>[^_]+)\.(?P<ext>\w+)$".into(),
                    path_template: Some("{type}/{name}.{ext}".into()),
                    example: Some("Character_Hero.fbx".into()),
                }]),
                pattern: None,
                example: None,
            },
            language: default_language(),
        }
    }

    /// Naming rules in match order.
    ///
    /// Expands the `naming.pattern` shorthand into a single rule. Rules
    /// without a path template of their own inherit the top-level one.
    pub fn naming_rules(&self) -> Vec<RuleSpec> {
        let rules = match (&self.naming.rules, &self.naming.pattern) {
            (Some(rules), _) if !rules.is_empty() => rules.clone(),
            (_, Some(pattern)) => vec![RuleSpec {
                pattern: pattern.clone(),
                path_template: None,
                example: self.naming.example.clone(),
            }],
            _ => Vec::new(),
        };

        rules
            .into_iter()
            .map(|mut rule| {
                if rule.path_template.as_deref().unwrap_or_default().is_empty() {
                    rule.path_template = self.path_template.clone();
                }
                rule
            })
            .collect()
    }

    /// Access token for HTTPS remotes.
    ///
    /// Uses `git.token` if set, otherwise `GIT_TOKEN` or `GITHUB_TOKEN` from
    /// the environment.
    pub fn git_token(&self) -> Option<String> {
        self.git
            .token
            .clone()
            .filter(|token| !token.is_empty())
            .or_else(|| env::var("GIT_TOKEN").ok().filter(|token| !token.is_empty()))
            .or_else(|| env::var("GITHUB_TOKEN").ok().filter(|token| !token.is_empty()))
    }

    /// Remote repository URL.
    pub fn repository(&self) -> &str {
        self.git.repository.as_deref().unwrap_or_default()
    }

    /// Asset root inside the repository.
    pub fn asset_root(&self) -> &str {
        self.asset_root.as_deref().unwrap_or_default()
    }

    /// Default path template.
    pub fn path_template(&self) -> &str {
        self.path_template.as_deref().unwrap_or_default()
    }

    /// Parsed commit message template.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Template`] if template syntax is invalid.
    pub fn commit_template(&self) -> Result<Template> {
        self.git
            .commit_message
            .parse()
            .map_err(|err| ConfigError::Template {
                field: "git.commit_message",
                source: err,
            })
    }

    fn validate(&self) -> Result<()> {
        if self.git.repository.as_deref().unwrap_or_default().is_empty() {
            return Err(ConfigError::MissingField {
                field: "git.repository",
            });
        }

        let rules = self.naming_rules();
        if rules.is_empty() {
            return Err(ConfigError::MissingField {
                field: "naming.rules or naming.pattern",
            });
        }

        if self.asset_root.is_none() {
            return Err(ConfigError::MissingField {
                field: "asset_root",
            });
        }

        for rule in &rules {
            let template = rule.path_template.as_deref().unwrap_or_default();
            if template.is_empty() {
                return Err(ConfigError::MissingField {
                    field: "path_template",
                });
            }
            template
                .parse::<Template>()
                .map_err(|err| ConfigError::Template {
                    field: "path_template",
                    source: err,
                })?;
        }

        self.commit_template()?;

        Ok(())
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let settings: Settings = serde_yaml::from_str(data)?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            serde_yaml::to_string(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Workspace layout, either a bare root path or a full layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WorkspaceLayout {
    /// Root directory with default subdirectory names.
    Root(String),

    /// Root directory with custom subdirectory names.
    Layout {
        #[serde(default = "default_root")]
        root: String,
        #[serde(default = "default_inbox")]
        inbox: String,
        #[serde(default = "default_repo")]
        repo: String,
        #[serde(default = "default_failed")]
        failed: String,
    },
}

impl Default for WorkspaceLayout {
    fn default() -> Self {
        Self::Root(default_root())
    }
}

/// Target repository settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct GitSettings {
    /// Remote URL to clone from and push to.
    #[serde(default)]
    pub repository: Option<String>,

    /// Branch to work on.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Access token embedded into HTTPS remote URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Commit identity.
    #[serde(default)]
    pub user: GitUser,

    /// Commit message template over captured fields.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// When to push.
    #[serde(default)]
    pub push: PushMode,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            repository: None,
            branch: default_branch(),
            token: None,
            user: GitUser::default(),
            commit_message: default_commit_message(),
            push: PushMode::default(),
        }
    }
}

/// Commit identity written into the checkout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct GitUser {
    #[serde(default = "default_user_name")]
    pub name: String,

    #[serde(default = "default_user_email")]
    pub email: String,
}

impl Default for GitUser {
    fn default() -> Self {
        Self {
            name: default_user_name(),
            email: default_user_email(),
        }
    }
}

/// Push strategy for batch processing.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushMode {
    /// Commit each file, push once after the batch.
    #[default]
    Batch,

    /// Pull, commit, and push each file on its own.
    PerFile,
}

/// Filename convention settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct NamingSettings {
    /// Ordered naming rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleSpec>>,

    /// Single-rule shorthand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Example for the single-rule shorthand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// One naming rule as written in configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RuleSpec {
    /// Regular expression with named captures.
    pub pattern: String,

    /// Destination template over captured fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_template: Option<String>,

    /// Example filename shown when nothing matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// Loaded configuration.
///
/// Settings plus the workspace they resolve to on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Parsed settings.
    pub settings: Settings,

    /// Resolved workspace directories.
    pub workspace: Workspace,

    /// Configuration file that was loaded.
    pub file: PathBuf,
}

impl Config {
    /// Load configuration file.
    ///
    /// Relative workspace roots resolve against the directory that holds
    /// the configuration file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NotFound`] if file does not exist.
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] for malformed YAML.
    /// - Return [`ConfigError::MissingField`] for missing required keys.
    /// - Return [`ConfigError::Workspace`] for a bad workspace layout.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let data = read_to_string(path).map_err(|err| ConfigError::Read {
            source: err,
            path: path.to_path_buf(),
        })?;
        let settings: Settings = data.parse()?;

        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base = base.canonicalize().map_err(|err| ConfigError::Read {
            source: err,
            path: base.clone(),
        })?;
        let workspace = settings.workspace.resolve(&base)?;

        Ok(Self {
            settings,
            workspace,
            file: path.to_path_buf(),
        })
    }
}

impl WorkspaceLayout {
    /// Resolve layout against base directory.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Workspace`] if layout is invalid.
    pub fn resolve(&self, base: impl AsRef<Path>) -> Result<Workspace> {
        let workspace = match self {
            Self::Root(root) => Workspace::resolve(
                base,
                root,
                &default_inbox(),
                &default_repo(),
                &default_failed(),
            )?,
            Self::Layout {
                root,
                inbox,
                repo,
                failed,
            } => Workspace::resolve(base, root, inbox, repo, failed)?,
        };

        Ok(workspace)
    }
}

fn default_root() -> String {
    "./".into()
}

fn default_inbox() -> String {
    "inbox".into()
}

fn default_repo() -> String {
    ".repo".into()
}

fn default_failed() -> String {
    "failed".into()
}

fn default_branch() -> String {
    "main".into()
}

fn default_commit_message() -> String {
    "Update: {name}".into()
}

fn default_user_name() -> String {
    "Asset Handoffer".into()
}

fn default_user_email() -> String {
    "asset-handoffer@local".into()
}

fn default_language() -> String {
    "en".into()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file does not exist.
    #[error("configuration file not found: {:?}", path.display())]
    NotFound { path: PathBuf },

    /// Configuration file cannot be read.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error("invalid configuration YAML: {0}")]
    Deserialize(#[from] serde_yaml::Error),

    /// Failed to serialize configuration.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),

    /// Required key is missing or empty.
    #[error("missing required configuration field: {field}")]
    MissingField { field: &'static str },

    /// Template has invalid syntax.
    #[error("invalid template in {field}")]
    Template {
        field: &'static str,
        #[source]
        source: TemplateError,
    },

    /// Workspace layout cannot be resolved.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn deserialize_full_settings() -> anyhow::Result<()> {
        let result: Settings = indoc! {r#"
            workspace:
              root: "~/handoff"
              inbox: "drop"
            git:
              repository: "https://git.example.com/org/game.git"
              branch: "develop"
              token: "s3cret"
              user:
                name: "Art Bot"
              commit_message: "Add {type} {name}"
              push: per_file
            asset_root: "Assets/GameRes/"
            naming:
              rules:
                - pattern: '^(?P<type>[^_]+)_(?P<name>[^_]+)\.(?P<ext>\w+)$'
                  path_template: "{type}/{name}.{ext}"
                  example: "Character_Hero.fbx"
            language: "zh-CN"
        "#}
        .parse()?;

        let expect = Settings {
            workspace: WorkspaceLayout::Layout {
                root: "~/handoff".into(),
                inbox: "drop".into(),
                repo: ".repo".into(),
                failed: "failed".into(),
            },
            git: GitSettings {
                repository: Some("https://git.example.com/org/game.git".into()),
                branch: "develop".into(),
                token: Some("s3cret".into()),
                user: GitUser {
                    name: "Art Bot".into(),
                    email: "asset-handoffer@local".into(),
                },
                commit_message: "Add {type} {name}".into(),
                push: PushMode::PerFile,
            },
            asset_root: Some("Assets/GameRes/".into()),
            path_template: None,
            naming: NamingSettings {
                rules: Some(vec![RuleSpec {
                    pattern: r"^(?P<type>[^_]+)_(?P<name>[^_]+)\.(?P<ext>\w+)$".into(),
                    path_template: Some("{type}/{name}.{ext}".into()),
                    example: Some("Character_Hero.fbx".into()),
                }]),
                pattern: None,
                example: None,
            },
            language: "zh-CN".into(),
        };

        assert_eq!(result, expect);
        Ok(())
    }

    #[test]
    fn deserialize_applies_defaults() -> anyhow::Result<()> {
        let result: Settings = indoc! {r#"
            git:
              repository: "https://git.example.com/org/game.git"
            asset_root: "Assets/"
            path_template: "{type}/{name}/"
            naming:
              pattern: '^(?P<type>[^_]+)_(?P<name>[^_]+)\.(?P<ext>\w+)$'
              example: "Character_Hero.fbx"
        "#}
        .parse()?;

        assert_eq!(result.workspace, WorkspaceLayout::Root("./".into()));
        assert_eq!(result.git.branch, "main");
        assert_eq!(result.git.commit_message, "Update: {name}");
        assert_eq!(result.git.user, GitUser::default());
        assert_eq!(result.git.push, PushMode::Batch);
        assert_eq!(result.language, "en");
        assert_eq!(
            result.naming_rules(),
            vec![RuleSpec {
                pattern: r"^(?P<type>[^_]+)_(?P<name>[^_]+)\.(?P<ext>\w+)$".into(),
                path_template: Some("{type}/{name}/".into()),
                example: Some("Character_Hero.fbx".into()),
            }]
        );
        Ok(())
    }

    #[test]
    fn rules_inherit_top_level_path_template() -> anyhow::Result<()> {
        let result: Settings = indoc! {r#"
            git:
              repository: "https://git.example.com/org/game.git"
            asset_root: "Assets/"
            path_template: "misc/"
            naming:
              rules:
                - pattern: '(?P<name>\w+)\.(?P<ext>fbx)'
                  path_template: "models/"
                - pattern: '(?P<name>\w+)\.(?P<ext>png)'
        "#}
        .parse()?;

        let templates = result
            .naming_rules()
            .into_iter()
            .map(|rule| rule.path_template.unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(templates, vec!["models/".to_string(), "misc/".to_string()]);
        Ok(())
    }

    #[test]
    fn validate_reports_missing_fields() {
        let missing_repo = indoc! {r#"
            asset_root: "Assets/"
            path_template: "{name}/"
            naming:
              pattern: '(?P<name>\w+)\.(?P<ext>\w+)'
        "#};
        assert!(matches!(
            missing_repo.parse::<Settings>(),
            Err(ConfigError::MissingField { field: "git.repository" })
        ));

        let missing_naming = indoc! {r#"
            git:
              repository: "https://git.example.com/org/game.git"
            asset_root: "Assets/"
            path_template: "{name}/"
        "#};
        assert!(matches!(
            missing_naming.parse::<Settings>(),
            Err(ConfigError::MissingField { field: "naming.rules or naming.pattern" })
        ));

        let missing_root = indoc! {r#"
            git:
              repository: "https://git.example.com/org/game.git"
            path_template: "{name}/"
            naming:
              pattern: '(?P<name>\w+)\.(?P<ext>\w+)'
        "#};
        assert!(matches!(
            missing_root.parse::<Settings>(),
            Err(ConfigError::MissingField { field: "asset_root" })
        ));

        let missing_template = indoc! {r#"
            git:
              repository: "https://git.example.com/org/game.git"
            asset_root: "Assets/"
            naming:
              pattern: '(?P<name>\w+)\.(?P<ext>\w+)'
        "#};
        assert!(matches!(
            missing_template.parse::<Settings>(),
            Err(ConfigError::MissingField { field: "path_template" })
        ));
    }

    #[test]
    fn validate_rejects_bad_commit_template() {
        let data = indoc! {r#"
            git:
              repository: "https://git.example.com/org/game.git"
              commit_message: "Update {name"
            asset_root: "Assets/"
            path_template: "{name}/"
            naming:
              pattern: '(?P<name>\w+)\.(?P<ext>\w+)'
        "#};
        assert!(matches!(
            data.parse::<Settings>(),
            Err(ConfigError::Template { field: "git.commit_message", .. })
        ));
    }

    #[test]
    fn invalid_yaml_is_config_error() {
        let result = "git: [unterminated".parse::<Settings>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn serialize_template_settings() -> anyhow::Result<()> {
        let settings = Settings::template("https://git.example.com/org/game.git", "Assets/GameRes/");
        let result = settings.to_string();

        assert!(result.contains("branch: main\n"));
        assert!(result.contains("push: batch\n"));
        assert!(!result.contains("token"));
        assert_eq!(result.parse::<Settings>()?, settings);
        Ok(())
    }

    #[test]
    fn load_resolves_workspace_next_to_config() -> anyhow::Result<()> {
        let sandbox = tempfile::tempdir()?;
        let file = sandbox.path().join("game.yaml");
        std::fs::write(
            &file,
            Settings::template("https://git.example.com/org/game.git", "Assets/").to_string(),
        )?;

        let config = Config::load(&file)?;
        let root = sandbox.path().canonicalize()?;
        assert_eq!(config.workspace.root, root);
        assert_eq!(config.workspace.inbox, root.join("inbox"));
        assert_eq!(config.workspace.repo, root.join(".repo"));
        assert_eq!(config.workspace.failed, root.join("failed"));
        Ok(())
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let result = Config::load("/definitely/not/here.yaml");
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[sealed_test(env = [("GIT_TOKEN", ""), ("GITHUB_TOKEN", "from-env")])]
    fn git_token_falls_back_to_environment() -> anyhow::Result<()> {
        let mut settings = Settings::template("https://git.example.com/org/game.git", "Assets/");
        assert_eq!(settings.git_token(), Some("from-env".into()));

        settings.git.token = Some("from-config".into());
        assert_eq!(settings.git_token(), Some("from-config".into()));
        Ok(())
    }
}
