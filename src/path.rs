// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the workspace directories live on the file system, and
//! keep path arithmetic lexical so that it can run before anything exists.
//!
//! # Workspace Layout
//!
//! A __workspace__ is the directory tree that one operator works in:
//!
//! - `inbox/` receives new files to hand off.
//! - `.repo/` is the local checkout of the target repository.
//! - `failed/` quarantines files that could not be handed off.
//!
//! All three hang off a workspace root, which defaults to the directory that
//! holds the configuration file. Only one operator may use a workspace at a
//! time; concurrent runs against the same checkout are not guarded against.

use ignore::WalkBuilder;
use std::{
    collections::HashSet,
    path::{Component, Path, PathBuf},
};
use tracing::debug;

/// Resolved workspace directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Workspace root.
    pub root: PathBuf,

    /// Drop directory for new files.
    pub inbox: PathBuf,

    /// Repository checkout.
    pub repo: PathBuf,

    /// Quarantine for files that failed.
    pub failed: PathBuf,
}

impl Workspace {
    /// Resolve workspace layout.
    ///
    /// Performs shell expansion on `root`. A relative root is taken relative
    /// to `base`, which should be the directory of the configuration file.
    /// Subdirectory names are joined onto the root.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::ShellExpansion`] if root cannot be expanded.
    /// - Return [`WorkspaceError::NotDistinct`] if two directories coincide.
    pub fn resolve(
        base: impl AsRef<Path>,
        root: &str,
        inbox: &str,
        repo: &str,
        failed: &str,
    ) -> Result<Self> {
        let expanded = shellexpand::full(root)?;
        let root = normalize(base.as_ref().join(expanded.as_ref()));
        let workspace = Self {
            inbox: normalize(root.join(inbox)),
            repo: normalize(root.join(repo)),
            failed: normalize(root.join(failed)),
            root,
        };

        // INVARIANT: Root, inbox, checkout, and quarantine never overlap.
        let mut seen = HashSet::new();
        for path in [
            &workspace.root,
            &workspace.inbox,
            &workspace.repo,
            &workspace.failed,
        ] {
            if !seen.insert(path) {
                return Err(WorkspaceError::NotDistinct { path: path.clone() });
            }
        }

        Ok(workspace)
    }

    /// Create inbox and quarantine directories if missing.
    ///
    /// The repository checkout is left alone, because cloning creates it.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::CreateDir`] if a directory cannot be made.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.inbox, &self.failed] {
            if let Some(created) = mkdirp::mkdirp(dir).map_err(|err| WorkspaceError::CreateDir {
                source: err,
                path: dir.clone(),
            })? {
                debug!("created workspace directory {:?}", created.display());
            }
        }

        Ok(())
    }

    /// List files waiting in the inbox.
    ///
    /// Only regular files directly inside the inbox count. Hidden files are
    /// skipped. Result is sorted by filename.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::ReadInbox`] if the inbox cannot be walked.
    pub fn list_inbox(&self) -> Result<Vec<PathBuf>> {
        if !self.inbox.is_dir() {
            return Ok(Vec::new());
        }

        let walker = WalkBuilder::new(&self.inbox)
            .standard_filters(false)
            .hidden(true)
            .max_depth(Some(1))
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| WorkspaceError::ReadInbox {
                source: err,
                path: self.inbox.clone(),
            })?;
            if entry.depth() == 1 && entry.file_type().is_some_and(|kind| kind.is_file()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }
}

/// Normalize path lexically.
///
/// Removes `.` components and folds `..` into their parent without touching
/// the file system. A `..` that would climb above the root is dropped.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// Workspace error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Workspace root contains a variable that cannot be expanded.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Two workspace directories resolve to the same path.
    #[error("workspace directories must be distinct, {:?} is used twice", path.display())]
    NotDistinct { path: PathBuf },

    /// Workspace directory cannot be created.
    #[error("failed to create workspace directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Inbox cannot be listed.
    #[error("failed to read inbox at {:?}", path.display())]
    ReadInbox {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
