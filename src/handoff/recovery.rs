// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Recovery after a failed sync.
//!
//! Once a file sits in the checkout, any failure to stage, commit, or push
//! it is cleaned up in two steps. First the Git side effects of this run are
//! undone: a created commit is reset, or a staged path is unstaged. Then the
//! file itself goes back to its inbox path, or to quarantine if that path is
//! gone or taken. A tracked file that was overridden is restored last.
//!
//! Recovery never fails. Each step that goes wrong is recorded as a
//! [`RecoveryError`] warning on the result. If the Git side effects cannot be
//! undone the file stays where it is, because the checkout still refers to
//! it there.

use super::{Disposition, Handoff, SyncProgress};
use crate::{naming::ParseFilename, resolve::ResolvePath, vcs::{GitError, VcsGateway}};

use chrono::Local;
use std::{
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

impl<V, P, R> Handoff<V, P, R>
where
    V: VcsGateway,
    P: ParseFilename,
    R: ResolvePath,
{
    pub(super) fn recover(
        &self,
        source: &Path,
        target: &Path,
        tracked: bool,
        progress: &SyncProgress,
        warnings: &mut Vec<RecoveryError>,
    ) -> Disposition {
        let stranded = Disposition::RecoveryFailed(target.to_path_buf());

        let undo = if progress.committed {
            match &progress.head {
                Some(Some(head)) => self
                    .vcs
                    .reset_to(head)
                    .map_err(|error| RecoveryError::Reset { source: error }),
                _ => Err(RecoveryError::NoBaseline),
            }
        } else if progress.staged {
            self.vcs
                .unstage(target)
                .map_err(|error| RecoveryError::Unstage { source: error })
        } else {
            Ok(())
        };
        if let Err(error) = undo {
            warn!("{error}, leaving {:?} in checkout", target.display());
            warnings.push(error);
            return stranded;
        }

        let inbox_free = parent_dir(source).is_some_and(Path::is_dir) && !source.exists();
        let disposition = if inbox_free {
            match move_file(target, source) {
                Ok(()) => {
                    info!("moved {:?} back to inbox", source.display());
                    Disposition::MovedBack
                }
                Err(error) => {
                    let error = RecoveryError::MoveBack {
                        path: source.to_path_buf(),
                        source: error,
                    };
                    warn!("{error}");
                    warnings.push(error);
                    self.quarantine_or(target, source, stranded.clone(), warnings)
                }
            }
        } else {
            self.quarantine_or(target, source, stranded.clone(), warnings)
        };

        if tracked && disposition != stranded {
            if let Err(error) = self.vcs.restore(target) {
                let error = RecoveryError::Restore {
                    path: target.to_path_buf(),
                    source: error,
                };
                warn!("{error}");
                warnings.push(error);
            }
        }

        disposition
    }

    /// Quarantine file at `current` under the name of `original`.
    pub(super) fn quarantine_or(
        &self,
        current: &Path,
        original: &Path,
        fallback: Disposition,
        warnings: &mut Vec<RecoveryError>,
    ) -> Disposition {
        let name = original
            .file_name()
            .or_else(|| current.file_name())
            .unwrap_or_else(|| OsStr::new("unnamed"));

        match quarantine(current, name, &self.workspace.failed) {
            Ok(destination) => {
                info!("quarantined {:?} at {:?}", current.display(), destination.display());
                Disposition::Quarantined(destination)
            }
            Err(error) => {
                let error = RecoveryError::Quarantine {
                    path: current.to_path_buf(),
                    source: error,
                };
                warn!("{error}");
                warnings.push(error);
                fallback
            }
        }
    }
}

/// Directory holding `path`, where a bare file name lives in `.`.
pub(crate) fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().map(|parent| {
        if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        }
    })
}

/// Move file, creating parent directories of destination.
///
/// Tries a rename first. Renames across file systems fail, so the fallback
/// copies into a temporary sibling of the destination, renames that into
/// place, and only then deletes the original.
pub(crate) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        mkdirp::mkdirp(parent)?;
    }

    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    let name = to.file_name().unwrap_or_else(|| OsStr::new("file"));
    let staging = to.with_file_name(format!(".{}.handoff", name.to_string_lossy()));
    if let Err(error) = fs::copy(from, &staging).and_then(|_| fs::rename(&staging, to)) {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }

    fs::remove_file(from)
}

/// Move file into quarantine directory under `name`.
///
/// Name collisions get a local timestamp appended to the stem, e.g.,
/// `Hero_20250101_120000.fbx`, plus a counter if that is taken as well.
pub(crate) fn quarantine(file: &Path, name: &OsStr, failed: &Path) -> io::Result<PathBuf> {
    mkdirp::mkdirp(failed)?;

    let mut destination = failed.join(name);
    if destination.exists() {
        let name = Path::new(name);
        let stem = name
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = name
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        destination = failed.join(format!("{stem}_{stamp}{ext}"));
        let mut counter = 1;
        while destination.exists() {
            destination = failed.join(format!("{stem}_{stamp}_{counter}{ext}"));
            counter += 1;
        }
    }

    move_file(file, &destination)?;
    Ok(destination)
}

/// Problems met while recovering from a failed sync.
///
/// These are warnings. The file's final location is always reported through
/// its [`Disposition`].
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// Commit was created on an unborn branch, there is nothing to reset to.
    #[error("cannot undo first commit of repository")]
    NoBaseline,

    #[error("failed to undo commit: {source}")]
    Reset { source: GitError },

    #[error("failed to unstage file: {source}")]
    Unstage { source: GitError },

    #[error("failed to restore {:?}: {source}", path.display())]
    Restore { path: PathBuf, source: GitError },

    #[error("failed to move file back to {:?}: {source}", path.display())]
    MoveBack { path: PathBuf, source: io::Error },

    #[error("failed to quarantine {:?}: {source}", path.display())]
    Quarantine { path: PathBuf, source: io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn move_file_creates_parents_and_overrides() -> anyhow::Result<()> {
        let sandbox = tempfile::tempdir()?;
        let from = sandbox.path().join("Character_Hero.fbx");
        let to = sandbox.path().join("repo/Character/Hero.fbx");
        fs::write(&from, "new")?;

        move_file(&from, &to)?;
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to)?, "new");

        fs::write(&from, "newer")?;
        move_file(&from, &to)?;
        assert_eq!(fs::read_to_string(&to)?, "newer");
        Ok(())
    }

    #[test]
    fn move_file_reports_missing_source() -> anyhow::Result<()> {
        let sandbox = tempfile::tempdir()?;
        let to = sandbox.path().join("Hero.fbx");
        fs::write(&to, "kept")?;

        let result = move_file(&sandbox.path().join("missing.fbx"), &to);
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&to)?, "kept");
        Ok(())
    }

    #[test]
    fn quarantine_appends_timestamp_on_collision() -> anyhow::Result<()> {
        let sandbox = tempfile::tempdir()?;
        let failed = sandbox.path().join("failed");
        let mut stored = Vec::new();
        for round in 0..3 {
            let file = sandbox.path().join("InvalidName.fbx");
            fs::write(&file, format!("round {round}"))?;
            stored.push(quarantine(&file, OsStr::new("InvalidName.fbx"), &failed)?);
            assert!(!file.exists());
        }

        assert_eq!(stored[0], failed.join("InvalidName.fbx"));
        for path in &stored[1..] {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("InvalidName_"), "{name}");
            assert!(name.ends_with(".fbx"), "{name}");
        }
        assert_ne!(stored[1], stored[2]);
        for (round, path) in stored.iter().enumerate() {
            assert_eq!(fs::read_to_string(path)?, format!("round {round}"));
        }
        Ok(())
    }

    #[test]
    fn parent_dir_of_bare_name_is_current_dir() {
        assert_eq!(parent_dir(Path::new("Hero.fbx")), Some(Path::new(".")));
        assert_eq!(parent_dir(Path::new("inbox/Hero.fbx")), Some(Path::new("inbox")));
        assert_eq!(parent_dir(Path::new("/")), None);
    }
}
