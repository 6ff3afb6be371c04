// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control gateway.
//!
//! Every interaction with the repository checkout goes through
//! [`VcsGateway`]. The default implementation, [`GitRepo`], shells out to the
//! Git binary for anything that mutates the checkout or talks to the remote,
//! and reads local state (HEAD, index, tracked tree) through libgit2.
//!
//! # Credentials
//!
//! When an access token is configured it is embedded into the remote URL as
//! the user component, for HTTPS remotes only. Other schemes are left
//! untouched. While a token is in use, Git is told never to prompt on the
//! terminal, so a bad token fails fast instead of hanging the batch.
//!
//! # Blocking
//!
//! Every call blocks until the Git process exits. There is no timeout.

use git2::{ErrorCode, ObjectType, Repository};
use std::{
    collections::VecDeque,
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Operations the handoff needs from a repository checkout.
pub trait VcsGateway {
    /// Root of the checkout.
    fn root(&self) -> &Path;

    /// Check that the checkout exists.
    fn exists(&self) -> bool;

    /// Check that `branch` exists at `url` without creating local state.
    fn verify_remote(&self, url: &str, branch: &str) -> bool;

    /// Clone single branch of `url` into the checkout root.
    fn clone_repo(&self, url: &str, branch: &str, user_name: &str, user_email: &str)
        -> Result<()>;

    /// Pull latest changes from remote.
    fn pull(&self) -> Result<()>;

    /// Stage path inside checkout.
    fn add(&self, path: &Path) -> Result<()>;

    /// Commit staged changes.
    ///
    /// Returns `false` if there was nothing to commit.
    fn commit(&self, message: &str) -> Result<bool>;

    /// Push commits to remote, optionally to a specific branch.
    fn push(&self, branch: Option<&str>) -> Result<()>;

    /// Remove path from index and working tree.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Commit id of HEAD, or `None` for an unborn branch.
    fn head(&self) -> Result<Option<String>>;

    /// Move HEAD and index back to `revision`, keeping the working tree.
    fn reset_to(&self, revision: &str) -> Result<()>;

    /// Drop staged changes of path.
    fn unstage(&self, path: &Path) -> Result<()>;

    /// Restore path in working tree from the index.
    fn restore(&self, path: &Path) -> Result<()>;

    /// Check if path is in the index.
    fn is_tracked(&self, path: &Path) -> bool;

    /// List files tracked at HEAD, relative to the checkout root.
    fn tracked_files(&self) -> Result<Vec<PathBuf>>;
}

/// Repository checkout driven through the Git binary.
#[derive(Debug)]
pub struct GitRepo {
    root: PathBuf,
    token: Option<String>,
}

impl GitRepo {
    /// Construct new gateway for checkout at `root`.
    pub fn new(root: impl Into<PathBuf>, token: Option<String>) -> Self {
        Self {
            root: root.into(),
            token: token.filter(|token| !token.is_empty()),
        }
    }

    fn relative<'a>(&self, path: &'a Path) -> Result<&'a Path> {
        path.strip_prefix(&self.root)
            .map_err(|_| GitError::FileNotInRepo {
                path: path.to_path_buf(),
            })
    }

    fn open(&self) -> Result<Repository> {
        Ok(Repository::open(&self.root)?)
    }

    fn envs(&self) -> Vec<(&'static str, &'static str)> {
        // INVARIANT: Always run Git with untranslated messages, we match on them.
        let mut envs = vec![("LC_ALL", "C")];
        if self.token.is_some() {
            envs.push(("GIT_TERMINAL_PROMPT", "0"));
            envs.push(("GCM_INTERACTIVE", "never"));
        }
        envs
    }

    fn gitcall(&self, args: &[&OsStr]) -> std::io::Result<String> {
        syscall_non_interactive("git", args, Some(&self.root), &self.envs())
    }

    fn gitcall_detached(&self, args: &[&OsStr]) -> std::io::Result<String> {
        syscall_non_interactive("git", args, None, &self.envs())
    }

    // Thank you Eric at https://www.hydrogen18.com/blog/list-all-files-git-repo-pygit2.html.
    fn list_file_paths(&self, repository: &Repository) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let commit = match repository.head() {
            Ok(head) => head.peel_to_commit()?,
            Err(err) if is_unborn(&err) => return Ok(entries),
            Err(err) => return Err(err.into()),
        };
        let tree = commit.tree()?;
        let mut trees_and_paths = VecDeque::new();
        trees_and_paths.push_front((tree, PathBuf::new()));

        // Use DFS to traverse index tree.
        while let Some((tree, path)) = trees_and_paths.pop_front() {
            for tree_entry in &tree {
                match tree_entry.kind() {
                    // INVARIANT: Hit a tree? Traverse it!
                    Some(ObjectType::Tree) => {
                        let next_tree = repository.find_tree(tree_entry.id())?;
                        let next_path = path.join(bytes_to_path(tree_entry.name_bytes()));
                        trees_and_paths.push_front((next_tree, next_path));
                    }
                    // INVARIANT: Hit a blob? Record our current path!
                    Some(ObjectType::Blob) => {
                        let full_path = path.join(bytes_to_path(tree_entry.name_bytes()));
                        entries.push(full_path);
                    }
                    _ => continue,
                }
            }
        }

        entries.sort();
        Ok(entries)
    }
}

impl VcsGateway for GitRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self) -> bool {
        self.root.join(".git").exists()
    }

    #[instrument(skip(self, url), level = "debug")]
    fn verify_remote(&self, url: &str, branch: &str) -> bool {
        let remote = inject_token(url, self.token.as_deref());
        let args = [
            OsStr::new("ls-remote"),
            OsStr::new("--exit-code"),
            OsStr::new("--heads"),
            OsStr::new(&remote),
            OsStr::new(branch),
        ];
        match self.gitcall_detached(&args) {
            Ok(_) => true,
            Err(err) => {
                warn!("remote {} unreachable: {err}", redact(url));
                false
            }
        }
    }

    #[instrument(skip(self, url, user_name, user_email), level = "debug")]
    fn clone_repo(
        &self,
        url: &str,
        branch: &str,
        user_name: &str,
        user_email: &str,
    ) -> Result<()> {
        if self.exists() {
            return Err(GitError::RepoExists {
                path: self.root.clone(),
            });
        }

        info!("clone {} into {:?}", redact(url), self.root.display());
        if let Some(parent) = self.root.parent() {
            mkdirp::mkdirp(parent).map_err(|err| GitError::CloneFailed {
                message: err.to_string(),
            })?;
        }

        let remote = inject_token(url, self.token.as_deref());
        let mut args = vec![
            OsStr::new("clone"),
            OsStr::new("-b"),
            OsStr::new(branch),
            OsStr::new("--single-branch"),
        ];
        if self.token.is_some() {
            args.extend([OsStr::new("-c"), OsStr::new("credential.helper=")]);
        }
        args.extend([OsStr::new(&remote), self.root.as_os_str()]);
        self.gitcall_detached(&args)
            .map_err(|err| GitError::CloneFailed {
                message: redact_message(&err.to_string(), self.token.as_deref()),
            })?;

        if self.token.is_some() {
            self.gitcall(&[
                OsStr::new("config"),
                OsStr::new("credential.helper"),
                OsStr::new(""),
            ])
            .map_err(|err| GitError::CloneFailed {
                message: err.to_string(),
            })?;
        }

        for (key, value) in [("user.name", user_name), ("user.email", user_email)] {
            if let Err(err) =
                self.gitcall(&[OsStr::new("config"), OsStr::new(key), OsStr::new(value)])
            {
                warn!("failed to set {key} in checkout: {err}");
            }
        }

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn pull(&self) -> Result<()> {
        debug!("pull into {:?}", self.root.display());
        let args = [
            OsStr::new("pull"),
            OsStr::new("--no-rebase"),
            OsStr::new("--no-edit"),
        ];
        if let Err(err) = self.gitcall(&args) {
            // INVARIANT: Never leave a half-finished merge behind.
            let _ = self.gitcall(&[OsStr::new("merge"), OsStr::new("--abort")]);
            return Err(GitError::PullFailed {
                message: redact_message(&err.to_string(), self.token.as_deref()),
            });
        }

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn add(&self, path: &Path) -> Result<()> {
        let relative = self.relative(path)?;
        self.gitcall(&[OsStr::new("add"), OsStr::new("--"), relative.as_os_str()])
            .map_err(|err| GitError::AddFailed {
                message: err.to_string(),
            })?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn commit(&self, message: &str) -> Result<bool> {
        match self.gitcall(&[OsStr::new("commit"), OsStr::new("-m"), OsStr::new(message)]) {
            Ok(_) => {
                info!("commit {message:?}");
                Ok(true)
            }
            Err(err) if is_nothing_to_commit(&err.to_string()) => {
                debug!("nothing to commit for {message:?}");
                Ok(false)
            }
            Err(err) => Err(GitError::CommitFailed {
                message: err.to_string(),
            }),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn push(&self, branch: Option<&str>) -> Result<()> {
        let mut args = vec![OsStr::new("push")];
        if let Some(branch) = branch {
            args.extend([OsStr::new("origin"), OsStr::new(branch)]);
        }
        self.gitcall(&args).map_err(|err| GitError::PushFailed {
            message: redact_message(&err.to_string(), self.token.as_deref()),
        })?;
        info!("pushed to remote");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn remove(&self, path: &Path) -> Result<()> {
        let relative = self.relative(path)?;
        self.gitcall(&[
            OsStr::new("rm"),
            OsStr::new("-q"),
            OsStr::new("--"),
            relative.as_os_str(),
        ])
        .map_err(|err| GitError::RemoveFailed {
            message: err.to_string(),
        })?;

        Ok(())
    }

    fn head(&self) -> Result<Option<String>> {
        let repository = self.open()?;
        let head = match repository.head() {
            Ok(head) => head.target().map(|oid| oid.to_string()),
            Err(err) if is_unborn(&err) => None,
            Err(err) => return Err(err.into()),
        };

        Ok(head)
    }

    #[instrument(skip(self), level = "debug")]
    fn reset_to(&self, revision: &str) -> Result<()> {
        self.gitcall(&[
            OsStr::new("reset"),
            OsStr::new("-q"),
            OsStr::new("--mixed"),
            OsStr::new(revision),
        ])
        .map_err(|err| GitError::ResetFailed {
            message: err.to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn unstage(&self, path: &Path) -> Result<()> {
        let relative = self.relative(path)?;
        let args = if self.head()?.is_some() {
            [
                OsStr::new("reset"),
                OsStr::new("-q"),
                OsStr::new("--"),
                relative.as_os_str(),
            ]
        } else {
            [
                OsStr::new("rm"),
                OsStr::new("--cached"),
                OsStr::new("-q"),
                relative.as_os_str(),
            ]
        };
        self.gitcall(&args).map_err(|err| GitError::ResetFailed {
            message: err.to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn restore(&self, path: &Path) -> Result<()> {
        let relative = self.relative(path)?;
        self.gitcall(&[OsStr::new("checkout"), OsStr::new("--"), relative.as_os_str()])
            .map_err(|err| GitError::ResetFailed {
                message: err.to_string(),
            })?;

        Ok(())
    }

    fn is_tracked(&self, path: &Path) -> bool {
        let Ok(relative) = self.relative(path) else {
            return false;
        };

        Repository::open(&self.root)
            .and_then(|repository| repository.index())
            .map(|index| index.get_path(relative, 0).is_some())
            .unwrap_or(false)
    }

    fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        let repository = self.open()?;
        self.list_file_paths(&repository)
    }
}

/// Embed access token into an HTTPS remote URL.
///
/// Returns `url` unchanged if there is no token, the URL cannot be parsed,
/// or the scheme is anything other than `https`.
pub fn inject_token(url: &str, token: Option<&str>) -> String {
    let Some(token) = token.filter(|token| !token.is_empty()) else {
        return url.into();
    };

    match Url::parse(url) {
        Ok(mut parsed) if parsed.scheme() == "https" => {
            if parsed.set_username(token).is_err() {
                return url.into();
            }
            parsed.into()
        }
        _ => url.into(),
    }
}

/// Hide credentials in a URL before it is logged or shown.
pub fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("***");
            let _ = parsed.set_password(None);
            parsed.into()
        }
        _ => url.into(),
    }
}

fn redact_message(message: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => message.replace(token, "***"),
        None => message.into(),
    }
}

fn is_nothing_to_commit(message: &str) -> bool {
    message.contains("nothing to commit") || message.contains("nothing added to commit")
}

fn is_unborn(err: &git2::Error) -> bool {
    matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound)
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: Option<&Path>,
    envs: &[(&str, &str)],
) -> std::io::Result<String> {
    let mut command = Command::new(cmd.as_ref());
    command.args(args).envs(envs.iter().copied());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = command.output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        )));
    }

    Ok(message)
}

// Thanks from:
//
// https://github.com/rust-lang/git2-rs/blob/5bc3baa9694a94db2ca9cc256b5bce8a215f9013/
// src/util.rs#L85
#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> &Path {
    use std::os::unix::prelude::*;
    Path::new(OsStr::from_bytes(bytes))
}
#[cfg(windows)]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// Checkout already exists where a clone was requested.
    #[error("repository already exists at {:?}", path.display())]
    RepoExists { path: PathBuf },

    /// Path lies outside of the checkout.
    #[error("file {:?} is not inside the repository", path.display())]
    FileNotInRepo { path: PathBuf },

    #[error("git clone failed: {message}")]
    CloneFailed { message: String },

    #[error("git pull failed: {message}")]
    PullFailed { message: String },

    #[error("git add failed: {message}")]
    AddFailed { message: String },

    #[error("git commit failed: {message}")]
    CommitFailed { message: String },

    #[error("git push failed: {message}")]
    PushFailed { message: String },

    #[error("git rm failed: {message}")]
    RemoveFailed { message: String },

    #[error("git reset failed: {message}")]
    ResetFailed { message: String },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = GitError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("https://git.example.com/org/game.git", Some("t0k"), "https://t0k@git.example.com/org/game.git"; "https gets token")]
    #[test_case("https://git.example.com/org/game.git", None, "https://git.example.com/org/game.git"; "no token")]
    #[test_case("https://git.example.com/org/game.git", Some(""), "https://git.example.com/org/game.git"; "empty token")]
    #[test_case("http://git.example.com/org/game.git", Some("t0k"), "http://git.example.com/org/game.git"; "plain http untouched")]
    #[test_case("ssh://git@git.example.com/org/game.git", Some("t0k"), "ssh://git@git.example.com/org/game.git"; "ssh untouched")]
    #[test_case("git@git.example.com:org/game.git", Some("t0k"), "git@git.example.com:org/game.git"; "scp form untouched")]
    #[test_case("/srv/git/game.git", Some("t0k"), "/srv/git/game.git"; "local path untouched")]
    #[test]
    fn inject_token_only_into_https(url: &str, token: Option<&str>, expect: &str) {
        pretty_assertions::assert_eq!(inject_token(url, token), expect);
    }

    #[test]
    fn redact_hides_credentials() {
        pretty_assertions::assert_eq!(
            redact("https://t0k@git.example.com/org/game.git"),
            "https://***@git.example.com/org/game.git"
        );
        pretty_assertions::assert_eq!(
            redact("https://git.example.com/org/game.git"),
            "https://git.example.com/org/game.git"
        );
    }

    #[test]
    fn nothing_to_commit_is_recognized() {
        assert!(is_nothing_to_commit(
            "command \"git\" failed:\nstdout: On branch main\nnothing to commit, working tree clean"
        ));
        assert!(is_nothing_to_commit(
            "stdout: nothing added to commit but untracked files present"
        ));
        assert!(!is_nothing_to_commit("stderr: fatal: not a git repository"));
    }

    #[test]
    fn paths_outside_checkout_are_rejected() {
        let repo = GitRepo::new("/work/.repo", None);
        let result = repo.add(Path::new("/work/inbox/Character_Hero.fbx"));
        assert!(matches!(result, Err(GitError::FileNotInRepo { .. })));

        let result = repo.remove(Path::new("/elsewhere/Hero.fbx"));
        assert!(matches!(result, Err(GitError::FileNotInRepo { .. })));
        assert!(!repo.is_tracked(Path::new("/elsewhere/Hero.fbx")));
    }

    #[test]
    fn missing_checkout_does_not_exist() -> anyhow::Result<()> {
        let sandbox = tempfile::tempdir()?;
        let repo = GitRepo::new(sandbox.path().join(".repo"), Some("t0k".into()));
        assert!(!repo.exists());
        Ok(())
    }
}
