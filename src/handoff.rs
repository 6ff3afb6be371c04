// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Handoff orchestration.
//!
//! Drive dropped files from the inbox into the repository checkout. Each file
//! walks through the same steps: check the checkout, parse the filename,
//! resolve the destination, render the commit message, move the file, then
//! stage and commit it. Parse and resolve failures send the file straight to
//! quarantine without it ever entering the checkout. Failures after the move
//! trigger recovery, see [`RecoveryError`].
//!
//! # Push Modes
//!
//! With [`PushMode::Batch`] the checkout is pulled once before a batch and
//! pushed once after it. A failed push is reported once, and every commit of
//! the batch stays in the local checkout for a later retry. With
//! [`PushMode::PerFile`] every file gets its own pull, commit, and push, and
//! any failure along the way is undone for that file alone.
//!
//! # Concurrency
//!
//! Files are handled one at a time in the order given. Two runs against the
//! same workspace at once may corrupt the checkout.

mod recovery;

pub use recovery::RecoveryError;

use crate::{
    config::{Config, ConfigError, PushMode, Settings},
    naming::{ParseError, ParseFilename, RuleSet},
    path::Workspace,
    resolve::{ResolveError, ResolvePath, ResolvedTarget, TemplateResolver},
    template::{Template, TemplateError},
    vcs::{GitError, GitRepo, VcsGateway},
};

use glob::{MatchOptions, Pattern, PatternError};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Handoff behaviour that comes from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffOptions {
    /// Commit message template, filled from captured fields.
    pub commit_template: Template,

    /// When to push.
    pub push: PushMode,

    /// Branch to push to.
    pub branch: String,
}

impl HandoffOptions {
    /// Extract handoff options from settings.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Template`] if commit template is invalid.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            commit_template: settings.commit_template()?,
            push: settings.git.push,
            branch: settings.git.branch.clone(),
        })
    }
}

/// Handoff orchestrator.
///
/// Owns everything needed to move files from the inbox into the checkout.
/// The version control gateway, filename parser, and path resolver are
/// pluggable so that tests can swap in doubles.
#[derive(Debug)]
pub struct Handoff<V = GitRepo, P = RuleSet, R = TemplateResolver>
where
    V: VcsGateway,
    P: ParseFilename,
    R: ResolvePath,
{
    vcs: V,
    parser: P,
    resolver: R,
    workspace: Workspace,
    options: HandoffOptions,
}

impl Handoff {
    /// Construct orchestrator from loaded configuration.
    ///
    /// # Errors
    ///
    /// - Return [`HandoffError::Parse`] if a naming rule fails to compile.
    /// - Return [`HandoffError::Config`] if commit template is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = &config.settings;
        let vcs = GitRepo::new(&config.workspace.repo, settings.git_token());
        let parser = RuleSet::compile(&settings.naming_rules())?;
        let resolver = TemplateResolver::new(
            settings.path_template(),
            settings.asset_root(),
            &config.workspace.repo,
        );
        let options = HandoffOptions::from_settings(settings)?;

        Ok(Self::new(
            vcs,
            parser,
            resolver,
            config.workspace.clone(),
            options,
        ))
    }
}

impl<V, P, R> Handoff<V, P, R>
where
    V: VcsGateway,
    P: ParseFilename,
    R: ResolvePath,
{
    /// Construct new orchestrator from its parts.
    pub fn new(vcs: V, parser: P, resolver: R, workspace: Workspace, options: HandoffOptions) -> Self {
        Self {
            vcs,
            parser,
            resolver,
            workspace,
            options,
        }
    }

    /// Version control gateway of checkout.
    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Path relative to checkout root, or path itself if outside.
    pub fn repo_relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(self.vcs.root()).unwrap_or(path)
    }

    /// Pull latest changes into checkout.
    ///
    /// # Errors
    ///
    /// - Return [`GitError::PullFailed`] if pull fails.
    pub fn pull(&self) -> Result<(), GitError> {
        self.vcs.pull()
    }

    /// Push local commits of checkout.
    ///
    /// # Errors
    ///
    /// - Return [`GitError::PushFailed`] if push fails.
    pub fn push(&self) -> Result<(), GitError> {
        self.vcs.push(Some(&self.options.branch))
    }

    /// Predict where a file would go without touching anything.
    ///
    /// # Errors
    ///
    /// - Return [`HandoffError::Parse`] if no naming rule matches.
    /// - Return [`HandoffError::Process`] if destination cannot be resolved.
    pub fn preview(&self, file: &Path) -> Result<ResolvedTarget> {
        let filename = filename_of(file)?;
        let parsed = self.parser.parse(filename).into_result(filename)?;
        let target = self.resolver.resolve(&parsed).map_err(ProcessError::from)?;

        Ok(ResolvedTarget::probe(target))
    }

    /// Hand off one file.
    ///
    /// Never fails as a whole. Every outcome, including recovery after a
    /// failed sync, is reported through the returned [`ProcessResult`].
    #[instrument(skip(self), level = "debug")]
    pub fn process_file(&self, file: &Path) -> ProcessResult {
        let result = ProcessResult::new(file);

        if !self.vcs.exists() {
            return result.fail(
                ProcessError::RepoNotExists {
                    path: self.vcs.root().to_path_buf(),
                },
                Disposition::Untouched,
            );
        }

        if !file.is_file() {
            return result.fail(
                ProcessError::MissingFile {
                    path: file.to_path_buf(),
                },
                Disposition::Untouched,
            );
        }

        let plan = match self.plan(file) {
            Ok(plan) => plan,
            Err(error) => {
                warn!("cannot hand off {:?}: {error}", file.display());
                let mut result = result;
                let disposition =
                    self.quarantine_or(file, file, Disposition::Untouched, &mut result.warnings);
                return result.fail(error, disposition);
            }
        };

        let target = plan.target.absolute_path.clone();
        let mut result = result.with_target(&target);
        if plan.target.is_override {
            info!("{:?} overrides existing file", self.repo_relative(&target).display());
        }

        // INVARIANT: Only a tracked file that gets overridden needs restoring.
        let tracked = plan.target.is_override && self.vcs.is_tracked(&target);
        if let Err(error) = recovery::move_file(file, &target) {
            return result.fail(
                ProcessError::Move {
                    from: file.to_path_buf(),
                    to: target,
                    source: error,
                },
                Disposition::Untouched,
            );
        }
        debug!("moved {:?} to {:?}", file.display(), target.display());

        let mut progress = SyncProgress::default();
        match self.sync(&target, &plan.message, &mut progress) {
            Ok(()) => {
                info!("handed off {:?}", self.repo_relative(&target).display());
                result.success = true;
                result.disposition = if progress.committed {
                    Disposition::Committed
                } else {
                    Disposition::Unchanged
                };
                result
            }
            Err(error) => {
                warn!("sync of {:?} failed: {error}", file.display());
                let disposition =
                    self.recover(file, &target, tracked, &progress, &mut result.warnings);
                result.fail(error, disposition)
            }
        }
    }

    /// Hand off files in order.
    ///
    /// Every file gets exactly one result, one failure never stops the
    /// batch. In batch push mode the checkout is pulled before the first
    /// file, and pushed after the last one if anything was committed.
    ///
    /// # Errors
    ///
    /// - Return [`GitError::PullFailed`] if the initial pull fails, before
    ///   any file is touched.
    pub fn process_batch(&self, files: &[PathBuf], bar: &ProgressBar) -> Result<BatchReport, GitError> {
        if self.options.push == PushMode::Batch && self.vcs.exists() {
            self.vcs.pull()?;
        }

        Ok(self.process_pulled(files, bar))
    }

    /// Hand off files in order into a checkout the caller just pulled.
    ///
    /// Same as [`Handoff::process_batch`] without the initial pull.
    #[instrument(skip(self, files, bar), level = "debug")]
    pub fn process_pulled(&self, files: &[PathBuf], bar: &ProgressBar) -> BatchReport {
        let batched = self.options.push == PushMode::Batch;
        let mut report = BatchReport::default();
        for file in files {
            bar.set_message(
                file.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            let result = self.process_file(file);
            bar.inc(1);
            report.results.push(result);
        }

        let committed = report
            .results
            .iter()
            .any(|result| result.disposition == Disposition::Committed);
        if batched && committed {
            if let Err(error) = self.push() {
                warn!("push after batch failed, commits are kept locally: {error}");
                report.push_error = Some(error);
            }
        }

        report
    }

    /// Find tracked files of checkout matching a glob pattern.
    ///
    /// Patterns match against file names and trailing parts of the path
    /// relative to the checkout, so `Hero_*.fbx` finds the file at any depth
    /// and `Character/*.fbx` finds it in any `Character` directory. Returned
    /// paths are absolute.
    ///
    /// # Errors
    ///
    /// - Return [`ProcessError::InvalidPattern`] for bad glob syntax.
    /// - Return [`HandoffError::Git`] if tracked files cannot be listed.
    pub fn find_tracked(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let glob = Pattern::new(pattern).map_err(|error| ProcessError::InvalidPattern {
            pattern: pattern.into(),
            source: error,
        })?;
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::default()
        };

        let matches = self
            .vcs
            .tracked_files()?
            .into_iter()
            .filter(|path| {
                let components = path.components().collect::<Vec<_>>();
                (0..components.len()).any(|start| {
                    let tail = components[start..].iter().collect::<PathBuf>();
                    glob.matches_path_with(&tail, options)
                })
            })
            .map(|path| self.vcs.root().join(path))
            .collect();

        Ok(matches)
    }

    /// Remove files from checkout, commit, and push.
    ///
    /// If removal fails partway, files already removed are restored.
    ///
    /// # Errors
    ///
    /// - Return [`HandoffError::Git`] if removal, commit, or push fails.
    #[instrument(skip(self, files), level = "debug")]
    pub fn delete(&self, pattern: &str, files: &[PathBuf]) -> Result<usize> {
        let mut removed = Vec::new();
        for file in files {
            if let Err(error) = self.vcs.remove(file) {
                self.undo_removals(&removed);
                return Err(error.into());
            }
            removed.push(file.as_path());
        }

        let message = format!("Delete: {pattern}");
        if let Err(error) = self.vcs.commit(&message) {
            self.undo_removals(&removed);
            return Err(error.into());
        }
        self.push()?;
        info!("deleted {} file(s) matching {pattern:?}", removed.len());

        Ok(removed.len())
    }

    fn undo_removals(&self, removed: &[&Path]) {
        for path in removed {
            if let Err(error) = self.vcs.unstage(path).and_then(|_| self.vcs.restore(path)) {
                warn!("failed to restore {:?}: {error}", path.display());
            }
        }
    }

    fn plan(&self, file: &Path) -> Result<Plan> {
        let filename = filename_of(file)?;
        let parsed = self.parser.parse(filename).into_result(filename)?;
        let target = self.resolver.resolve(&parsed).map_err(ProcessError::from)?;
        let message = self
            .options
            .commit_template
            .render(|name| parsed.field(name))
            .map_err(ProcessError::CommitMessage)?;

        Ok(Plan {
            target: ResolvedTarget::probe(target),
            message,
        })
    }

    fn sync(&self, target: &Path, message: &str, progress: &mut SyncProgress) -> Result<(), GitError> {
        let per_file = self.options.push == PushMode::PerFile;
        if per_file {
            self.vcs.pull()?;
        }

        progress.head = Some(self.vcs.head()?);
        self.vcs.add(target)?;
        progress.staged = true;
        progress.committed = self.vcs.commit(message)?;

        if per_file && progress.committed {
            self.push()?;
        }

        Ok(())
    }
}

/// What happened to a file once processing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// File is in the checkout and committed.
    Committed,

    /// File is in the checkout, but it matched what was already there.
    Unchanged,

    /// File was never moved.
    Untouched,

    /// File was moved to quarantine at the given path.
    Quarantined(PathBuf),

    /// File was moved from the checkout back to its inbox path.
    MovedBack,

    /// Recovery failed, file was left at the given path.
    RecoveryFailed(PathBuf),
}

/// Outcome of processing one file.
#[derive(Debug)]
pub struct ProcessResult {
    /// File was handed off.
    pub success: bool,

    /// Inbox path of file.
    pub source: PathBuf,

    /// Resolved destination, if it got that far.
    pub target: Option<PathBuf>,

    /// Where the file ended up.
    pub disposition: Disposition,

    /// Reason for failure.
    pub error: Option<HandoffError>,

    /// Problems met during recovery.
    pub warnings: Vec<RecoveryError>,
}

impl ProcessResult {
    fn new(source: &Path) -> Self {
        Self {
            success: false,
            source: source.to_path_buf(),
            target: None,
            disposition: Disposition::Untouched,
            error: None,
            warnings: Vec::new(),
        }
    }

    fn with_target(mut self, target: &Path) -> Self {
        self.target = Some(target.to_path_buf());
        self
    }

    fn fail(mut self, error: impl Into<HandoffError>, disposition: Disposition) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self.disposition = disposition;
        self
    }
}

/// Results of processing a batch of files.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One result per input file, in input order.
    pub results: Vec<ProcessResult>,

    /// Error of the push after the batch, if any.
    pub push_error: Option<GitError>,
}

impl BatchReport {
    /// Count of succeeded and failed files.
    pub fn counts(&self) -> (usize, usize) {
        let success = self.results.iter().filter(|result| result.success).count();
        (success, self.results.len() - success)
    }

    /// Batch fully succeeded, including the push.
    pub fn is_clean(&self) -> bool {
        self.push_error.is_none() && self.results.iter().all(|result| result.success)
    }
}

#[derive(Debug)]
struct Plan {
    target: ResolvedTarget,
    message: String,
}

/// Git side effects a sync got through before it stopped.
#[derive(Debug, Default)]
struct SyncProgress {
    head: Option<Option<String>>,
    staged: bool,
    committed: bool,
}

fn filename_of(file: &Path) -> Result<&str, ProcessError> {
    file.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ProcessError::InvalidFilename {
            path: file.to_path_buf(),
        })
}

/// Per-file processing error types.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Repository checkout is missing.
    #[error("repository does not exist at {:?}, run setup first", path.display())]
    RepoNotExists { path: PathBuf },

    /// File vanished or is not a regular file.
    #[error("file {:?} does not exist", path.display())]
    MissingFile { path: PathBuf },

    /// File name is not valid UTF-8.
    #[error("file name of {:?} is not valid UTF-8", path.display())]
    InvalidFilename { path: PathBuf },

    /// Destination cannot be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Commit message template cannot be filled.
    #[error("commit message: {0}")]
    CommitMessage(TemplateError),

    /// File cannot be moved into checkout.
    #[error("failed to move {:?} to {:?}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Glob pattern is invalid.
    #[error("invalid pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },
}

/// Handoff error types.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Friendly result alias :3
pub type Result<T, E = HandoffError> = std::result::Result<T, E>;
