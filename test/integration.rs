// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::RepoFixture;

use asset_handoffer::{Config, Disposition, GitRepo, Handoff, VcsGateway};

use anyhow::Result;
use git2::Repository;
use indicatif::ProgressBar;
use indoc::formatdoc;
use pretty_assertions::assert_eq;
use std::{
    fs,
    path::{Path, PathBuf},
};

fn write_config(dir: &Path, remote: &RepoFixture, push: &str) -> Result<PathBuf> {
    let path = dir.join("handoff.yaml");
    let data = formatdoc!(
        r#"
        git:
          repository: "{url}"
          push: {push}
        asset_root: Assets/GameRes
        naming:
          rules:
            - pattern: '^(?P<type>[^_]+)_(?P<name>[^_]+)\.(?P<ext>\w+)$'
              path_template: '{{type}}/{{name}}.{{ext}}'
              example: Character_Hero.fbx
        "#,
        url = remote.url(),
        push = push,
    );
    fs::write(&path, data)?;
    Ok(path)
}

fn setup(dir: &Path, push: &str) -> Result<(RepoFixture, Config)> {
    let remote = RepoFixture::new(dir.join("remote.git"))?;
    remote.stage_and_commit("README.md", "art drop target")?;

    let config = Config::load(write_config(dir, &remote, push)?)?;
    config.workspace.ensure_dirs()?;
    let repo = GitRepo::new(&config.workspace.repo, None);
    repo.clone_repo(&remote.url(), "main", "Artist", "artist@example.com")?;

    Ok((remote, config))
}

#[test]
fn clone_creates_checkout_once() -> Result<()> {
    let sandbox = tempfile::tempdir()?;
    let (remote, config) = setup(sandbox.path(), "batch")?;
    let repo = GitRepo::new(&config.workspace.repo, None);

    assert!(repo.exists());
    assert!(repo.verify_remote(&remote.url(), "main"));
    assert!(!repo.verify_remote(&remote.url(), "no-such-branch"));
    assert_eq!(repo.tracked_files()?, vec![PathBuf::from("README.md")]);

    let result = repo.clone_repo(&remote.url(), "main", "Artist", "artist@example.com");
    assert!(result.is_err());
    Ok(())
}

#[test]
fn commit_without_changes_is_noop() -> Result<()> {
    let sandbox = tempfile::tempdir()?;
    let (_remote, config) = setup(sandbox.path(), "batch")?;
    let repo = GitRepo::new(&config.workspace.repo, None);

    let before = repo.head()?;
    assert!(!repo.commit("Update: nothing")?);
    assert_eq!(repo.head()?, before);
    Ok(())
}

#[test]
fn process_batch_commits_and_pushes() -> Result<()> {
    let sandbox = tempfile::tempdir()?;
    let (remote, config) = setup(sandbox.path(), "batch")?;
    let handoff = Handoff::from_config(&config)?;
    fs::write(config.workspace.inbox.join("Character_Hero.fbx"), "mesh")?;
    fs::write(config.workspace.inbox.join("InvalidName.fbx"), "junk")?;

    let files = config.workspace.list_inbox()?;
    let report = handoff.process_batch(&files, &ProgressBar::hidden())?;
    assert_eq!(report.counts(), (1, 1));
    assert!(report.push_error.is_none());

    assert_eq!(
        remote.read_head("Assets/GameRes/Character/Hero.fbx")?,
        Some("mesh".to_string())
    );
    assert_eq!(remote.head_summary()?, "Update: Hero");
    assert!(config.workspace.failed.join("InvalidName.fbx").is_file());
    assert_eq!(remote.read_head("InvalidName.fbx")?, None);
    assert!(config.workspace.list_inbox()?.is_empty());
    Ok(())
}

#[cfg(unix)]
#[test]
fn rejected_push_moves_file_back() -> Result<()> {
    let sandbox = tempfile::tempdir()?;
    let (remote, config) = setup(sandbox.path(), "per_file")?;
    remote.reject_pushes()?;
    let handoff = Handoff::from_config(&config)?;
    let source = config.workspace.inbox.join("Character_Hero.fbx");
    fs::write(&source, "mesh")?;
    let before = handoff.vcs().head()?;

    let result = handoff.process_file(&source);
    assert!(!result.success);
    assert_eq!(result.disposition, Disposition::MovedBack);
    assert!(result.warnings.is_empty());
    assert_eq!(fs::read_to_string(&source)?, "mesh");

    let target = config.workspace.repo.join("Assets/GameRes/Character/Hero.fbx");
    assert!(!target.exists());
    assert_eq!(handoff.vcs().head()?, before);
    assert!(!handoff.vcs().is_tracked(&target));

    let checkout = Repository::open(&config.workspace.repo)?;
    assert!(checkout.statuses(None)?.is_empty());
    Ok(())
}

#[test]
fn delete_removes_tracked_files_from_remote() -> Result<()> {
    let sandbox = tempfile::tempdir()?;
    let remote = RepoFixture::new(sandbox.path().join("remote.git"))?;
    remote.stage_and_commit("Assets/GameRes/Character/Hero.fbx", "mesh")?;
    remote.stage_and_commit("Assets/GameRes/Prop/Crate.fbx", "crate")?;
    let config = Config::load(write_config(sandbox.path(), &remote, "batch")?)?;
    GitRepo::new(&config.workspace.repo, None).clone_repo(
        &remote.url(),
        "main",
        "Artist",
        "artist@example.com",
    )?;
    let handoff = Handoff::from_config(&config)?;

    let matches = handoff.find_tracked("Hero*")?;
    assert_eq!(
        matches,
        vec![config.workspace.repo.join("Assets/GameRes/Character/Hero.fbx")]
    );

    assert_eq!(handoff.delete("Hero*", &matches)?, 1);
    assert_eq!(remote.read_head("Assets/GameRes/Character/Hero.fbx")?, None);
    assert_eq!(
        remote.read_head("Assets/GameRes/Prop/Crate.fbx")?,
        Some("crate".to_string())
    );
    assert_eq!(remote.head_summary()?, "Delete: Hero*");
    Ok(())
}
