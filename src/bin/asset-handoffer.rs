// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use asset_handoffer::{
    handoff::ProcessError,
    vcs::redact,
    Config, Disposition, GitRepo, Handoff, Messages, ProcessResult, Settings, VcsGateway,
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Password, PasswordDisplayMode, Text};
use std::{
    fs,
    path::{Path, PathBuf},
    process::exit,
    time::Duration,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "asset-handoffer [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Init(opts) => run_init(opts),
            Command::Setup(opts) => run_setup(opts),
            Command::Process(opts) => run_process(opts),
            Command::Status(opts) => run_status(opts),
            Command::Delete(opts) => run_delete(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Write new configuration file.
    #[command(override_usage = "asset-handoffer init [options]")]
    Init(InitOptions),

    /// Verify remote, clone repository, and create workspace directories.
    #[command(override_usage = "asset-handoffer setup [options] <config>")]
    Setup(SetupOptions),

    /// Hand off inbox files into the repository.
    #[command(override_usage = "asset-handoffer process [options] <config>")]
    Process(ProcessOptions),

    /// Show inbox files and where they would go.
    #[command(override_usage = "asset-handoffer status [options] <config>")]
    Status(StatusOptions),

    /// Delete tracked files matching a pattern from the repository.
    #[command(override_usage = "asset-handoffer delete [options] <pattern> <config>")]
    Delete(DeleteOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// URL of Git repository to hand files off to.
    #[arg(short, long, value_name = "url")]
    pub url: Option<String>,

    /// Directory inside the repository that assets go under.
    #[arg(short, long, value_name = "path")]
    pub asset_root: Option<String>,

    /// Branch to commit to.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,

    /// Language of messages.
    #[arg(short, long, value_name = "locale", default_value = "en")]
    pub language: String,

    /// Path of configuration file to write.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SetupOptions {
    /// Path to configuration file.
    #[arg(required = true, value_name = "config")]
    pub config: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ProcessOptions {
    /// Path to configuration file.
    #[arg(required = true, value_name = "config")]
    pub config: PathBuf,

    /// Process only these files instead of the whole inbox.
    #[arg(short, long = "file", value_name = "path")]
    pub files: Vec<PathBuf>,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StatusOptions {
    /// Path to configuration file.
    #[arg(required = true, value_name = "config")]
    pub config: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    /// Glob pattern of tracked files to delete, e.g., "Hero_*.fbx".
    #[arg(required = true, value_name = "pattern")]
    pub pattern: String,

    /// Path to configuration file.
    #[arg(required = true, value_name = "config")]
    pub config: PathBuf,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_init(opts: InitOptions) -> Result<()> {
    let m = Messages::load(&opts.language)?;
    let interactive = opts.url.is_none();

    let url = match opts.url {
        Some(url) => url,
        None => Text::new(&m.t("init.url", &[])).prompt()?,
    };
    let asset_root = match opts.asset_root {
        Some(asset_root) => asset_root,
        None => Text::new(&m.t("init.asset_root", &[]))
            .with_default("Assets/")
            .prompt()?,
    };
    let branch = match opts.branch {
        Some(branch) => branch,
        None => Text::new(&m.t("init.branch", &[]))
            .with_default("main")
            .prompt()?,
    };
    let token = if interactive {
        Some(
            Password::new(&m.t("init.token", &[]))
                .without_confirmation()
                .with_display_mode(PasswordDisplayMode::Masked)
                .prompt()?,
        )
        .filter(|token| !token.is_empty())
    } else {
        None
    };

    let mut settings = Settings::template(url.trim(), asset_root.trim());
    settings.git.branch = branch.trim().into();
    settings.git.token = token;
    settings.language = m.language().into();

    let output = opts
        .output
        .unwrap_or_else(|| PathBuf::from(format!("{}.yaml", project_name(&url))));
    if output.exists() {
        let overwrite = Confirm::new(&m.t("init.overwrite", &[("path", &output.display())]))
            .with_default(false)
            .prompt()?;
        if !overwrite {
            println!("{}", m.t("init.cancelled", &[]));
            return Ok(());
        }
    }

    fs::write(&output, settings.to_string())?;
    info!("wrote {:?}", output.display());
    println!("{}", m.t("init.written", &[("path", &output.display())]));
    println!("{}", m.t("init.next", &[("path", &output.display())]));

    Ok(())
}

fn run_setup(opts: SetupOptions) -> Result<()> {
    let config = Config::load(&opts.config)?;
    let m = Messages::load(&config.settings.language)?;
    let settings = &config.settings;
    let url = settings.repository();
    let branch = settings.git.branch.as_str();

    println!("{}", m.t("setup.title", &[]));
    println!("{}", m.t("setup.repository", &[("url", &redact(url))]));
    println!(
        "{}",
        m.t("setup.workspace", &[("path", &config.workspace.root.display())])
    );

    let repo = GitRepo::new(&config.workspace.repo, settings.git_token());
    println!(
        "{}",
        m.t("setup.verifying", &[("url", &redact(url)), ("branch", &branch)])
    );
    if !repo.verify_remote(url, branch) {
        return Err(anyhow!(m.t(
            "setup.unreachable",
            &[("url", &redact(url)), ("branch", &branch)]
        )));
    }

    config.workspace.ensure_dirs()?;
    println!(
        "{}",
        m.t("setup.inbox_dir", &[("path", &config.workspace.inbox.display())])
    );

    if repo.exists() {
        println!(
            "{}",
            m.t("setup.repo_exists_warning", &[("path", &config.workspace.repo.display())])
        );
        let wipe = Confirm::new(&m.t("setup.repo_exists_confirm", &[]))
            .with_default(false)
            .prompt()?;
        if !wipe {
            println!("{}", m.t("setup.skip_clone", &[]));
            print_usage(&m, &config, &opts.config);
            return Ok(());
        }
        fs::remove_dir_all(&config.workspace.repo)?;
    }

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {elapsed_precise:.green}  {msg}")?);
    bar.set_message(m.t("setup.cloning", &[]));
    bar.enable_steady_tick(Duration::from_millis(100));
    let cloned = repo.clone_repo(url, branch, &settings.git.user.name, &settings.git.user.email);
    bar.finish_and_clear();
    cloned?;

    println!(
        "{}",
        m.t("setup.cloned", &[("path", &config.workspace.repo.display())])
    );
    print_usage(&m, &config, &opts.config);

    Ok(())
}

fn print_usage(m: &Messages, config: &Config, file: &Path) {
    println!();
    println!("{}", m.t("setup.done", &[]));
    println!(
        "{}",
        m.t("setup.usage_put_files", &[("inbox", &config.workspace.inbox.display())])
    );
    println!(
        "{}",
        m.t("setup.usage_run_process", &[("config", &file.display())])
    );
}

fn run_process(opts: ProcessOptions) -> Result<()> {
    let config = Config::load(&opts.config)?;
    let m = Messages::load(&config.settings.language)?;
    let handoff = Handoff::from_config(&config)?;

    if handoff.vcs().exists() {
        println!("{}", m.t("process.pulling", &[]));
        handoff.pull()?;
    }

    let files = if opts.files.is_empty() {
        config.workspace.list_inbox()?
    } else {
        opts.files
            .iter()
            .map(std::path::absolute)
            .collect::<Result<Vec<_>, _>>()?
    };
    if files.is_empty() {
        println!("{}", m.t("process.empty", &[]));
        println!(
            "{}",
            m.t("setup.inbox_dir", &[("path", &config.workspace.inbox.display())])
        );
        return Ok(());
    }

    println!("{}", m.t("process.found_files", &[("count", &files.len())]));
    for file in &files {
        let name = file_name(file);
        let line = match handoff.preview(file) {
            Ok(target) => {
                let key = if target.is_override {
                    "process.preview_override"
                } else {
                    "process.preview_item"
                };
                let relative = handoff.repo_relative(&target.absolute_path).display();
                m.t(key, &[("name", &name), ("target", &relative)])
            }
            Err(error) => m.t("process.preview_invalid", &[("name", &name), ("error", &error)]),
        };
        println!("{line}");
    }

    if !opts.yes {
        let proceed = Confirm::new(&m.t("process.confirm", &[]))
            .with_default(true)
            .prompt()?;
        if !proceed {
            println!("{}", m.t("process.cancelled", &[]));
            return Ok(());
        }
    }

    let bar = ProgressBar::new(files.len() as u64);
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {pos}/{len}",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    // INVARIANT: Checkout was pulled above, so do not pull it again.
    let report = handoff.process_pulled(&files, &bar);
    bar.finish_and_clear();

    println!();
    for result in &report.results {
        print_result(&m, &handoff, result);
    }
    if let Some(error) = &report.push_error {
        println!("{}", m.t("process.push_failed", &[("error", error)]));
    }

    let (success, failed) = report.counts();
    println!();
    if report.is_clean() {
        println!("{}", m.t("process.result_all_success", &[]));
    } else {
        println!("{}", m.t("process.result_partial_failure", &[]));
    }
    println!("{}", m.t("process.summary_success", &[("success", &success)]));
    println!("{}", m.t("process.summary_failed", &[("failed", &failed)]));

    if failed > 0 {
        println!(
            "{}",
            m.t("process.failed_files_hint", &[("path", &config.workspace.failed.display())])
        );
        return Err(anyhow!("{failed} of {} file(s) failed", report.results.len()));
    }

    match report.push_error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn print_result(m: &Messages, handoff: &Handoff, result: &ProcessResult) {
    let name = file_name(&result.source);
    let target = result
        .target
        .as_deref()
        .map(|target| handoff.repo_relative(target).display().to_string())
        .unwrap_or_default();

    if result.success {
        let key = match result.disposition {
            Disposition::Unchanged => "process.unchanged_item",
            _ => "process.success_item",
        };
        println!("{}", m.t(key, &[("name", &name), ("target", &target)]));
        return;
    }

    let error = result
        .error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    println!("{}", m.t("process.failed_item", &[("name", &name), ("error", &error)]));
    match &result.disposition {
        Disposition::MovedBack => println!(
            "{}",
            m.t("process.moved_back", &[("path", &result.source.display())])
        ),
        Disposition::Quarantined(path) => {
            println!("{}", m.t("process.quarantined", &[("path", &path.display())]))
        }
        Disposition::RecoveryFailed(path) => println!(
            "{}",
            m.t("process.recovery_failed", &[("path", &path.display())])
        ),
        _ => {}
    }
    for warning in &result.warnings {
        println!("{}", m.t("process.recovery_warning", &[("warning", warning)]));
    }
}

fn run_status(opts: StatusOptions) -> Result<()> {
    let config = Config::load(&opts.config)?;
    let m = Messages::load(&config.settings.language)?;
    let handoff = Handoff::from_config(&config)?;
    let files = config.workspace.list_inbox()?;

    println!(
        "{}",
        m.t("setup.inbox_dir", &[("path", &config.workspace.inbox.display())])
    );
    println!();
    if files.is_empty() {
        println!("{}", m.t("status.empty", &[]));
        return Ok(());
    }

    println!("{}", m.t("status.count", &[("count", &files.len())]));
    for file in &files {
        let name = file_name(file);
        let bytes = fs::metadata(file).map(|meta| meta.len()).unwrap_or_default();
        let size = format!("{:.2}", bytes as f64 / (1024.0 * 1024.0));
        let line = match handoff.preview(file) {
            Ok(target) => {
                let key = if target.is_override {
                    "status.file_override"
                } else {
                    "status.file_item"
                };
                let relative = handoff.repo_relative(&target.absolute_path).display();
                m.t(key, &[("name", &name), ("size", &size), ("target", &relative)])
            }
            Err(error) => m.t(
                "status.file_invalid",
                &[("name", &name), ("size", &size), ("error", &error)],
            ),
        };
        println!("{line}");
    }

    println!();
    println!(
        "{}",
        m.t("status.run_hint", &[("config", &opts.config.display())])
    );

    Ok(())
}

fn run_delete(opts: DeleteOptions) -> Result<()> {
    let config = Config::load(&opts.config)?;
    let m = Messages::load(&config.settings.language)?;
    let handoff = Handoff::from_config(&config)?;

    if !handoff.vcs().exists() {
        return Err(ProcessError::RepoNotExists {
            path: config.workspace.repo.clone(),
        }
        .into());
    }

    println!("{}", m.t("delete.pulling", &[]));
    handoff.pull()?;

    let matches = handoff.find_tracked(&opts.pattern)?;
    if matches.is_empty() {
        println!("{}", m.t("delete.not_found", &[("pattern", &opts.pattern)]));
        return Ok(());
    }

    println!("{}", m.t("delete.found", &[("count", &matches.len())]));
    for path in &matches {
        println!(
            "{}",
            m.t("delete.file_item", &[("path", &handoff.repo_relative(path).display())])
        );
    }

    if !opts.yes {
        let proceed = Confirm::new(&m.t("delete.confirm", &[]))
            .with_default(false)
            .prompt()?;
        if !proceed {
            println!("{}", m.t("delete.cancelled", &[]));
            return Ok(());
        }
    }

    let count = handoff.delete(&opts.pattern, &matches)?;
    println!("{}", m.t("delete.deleted", &[("count", &count)]));

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn project_name(url: &str) -> String {
    let name = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");

    if name.is_empty() {
        "asset-handoffer".into()
    } else {
        name.into()
    }
}
