// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hand off dropped art assets into a Git repository.
//!
//! A contributor drops a file into the __inbox__ of a workspace. The file
//! name is matched against configured naming rules, the captured fields
//! fill a path template, and the file is moved to that path inside a local
//! checkout of the target repository. The move is then committed and pushed.
//! Files that do not fit any rule go to a quarantine directory instead, and
//! files whose sync fails are moved back so nothing is lost.
//!
//! # Naming Rules
//!
//! A naming rule pairs a regular expression with a path template:
//!
//! ```yaml
//! naming:
//!   rules:
//!     - pattern: '^(?P<type>[^_]+)_(?P<name>[^_]+)\.(?P<ext>\w+)$'
//!       path_template: '{type}/{name}.{ext}'
//!       example: Character_Hero.fbx
//! ```
//!
//! With `asset_root: Assets/GameRes`, the file `Character_Hero.fbx` lands at
//! `Assets/GameRes/Character/Hero.fbx` in the checkout. Rules are tried in
//! order and the first full match wins. Every rule must capture the file
//! extension as `ext` or `extension`.

pub mod config;
pub mod handoff;
pub mod i18n;
pub mod naming;
pub mod path;
pub mod resolve;
pub mod template;
pub mod vcs;

pub use config::{Config, Settings};
pub use handoff::{BatchReport, Disposition, Handoff, ProcessResult};
pub use i18n::Messages;
pub use vcs::{GitRepo, VcsGateway};
