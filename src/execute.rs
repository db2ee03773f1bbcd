// SPDX-FileCopyrightText: 2026 Rigup Contributors
// SPDX-License-Identifier: MIT

//! Action execution.
//!
//! Apply a [`Plan`] to a host, one action at a time, strictly sequentially.
//!
//! # Idempotence
//!
//! Every action carries an implicit precondition, i.e., a test of whether the
//! desired state already holds. The executor re-evaluates that precondition
//! against live host state immediately before applying each action, never
//! against the snapshot taken at planning time. An action whose precondition
//! holds is skipped. After applying an action, the same check runs again as a
//! postcondition: a tool that exits cleanly without producing the desired
//! state counts as a failure.
//!
//! # Failure Policy
//!
//! Per-action failures are recorded in the action's [`ActionOutcome`] and
//! execution continues with the next action. One package failing to install
//! must not block dotfile copies. The only fatal condition at execution time
//! is an unwritable home directory, which aborts the run before any action
//! has a chance to apply.
//!
//! # Host Access
//!
//! All host state queries and effects sit behind the [`System`] trait.
//! [`HostSystem`] implements it by shelling out to the external tools that
//! own each concern: the package manager for installs, the account utilities
//! for users, and ssh-keygen for keys.

use crate::{
    path,
    plan::{Action, ActionKind, Plan},
    probe::{self, OsFamily, PackageManagerKind},
};

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, info, instrument, warn};

/// Homebrew ends up outside the inherited PATH on fresh hosts.
const BREW_LOCATIONS: &[&str] = &["/opt/homebrew/bin/brew", "/usr/local/bin/brew"];

const BREW_BOOTSTRAP: &str =
    r#"bash -c "$(curl -fsSL https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh)""#;

/// Layer of indirection for host state queries and effects.
pub trait System {
    fn binary_exists(&self, name: &str) -> bool;

    fn package_installed(&self, manager: PackageManagerKind, name: &str) -> Result<bool>;

    fn install_package_manager(&mut self, manager: PackageManagerKind) -> Result<()>;

    fn install_package(
        &mut self,
        manager: PackageManagerKind,
        name: &str,
        version: Option<&str>,
    ) -> Result<()>;

    fn user_exists(&self, name: &str) -> Result<bool>;

    fn create_user(&mut self, name: &str, groups: &[String]) -> Result<()>;

    fn path_exists(&self, path: &Path) -> bool;

    fn contents_match(&self, source: &Path, target: &Path) -> Result<bool>;

    fn copy_file(&mut self, source: &Path, target: &Path, owner: Option<&str>) -> Result<()>;

    fn generate_ssh_key(&mut self, path: &Path, algorithm: &str, comment: Option<&str>)
        -> Result<()>;

    fn read_public_key(&self, path: &Path) -> Result<String>;

    fn home_writable(&self) -> Result<()>;
}

/// Result of executing a single action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Human description of the action, for logs and the final report.
    pub description: String,

    /// What happened.
    pub status: Status,
}

/// Per-action execution status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// Effect was performed, and the postcondition holds.
    Applied {
        /// Credential generated by the action, surfaced verbatim so the
        /// operator can copy it elsewhere.
        credential: Option<String>,
    },

    /// Precondition already satisfied. Nothing was done.
    Skipped,

    /// Effect failed, or the postcondition did not hold afterward.
    Failed { reason: String },
}

/// Sequential action executor.
///
/// Owns a [`System`] implementation, re-checks every action's precondition at
/// execution time, and records per-action outcomes instead of propagating
/// non-fatal failures.
#[derive(Debug)]
pub struct Executor<S = HostSystem>
where
    S: System,
{
    system: S,
}

impl<S> Executor<S>
where
    S: System,
{
    /// Construct new executor over the given host access layer.
    pub fn new(system: S) -> Self {
        Self { system }
    }

    /// Access the underlying host access layer.
    pub fn system(&self) -> &S {
        &self.system
    }

    /// Execute a full plan in order.
    ///
    /// Progress is reported through the given progress bar. Failed actions do
    /// not stop the run; their outcomes say what went wrong.
    ///
    /// # Errors
    ///
    /// - Return [`ExecuteError::Preflight`] if the home directory is not
    ///   writable. Nothing is executed in that case.
    /// - Return [`ExecuteError::IndicatifStyleTemplate`] if the progress bar
    ///   style cannot be set.
    #[instrument(skip(self, plan, bar), level = "debug")]
    pub fn run(&mut self, plan: &Plan, bar: ProgressBar) -> Result<Vec<ActionOutcome>, ExecuteError> {
        // INVARIANT: A home directory we cannot write to is fatal before any
        // action runs.
        self.system
            .home_writable()
            .map_err(|source| ExecuteError::Preflight { source })?;

        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Rr.");
        bar.set_style(style);
        bar.set_length(plan.len() as u64);

        let mut outcomes = Vec::with_capacity(plan.len());
        for action in plan.actions() {
            bar.set_message(action.to_string());
            let outcome = self.execute(action);
            if let Status::Failed { reason } = &outcome.status {
                warn!("{}: {reason}", outcome.description);
            }
            outcomes.push(outcome);
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(outcomes)
    }

    /// Execute a single action.
    ///
    /// Re-checks the precondition, applies the effect if needed, then
    /// re-verifies that the desired state holds. Never fails outright; every
    /// problem is captured in the returned outcome.
    pub fn execute(&mut self, action: &Action) -> ActionOutcome {
        let description = action.to_string();

        // INVARIANT: Preconditions are evaluated at execution time, never
        // cached from planning time.
        match self.satisfied(action) {
            Ok(true) => {
                debug!("skip {description}: already satisfied");
                return ActionOutcome {
                    description,
                    status: Status::Skipped,
                };
            }
            Ok(false) => {}
            Err(error) => {
                return ActionOutcome {
                    description,
                    status: Status::Failed {
                        reason: error.to_string(),
                    },
                }
            }
        }

        info!("apply {description}");
        let credential = match self.apply(action) {
            Ok(credential) => credential,
            Err(error) => {
                return ActionOutcome {
                    description,
                    status: Status::Failed {
                        reason: error.to_string(),
                    },
                }
            }
        };

        match self.satisfied(action) {
            Ok(true) => ActionOutcome {
                description,
                status: Status::Applied { credential },
            },
            Ok(false) => ActionOutcome {
                description,
                status: Status::Failed {
                    reason: "applied without error, but desired state still does not hold".into(),
                },
            },
            Err(error) => ActionOutcome {
                description,
                status: Status::Failed {
                    reason: error.to_string(),
                },
            },
        }
    }

    /// Re-evaluate an action's precondition against live host state.
    fn satisfied(&self, action: &Action) -> Result<bool> {
        match action.kind() {
            ActionKind::InstallPackageManager { manager } => {
                Ok(self.system.binary_exists(manager.binary_name()))
            }
            ActionKind::InstallPackage { manager, name, .. } => {
                self.system.package_installed(*manager, name)
            }
            ActionKind::CreateUser { name, .. } => self.system.user_exists(name),
            ActionKind::GenerateSshKey { path, .. } => Ok(self.system.path_exists(path)),
            ActionKind::CopyFile { source, target, .. } => {
                if !self.system.path_exists(target) {
                    return Ok(false);
                }

                self.system.contents_match(source, target)
            }
        }
    }

    fn apply(&mut self, action: &Action) -> Result<Option<String>> {
        match action.kind() {
            ActionKind::InstallPackageManager { manager } => {
                self.system.install_package_manager(*manager)?;
                Ok(None)
            }
            ActionKind::InstallPackage {
                manager,
                name,
                version,
            } => {
                self.system
                    .install_package(*manager, name, version.as_deref())?;
                Ok(None)
            }
            ActionKind::CreateUser { name, groups } => {
                self.system.create_user(name, groups)?;
                Ok(None)
            }
            ActionKind::GenerateSshKey {
                path,
                algorithm,
                comment,
            } => {
                self.system
                    .generate_ssh_key(path, algorithm, comment.as_deref())?;
                let public = self.system.read_public_key(&path.with_extension("pub"))?;
                Ok(Some(public))
            }
            ActionKind::CopyFile {
                source,
                target,
                owner,
            } => {
                self.system.copy_file(source, target, owner.as_deref())?;
                Ok(None)
            }
        }
    }
}

/// Host access through external tooling.
#[derive(Debug)]
pub struct HostSystem {
    os: OsFamily,
    search_path: Vec<PathBuf>,
}

impl HostSystem {
    /// Construct new host access layer.
    pub fn new(os: OsFamily, search_path: Vec<PathBuf>) -> Self {
        Self { os, search_path }
    }
}

impl System for HostSystem {
    fn binary_exists(&self, name: &str) -> bool {
        if probe::binary_on_path(&self.search_path, name) {
            return true;
        }

        name == "brew" && BREW_LOCATIONS.iter().any(|location| Path::new(location).is_file())
    }

    fn package_installed(&self, manager: PackageManagerKind, name: &str) -> Result<bool> {
        match manager {
            PackageManagerKind::Brew => syscall_status("brew", ["list", "--versions", name]),
            PackageManagerKind::Yum => syscall_status("rpm", ["-q", name]),
        }
    }

    fn install_package_manager(&mut self, manager: PackageManagerKind) -> Result<()> {
        match manager {
            PackageManagerKind::Brew => syscall_interactive("/bin/bash", ["-c", BREW_BOOTSTRAP]),
            PackageManagerKind::Yum => Err(SystemError::Syscall(std::io::Error::other(
                "yum cannot bootstrap itself",
            ))),
        }
    }

    fn install_package(
        &mut self,
        manager: PackageManagerKind,
        name: &str,
        version: Option<&str>,
    ) -> Result<()> {
        match manager {
            PackageManagerKind::Brew => {
                // Homebrew pins versions through versioned formula names.
                let formula = match version {
                    Some(version) => format!("{name}@{version}"),
                    None => name.to_string(),
                };
                syscall_non_interactive("brew", ["install", formula.as_str()])?;
            }
            PackageManagerKind::Yum => {
                let package = match version {
                    Some(version) => format!("{name}-{version}"),
                    None => name.to_string(),
                };
                syscall_non_interactive("yum", ["install", "-y", package.as_str()])?;
            }
        }

        Ok(())
    }

    fn user_exists(&self, name: &str) -> Result<bool> {
        syscall_status("id", ["-u", name])
    }

    fn create_user(&mut self, name: &str, groups: &[String]) -> Result<()> {
        match self.os {
            OsFamily::Linux => {
                let mut args = vec!["-m".to_string()];
                if !groups.is_empty() {
                    args.push("-G".into());
                    args.push(groups.join(","));
                }
                args.push(name.to_string());
                syscall_non_interactive("useradd", args)?;

                // Password entry belongs to the operator.
                syscall_interactive("passwd", [name])?;
            }
            OsFamily::MacOs => {
                syscall_interactive("sysadminctl", ["-addUser", name])?;
                for group in groups {
                    syscall_non_interactive(
                        "dseditgroup",
                        ["-o", "edit", "-a", name, "-t", "user", group.as_str()],
                    )?;
                }
            }
        }

        Ok(())
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn contents_match(&self, source: &Path, target: &Path) -> Result<bool> {
        Ok(fs::read(source)? == fs::read(target)?)
    }

    fn copy_file(&mut self, source: &Path, target: &Path, owner: Option<&str>) -> Result<()> {
        if let Some(parent) = target.parent() {
            mkdirp::mkdirp(parent)?;
        }

        fs::copy(source, target)?;

        if let Some(owner) = owner {
            syscall_non_interactive(
                "chown",
                [owner.to_string(), target.to_string_lossy().into_owned()],
            )?;
        }

        Ok(())
    }

    fn generate_ssh_key(
        &mut self,
        path: &Path,
        algorithm: &str,
        comment: Option<&str>,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            mkdirp::mkdirp(parent)?;
        }

        let mut args = vec![
            "-t".to_string(),
            algorithm.to_string(),
            "-f".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        if let Some(comment) = comment {
            args.push("-C".into());
            args.push(comment.to_string());
        }

        // Passphrase entry belongs to the operator.
        syscall_interactive("ssh-keygen", args)
    }

    fn read_public_key(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?.trim_end().to_string())
    }

    fn home_writable(&self) -> Result<()> {
        let probe_file = path::home_dir()?.join(".rigup-write-check");
        fs::write(&probe_file, b"")?;
        fs::remove_file(&probe_file)?;

        Ok(())
    }
}

fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<()> {
    let status = Command::new(cmd.as_ref()).args(args).spawn()?.wait()?;
    if !status.success() {
        return Err(SystemError::Syscall(std::io::Error::other(format!(
            "command {:?} failed",
            cmd.as_ref()
        ))));
    }

    Ok(())
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
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
        return Err(SystemError::Syscall(std::io::Error::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        ))));
    }

    Ok(message)
}

fn syscall_status(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<bool> {
    let status = Command::new(cmd.as_ref())
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    Ok(status.success())
}

/// All possible error types for a full plan execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// Home directory is not writable.
    #[error("home directory is not writable")]
    Preflight { source: SystemError },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// All possible error types for host access.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// External command failed, or cannot be spawned.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),

    /// Home directory path cannot be determined.
    #[error(transparent)]
    Home(#[from] crate::path::NoWayHome),
}

/// Friendly result alias :3
type Result<T, E = SystemError> = std::result::Result<T, E>;
