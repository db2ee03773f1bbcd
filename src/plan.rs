// SPDX-FileCopyrightText: 2026 Rigup Contributors
// SPDX-License-Identifier: MIT

//! Action planning.
//!
//! Turn a [`Manifest`] and a [`ProbeResult`] into an ordered, immutable
//! [`Plan`] of idempotent actions. Planning is pure: identical inputs always
//! produce identical plans, and nothing here touches the host.
//!
//! # Ordering Policy
//!
//! Actions are planned in fixed phases: package manager bootstrap, package
//! installs, user creation, SSH key generation, then dotfile copies. Within a
//! phase, manifest order is preserved. The phase order guarantees that a user
//! exists before anything is copied into their home directory, and that the
//! package manager exists before anything is installed through it.
//!
//! # Preconditions
//!
//! A planned action does not record whether the host already satisfies it.
//! That check belongs to the executor, which re-evaluates preconditions at
//! execution time so a plan stays correct even when host state changes
//! between planning and execution.

use crate::{
    manifest::{DotfileEntry, Manifest},
    path,
    probe::{OsFamily, PackageManagerKind, ProbeResult},
};

use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{debug, instrument};

/// Key algorithm used when an ssh_key entry does not pick one.
const DEFAULT_KEY_ALGORITHM: &str = "ed25519";

/// A single idempotent bootstrap step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    kind: ActionKind,
}

impl Action {
    /// Construct new action.
    pub fn new(kind: ActionKind) -> Self {
        Self { kind }
    }

    /// What this action does.
    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }
}

impl Display for Action {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            ActionKind::InstallPackageManager { manager } => {
                write!(fmt, "install package manager {manager}")
            }
            ActionKind::InstallPackage {
                manager,
                name,
                version: Some(version),
            } => write!(fmt, "install package {name} {version} with {manager}"),
            ActionKind::InstallPackage {
                manager,
                name,
                version: None,
            } => write!(fmt, "install package {name} with {manager}"),
            ActionKind::CreateUser { name, .. } => write!(fmt, "create user {name}"),
            ActionKind::GenerateSshKey {
                path, algorithm, ..
            } => write!(fmt, "generate {algorithm} ssh key at {}", path.display()),
            ActionKind::CopyFile { source, target, .. } => {
                write!(fmt, "copy {} to {}", source.display(), target.display())
            }
        }
    }
}

/// Every kind of step Rigup knows how to plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Bootstrap a missing package manager.
    InstallPackageManager { manager: PackageManagerKind },

    /// Install a package through an available package manager.
    InstallPackage {
        manager: PackageManagerKind,
        name: String,
        version: Option<String>,
    },

    /// Create a user account.
    CreateUser { name: String, groups: Vec<String> },

    /// Generate an SSH key pair.
    GenerateSshKey {
        path: PathBuf,
        algorithm: String,
        comment: Option<String>,
    },

    /// Copy a dotfile to its resolved destination.
    CopyFile {
        source: PathBuf,
        target: PathBuf,
        owner: Option<String>,
    },
}

/// Ordered, immutable sequence of planned actions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    actions: Vec<Action>,
}

impl Plan {
    /// Construct a plan from an already ordered action list.
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    /// Planned actions in execution order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Plan the ordered action sequence for a manifest on a probed host.
///
/// Deterministic given identical inputs, and free of side effects.
///
/// # Errors
///
/// - Return [`PlanError::InvalidManifest`] if an entry references an
///   unsupported platform for the probed host, if packages are declared with
///   no package manager to install them, or if a dotfile target cannot be
///   resolved.
/// - Return [`PlanError::Home`] if a `~/` target is declared and the home
///   directory cannot be determined.
#[instrument(skip(manifest, probe), level = "debug")]
pub fn plan(manifest: &Manifest, probe: &ProbeResult) -> Result<Plan> {
    let mut actions = Vec::new();

    let packages: Vec<_> = manifest.packages.iter().flatten().collect();
    for entry in &packages {
        check_platforms(entry.platform.as_ref(), probe.os, &entry.name)?;
    }

    // Phase 1: package manager bootstrap comes before everything else.
    let manager = match (probe.package_manager, packages.is_empty()) {
        (_, true) => None,
        (Some(manager), false) => Some(manager),
        (None, false) => match probe.os {
            // Homebrew can bootstrap itself. Yum cannot.
            OsFamily::MacOs => {
                actions.push(Action::new(ActionKind::InstallPackageManager {
                    manager: PackageManagerKind::Brew,
                }));
                Some(PackageManagerKind::Brew)
            }
            OsFamily::Linux => {
                return Err(PlanError::InvalidManifest {
                    reason: "manifest declares packages, but no package manager is available \
                             on this host"
                        .into(),
                })
            }
        },
    };

    // Phase 2: package installs.
    if let Some(manager) = manager {
        for entry in &packages {
            actions.push(Action::new(ActionKind::InstallPackage {
                manager,
                name: entry.name.clone(),
                version: entry.version.clone(),
            }));
        }
    }

    // Phase 3: user creation before anything scoped to a user.
    let mut known_users = probe.users.clone();
    for entry in manifest.users.iter().flatten() {
        known_users.insert(entry.name.clone());
        actions.push(Action::new(ActionKind::CreateUser {
            name: entry.name.clone(),
            groups: entry.groups.clone().unwrap_or_default(),
        }));
    }

    // Phase 4: SSH key generation.
    for entry in manifest.ssh_keys.iter().flatten() {
        actions.push(Action::new(ActionKind::GenerateSshKey {
            path: PathBuf::from(&entry.path),
            algorithm: entry
                .algorithm
                .clone()
                .unwrap_or_else(|| DEFAULT_KEY_ALGORITHM.into()),
            comment: entry.comment.clone(),
        }));
    }

    // Phase 5: dotfile copies.
    for entry in manifest.dotfiles.iter().flatten() {
        check_platforms(entry.platform.as_ref(), probe.os, &entry.target)?;
        let (target, owner) = resolve_target(entry, probe.os, &known_users)?;
        actions.push(Action::new(ActionKind::CopyFile {
            source: entry.source.clone(),
            target,
            owner,
        }));
    }

    debug!("planned {} actions", actions.len());

    Ok(Plan::new(actions))
}

fn check_platforms(
    platforms: Option<&Vec<String>>,
    os: OsFamily,
    entry_name: &str,
) -> Result<()> {
    let Some(platforms) = platforms else {
        return Ok(());
    };

    let mut allowed = BTreeSet::new();
    for name in platforms {
        let family = OsFamily::from_name(name).ok_or_else(|| PlanError::InvalidManifest {
            reason: format!("entry {entry_name:?} references unknown platform {name:?}"),
        })?;
        allowed.insert(family);
    }

    if !allowed.contains(&os) {
        return Err(PlanError::InvalidManifest {
            reason: format!(
                "entry {entry_name:?} is pinned to {platforms:?}, but the probed platform is {os}"
            ),
        });
    }

    Ok(())
}

/// Resolve a dotfile target to an absolute path plus the user it is scoped
/// to, if any.
fn resolve_target(
    entry: &DotfileEntry,
    os: OsFamily,
    known_users: &BTreeSet<String>,
) -> Result<(PathBuf, Option<String>)> {
    let target = entry.target.as_str();

    if let Some(relative) = target.strip_prefix("~/") {
        if relative.is_empty() {
            return Err(PlanError::InvalidManifest {
                reason: format!("dotfile target {target:?} must name a file"),
            });
        }

        return Ok((path::home_dir()?.join(relative), None));
    }

    if let Some(rest) = target.strip_prefix('~') {
        let Some((user, relative)) = rest.split_once('/') else {
            return Err(PlanError::InvalidManifest {
                reason: format!("dotfile target {target:?} must name a file inside a home directory"),
            });
        };

        if relative.is_empty() {
            return Err(PlanError::InvalidManifest {
                reason: format!("dotfile target {target:?} must name a file"),
            });
        }

        if !known_users.contains(user) {
            return Err(PlanError::InvalidManifest {
                reason: format!(
                    "dotfile target {target:?} is scoped to user {user:?}, which neither exists \
                     nor is declared by this manifest"
                ),
            });
        }

        return Ok((
            path::user_home_dir(os, user).join(relative),
            Some(user.to_string()),
        ));
    }

    let resolved = PathBuf::from(target);
    if !resolved.is_absolute() {
        return Err(PlanError::InvalidManifest {
            reason: format!("dotfile target {target:?} must be absolute or start with '~'"),
        });
    }

    Ok((resolved, None))
}

/// All possible error types for action planning.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Manifest declares something the probed host cannot satisfy.
    #[error("invalid manifest: {reason}")]
    InvalidManifest { reason: String },

    /// Home directory path cannot be determined for target resolution.
    #[error(transparent)]
    Home(#[from] crate::path::NoWayHome),
}

/// Friendly result alias :3
type Result<T, E = PlanError> = std::result::Result<T, E>;
