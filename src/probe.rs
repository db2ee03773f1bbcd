// SPDX-FileCopyrightText: 2026 Rigup Contributors
// SPDX-License-Identifier: MIT

//! Environment probing.
//!
//! Detect everything about the host that planning depends on: the OS family,
//! package manager availability, existing user accounts, and existing SSH
//! public keys. Probing is strictly read-only. The only observable behavior
//! here is file and directory inspection, so a probe can never change the
//! host it describes.
//!
//! # Explicit Context
//!
//! All ambient inputs are captured once into a [`ProbeContext`] instead of
//! being read from global state on demand. This keeps [`probe`] a function of
//! its arguments, which makes every downstream decision reproducible given
//! the same context.
//!
//! # Supported Platforms
//!
//! Rigup recognizes the Linux and macOS families. Anything else fails the
//! probe immediately with [`ProbeError::UnsupportedPlatform`], before any
//! action can be planned or executed.

use crate::path;

use std::{
    collections::BTreeSet,
    env,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Operating system family of the probed host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OsFamily {
    Linux,
    MacOs,
}

impl OsFamily {
    /// Match an OS name as reported by `std::env::consts::OS`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::MacOs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
        }
    }
}

impl Display for OsFamily {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Package manager families that Rigup can drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackageManagerKind {
    Brew,
    Yum,
}

impl PackageManagerKind {
    /// Name of the binary to look for on the search path.
    pub fn binary_name(&self) -> &'static str {
        match self {
            Self::Brew => "brew",
            Self::Yum => "yum",
        }
    }

    /// Candidate package managers for an OS family, in preference order.
    pub fn candidates(os: OsFamily) -> &'static [PackageManagerKind] {
        match os {
            OsFamily::Linux => &[Self::Yum],
            OsFamily::MacOs => &[Self::Brew],
        }
    }
}

impl Display for PackageManagerKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.binary_name())
    }
}

/// Ambient environment captured once per run.
///
/// Everything [`probe`] is allowed to look at. Constructed from the real
/// environment through [`ProbeContext::from_env`], or directly for tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeContext {
    /// OS name in `std::env::consts::OS` notation.
    pub os_name: String,

    /// Directories searched for package manager binaries.
    pub search_path: Vec<PathBuf>,

    /// User database file consulted on Linux.
    pub passwd_file: PathBuf,

    /// Home directory root consulted on macOS.
    pub users_dir: PathBuf,

    /// Directory searched for existing SSH public keys.
    pub ssh_dir: PathBuf,
}

impl ProbeContext {
    /// Capture the ambient environment of the current process.
    ///
    /// # Errors
    ///
    /// - Return [`ProbeError::Home`] if home directory path cannot be
    ///   determined.
    pub fn from_env() -> Result<Self> {
        let search_path = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();

        Ok(Self {
            os_name: env::consts::OS.to_string(),
            search_path,
            passwd_file: PathBuf::from("/etc/passwd"),
            users_dir: PathBuf::from("/Users"),
            ssh_dir: path::ssh_dir()?,
        })
    }
}

/// Read-only snapshot of host state.
///
/// Created once per run and never mutated afterward. Planning reads it; the
/// executor deliberately does not, because preconditions must be evaluated
/// against live host state instead of this snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    /// Detected OS family.
    pub os: OsFamily,

    /// First available package manager for the OS family, if any.
    pub package_manager: Option<PackageManagerKind>,

    /// Existing user account names.
    pub users: BTreeSet<String>,

    /// Existing SSH public key files.
    pub ssh_public_keys: Vec<PathBuf>,
}

/// Probe the host described by the given context.
///
/// # Errors
///
/// - Return [`ProbeError::UnsupportedPlatform`] if the OS family cannot be
///   determined.
/// - Return [`ProbeError::ReadUserDatabase`] if existing accounts cannot be
///   enumerated.
/// - Return [`ProbeError::ListSshDir`] if the SSH directory exists but
///   cannot be listed.
#[instrument(skip(context), level = "debug")]
pub fn probe(context: &ProbeContext) -> Result<ProbeResult> {
    let os = OsFamily::from_name(&context.os_name).ok_or_else(|| {
        ProbeError::UnsupportedPlatform {
            os_name: context.os_name.clone(),
        }
    })?;

    let package_manager = PackageManagerKind::candidates(os)
        .iter()
        .copied()
        .find(|manager| binary_on_path(&context.search_path, manager.binary_name()));

    let users = match os {
        OsFamily::Linux => passwd_users(&context.passwd_file)?,
        OsFamily::MacOs => home_dir_users(&context.users_dir)?,
    };

    let ssh_public_keys = public_keys(&context.ssh_dir)?;

    info!(
        "probed {os} host: package manager {}, {} users, {} public keys",
        package_manager.map_or(String::from("none"), |manager| manager.to_string()),
        users.len(),
        ssh_public_keys.len()
    );

    Ok(ProbeResult {
        os,
        package_manager,
        users,
        ssh_public_keys,
    })
}

/// Check whether an executable with the given name sits on the search path.
pub(crate) fn binary_on_path(search_path: &[PathBuf], name: &str) -> bool {
    search_path.iter().any(|dir| dir.join(name).is_file())
}

fn passwd_users(passwd_file: &Path) -> Result<BTreeSet<String>> {
    let content = fs::read_to_string(passwd_file).map_err(|source| {
        ProbeError::ReadUserDatabase {
            source,
            path: passwd_file.to_path_buf(),
        }
    })?;

    Ok(content
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split(':').next())
        .map(str::to_owned)
        .collect())
}

fn home_dir_users(users_dir: &Path) -> Result<BTreeSet<String>> {
    let entries = fs::read_dir(users_dir).map_err(|source| ProbeError::ReadUserDatabase {
        source,
        path: users_dir.to_path_buf(),
    })?;

    let mut users = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|source| ProbeError::ReadUserDatabase {
            source,
            path: users_dir.to_path_buf(),
        })?;

        if !entry.path().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();

        // INVARIANT: The shared folder is not an account.
        if name == "Shared" || name.starts_with('.') {
            continue;
        }

        users.insert(name);
    }

    Ok(users)
}

fn public_keys(ssh_dir: &Path) -> Result<Vec<PathBuf>> {
    if !ssh_dir.is_dir() {
        debug!("no ssh directory at {:?}", ssh_dir.display());
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(ssh_dir).map_err(|source| ProbeError::ListSshDir {
        source,
        path: ssh_dir.to_path_buf(),
    })?;

    let mut keys = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ProbeError::ListSshDir {
            source,
            path: ssh_dir.to_path_buf(),
        })?;

        let path = entry.path();
        if path.extension().is_some_and(|extension| extension == "pub") {
            keys.push(path);
        }
    }

    // INVARIANT: Keep listing order stable across file systems.
    keys.sort();

    Ok(keys)
}

/// All possible error types for host probing.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// OS family cannot be determined.
    #[error("unsupported platform {os_name:?}, expected linux or macos")]
    UnsupportedPlatform { os_name: String },

    /// User database cannot be read.
    #[error("cannot read user database at {path:?}")]
    ReadUserDatabase {
        source: std::io::Error,
        path: PathBuf,
    },

    /// SSH directory cannot be listed.
    #[error("cannot list ssh directory at {path:?}")]
    ListSshDir {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Home directory path cannot be determined.
    #[error(transparent)]
    Home(#[from] crate::path::NoWayHome),
}

/// Friendly result alias :3
type Result<T, E = ProbeError> = std::result::Result<T, E>;
