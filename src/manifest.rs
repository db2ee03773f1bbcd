// SPDX-FileCopyrightText: 2026 Rigup Contributors
// SPDX-License-Identifier: MIT

//! Manifest layout.
//!
//! Specify the layout for the manifest file that Rigup uses to simplify the
//! process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! A manifest is a declarative description of the desired end-state of a
//! machine, composed of four kinds of entry: packages to install, dotfiles
//! to copy into place, user accounts to create, and SSH keys to generate.
//! The manifest never says _how_ to reach that state. Ordering and
//! idempotence are the planner's and executor's business.
//!
//! Dotfile targets may use `~/` for the invoking user's home directory, or
//! `~name/` for another user's home directory. The `~name/` notation is kept
//! verbatim during parsing, because resolving it requires knowing the probed
//! OS family.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Bundled manifest applied when the CLI is not given one.
///
/// Mirrors a minimal workstation: an editor with its configuration, version
/// control, and a fresh SSH key.
pub const DEFAULT_MANIFEST: &str = r#"
[[package]]
name = "vim"

[[package]]
name = "git"

[[dotfile]]
source = "vimrc"
target = "~/.vimrc"

[[ssh_key]]
path = "~/.ssh/id_ed25519"
algorithm = "ed25519"
"#;

/// Desired end-state of a machine.
///
/// Immutable once loaded. Entry order within each section is preserved, and
/// the planner keeps it when ordering actions inside a phase.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Manifest {
    /// Packages that must be installed.
    #[serde(rename = "package")]
    pub packages: Option<Vec<PackageEntry>>,

    /// Dotfiles that must be copied into place.
    #[serde(rename = "dotfile")]
    pub dotfiles: Option<Vec<DotfileEntry>>,

    /// User accounts that must exist.
    #[serde(rename = "user")]
    pub users: Option<Vec<UserEntry>>,

    /// SSH keys that must exist.
    #[serde(rename = "ssh_key")]
    pub ssh_keys: Option<Vec<SshKeyEntry>>,
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut manifest: Manifest = toml::de::from_str(data).map_err(ManifestError::Deserialize)?;

        // INVARIANT: Perform shell expansion on declared source and key
        // paths. Dotfile targets keep their "~name" notation for the planner.
        if let Some(dotfiles) = manifest.dotfiles.as_mut() {
            for dotfile in dotfiles {
                dotfile.source = shellexpand::full(dotfile.source.to_string_lossy().as_ref())
                    .map_err(ManifestError::ShellExpansion)?
                    .into_owned()
                    .into();
            }
        }

        if let Some(ssh_keys) = manifest.ssh_keys.as_mut() {
            for ssh_key in ssh_keys {
                ssh_key.path = shellexpand::full(ssh_key.path.as_str())
                    .map_err(ManifestError::ShellExpansion)?
                    .into_owned();
            }
        }

        Ok(manifest)
    }
}

impl Display for Manifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ManifestError::Serialize)?
                .as_str(),
        )
    }
}

/// Desired package install.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PackageEntry {
    /// Package name in the package manager's own vocabulary.
    pub name: String,

    /// Version constraint passed through to the package manager.
    pub version: Option<String>,

    /// OS families this entry applies to. Unset means every family.
    pub platform: Option<Vec<String>>,
}

/// Desired dotfile copy.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DotfileEntry {
    /// File to copy from.
    pub source: PathBuf,

    /// Destination, either absolute or anchored with `~/` or `~name/`.
    pub target: String,

    /// OS families this entry applies to. Unset means every family.
    pub platform: Option<Vec<String>>,
}

/// Desired user account.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct UserEntry {
    /// Account name.
    pub name: String,

    /// Supplementary group memberships.
    pub groups: Option<Vec<String>>,
}

/// Desired SSH key pair.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SshKeyEntry {
    /// Private key path. The public half gets a ".pub" extension.
    pub path: String,

    /// Key algorithm handed to the key generator. Defaults to ed25519.
    pub algorithm: Option<String>,

    /// Comment embedded into the generated key.
    pub comment: Option<String>,
}

/// Manifest error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ManifestError {
    /// Failed to deserialize manifest.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize manifest.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on manifest.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ManifestError> for FmtError {
    fn from(_: ManifestError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ManifestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("RIGUP_DOTS", "/home/mg/dots")])]
    fn deserialize_manifest() -> anyhow::Result<()> {
        let result: Manifest = r#"
            [[package]]
            name = "vim"
            platform = ["linux"]

            [[dotfile]]
            source = "$RIGUP_DOTS/vimrc"
            target = "~mg/.vimrc"

            [[user]]
            name = "mg"
            groups = ["wheel"]

            [[ssh_key]]
            path = "$RIGUP_DOTS/id_ed25519"
            comment = "mg@workstation"
        "#
        .parse()?;

        let expect = Manifest {
            packages: Some(vec![PackageEntry {
                name: "vim".into(),
                version: None,
                platform: Some(vec!["linux".into()]),
            }]),
            dotfiles: Some(vec![DotfileEntry {
                source: "/home/mg/dots/vimrc".into(),
                target: "~mg/.vimrc".into(),
                platform: None,
            }]),
            users: Some(vec![UserEntry {
                name: "mg".into(),
                groups: Some(vec!["wheel".into()]),
            }]),
            ssh_keys: Some(vec![SshKeyEntry {
                path: "/home/mg/dots/id_ed25519".into(),
                algorithm: None,
                comment: Some("mg@workstation".into()),
            }]),
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_manifest() {
        let result = Manifest {
            packages: Some(vec![PackageEntry {
                name: "vim".into(),
                version: Some("9.1".into()),
                platform: None,
            }]),
            dotfiles: Some(vec![DotfileEntry {
                source: "vimrc".into(),
                target: "~/.vimrc".into(),
                platform: None,
            }]),
            users: None,
            ssh_keys: None,
        }
        .to_string();

        let expect = indoc! {r#"
            [[package]]
            name = "vim"
            version = "9.1"

            [[dotfile]]
            source = "vimrc"
            target = "~/.vimrc"
        "#};

        assert_eq!(result, expect);
    }

    #[sealed_test(env = [("HOME", "/home/mg")])]
    fn default_manifest_parses() -> anyhow::Result<()> {
        let manifest: Manifest = DEFAULT_MANIFEST.parse()?;

        assert!(manifest.packages.is_some());
        assert!(manifest.dotfiles.is_some());
        assert!(manifest.ssh_keys.is_some());

        Ok(())
    }
}
