// SPDX-FileCopyrightText: 2026 Rigup Contributors
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use crate::probe::OsFamily;

use std::path::PathBuf;

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine absolute path to user's SSH directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn ssh_dir() -> Result<PathBuf> {
    home_dir().map(|path| path.join(".ssh"))
}

/// Determine absolute path to another user's home directory.
///
/// Uses the conventional home root of the given OS family, i.e., "/home" for
/// Linux, and "/Users" for macOS. Does not check if the path returned
/// actually exists.
pub fn user_home_dir(os: OsFamily, user: impl AsRef<str>) -> PathBuf {
    let root = match os {
        OsFamily::Linux => "/home",
        OsFamily::MacOs => "/Users",
    };

    PathBuf::from(root).join(user.as_ref())
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case(OsFamily::Linux, "/home/mg"; "linux home root")]
    #[test_case(OsFamily::MacOs, "/Users/mg"; "macos home root")]
    #[test]
    fn user_home_dir_follows_os_convention(os: OsFamily, expect: &str) {
        assert_eq!(user_home_dir(os, "mg"), PathBuf::from(expect));
    }
}
