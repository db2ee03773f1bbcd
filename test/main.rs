// SPDX-FileCopyrightText: 2026 Rigup Contributors
// SPDX-License-Identifier: MIT

//! Full pipeline coverage: manifest parsing, planning, execution over an
//! in-memory host, and reporting.

use rigup::{
    plan, probe, report, Executor, Manifest, OsFamily, PackageManagerKind, ProbeContext,
    ProbeError, ProbeResult, Status, System, SystemError,
};

use indicatif::ProgressBar;
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

/// In-memory stand-in for a real host.
#[derive(Debug, Default)]
pub(crate) struct MemoryHost {
    pub(crate) packages: BTreeSet<String>,
    pub(crate) users: BTreeSet<String>,
    pub(crate) files: BTreeMap<PathBuf, String>,
}

impl System for MemoryHost {
    fn binary_exists(&self, _name: &str) -> bool {
        true
    }

    fn package_installed(
        &self,
        _manager: PackageManagerKind,
        name: &str,
    ) -> Result<bool, SystemError> {
        Ok(self.packages.contains(name))
    }

    fn install_package_manager(&mut self, _manager: PackageManagerKind) -> Result<(), SystemError> {
        Ok(())
    }

    fn install_package(
        &mut self,
        _manager: PackageManagerKind,
        name: &str,
        _version: Option<&str>,
    ) -> Result<(), SystemError> {
        self.packages.insert(name.to_string());
        Ok(())
    }

    fn user_exists(&self, name: &str) -> Result<bool, SystemError> {
        Ok(self.users.contains(name))
    }

    fn create_user(&mut self, name: &str, _groups: &[String]) -> Result<(), SystemError> {
        self.users.insert(name.to_string());
        Ok(())
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn contents_match(&self, source: &Path, target: &Path) -> Result<bool, SystemError> {
        Ok(self.files.get(source) == self.files.get(target))
    }

    fn copy_file(
        &mut self,
        source: &Path,
        target: &Path,
        _owner: Option<&str>,
    ) -> Result<(), SystemError> {
        let contents = self.files.get(source).cloned().ok_or_else(|| {
            SystemError::Syscall(std::io::Error::other(format!(
                "no such file {}",
                source.display()
            )))
        })?;
        self.files.insert(target.to_path_buf(), contents);

        Ok(())
    }

    fn generate_ssh_key(
        &mut self,
        path: &Path,
        algorithm: &str,
        comment: Option<&str>,
    ) -> Result<(), SystemError> {
        self.files.insert(path.to_path_buf(), "private key".into());
        self.files.insert(
            path.with_extension("pub"),
            format!("ssh-{algorithm} AAAA {}", comment.unwrap_or("nobody@nowhere")),
        );

        Ok(())
    }

    fn read_public_key(&self, path: &Path) -> Result<String, SystemError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| SystemError::Syscall(std::io::Error::other("missing public key")))
    }

    fn home_writable(&self) -> Result<(), SystemError> {
        Ok(())
    }
}

fn scenario_manifest() -> Manifest {
    indoc! {r#"
        [[package]]
        name = "vim"

        [[user]]
        name = "mg"

        [[dotfile]]
        source = "vimrc"
        target = "~mg/.vimrc"
    "#}
    .parse()
    .expect("scenario manifest must parse")
}

fn linux_yum_probe() -> ProbeResult {
    ProbeResult {
        os: OsFamily::Linux,
        package_manager: Some(PackageManagerKind::Yum),
        users: BTreeSet::new(),
        ssh_public_keys: Vec::new(),
    }
}

#[test]
fn fresh_host_applies_everything_then_second_run_skips() {
    let manifest = scenario_manifest();
    let probed = linux_yum_probe();
    let planned = plan(&manifest, &probed).unwrap();

    assert_eq!(
        planned
            .actions()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        vec![
            "install package vim with yum",
            "create user mg",
            "copy vimrc to /home/mg/.vimrc",
        ],
    );

    let mut host = MemoryHost::default();
    host.files
        .insert(PathBuf::from("vimrc"), "set nocompatible".into());
    let mut executor = Executor::new(host);

    let first = report(&executor.run(&planned, ProgressBar::hidden()).unwrap());
    assert_eq!((first.applied, first.skipped, first.failed), (3, 0, 0));

    // Unchanged host: a second pass over the same manifest is all skips.
    let planned_again = plan(&manifest, &probed).unwrap();
    assert_eq!(planned, planned_again);

    let second = report(&executor.run(&planned_again, ProgressBar::hidden()).unwrap());
    assert_eq!((second.applied, second.skipped, second.failed), (0, 3, 0));
}

#[test]
fn generated_credentials_reach_the_summary() {
    let manifest: Manifest = indoc! {r#"
        [[ssh_key]]
        path = "/home/mg/.ssh/id_ed25519"
        comment = "mg@workstation"
    "#}
    .parse()
    .unwrap();

    let planned = plan(&manifest, &linux_yum_probe()).unwrap();
    let mut executor = Executor::new(MemoryHost::default());

    let summary = report(&executor.run(&planned, ProgressBar::hidden()).unwrap());

    assert_eq!((summary.applied, summary.skipped, summary.failed), (1, 0, 0));
    assert_eq!(summary.credentials, vec!["ssh-ed25519 AAAA mg@workstation"]);
}

#[test]
fn failed_actions_do_not_block_the_rest() {
    let manifest = scenario_manifest();
    let planned = plan(&manifest, &linux_yum_probe()).unwrap();

    // The vimrc source is missing, so the copy fails, but everything planned
    // before it still applies.
    let mut executor = Executor::new(MemoryHost::default());
    let outcomes = executor.run(&planned, ProgressBar::hidden()).unwrap();

    assert_eq!(outcomes[0].status, Status::Applied { credential: None });
    assert_eq!(outcomes[1].status, Status::Applied { credential: None });
    assert!(matches!(outcomes[2].status, Status::Failed { .. }));

    let summary = report(&outcomes);
    assert_eq!((summary.applied, summary.skipped, summary.failed), (2, 0, 1));
    assert!(summary.failures[0].1.contains("no such file vimrc"));
}

#[test]
fn unsupported_platform_halts_before_any_side_effect() {
    let context = ProbeContext {
        os_name: "plan9".into(),
        search_path: Vec::new(),
        passwd_file: PathBuf::from("/etc/passwd"),
        users_dir: PathBuf::from("/Users"),
        ssh_dir: PathBuf::from("/nonexistent/.ssh"),
    };

    let error = probe(&context).unwrap_err();

    assert!(matches!(error, ProbeError::UnsupportedPlatform { .. }));
}
