// SPDX-FileCopyrightText: 2026 Rigup Contributors
// SPDX-License-Identifier: MIT

//! Declarative idempotent workstation bootstrap.
//!
//! Rigup reads a manifest describing the desired state of a machine, i.e.,
//! packages, dotfiles, user accounts, and SSH keys. It probes the host,
//! plans an ordered list of idempotent actions, executes them sequentially,
//! and reports what happened.
//!
//! # Pipeline
//!
//! Probe, plan, execute, report. Strictly sequential, no feedback loop.
//! Probing is read-only, planning is pure, and only the executor touches the
//! host. Re-running the pipeline is always safe, because every action's
//! precondition is re-checked at execution time: a satisfied action is
//! skipped instead of applied twice.

pub mod execute;
pub mod manifest;
pub mod path;
pub mod plan;
pub mod probe;
pub mod report;

pub use execute::{ActionOutcome, ExecuteError, Executor, HostSystem, Status, System, SystemError};
pub use manifest::{Manifest, ManifestError, DEFAULT_MANIFEST};
pub use plan::{plan, Action, ActionKind, Plan, PlanError};
pub use probe::{probe, OsFamily, PackageManagerKind, ProbeContext, ProbeError, ProbeResult};
pub use report::{report, Summary};
