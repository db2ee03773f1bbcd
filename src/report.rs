// SPDX-FileCopyrightText: 2026 Rigup Contributors
// SPDX-License-Identifier: MIT

//! Run summary reporting.
//!
//! Pure aggregation of per-action outcomes into a single [`Summary`]. The
//! summary always carries the applied/skipped/failed counts, every failure
//! with the underlying tool's error text verbatim, and the full text of any
//! credential generated during the run.

use crate::execute::{ActionOutcome, Status};

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Aggregated result of a bootstrap run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,

    /// Failed action descriptions paired with their reasons.
    pub failures: Vec<(String, String)>,

    /// Credentials generated during the run, verbatim.
    pub credentials: Vec<String>,
}

/// Aggregate per-action outcomes into a run summary.
pub fn report(outcomes: &[ActionOutcome]) -> Summary {
    let mut summary = Summary::default();

    for outcome in outcomes {
        match &outcome.status {
            Status::Applied { credential } => {
                summary.applied += 1;
                if let Some(credential) = credential {
                    summary.credentials.push(credential.clone());
                }
            }
            Status::Skipped => summary.skipped += 1,
            Status::Failed { reason } => {
                summary.failed += 1;
                summary
                    .failures
                    .push((outcome.description.clone(), reason.clone()));
            }
        }
    }

    summary
}

impl Display for Summary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(
            fmt,
            "applied {}, skipped {}, failed {}",
            self.applied, self.skipped, self.failed
        )?;

        for (description, reason) in &self.failures {
            writeln!(fmt, "failed: {description}")?;
            writeln!(fmt, "  {reason}")?;
        }

        for credential in &self.credentials {
            writeln!(fmt, "generated credential:")?;
            writeln!(fmt, "{credential}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcomes() -> Vec<ActionOutcome> {
        vec![
            ActionOutcome {
                description: "generate ed25519 ssh key at /home/mg/.ssh/id_ed25519".into(),
                status: Status::Applied {
                    credential: Some("ssh-ed25519 AAAA mg@host".into()),
                },
            },
            ActionOutcome {
                description: "install package ghost with yum".into(),
                status: Status::Failed {
                    reason: "no package ghost available".into(),
                },
            },
            ActionOutcome {
                description: "create user mg".into(),
                status: Status::Skipped,
            },
        ]
    }

    #[test]
    fn report_counts_every_status() {
        let summary = report(&outcomes());

        assert_eq!(
            (summary.applied, summary.skipped, summary.failed),
            (1, 1, 1)
        );
        assert_eq!(summary.credentials, vec!["ssh-ed25519 AAAA mg@host"]);
        assert_eq!(
            summary.failures,
            vec![(
                "install package ghost with yum".to_string(),
                "no package ghost available".to_string(),
            )]
        );
    }

    #[test]
    fn summary_display_surfaces_failures_and_credentials() {
        let rendered = report(&outcomes()).to_string();

        assert!(rendered.contains("applied 1, skipped 1, failed 1"));
        assert!(rendered.contains("install package ghost with yum"));
        assert!(rendered.contains("no package ghost available"));
        assert!(rendered.contains("ssh-ed25519 AAAA mg@host"));
    }
}
