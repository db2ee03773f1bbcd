// SPDX-FileCopyrightText: 2026 Rigup Contributors
// SPDX-License-Identifier: MIT

use rigup::{plan, probe, report, Executor, HostSystem, Manifest, ProbeContext, DEFAULT_MANIFEST};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use inquire::Confirm;
use std::{fs, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(about, override_usage = "\n  rigup [options]", version)]
struct Cli {
    /// Path to a manifest file to apply instead of the bundled default.
    #[arg(short, long, value_name = "path")]
    manifest: Option<PathBuf>,

    /// Show the planned actions without executing anything.
    #[arg(long)]
    dry_run: bool,

    /// Apply the plan without asking for confirmation.
    #[arg(short = 'y', long)]
    assume_yes: bool,
}

impl Cli {
    fn run(self) -> Result<()> {
        let manifest: Manifest = match &self.manifest {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("cannot read manifest at {}", path.display()))?
                .parse()?,
            None => DEFAULT_MANIFEST.parse()?,
        };

        let context = ProbeContext::from_env()?;
        let probed = probe(&context)?;
        let planned = plan(&manifest, &probed)?;

        if planned.is_empty() {
            info!("nothing to do: manifest declares no desired state");
            return Ok(());
        }

        if self.dry_run {
            for action in planned.actions() {
                println!("{action}");
            }
            return Ok(());
        }

        if !self.assume_yes {
            let proceed = Confirm::new(&format!("apply {} actions?", planned.len()))
                .with_default(true)
                .prompt()?;
            if !proceed {
                info!("aborted by operator");
                return Ok(());
            }
        }

        let system = HostSystem::new(probed.os, context.search_path.clone());
        let mut executor = Executor::new(system);
        let outcomes = executor.run(&planned, ProgressBar::new(planned.len() as u64))?;

        let summary = report(&outcomes);
        println!("{summary}");

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer().compact();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry().with(layer).with(filter).init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}
