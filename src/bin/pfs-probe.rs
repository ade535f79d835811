//! Sandboxed probe
//!
//! Executed by the pfs launcher inside its private mount namespace. Writes
//! the probe file under the ramfs mount, reads it back and exits 0 only if
//! the round trip returned the expected payload.

use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::{error, info};

use pfs_verify::probe::{
    identity_marker, read_probe, write_probe, ProbeSpec, VisibilityExpectation,
};
use pfs_verify::Verdict;

fn main() -> ExitCode {
    if let Err(e) = pfs_verify::init_tracing() {
        eprintln!("failed to initialize logging: {:#}", e);
    }

    match run() {
        Ok(()) => {
            println!("{}", Verdict::Pass);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Probe failed: {:#}", e);
            println!("{}", Verdict::Fail);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let spec = ProbeSpec::from_env().context("Failed to load probe configuration")?;

    let identity = spec.identity.resolve();
    let path = spec.path_for(identity);
    println!("{}", identity_marker(identity));
    info!(
        "Probe identity {} ({} pid), probe file {}",
        identity,
        spec.identity,
        path.display()
    );

    write_probe(&path, &spec.contents)?;
    let read = read_probe(&path);
    VisibilityExpectation::MustBeVisible.assess(&path, read, &spec.contents)?;

    info!("Probe round trip verified at {}", path.display());
    Ok(())
}
