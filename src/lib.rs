//! pfs-verify: black-box isolation checks for the pfs launcher
//!
//! The pfs launcher runs a command inside a private mount namespace backed by
//! a ramfs mounted at `/var/lib/ramfs-ns`. This crate checks that files the
//! command writes there stay invisible to the outside world.
//!
//! - **probe**: probe path naming, payload, file I/O and visibility assertions
//! - **launcher**: plain / elevated launcher invocation with a bounded wait
//! - **verifier**: the outside verification state machine and its report
//! - **config**: layered configuration (defaults, TOML file, environment)
//!
//! Two binaries sit on top: `pfs-probe` runs inside the sandbox and
//! `pfs-verify` drives the launcher from outside.

pub mod config;
pub mod core;
pub mod launcher;
pub mod probe;
pub mod verifier;

pub use config::HarnessConfig;
pub use crate::core::{HarnessError, ProbeError, Result, Verdict};
pub use launcher::{LaunchStrategy, StrategyKind};
pub use probe::{IdentitySource, ProbeSpec, VisibilityExpectation};
pub use verifier::{IsolationVerifier, ReportFormat, VerificationReport};

/// Install the `tracing` subscriber used by both binaries (logs go to stderr)
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pfs_verify=info".parse()?)
                .add_directive("pfs_probe=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
