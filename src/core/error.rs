//! Error types for the harness
//!
//! `ProbeError` covers a single probe file operation. `HarnessError` covers
//! everything the verifier can trip over, one variant per broken invariant so
//! the report says *which* check failed.

use std::path::PathBuf;
use thiserror::Error;

/// Probe file operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOp {
    Write,
    Read,
}

impl std::fmt::Display for ProbeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOp::Write => write!(f, "write"),
            ProbeOp::Read => write!(f, "read"),
        }
    }
}

/// I/O fault on a probe file
#[derive(Debug, Error)]
#[error("failed to {op} probe file {}: {source}", .path.display())]
pub struct ProbeError {
    pub op: ProbeOp,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl ProbeError {
    pub fn new(op: ProbeOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> std::io::ErrorKind {
        self.source.kind()
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Malformed configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Required environment value is absent
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// The outside context must not run as root
    #[error("refusing to verify from a privileged context (euid 0); run as an unprivileged user")]
    PrivilegedOutsideContext,

    /// Launcher could not be spawned at all
    #[error("failed to spawn launcher {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Launcher did not exit within the bounded wait
    #[error("launcher did not exit within {secs}s and was killed")]
    Timeout { secs: u64 },

    /// Launcher exited non-zero or was killed by a signal
    #[error("launcher exited with {}", describe_exit(.code))]
    LauncherFailed { code: Option<i32> },

    /// Probe never reported which identity it used
    #[error("sandboxed probe did not report its identity")]
    IdentityUnreported,

    /// Probe file was readable but held the wrong payload
    #[error("probe file {} holds unexpected contents {found:?}", .path.display())]
    RoundTripMismatch { path: PathBuf, found: String },

    /// Probe file leaked out of the namespace
    #[error(
        "probe file {} is visible outside the namespace{}",
        .path.display(),
        breach_suffix(.contents_match)
    )]
    IsolationBreach { path: PathBuf, contents_match: bool },

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl HarnessError {
    /// Stable snake_case name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Config(_) => "config",
            HarnessError::MissingEnv(_) => "missing_env",
            HarnessError::PrivilegedOutsideContext => "privileged_outside_context",
            HarnessError::Spawn { .. } => "spawn",
            HarnessError::Timeout { .. } => "timeout",
            HarnessError::LauncherFailed { .. } => "launcher_failed",
            HarnessError::IdentityUnreported => "identity_unreported",
            HarnessError::RoundTripMismatch { .. } => "round_trip_mismatch",
            HarnessError::IsolationBreach { .. } => "isolation_breach",
            HarnessError::Probe(_) => "probe_io",
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

fn breach_suffix(contents_match: &bool) -> &'static str {
    if *contents_match {
        " with matching contents"
    } else {
        ""
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
