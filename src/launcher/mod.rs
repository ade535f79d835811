//! Launcher module - invoking the external pfs launcher
//!
//! This module provides:
//! - `CommandSpec`: a program + args + env description of one invocation
//! - `LaunchStrategy`: plain vs. privilege-elevated launcher invocation
//! - `run_launcher`: single-shot execution with a bounded wait
//!
//! The launcher module does NOT:
//! - Interpret probe results or decide verdicts
//! - Retry a failed or hung launcher

pub mod process;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::core::HarnessError;

pub use process::run_launcher;

/// Command specification for execution
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    /// Program path or name
    pub program: String,
    /// Arguments to the program
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Convert to a vector of strings (program + args)
    pub fn to_vec(&self) -> Vec<String> {
        let mut v = vec![self.program.clone()];
        v.extend(self.args.clone());
        v
    }
}

/// Which launcher invocation a run uses, before the target user is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Plain,
    Elevated,
}

impl FromStr for StrategyKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(StrategyKind::Plain),
            "elevated" | "privileged" | "sudo" => Ok(StrategyKind::Elevated),
            other => Err(HarnessError::Config(format!(
                "unknown launch strategy {:?} (expected \"plain\" or \"elevated\")",
                other
            ))),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Plain => write!(f, "plain"),
            StrategyKind::Elevated => write!(f, "elevated"),
        }
    }
}

/// Resolved launcher invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// `<launcher> <probe>`
    Plain,
    /// `<wrapper> -E <launcher> -c <probe> -u <user>`
    Elevated { wrapper: String, user: String },
}

impl LaunchStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            LaunchStrategy::Plain => StrategyKind::Plain,
            LaunchStrategy::Elevated { .. } => StrategyKind::Elevated,
        }
    }

    /// Build the invocation that makes `launcher` run `probe` in a namespace
    pub fn command(&self, launcher: &Path, probe: &Path) -> CommandSpec {
        let launcher = launcher.to_string_lossy().into_owned();
        let probe = probe.to_string_lossy().into_owned();

        match self {
            LaunchStrategy::Plain => CommandSpec::new(launcher).with_args([probe]),
            LaunchStrategy::Elevated { wrapper, user } => CommandSpec::new(wrapper.clone())
                .with_args([
                    "-E".to_string(),
                    launcher,
                    "-c".to_string(),
                    probe,
                    "-u".to_string(),
                    user.clone(),
                ]),
        }
    }
}

/// Exit status of the launcher process (raw, no verdict interpretation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Exited normally with given exit code
    Exited(i32),
    /// Killed by signal
    Signaled(i32),
}

impl RunStatus {
    /// Check if execution was successful (exited with code 0)
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Exited(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            RunStatus::Exited(code) => Some(*code),
            RunStatus::Signaled(_) => None,
        }
    }
}

/// Outcome of one launcher run
#[derive(Debug)]
pub struct LaunchOutcome {
    /// Pid of the spawned launcher (or elevation wrapper)
    pub pid: Option<u32>,
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
}

impl LaunchOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
