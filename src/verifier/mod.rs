//! Verifier module - the outside half of the isolation protocol
//!
//! Drives one verification run:
//! `Launching -> AwaitingExit -> CheckingExitCode -> ProbingOutsideVisibility -> Done`
//!
//! The same state machine serves both the plain and the privileged
//! verifier; only the `LaunchStrategy` differs.

pub mod report;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::HarnessConfig;
use crate::core::{HarnessError, Result, Verdict};
use crate::launcher::{run_launcher, LaunchOutcome, LaunchStrategy, StrategyKind};
use crate::probe::{parse_reported_identity, read_probe, ProbeSpec, VisibilityExpectation};

pub use report::{ReportFormat, VerificationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierState {
    Launching,
    AwaitingExit,
    CheckingExitCode,
    ProbingOutsideVisibility,
    Done(Verdict),
}

impl fmt::Display for VerifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifierState::Launching => write!(f, "launching"),
            VerifierState::AwaitingExit => write!(f, "awaiting_exit"),
            VerifierState::CheckingExitCode => write!(f, "checking_exit_code"),
            VerifierState::ProbingOutsideVisibility => write!(f, "probing_outside_visibility"),
            VerifierState::Done(verdict) => write!(f, "done({})", verdict),
        }
    }
}

/// Verifies that the launcher's ramfs namespace does not leak probe files
#[derive(Debug, Clone)]
pub struct IsolationVerifier {
    launcher: PathBuf,
    probe_command: PathBuf,
    probe: ProbeSpec,
    strategy: LaunchStrategy,
    timeout: Duration,
}

impl IsolationVerifier {
    /// Plain verifier: `<launcher> <probe_command>`
    pub fn new(
        launcher: impl Into<PathBuf>,
        probe_command: impl Into<PathBuf>,
        probe: ProbeSpec,
        timeout: Duration,
    ) -> Self {
        Self {
            launcher: launcher.into(),
            probe_command: probe_command.into(),
            probe,
            strategy: LaunchStrategy::Plain,
            timeout,
        }
    }

    /// Privileged verifier: the launcher runs through `wrapper -E` as `user`.
    /// Fails fast with `MissingEnv` when no user can be resolved.
    pub fn privileged(
        launcher: impl Into<PathBuf>,
        probe_command: impl Into<PathBuf>,
        probe: ProbeSpec,
        timeout: Duration,
        wrapper: impl Into<String>,
        user: Option<String>,
    ) -> Result<Self> {
        let user = non_blank(user).ok_or(HarnessError::MissingEnv("USER"))?;
        Ok(Self::new(launcher, probe_command, probe, timeout).with_strategy(
            LaunchStrategy::Elevated {
                wrapper: wrapper.into(),
                user,
            },
        ))
    }

    /// Build from configuration, checking every precondition before any spawn.
    /// `lookup` supplies `USER` and `PWD`.
    pub fn from_config<F>(config: &HarnessConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if config.require_unprivileged {
            ensure_unprivileged()?;
        }

        let probe_command = config.resolve_probe_command(lookup("PWD").as_deref())?;

        match config.strategy {
            StrategyKind::Plain => Ok(Self::new(
                config.launcher.clone(),
                probe_command,
                config.probe.clone(),
                config.timeout(),
            )),
            StrategyKind::Elevated => {
                // An explicit target user wins over $USER, unless it is blank
                let user = non_blank(config.target_user.clone())
                    .or_else(|| non_blank(lookup("USER")));
                Self::privileged(
                    config.launcher.clone(),
                    probe_command,
                    config.probe.clone(),
                    config.timeout(),
                    config.elevation_wrapper.clone(),
                    user,
                )
            }
        }
    }

    pub fn with_strategy(mut self, strategy: LaunchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> &LaunchStrategy {
        &self.strategy
    }

    /// Run the verification once. Never retries.
    pub async fn run(&self) -> VerificationReport {
        let mut report = VerificationReport::new(
            self.strategy.kind(),
            self.launcher.to_string_lossy().into_owned(),
        );

        let verdict = match self.execute(&mut report).await {
            Ok(()) => {
                report.record_pass();
                Verdict::Pass
            }
            Err(e) => {
                error!("Isolation verification failed: {}", e);
                report.record_failure(&e);
                Verdict::Fail
            }
        };
        self.enter(VerifierState::Done(verdict));

        report
    }

    async fn execute(&self, report: &mut VerificationReport) -> Result<()> {
        self.enter(VerifierState::Launching);
        let cmd = self
            .strategy
            .command(&self.launcher, &self.probe_command)
            .with_env(self.probe.to_env());
        info!(
            "Launching {} with probe {} ({} strategy)",
            self.launcher.display(),
            self.probe_command.display(),
            self.strategy.kind()
        );

        self.enter(VerifierState::AwaitingExit);
        let outcome = run_launcher(&cmd, self.timeout).await?;
        report.launcher_exit_code = outcome.status.code();
        echo_output(&outcome);

        self.enter(VerifierState::CheckingExitCode);
        if !outcome.is_success() {
            return Err(HarnessError::LauncherFailed {
                code: outcome.status.code(),
            });
        }

        self.enter(VerifierState::ProbingOutsideVisibility);
        let identity =
            parse_reported_identity(&outcome.stdout).ok_or(HarnessError::IdentityUnreported)?;
        let path = self.probe.path_for(identity);
        report.probe_identity = Some(identity);
        report.probe_path = Some(path.clone());

        let read = read_probe(&path);
        VisibilityExpectation::MustNotBeVisible.assess(&path, read, &self.probe.contents)
    }

    fn enter(&self, state: VerifierState) {
        debug!("Verifier state: {}", state);
    }
}

/// The outside context must be unprivileged, or it could see through the namespace
pub fn ensure_unprivileged() -> Result<()> {
    if nix::unistd::geteuid().is_root() {
        return Err(HarnessError::PrivilegedOutsideContext);
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn echo_output(outcome: &LaunchOutcome) {
    for line in outcome.stdout.lines().chain(outcome.stderr.lines()) {
        info!("launcher> {}", line);
    }
}
