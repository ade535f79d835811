//! Harness configuration
//!
//! Layered: built-in defaults, then an optional TOML file named by
//! `PFS_CONFIG`, then `PFS_*` environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{HarnessError, Result};
use crate::launcher::StrategyKind;
use crate::probe::{
    IdentitySource, ProbeSpec, ENV_MOUNT_ROOT, ENV_PROBE_CONTENTS, ENV_PROBE_IDENTITY,
};
use crate::verifier::ReportFormat;

pub const ENV_CONFIG: &str = "PFS_CONFIG";
pub const ENV_LAUNCHER: &str = "PFS_LAUNCHER";
pub const ENV_PROBE_COMMAND: &str = "PFS_PROBE_COMMAND";
pub const ENV_STRATEGY: &str = "PFS_STRATEGY";
pub const ENV_ELEVATION_WRAPPER: &str = "PFS_ELEVATION_WRAPPER";
pub const ENV_TARGET_USER: &str = "PFS_TARGET_USER";
pub const ENV_TIMEOUT_SECS: &str = "PFS_TIMEOUT_SECS";
pub const ENV_REQUIRE_UNPRIVILEGED: &str = "PFS_REQUIRE_UNPRIVILEGED";
pub const ENV_REPORT: &str = "PFS_REPORT";

/// Name of the sandboxed probe binary, looked up next to the verifier
pub const PROBE_BINARY_NAME: &str = "pfs-probe";

/// Verifier configuration
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Path to the pfs launcher executable
    pub launcher: PathBuf,
    /// Probe executable (None = `pfs-probe` next to the running binary)
    pub probe_command: Option<PathBuf>,
    /// Probe parameters forwarded to the sandboxed child
    pub probe: ProbeSpec,
    pub strategy: StrategyKind,
    /// Privilege-elevation wrapper for the elevated strategy
    pub elevation_wrapper: String,
    /// User the launcher runs the probe as (elevated strategy; default `$USER`)
    pub target_user: Option<String>,
    /// Bounded wait for the launcher in seconds (default: 30)
    pub timeout_secs: u64,
    /// Refuse to verify from an euid 0 outside context
    pub require_unprivileged: bool,
    pub report: ReportFormat,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            launcher: PathBuf::from("./bin/pfs"),
            probe_command: None,
            probe: ProbeSpec::default(),
            strategy: StrategyKind::Plain,
            elevation_wrapper: "sudo".to_string(),
            target_user: None,
            timeout_secs: 30,
            require_unprivileged: true,
            report: ReportFormat::Text,
        }
    }
}

/// Raw TOML configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    launcher: Option<PathBuf>,
    probe_command: Option<PathBuf>,
    mount_root: Option<PathBuf>,
    probe_contents: Option<String>,
    identity: Option<IdentitySource>,
    strategy: Option<StrategyKind>,
    elevation_wrapper: Option<String>,
    target_user: Option<String>,
    timeout_secs: Option<u64>,
    require_unprivileged: Option<bool>,
    report: Option<ReportFormat>,
}

impl HarnessConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for every environment variable
    pub fn load<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_CONFIG) {
            let raw = read_raw_config(Path::new(&path))?;
            config.apply_raw(raw);
        }

        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults (no environment)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| HarnessError::Config(format!("malformed config: {}", e)))?;
        let mut config = Self::default();
        config.apply_raw(raw);
        config.validate()?;
        Ok(config)
    }

    fn apply_raw(&mut self, raw: RawConfig) {
        if let Some(v) = raw.launcher {
            self.launcher = v;
        }
        if raw.probe_command.is_some() {
            self.probe_command = raw.probe_command;
        }
        if let Some(v) = raw.mount_root {
            self.probe.mount_root = v;
        }
        if let Some(v) = raw.probe_contents {
            self.probe.contents = v;
        }
        if let Some(v) = raw.identity {
            self.probe.identity = v;
        }
        if let Some(v) = raw.strategy {
            self.strategy = v;
        }
        if let Some(v) = raw.elevation_wrapper {
            self.elevation_wrapper = v;
        }
        if raw.target_user.is_some() {
            self.target_user = raw.target_user;
        }
        if let Some(v) = raw.timeout_secs {
            self.timeout_secs = v;
        }
        if let Some(v) = raw.require_unprivileged {
            self.require_unprivileged = v;
        }
        if let Some(v) = raw.report {
            self.report = v;
        }
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_LAUNCHER) {
            self.launcher = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_PROBE_COMMAND) {
            self.probe_command = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_MOUNT_ROOT) {
            self.probe.mount_root = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_PROBE_CONTENTS) {
            self.probe.contents = v;
        }
        if let Some(v) = lookup(ENV_PROBE_IDENTITY) {
            self.probe.identity = v.parse()?;
        }
        if let Some(v) = lookup(ENV_STRATEGY) {
            self.strategy = v.parse()?;
        }
        if let Some(v) = lookup(ENV_ELEVATION_WRAPPER) {
            self.elevation_wrapper = v;
        }
        if let Some(v) = lookup(ENV_TARGET_USER) {
            self.target_user = Some(v);
        }
        if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = v.trim().parse().map_err(|_| {
                HarnessError::Config(format!(
                    "{} must be a whole number of seconds, got {:?}",
                    ENV_TIMEOUT_SECS, v
                ))
            })?;
        }
        if let Some(v) = lookup(ENV_REQUIRE_UNPRIVILEGED) {
            self.require_unprivileged = parse_bool(ENV_REQUIRE_UNPRIVILEGED, &v)?;
        }
        if let Some(v) = lookup(ENV_REPORT) {
            self.report = v.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.probe.validate()?;
        if self.timeout_secs == 0 {
            return Err(HarnessError::Config(
                "timeout must be at least one second".to_string(),
            ));
        }
        if self.elevation_wrapper.trim().is_empty() {
            return Err(HarnessError::Config(
                "elevation wrapper must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute path of the probe executable handed to the launcher.
    /// Relative paths are resolved against `pwd` (normally `$PWD`).
    pub fn resolve_probe_command(&self, pwd: Option<&str>) -> Result<PathBuf> {
        let probe = match &self.probe_command {
            Some(path) => path.clone(),
            None => {
                let exe = std::env::current_exe().map_err(|e| {
                    HarnessError::Config(format!("cannot locate running executable: {}", e))
                })?;
                exe.with_file_name(PROBE_BINARY_NAME)
            }
        };

        if probe.is_absolute() {
            return Ok(probe);
        }

        let base = match pwd {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().map_err(|_| HarnessError::MissingEnv("PWD"))?,
        };
        Ok(base.join(probe))
    }
}

fn read_raw_config(path: &Path) -> Result<RawConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        HarnessError::Config(format!("cannot read config file {}: {}", path.display(), e))
    })?;
    toml::from_str(&content).map_err(|e| {
        HarnessError::Config(format!("malformed config file {}: {}", path.display(), e))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HarnessError::Config(format!(
            "{} must be a boolean, got {:?}",
            key, value
        ))),
    }
}
