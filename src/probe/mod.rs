//! Probe module - the shared half of the isolation protocol
//!
//! Everything both sides of the namespace boundary must agree on lives here:
//! - How a process identity maps to a probe path
//! - The payload written into the probe file
//! - Write/read operations against the probe file
//! - The two assertion modes applied to a read (visible vs. not visible)
//!
//! The probe module does NOT:
//! - Spawn the launcher
//! - Decide the final verdict of a verification run

pub mod expect;
pub mod io;
pub mod naming;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::{HarnessError, Result};

pub use expect::VisibilityExpectation;
pub use io::{read_probe, write_probe};
pub use naming::{probe_path, DEFAULT_MOUNT_ROOT};

/// Payload written by the sandboxed probe and expected back on read
pub const PROBE_CONTENTS: &str = "pfs ramfs-ns isolation probe\n";

/// Prefix of the line the probe prints on stdout to report its identity
pub const IDENTITY_MARKER: &str = "pfs-probe identity=";

pub const ENV_MOUNT_ROOT: &str = "PFS_MOUNT_ROOT";
pub const ENV_PROBE_CONTENTS: &str = "PFS_PROBE_CONTENTS";
pub const ENV_PROBE_IDENTITY: &str = "PFS_PROBE_IDENTITY";

/// Which process id names the probe file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// The probe's own pid
    #[default]
    Own,
    /// The pid of the probe's parent (the launcher)
    Parent,
}

impl IdentitySource {
    /// Resolve the identity for the calling process
    pub fn resolve(self) -> u32 {
        let pid = match self {
            IdentitySource::Own => nix::unistd::getpid(),
            IdentitySource::Parent => nix::unistd::getppid(),
        };
        pid.as_raw() as u32
    }
}

impl FromStr for IdentitySource {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "own" | "self" | "pid" => Ok(IdentitySource::Own),
            "parent" | "ppid" => Ok(IdentitySource::Parent),
            other => Err(HarnessError::Config(format!(
                "unknown probe identity source {:?} (expected \"own\" or \"parent\")",
                other
            ))),
        }
    }
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentitySource::Own => write!(f, "own"),
            IdentitySource::Parent => write!(f, "parent"),
        }
    }
}

/// Probe parameters shared by the sandboxed probe and the verifier
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSpec {
    /// Root of the ramfs mount the probe file lives in
    pub mount_root: PathBuf,
    /// Expected payload
    pub contents: String,
    /// Identity convention
    pub identity: IdentitySource,
}

impl Default for ProbeSpec {
    fn default() -> Self {
        Self {
            mount_root: PathBuf::from(DEFAULT_MOUNT_ROOT),
            contents: PROBE_CONTENTS.to_string(),
            identity: IdentitySource::default(),
        }
    }
}

impl ProbeSpec {
    /// Build from environment-style lookups, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut spec = Self::default();
        if let Some(root) = lookup(ENV_MOUNT_ROOT) {
            spec.mount_root = PathBuf::from(root);
        }
        if let Some(contents) = lookup(ENV_PROBE_CONTENTS) {
            spec.contents = contents;
        }
        if let Some(identity) = lookup(ENV_PROBE_IDENTITY) {
            spec.identity = identity.parse()?;
        }
        spec.validate()?;
        Ok(spec)
    }

    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn validate(&self) -> Result<()> {
        if self.contents.is_empty() {
            return Err(HarnessError::Config(
                "probe contents must not be empty".to_string(),
            ));
        }
        if !self.mount_root.is_absolute() {
            return Err(HarnessError::Config(format!(
                "mount root {} must be an absolute path",
                self.mount_root.display()
            )));
        }
        Ok(())
    }

    /// Environment forwarded to the launcher so the probe sees the same spec
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_MOUNT_ROOT, self.mount_root.to_string_lossy().into_owned()),
            (ENV_PROBE_CONTENTS, self.contents.clone()),
            (ENV_PROBE_IDENTITY, self.identity.to_string()),
        ]
    }

    pub fn path_for(&self, identity: u32) -> PathBuf {
        probe_path(Path::new(&self.mount_root), identity)
    }
}

/// Line the probe prints to report the identity it used
pub fn identity_marker(identity: u32) -> String {
    format!("{}{}", IDENTITY_MARKER, identity)
}

/// Find the identity reported by the probe in captured output (last marker wins)
pub fn parse_reported_identity(output: &str) -> Option<u32> {
    output
        .lines()
        .rev()
        .filter_map(|line| line.trim().strip_prefix(IDENTITY_MARKER))
        .find_map(|value| value.trim().parse::<u32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_probe_contents_non_empty() {
        assert!(!PROBE_CONTENTS.is_empty());
    }

    #[test]
    fn test_spec_defaults() {
        let spec = ProbeSpec::from_lookup(lookup(&[])).unwrap();
        assert_eq!(spec, ProbeSpec::default());
        assert_eq!(spec.path_for(1), PathBuf::from("/var/lib/ramfs-ns/1"));
    }

    #[test]
    fn test_spec_env_round_trip() {
        let spec = ProbeSpec {
            mount_root: PathBuf::from("/tmp/ramfs-test"),
            contents: "hello-probe".to_string(),
            identity: IdentitySource::Parent,
        };
        let env = spec.to_env();
        let pairs: Vec<(&str, &str)> = env.iter().map(|(k, v)| (*k, v.as_str())).collect();

        assert_eq!(ProbeSpec::from_lookup(lookup(&pairs)).unwrap(), spec);
    }

    #[test]
    fn test_spec_rejects_empty_contents() {
        let err = ProbeSpec::from_lookup(lookup(&[(ENV_PROBE_CONTENTS, "")])).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_spec_rejects_relative_root() {
        assert!(ProbeSpec::from_lookup(lookup(&[(ENV_MOUNT_ROOT, "ramfs-ns")])).is_err());
    }

    #[test]
    fn test_identity_source_parse() {
        assert_eq!("own".parse::<IdentitySource>().unwrap(), IdentitySource::Own);
        assert_eq!(" Parent ".parse::<IdentitySource>().unwrap(), IdentitySource::Parent);
        assert!("grandparent".parse::<IdentitySource>().is_err());
    }

    #[test]
    fn test_identity_resolves_to_current_process() {
        assert_eq!(IdentitySource::Own.resolve(), std::process::id());
        assert_eq!(
            IdentitySource::Parent.resolve(),
            std::os::unix::process::parent_id()
        );
    }

    #[test]
    fn test_parse_reported_identity() {
        let output = format!(
            "launcher: mounting ramfs\n{}\nprobe done\n",
            identity_marker(4242)
        );
        assert_eq!(parse_reported_identity(&output), Some(4242));
    }

    #[test]
    fn test_parse_reported_identity_last_marker_wins() {
        let output = format!("{}\n{}\n", identity_marker(1), identity_marker(2));
        assert_eq!(parse_reported_identity(&output), Some(2));
    }

    #[test]
    fn test_parse_reported_identity_missing_or_garbled() {
        assert_eq!(parse_reported_identity("nothing here\n"), None);
        assert_eq!(parse_reported_identity("pfs-probe identity=abc\n"), None);
    }
}
