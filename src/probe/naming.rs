//! Probe path derivation
//!
//! Both the sandboxed probe and the outside verifier go through
//! [`probe_path`], so they always agree on which file is "the" probe.

use std::path::{Path, PathBuf};

/// Mount point of the launcher's ramfs
pub const DEFAULT_MOUNT_ROOT: &str = "/var/lib/ramfs-ns";

/// Probe file path for a process identity: `<mount_root>/<identity>`
pub fn probe_path(mount_root: &Path, identity: u32) -> PathBuf {
    mount_root.join(identity.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_probe_path_layout() {
        let root = Path::new(DEFAULT_MOUNT_ROOT);
        assert_eq!(probe_path(root, 1234), PathBuf::from("/var/lib/ramfs-ns/1234"));
        assert_eq!(probe_path(root, 0), PathBuf::from("/var/lib/ramfs-ns/0"));
    }

    #[test]
    fn test_probe_path_is_deterministic() {
        let root = Path::new("/tmp/probe-root");
        assert_eq!(probe_path(root, 77), probe_path(root, 77));
    }

    #[test]
    fn test_probe_path_collision_free() {
        let root = Path::new(DEFAULT_MOUNT_ROOT);
        let mut ids: Vec<u32> = (0..2048).collect();
        ids.extend([
            9_999,
            10_000,
            32_768,
            4_194_303,
            4_194_304,
            u32::MAX / 2,
            u32::MAX - 1,
            u32::MAX,
        ]);

        let paths: HashSet<PathBuf> = ids.iter().map(|&id| probe_path(root, id)).collect();
        assert_eq!(paths.len(), ids.len());
    }

    #[test]
    fn test_probe_path_stays_under_root() {
        let root = Path::new(DEFAULT_MOUNT_ROOT);
        for id in [1, 10, 65_535, u32::MAX] {
            let path = probe_path(root, id);
            assert_eq!(path.parent(), Some(root));
        }
    }
}
