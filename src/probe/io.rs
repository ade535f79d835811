//! Probe file I/O
//!
//! Single-shot write and read against a probe path. Every fault is returned
//! as a [`ProbeError`]; the file handle is always dropped before the outcome
//! is logged.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{error, info};

use crate::core::{ProbeError, ProbeOp};

/// Create (or truncate) `path` and write `contents` to it
pub fn write_probe(path: &Path, contents: &str) -> Result<(), ProbeError> {
    info!("Creating probe file in ramfs-ns mount at {}...", path.display());

    let result = {
        let written = File::create(path).and_then(|mut file| {
            file.write_all(contents.as_bytes())?;
            file.flush()
        });
        written.map_err(|e| ProbeError::new(ProbeOp::Write, path, e))
    };

    report(&result);
    result
}

/// Read the full contents of `path`
pub fn read_probe(path: &Path) -> Result<String, ProbeError> {
    info!("Reading probe file in ramfs-ns mount at {}...", path.display());

    let result = {
        let mut contents = String::new();
        File::open(path)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map(|_| contents)
            .map_err(|e| ProbeError::new(ProbeOp::Read, path, e))
    };

    report(&result);
    result
}

fn report<T>(result: &Result<T, ProbeError>) {
    match result {
        Ok(_) => info!("SUCCESS"),
        Err(e) => error!("FAILURE: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{probe_path, PROBE_CONTENTS};
    use std::io::ErrorKind;

    #[test]
    fn test_write_then_read_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let path = probe_path(root.path(), 1234);

        write_probe(&path, "hello-probe").unwrap();
        assert_eq!(read_probe(&path).unwrap(), "hello-probe");
    }

    #[test]
    fn test_round_trip_default_contents() {
        let root = tempfile::tempdir().unwrap();
        let path = probe_path(root.path(), 1);

        write_probe(&path, PROBE_CONTENTS).unwrap();
        assert_eq!(read_probe(&path).unwrap(), PROBE_CONTENTS);
    }

    #[test]
    fn test_write_truncates_instead_of_appending() {
        let root = tempfile::tempdir().unwrap();
        let path = probe_path(root.path(), 99);

        write_probe(&path, "a much longer first payload").unwrap();
        write_probe(&path, "hello-probe").unwrap();
        write_probe(&path, "hello-probe").unwrap();
        assert_eq!(read_probe(&path).unwrap(), "hello-probe");
    }

    #[test]
    fn test_write_missing_parent_fails() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("no-such-dir").join("5");

        let err = write_probe(&path, "hello-probe").unwrap_err();
        assert_eq!(err.op, ProbeOp::Write);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_read_missing_file_fails() {
        let root = tempfile::tempdir().unwrap();
        let path = probe_path(root.path(), 4321);

        let err = read_probe(&path).unwrap_err();
        assert_eq!(err.op, ProbeOp::Read);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_read_directory_fails() {
        let root = tempfile::tempdir().unwrap();
        assert!(read_probe(root.path()).is_err());
    }
}
