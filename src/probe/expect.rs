//! Visibility assertions over a probe read
//!
//! A successful read means opposite things depending on where it happens:
//! inside the namespace it is the round trip working, outside it is a leak.

use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use crate::core::{HarnessError, ProbeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityExpectation {
    /// Read must succeed and return the expected payload
    MustBeVisible,
    /// Read must fault before any bytes come back (not found, permission denied)
    MustNotBeVisible,
}

impl VisibilityExpectation {
    /// Judge a read of the probe file at `path` against this expectation
    pub fn assess(
        self,
        path: &Path,
        read: std::result::Result<String, ProbeError>,
        expected: &str,
    ) -> Result<()> {
        match (self, read) {
            (VisibilityExpectation::MustBeVisible, Ok(found)) if found == expected => Ok(()),
            (VisibilityExpectation::MustBeVisible, Ok(found)) => {
                Err(HarnessError::RoundTripMismatch {
                    path: path.to_path_buf(),
                    found,
                })
            }
            (VisibilityExpectation::MustBeVisible, Err(e)) => Err(e.into()),
            (VisibilityExpectation::MustNotBeVisible, Ok(found)) => {
                Err(HarnessError::IsolationBreach {
                    path: path.to_path_buf(),
                    contents_match: found == expected,
                })
            }
            // The bytes were read and only the UTF-8 decode failed: the file is visible
            (VisibilityExpectation::MustNotBeVisible, Err(e))
                if e.kind() == ErrorKind::InvalidData =>
            {
                Err(HarnessError::IsolationBreach {
                    path: path.to_path_buf(),
                    contents_match: false,
                })
            }
            (VisibilityExpectation::MustNotBeVisible, Err(e)) => {
                match e.kind() {
                    ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                        info!("Probe file not visible outside namespace ({})", e.kind());
                    }
                    kind => {
                        warn!(
                            "Probe file not readable outside namespace, unusual fault ({}): {}",
                            kind, e
                        );
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProbeOp;
    use crate::probe::{probe_path, read_probe};
    use std::path::PathBuf;

    fn fault(kind: ErrorKind) -> std::result::Result<String, ProbeError> {
        Err(ProbeError::new(
            ProbeOp::Read,
            "/var/lib/ramfs-ns/1",
            std::io::Error::from(kind),
        ))
    }

    #[test]
    fn test_must_be_visible_matching() {
        let res = VisibilityExpectation::MustBeVisible.assess(
            Path::new("/p/1"),
            Ok("hello-probe".into()),
            "hello-probe",
        );
        assert!(res.is_ok());
    }

    #[test]
    fn test_must_be_visible_mismatch() {
        let res = VisibilityExpectation::MustBeVisible.assess(
            Path::new("/p/1"),
            Ok("other".into()),
            "hello-probe",
        );
        match res {
            Err(HarnessError::RoundTripMismatch { path, found }) => {
                assert_eq!(path, PathBuf::from("/p/1"));
                assert_eq!(found, "other");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_must_be_visible_fault_fails() {
        let res = VisibilityExpectation::MustBeVisible.assess(
            Path::new("/p/1"),
            fault(ErrorKind::NotFound),
            "x",
        );
        assert_eq!(res.unwrap_err().kind(), "probe_io");
    }

    #[test]
    fn test_must_not_be_visible_fault_passes() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::PermissionDenied,
            ErrorKind::Other,
        ] {
            assert!(VisibilityExpectation::MustNotBeVisible
                .assess(Path::new("/p/1"), fault(kind), "hello-probe")
                .is_ok());
        }
    }

    #[test]
    fn test_must_not_be_visible_read_is_breach() {
        let res = VisibilityExpectation::MustNotBeVisible.assess(
            Path::new("/p/2"),
            Ok("hello-probe".into()),
            "hello-probe",
        );
        match res {
            Err(HarnessError::IsolationBreach {
                path,
                contents_match,
            }) => {
                assert_eq!(path, PathBuf::from("/p/2"));
                assert!(contents_match);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_must_not_be_visible_foreign_contents_still_breach() {
        let res = VisibilityExpectation::MustNotBeVisible.assess(
            Path::new("/p/3"),
            Ok("stale".into()),
            "hello-probe",
        );
        assert!(matches!(
            res,
            Err(HarnessError::IsolationBreach {
                contents_match: false,
                ..
            })
        ));
    }

    #[test]
    fn test_must_not_be_visible_undecodable_file_is_breach() {
        let root = tempfile::tempdir().unwrap();
        let path = probe_path(root.path(), 4242);
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let res = VisibilityExpectation::MustNotBeVisible.assess(
            &path,
            read_probe(&path),
            "hello-probe",
        );
        match res {
            Err(HarnessError::IsolationBreach {
                path: found,
                contents_match,
            }) => {
                assert_eq!(found, path);
                assert!(!contents_match);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_must_not_be_visible_missing_file_passes() {
        let root = tempfile::tempdir().unwrap();
        let path = probe_path(root.path(), 4243);

        assert!(VisibilityExpectation::MustNotBeVisible
            .assess(&path, read_probe(&path), "hello-probe")
            .is_ok());
    }
}
