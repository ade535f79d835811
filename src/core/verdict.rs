use serde::{Deserialize, Serialize};
use std::fmt;

/// Final outcome of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Process exit code for this verdict (0 = pass, 1 = fail)
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Pass => "SUCCESS",
            Verdict::Fail => "FAILURE",
        };
        write!(f, "{}", s)
    }
}
