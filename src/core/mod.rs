pub mod error;
pub mod verdict;

pub use error::{HarnessError, ProbeError, ProbeOp, Result};
pub use verdict::Verdict;
