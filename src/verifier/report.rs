//! Verification report
//!
//! One report per run, rendered either as a short text summary or as JSON.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::{HarnessError, Verdict};
use crate::launcher::StrategyKind;

/// Output format of the final report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(HarnessError::Config(format!(
                "unknown report format {:?} (expected \"text\" or \"json\")",
                other
            ))),
        }
    }
}

/// Result of a verification run
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub strategy: StrategyKind,
    pub launcher: String,
    pub launcher_exit_code: Option<i32>,
    pub probe_identity: Option<u32>,
    pub probe_path: Option<PathBuf>,
    pub verdict: Verdict,
    /// Failure kind (snake_case), absent on pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerificationReport {
    pub fn new(strategy: StrategyKind, launcher: impl Into<String>) -> Self {
        Self {
            strategy,
            launcher: launcher.into(),
            launcher_exit_code: None,
            probe_identity: None,
            probe_path: None,
            verdict: Verdict::Fail,
            failure: None,
            message: None,
        }
    }

    /// Report for a run that never got past its preconditions
    pub fn rejected(strategy: StrategyKind, launcher: impl Into<String>, err: &HarnessError) -> Self {
        let mut report = Self::new(strategy, launcher);
        report.record_failure(err);
        report
    }

    pub fn record_pass(&mut self) {
        self.verdict = Verdict::Pass;
        self.failure = None;
        self.message = None;
    }

    pub fn record_failure(&mut self, err: &HarnessError) {
        self.verdict = Verdict::Fail;
        self.failure = Some(err.kind().to_string());
        self.message = Some(err.to_string());
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Json => serde_json::to_string_pretty(self)
                .unwrap_or_else(|e| format!("{{\"verdict\":\"{}\",\"error\":\"{}\"}}", self.verdict, e)),
            ReportFormat::Text => self.render_text(),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "strategy={} launcher={} exit_code={} probe={}\n",
            self.strategy,
            self.launcher,
            self.launcher_exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.probe_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ));
        if let (Some(kind), Some(message)) = (&self.failure, &self.message) {
            out.push_str(&format!("{}: {}\n", kind, message));
        }
        out.push_str(&self.verdict.to_string());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_text_pass() {
        let mut report = VerificationReport::new(StrategyKind::Plain, "./bin/pfs");
        report.launcher_exit_code = Some(0);
        report.probe_path = Some(PathBuf::from("/var/lib/ramfs-ns/812"));
        report.record_pass();

        let text = report.render(ReportFormat::Text);
        assert!(text.starts_with("strategy=plain launcher=./bin/pfs exit_code=0 probe=/var/lib/ramfs-ns/812"));
        assert!(text.ends_with("SUCCESS"));
    }

    #[test]
    fn test_report_json_failure() {
        let err = HarnessError::IsolationBreach {
            path: PathBuf::from("/var/lib/ramfs-ns/9"),
            contents_match: true,
        };
        let mut report = VerificationReport::new(StrategyKind::Elevated, "./bin/pfs");
        report.probe_identity = Some(9);
        report.record_failure(&err);

        let json: serde_json::Value =
            serde_json::from_str(&report.render(ReportFormat::Json)).unwrap();
        assert_eq!(json["verdict"], "fail");
        assert_eq!(json["strategy"], "elevated");
        assert_eq!(json["failure"], "isolation_breach");
        assert_eq!(json["probe_identity"], 9);
    }

    #[test]
    fn test_rejected_report() {
        let report = VerificationReport::rejected(
            StrategyKind::Elevated,
            "./bin/pfs",
            &HarnessError::MissingEnv("USER"),
        );
        assert!(!report.passed());
        assert_eq!(report.failure.as_deref(), Some("missing_env"));
        assert!(report.render(ReportFormat::Text).ends_with("FAILURE"));
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
    }
}
