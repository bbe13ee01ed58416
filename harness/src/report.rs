use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::executor::{JobResult, JobStatus};
use crate::plan::StageKind;

/// One non-success entry: either a job that ran and failed, or a descriptor
/// whose plan could not be constructed (no stage or log in that case).
#[derive(Debug, Clone, Serialize)]
pub struct FailureDetail {
    pub test: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<Utf8PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Aggregate outcome of one batch. Built once, read-only afterwards.
#[derive(Debug, Serialize)]
pub struct Report {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub failures: Vec<FailureDetail>,
    pub results: Vec<JobResult>,
}

impl Report {
    pub fn from_results(results: Vec<JobResult>) -> Self {
        let mut report = Self {
            total: results.len(),
            passed: 0,
            failed: 0,
            timed_out: 0,
            skipped: 0,
            failures: Vec::new(),
            results: Vec::new(),
        };

        for result in &results {
            match result.status {
                JobStatus::Success => report.passed += 1,
                JobStatus::StageFailed { stage, code } => {
                    report.failed += 1;
                    report.failures.push(FailureDetail {
                        test: result.name.clone(),
                        stage: StageKind::from_index(stage).map(StageKind::name),
                        stage_index: Some(stage),
                        exit_code: Some(code),
                        log: Some(result.log_path.clone()),
                        reason: None,
                    });
                }
                JobStatus::TimedOut => {
                    report.timed_out += 1;
                    report.failures.push(FailureDetail {
                        test: result.name.clone(),
                        stage: None,
                        stage_index: None,
                        exit_code: None,
                        log: Some(result.log_path.clone()),
                        reason: Some("batch deadline expired".to_owned()),
                    });
                }
                JobStatus::Skipped => report.skipped += 1,
            }
        }

        report.results = results;
        report
    }

    /// Record a descriptor whose plan construction failed. The batch keeps
    /// going; the report still has to name the test.
    pub fn push_plan_failure(&mut self, test: &str, reason: impl std::fmt::Display) {
        self.total += 1;
        self.failed += 1;
        self.failures.push(FailureDetail {
            test: test.to_owned(),
            stage: None,
            stage_index: None,
            exit_code: None,
            log: None,
            reason: Some(reason.to_string()),
        });
    }

    /// Drives the process exit code: true only for an all-green run.
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to encode report")
    }

    pub fn write_json(&self, path: &Utf8Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write report {path}"))
    }

    /// One-line console summary in the texture of a test runner.
    pub fn summary_line(&self) -> String {
        format!(
            "{} total, {} passed, {} failed, {} timed out, {} skipped",
            self.total, self.passed, self.failed, self.timed_out, self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(name: &str, status: JobStatus) -> JobResult {
        JobResult {
            name: name.to_owned(),
            status,
            log_path: format!("/work/{name}/{name}.log").into(),
            wall_time: Duration::from_millis(5),
        }
    }

    #[test]
    fn counts_by_status() {
        let report = Report::from_results(vec![
            result("add-01", JobStatus::Success),
            result("mul-01", JobStatus::StageFailed { stage: 2, code: 1 }),
            result("div-01", JobStatus::TimedOut),
            result("rem-01", JobStatus::Skipped),
        ]);
        assert_eq!(report.total, 4);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.skipped, 1);
        assert!(!report.all_passed());
    }

    #[test]
    fn stage_failure_detail_names_the_stage() {
        let report =
            Report::from_results(vec![result("mul-01", JobStatus::StageFailed { stage: 2, code: 3 })]);
        let failure = &report.failures[0];
        assert_eq!(failure.test, "mul-01");
        assert_eq!(failure.stage, Some("pack"));
        assert_eq!(failure.stage_index, Some(2));
        assert_eq!(failure.exit_code, Some(3));
        assert!(failure.log.is_some());
    }

    #[test]
    fn plan_failures_count_as_failed() {
        let mut report = Report::from_results(vec![result("add-01", JobStatus::Success)]);
        report.push_plan_failure("vec-01", "unsupported ISA extension 'V'");
        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.all_passed());
        assert!(report.failures[0].reason.as_deref().unwrap().contains("'V'"));
    }

    #[test]
    fn json_is_machine_readable() {
        let report = Report::from_results(vec![result(
            "mul-01",
            JobStatus::StageFailed { stage: 0, code: 1 },
        )]);
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["failed"], 1);
        assert_eq!(value["failures"][0]["stage"], "compile");
    }
}
