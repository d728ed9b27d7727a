use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::error::{SimError, SimResult};
use crate::report::SimReport;

pub(crate) fn create_junit_xml(report: &SimReport, suite: &str, path: &Path) -> SimResult<()> {
    let mut test_cases = Vec::new();

    for t in report.tests.iter() {
        let tc = match t.passed {
            true => TestCaseBuilder::success(&t.name, Duration::seconds_f64(t.time_secs)),
            false => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(t.time_secs),
                "failure",
                &t.message,
            ),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(suite)
        .add_testcases(test_cases)
        .build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = std::fs::File::create(path)
        .map_err(|e| SimError::Report(format!("{}: {}", path.display(), e)))?;
    report
        .write_xml(file)
        .map_err(|e| SimError::Report(format!("{}: {}", path.display(), e)))
}
