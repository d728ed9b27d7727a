use num_format::{Locale, ToFormattedString};
use prettytable::{Cell, Row, Table};

use crate::sim_if::SIM_IF;
use crate::test::TbTests;
use crate::value::Val;

const UNFINISHED: &str = "simulation ended before the test completed";

#[derive(Clone, Debug, PartialEq)]
pub struct TestReport {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimReport {
    pub tests: Vec<TestReport>,
    pub sim_time_ns: f64,
    pub real_time_secs: f64,
}

impl SimReport {
    pub(crate) fn collect(tests: &TbTests, sim_time_ns: f64, real_time_secs: f64) -> Self {
        let tests = tests
            .iter()
            .map(|obj| {
                let t = obj.get();
                let (passed, message) = match &t.result {
                    Some(Ok(val)) => (true, describe(val)),
                    Some(Err(val)) => (false, describe(val)),
                    None => (false, UNFINISHED.to_string()),
                };
                TestReport {
                    name: t.name.clone(),
                    passed,
                    message,
                    time_secs: t.time_secs,
                    sim_time_ns: t.sim_time_ns,
                }
            })
            .collect();
        Self { tests, sim_time_ns, real_time_secs }
    }

    pub fn passed(&self) -> bool {
        self.tests.iter().all(|t| t.passed)
    }

    pub fn failed(&self) -> usize {
        self.tests.iter().filter(|t| !t.passed).count()
    }

    pub fn test(&self, name: &str) -> Option<&TestReport> {
        self.tests.iter().find(|t| t.name == name)
    }

    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table.set_titles(Row::new(
            ["TEST", "RESULT", "SIM TIME (ns)", "REAL TIME (s)", "RATIO (ns/s)"]
                .iter()
                .map(|h| Cell::new(h))
                .collect(),
        ));
        for t in &self.tests {
            table.add_row(Row::new(vec![
                Cell::new(&t.name),
                Cell::new(if t.passed { "PASS" } else { "FAIL" }),
                Cell::new(&format_ns(t.sim_time_ns)),
                Cell::new(&format!("{:.3}", t.time_secs)),
                Cell::new(&format!("{:.3}", speed(t.sim_time_ns, t.time_secs))),
            ]));
        }
        table
    }

    pub(crate) fn log_summary(&self) {
        for line in self.summary_table().to_string().lines() {
            SIM_IF.log(line);
        }
        for t in self.tests.iter().filter(|t| !t.passed) {
            SIM_IF.log(&format!("FAIL {}: {}", t.name, t.message));
        }
        SIM_IF.log(&format!(
            "TESTS={} PASS={} FAIL={}",
            self.tests.len(),
            self.tests.len() - self.failed(),
            self.failed()
        ));
        SIM_IF.log(&format!("Simulation time: {} ns", format_ns(self.sim_time_ns)));
        SIM_IF.log(&format!("Real time: {:.3} s", self.real_time_secs));
        SIM_IF.log(&format!(
            "Simulation speed: {:.3} ns/s",
            speed(self.sim_time_ns, self.real_time_secs)
        ));
    }
}

fn describe(val: &Val) -> String {
    match val {
        Val::String(s) | Val::Error(s) | Val::BitStr(s) => s.clone(),
        Val::None => String::new(),
        other => format!("{:?}", other),
    }
}

fn format_ns(ns: f64) -> String {
    (ns.round() as u64).to_formatted_string(&Locale::en)
}

fn speed(sim_ns: f64, secs: f64) -> f64 {
    match secs > 0.0 {
        true => sim_ns / secs,
        false => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SimReport {
        SimReport {
            tests: vec![
                TestReport {
                    name: "a".to_string(),
                    passed: true,
                    message: String::new(),
                    time_secs: 0.5,
                    sim_time_ns: 1000.0,
                },
                TestReport {
                    name: "b".to_string(),
                    passed: false,
                    message: "boom".to_string(),
                    time_secs: 0.0,
                    sim_time_ns: 0.0,
                },
            ],
            sim_time_ns: 1000.0,
            real_time_secs: 0.5,
        }
    }

    #[test]
    fn counts_failures() {
        let r = report();
        assert!(!r.passed());
        assert_eq!(r.failed(), 1);
        assert_eq!(r.test("b").map(|t| t.message.as_str()), Some("boom"));
    }

    #[test]
    fn table_lists_every_test() {
        let rendered = report().summary_table().to_string();
        assert!(rendered.contains("PASS"));
        assert!(rendered.contains("FAIL"));
        assert!(rendered.contains("1,000"));
    }

    #[test]
    fn speed_handles_zero_time() {
        assert_eq!(speed(10.0, 0.0), 0.0);
        assert_eq!(speed(10.0, 2.0), 5.0);
    }
}
