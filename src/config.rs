use std::path::PathBuf;

use crate::error::{SimError, SimResult};

pub const ENV_RESULTS: &str = "STEPBENCH_RESULTS";
pub const ENV_TESTCASE: &str = "STEPBENCH_TESTCASE";
pub const ENV_SEED: &str = "STEPBENCH_SEED";
pub const ENV_TIMEOUT_US: &str = "STEPBENCH_TIMEOUT_US";
pub const ENV_QUIET: &str = "STEPBENCH_QUIET";

#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    /// Simulator step is `10^precision` seconds.
    pub precision: i8,
    /// Per-test limit on simulated time, in microseconds.
    pub timeout_us: Option<u64>,
    pub max_deltas: u32,
    /// JUnit XML output; `None` disables it.
    pub results_file: Option<PathBuf>,
    /// Only run tests with this name.
    pub testcase: Option<String>,
    pub seed: Option<u64>,
    pub quiet: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            precision: -12,
            timeout_us: None,
            max_deltas: 1000,
            results_file: Some(PathBuf::from("results.xml")),
            testcase: None,
            seed: None,
            quiet: false,
        }
    }
}

impl SimConfig {
    pub fn from_env() -> SimResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SimResult<Self> {
        let mut config = SimConfig::default();
        if let Some(path) = lookup(ENV_RESULTS) {
            config.results_file = match path.as_str() {
                "" => None,
                _ => Some(PathBuf::from(path)),
            };
        }
        config.testcase = lookup(ENV_TESTCASE).filter(|t| !t.is_empty());
        if let Some(seed) = lookup(ENV_SEED) {
            config.seed = Some(parse_num(ENV_SEED, &seed)?);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_US) {
            config.timeout_us = Some(parse_num(ENV_TIMEOUT_US, &timeout)?);
        }
        if let Some(quiet) = lookup(ENV_QUIET) {
            config.quiet = matches!(quiet.as_str(), "1" | "true" | "yes");
        }
        Ok(config)
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn without_results(mut self) -> Self {
        self.results_file = None;
        self
    }
}

fn parse_num(key: &str, value: &str) -> SimResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| SimError::Config(format!("{}={} is not a number", key, value)))
}
