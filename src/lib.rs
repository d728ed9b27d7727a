pub mod config;
pub mod control;
pub mod device;
pub mod error;
mod executor;
mod junit;
mod kernel;
pub mod prelude;
pub mod report;
pub mod sequence;
mod signal;
pub mod sim_if;
pub mod stepper;
mod tb_obj;
pub mod test;
pub mod testbench;
mod trigger;
pub mod utils;
mod value;

use once_cell::sync::OnceCell;
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use config::SimConfig;
use error::SimResult;
use executor::{JoinHandle, Task};
use report::SimReport;
use signal::SimObject;
use sim_if::SIM_IF;
use tb_obj::TbObj;
use test::{TbTests, Test};
use value::Val;

pub use kernel::run_sim;

pub type TbResult = Result<Val, Val>;

thread_local! {
    static CURRENT_TEST: RefCell<Option<(Arc<Task>, TbObj<Test>)>> = RefCell::new(None);
}

/// Test suite name used in reports, set by [`run_with_sim!`].
pub static CRATE_NAME: OnceCell<String> = OnceCell::new();

pub fn pass_test(msg: &str) {
    finish_test(Ok(Val::String(msg.to_string())));
}

pub fn fail_test(msg: &str) {
    finish_test(Err(Val::String(msg.to_string())));
}

// Finishes the running test that has not already failed/passed.
fn finish_test(result: TbResult) {
    let Some((task, test)) = CURRENT_TEST.with(|c| c.borrow_mut().take()) else {
        return;
    };
    let sim_time_ns = SIM_IF.get_sim_time("ns").unwrap_or(0.0);
    let (name, passed) = test.with_mut(|t| {
        let passed = result.is_ok();
        t.finish(result, sim_time_ns);
        (t.name.clone(), passed)
    });
    SIM_IF.log(&format!(
        "Test {} {}",
        name,
        if passed { "passed" } else { "failed" }
    ));
    tear_down_test(task);
}

fn tear_down_test(test: Arc<Task>) {
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
    test.cancel();
}

pub(crate) fn clear_current_test() {
    CURRENT_TEST.with(|c| *c.borrow_mut() = None);
}

pub(crate) fn current_test_deadline() -> Option<u64> {
    let timeout = kernel::timeout_steps()?;
    let start = CURRENT_TEST.with(|c| c.borrow().as_ref().and_then(|(_, t)| t.get().start_steps()))?;
    Some(start + timeout)
}

pub(crate) fn start_of_simulation(tests: &TbTests) -> SimResult<()> {
    let sim_root = SimObject::get_root()?;

    // All tests are scheduled in a chain at simulation start up by awaiting the previous test completion.
    // Wrapping logic handles test results, timers, etc.
    let mut join_handle: Option<JoinHandle> = None;
    for test in tests.iter().cloned() {
        let previous = join_handle.take();
        join_handle = Some(Task::spawn_named(
            async move {
                // await previous test, if there is one
                if let Some(handle) = previous {
                    let _ = handle.await;
                }
                let (name, generator) = {
                    let t = test.get();
                    (t.name.clone(), t.generator)
                };
                SIM_IF.log(&format!("Running test {}", name));
                let sim_time_ns = SIM_IF.get_sim_time("ns").unwrap_or(0.0);
                let sim_steps = SIM_IF.get_sim_time_steps();
                test.with_mut(|t| t.begin(sim_time_ns, sim_steps));

                let test_handle = Task::spawn_named(
                    async move {
                        let result = (generator)(sim_root).await;
                        finish_test(result);
                        Ok(Val::None)
                    },
                    &name,
                );
                if let Some(task) = test_handle.task() {
                    CURRENT_TEST.with(|c| *c.borrow_mut() = Some((task, test)));
                }
                // await test execution
                let _ = test_handle.await;
                Ok(Val::None)
            },
            "runner",
        ));
    }

    // execute first simulation tick
    executor::run_once();
    Ok(())
}

pub(crate) fn end_of_simulation(tests: &TbTests, real_time: Duration, config: &SimConfig) -> SimReport {
    let final_sim_time_ns = SIM_IF.get_sim_time("ns").unwrap_or(0.0);
    let report = SimReport::collect(tests, final_sim_time_ns, real_time.as_secs_f64());
    report.log_summary();
    if let Some(path) = &config.results_file {
        let suite = CRATE_NAME.get().map(String::as_str).unwrap_or(env!("CARGO_PKG_NAME"));
        if let Err(e) = junit::create_junit_xml(&report, suite, path) {
            SIM_IF.log(&e.to_string());
        }
    }
    report
}

/// Generates `main` running the given test coroutines against a device model.
#[macro_export]
macro_rules! run_with_sim {
    ($device:expr; $( $i:ident ),+ $(,)?) => {
        fn main() {
            let _ = $crate::CRATE_NAME.set(std::module_path!().to_string());
            // add tests to execution vector
            let mut tests = $crate::test::TbTests::new();
            $(tests.push($crate::test::Test::new(
                stringify!($i).to_string(),
                |sim_root| $crate::prelude::FutureExt::boxed($i(sim_root)),
            ));)+

            let config = match $crate::config::SimConfig::from_env() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(2);
                }
            };
            let report = $crate::run_sim(Box::new($device), tests, config);
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
    };
}
