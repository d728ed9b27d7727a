use stepbench::prelude::*;
use stepbench::sequence::{test_project, StepSequence};

fn config() -> SimConfig {
    SimConfig::default().quiet().without_results()
}

fn project_tests() -> TbTests {
    TbTests::new().add("test_project", |dut| test_project(dut).boxed())
}

#[test]
fn sequence_passes_on_step_counter() {
    let dut = StepCounter::new();
    let stats = dut.stats();
    let report = run_sim(Box::new(dut), project_tests(), config());

    assert!(report.passed(), "{:?}", report);
    let stats = stats.snapshot();
    assert_eq!(stats.cycles, u64::from(StepSequence::default().total_cycles()));
    assert_eq!(stats.reset_cycles, 10);
    assert_eq!(stats.ticks, 300);
    assert_eq!(stats.steps, 8);
    // ui_in = 64 counts down from zero
    assert_eq!(stats.position, (-308_i32).rem_euclid(256) as u8);
}

#[test]
fn sequence_consumes_340_clock_cycles() {
    let report = run_sim(Box::new(StepCounter::new()), project_tests(), config());
    let test = report.test("test_project").unwrap();
    assert!(test.passed);
    // clock starts low: first rising edge at 5 us, then one every 10 us
    assert_eq!(test.sim_time_ns, 3_395_000.0);
    assert_eq!(report.sim_time_ns, 3_395_000.0);
}

#[test]
fn sequence_passes_on_passive_device() {
    let report = run_sim(Box::new(Passive), project_tests(), config());
    assert!(report.passed(), "{:?}", report);
    assert_eq!(report.sim_time_ns, 3_395_000.0);
}

#[test]
fn tick_scale_divides_free_run() {
    async fn scaled(dut: SimObject) -> TbResult {
        let clk = dut.get_child("clk")?;
        Task::fork(testbench::clock(clk, 10, "us"));
        dut.get_child("ena")?.try_set(1)?;
        dut.get_child("rst_n")?.try_set(0)?;
        utils::clock_cycles(clk, 2).await?;
        dut.get_child("rst_n")?.try_set(1)?;
        dut.get_child("uio_in")?
            .try_set(ControlWord::new().run(1).tick_scale(2).encode().into())?;
        utils::clock_cycles(clk, 16).await?;
        Ok(Val::None)
    }

    let dut = StepCounter::new();
    let stats = dut.stats();
    let report = run_sim(
        Box::new(dut),
        TbTests::new().add("scaled", |dut| scaled(dut).boxed()),
        config(),
    );
    assert!(report.passed(), "{:?}", report);
    // one tick every 4 clocks, counting up
    assert_eq!(stats.snapshot().ticks, 4);
    assert_eq!(stats.snapshot().position, 4);
}

#[test]
fn outputs_are_visible_to_the_testbench() {
    async fn observe(dut: SimObject) -> TbResult {
        let clk = dut.c("clk");
        Task::fork(testbench::clock(clk, 10, "us"));
        dut.c("ena").set(1);
        dut.c("rst_n").set(1);
        dut.c("uio_in").set_u32(u32::from(control_word(1, 0, 0, 0)));
        utils::clock_cycles(clk, 5).await?;
        clk.rising_edge_ro().await?;
        match dut.c("uo_out").u32() {
            6 => Ok(Val::Int(6)),
            other => Err(Val::String(format!("uo_out={}", other))),
        }
    }

    let report = run_sim(
        Box::new(StepCounter::new()),
        TbTests::new().add("observe", |dut| observe(dut).boxed()),
        config(),
    );
    assert!(report.passed(), "{:?}", report);
}
