//! Reset, free-run and single-step stimulus for the run/step controller.
//!
//! The sequence only drives inputs; it never looks at `uo_out`. A run passes when it
//! reaches the end without an error.

use crate::control::control_word;
use crate::prelude::*;
use crate::utils::clock_cycles;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepSequence {
    pub clock_period_us: u32,
    pub reset_cycles: u32,
    pub settle_cycles: u32,
    pub free_run_input: u8,
    pub free_run_cycles: u32,
    pub step_setup_cycles: u32,
    pub step_pulses: u32,
    pub tail_cycles: u32,
}

impl Default for StepSequence {
    fn default() -> Self {
        Self {
            // 100 kHz
            clock_period_us: 10,
            reset_cycles: 10,
            settle_cycles: 2,
            free_run_input: 64,
            free_run_cycles: 300,
            step_setup_cycles: 2,
            step_pulses: 8,
            tail_cycles: 10,
        }
    }
}

impl StepSequence {
    /// Rising clock edges the sequence waits for in total. Each step pulse is high for one
    /// cycle and low for one cycle.
    pub fn total_cycles(&self) -> u32 {
        self.reset_cycles
            + self.settle_cycles
            + self.free_run_cycles
            + self.step_setup_cycles
            + 2 * self.step_pulses
            + self.tail_cycles
    }

    pub async fn run(self, dut: SimObject) -> TbResult {
        let clk = dut.get_child("clk")?;
        let rst_n = dut.get_child("rst_n")?;
        let ena = dut.get_child("ena")?;
        let ui_in = dut.get_child("ui_in")?;
        let uio_in = dut.get_child("uio_in")?;

        Task::fork(testbench::clock(clk, self.clock_period_us, "us"));

        // Reset
        ena.try_set(1)?;
        ui_in.try_set(0)?;
        uio_in.try_set(control_word(0, 0, 0, 0).into())?;
        rst_n.try_set(0)?;
        clock_cycles(clk, self.reset_cycles).await?;
        rst_n.try_set(1)?;
        clock_cycles(clk, self.settle_cycles).await?;

        // Free-run mode for a while.
        ui_in.try_set(self.free_run_input.into())?;
        uio_in.try_set(control_word(1, 0, 0, 0).into())?;
        clock_cycles(clk, self.free_run_cycles).await?;

        // Step mode for a while.
        uio_in.try_set(control_word(1, 1, 0, 0).into())?;
        clock_cycles(clk, self.step_setup_cycles).await?;
        for _ in 0..self.step_pulses {
            uio_in.try_set(control_word(1, 1, 1, 0).into())?;
            clock_cycles(clk, 1).await?;
            uio_in.try_set(control_word(1, 1, 0, 0).into())?;
            clock_cycles(clk, 1).await?;
        }

        // Finish after a few additional cycles.
        clock_cycles(clk, self.tail_cycles).await?;
        Ok(Val::None)
    }
}

pub async fn test_project(dut: SimObject) -> TbResult {
    StepSequence::default().run(dut).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sequence_spans_340_cycles() {
        assert_eq!(StepSequence::default().total_cycles(), 340);
    }

    #[test]
    fn pulses_count_twice() {
        let seq = StepSequence { step_pulses: 3, ..StepSequence::default() };
        assert_eq!(seq.total_cycles(), 340 - 10);
    }
}
