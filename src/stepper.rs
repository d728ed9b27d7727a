//! Behavioral model of the run/step controller the testbench drives.
//!
//! On every rising `clk` edge the model samples its inputs:
//! - `rst_n` low clears the position, the prescaler and the step detector;
//! - with `ena` high, `uio_in` is decoded as a [`ControlWord`]. In free-run mode the
//!   position advances once every `2^tick_scale` clocks, in step mode once per rising
//!   edge of `step_in`. `run` low holds the position.
//!
//! `ui_in[6]` selects the direction (set: count down). `uo_out` shows the position.

use crate::control::ControlWord;
use crate::device::{tt_ports, Device, PortDecl, PortIo};
use crate::error::SimResult;
use crate::tb_obj::TbObj;

const DIR_DOWN_BIT: u64 = 6;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Rising clock edges seen.
    pub cycles: u64,
    pub reset_cycles: u64,
    /// Advances in free-run mode.
    pub ticks: u64,
    /// Advances in step mode.
    pub steps: u64,
    pub position: u8,
}

#[derive(Debug)]
pub struct StepCounter {
    last_clk: bool,
    last_step_in: bool,
    prescale: u32,
    position: u8,
    stats: TbObj<StepStats>,
}

impl StepCounter {
    pub fn new() -> Self {
        Self {
            last_clk: false,
            last_step_in: false,
            prescale: 0,
            position: 0,
            stats: TbObj::new(StepStats::default()),
        }
    }

    /// Shared view on the model's counters, readable after the simulation.
    pub fn stats(&self) -> TbObj<StepStats> {
        self.stats.clone()
    }

    fn reset(&mut self) {
        self.last_step_in = false;
        self.prescale = 0;
        self.position = 0;
    }

    fn advance(&mut self, down: bool) {
        self.position = match down {
            true => self.position.wrapping_sub(1),
            false => self.position.wrapping_add(1),
        };
    }

    fn clock(&mut self, io: &PortIo<'_>) -> SimResult<()> {
        self.stats.with_mut(|s| s.cycles += 1);
        if !io.get_bit("rst_n")? {
            self.reset();
            self.stats.with_mut(|s| s.reset_cycles += 1);
            return Ok(());
        }
        if !io.get_bit("ena")? {
            return Ok(());
        }
        let ctrl = ControlWord::decode(io.get("uio_in")? as u8);
        let down = (io.get("ui_in")? >> DIR_DOWN_BIT) & 1 == 1;
        let step_in = ctrl.step_in == 1;
        let step_edge = step_in && !self.last_step_in;
        self.last_step_in = step_in;

        if ctrl.is_stepping() {
            if step_edge {
                self.advance(down);
                self.stats.with_mut(|s| s.steps += 1);
            }
        } else if ctrl.is_free_running() {
            self.prescale += 1;
            if self.prescale >= 1 << ctrl.tick_scale {
                self.prescale = 0;
                self.advance(down);
                self.stats.with_mut(|s| s.ticks += 1);
            }
        }
        Ok(())
    }
}

impl Default for StepCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for StepCounter {
    fn name(&self) -> &str {
        "tt_um_stepper"
    }

    fn ports(&self) -> Vec<PortDecl> {
        tt_ports()
    }

    fn eval(&mut self, io: &mut PortIo<'_>) -> SimResult<()> {
        let clk = io.get_bit("clk")?;
        let rising = clk && !self.last_clk;
        self.last_clk = clk;
        if rising {
            self.clock(io)?;
        }
        let position = self.position;
        self.stats.with_mut(|s| s.position = position);
        io.set("uo_out", u64::from(position))?;
        io.set("uio_out", 0)?;
        io.set("uio_oe", 0)
    }
}
