use crate::prelude::*;

/*
 * CLOCK
 */
/// Free-running clock on `clk`, starting low. Never returns unless a timer can't be set up.
pub async fn clock(clk: SimObject, period: u32, unit: &str) -> TbResult {
    run_clock(clk, period, unit, false).await
}

/// Like [`clock`], but drives `clk` high first, so the first rising edge is at the time of
/// the call.
pub async fn clock_high_first(clk: SimObject, period: u32, unit: &str) -> TbResult {
    run_clock(clk, period, unit, true).await
}

async fn run_clock(clk: SimObject, period: u32, unit: &str, high_first: bool) -> TbResult {
    if period < 2 {
        return Err(Val::Error(format!("Clock period {}{} is too short", period, unit)));
    }
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        SIM_IF.log(&format!("Warning: Clock period {period}{unit} not dividable by 2. High time will be {high}{unit}; low time will be {low}{unit}.", period=period, unit=unit, high=high_t, low=low_t));
    }
    let phases = match high_first {
        true => [(1, high_t), (0, low_t)],
        false => [(0, low_t), (1, high_t)],
    };
    loop {
        for (level, t) in phases {
            clk.try_set(level)?;
            Trigger::timer(u64::from(t), unit).await.into_result()?;
        }
    }
}
