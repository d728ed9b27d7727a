use crate::error::{SimError, SimResult};
use crate::kernel;
use crate::signal::SimObject;
use lazy_static::lazy_static;

lazy_static! {
    pub static ref SIM_IF: Box<dyn SimIf + Sync> = new_interface();
}

fn new_interface() -> Box<dyn SimIf + Sync> {
    Box::new(kernel::Kernel)
}

#[derive(Debug, Hash, Clone, Eq, PartialEq)]
pub enum SimCallback {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

pub trait SimIf {
    fn set_value(&self, obj: &SimObject, value: u64) -> SimResult<()>;
    fn get_value(&self, obj: &SimObject) -> SimResult<u64>;
    fn get_value_bin(&self, obj: &SimObject) -> SimResult<String>;
    fn get_object_by_name(&self, name: &str) -> SimResult<SimObject>;
    fn get_full_name(&self, obj: &SimObject) -> SimResult<String>;
    fn get_root_object(&self) -> SimResult<SimObject>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn log(&self, msg: &str);
    fn register_callback(&self, cb: SimCallback) -> SimResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> SimResult<()>;
    fn get_sim_time(&self, unit: &str) -> SimResult<f64> {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        let exp = i32::from(self.get_sim_precision()) - i32::from(time_scale(unit)?);
        Ok(ldexp10(t, exp))
    }
    fn get_sim_steps(&self, time: f64, unit: &str) -> SimResult<u64> {
        time_to_steps(time, unit, self.get_sim_precision())
    }
}

/// Converts `time` in `unit` into whole simulator steps of `10^precision` seconds.
pub fn time_to_steps(time: f64, unit: &str, precision: i8) -> SimResult<u64> {
    let exp = i32::from(time_scale(unit)?) - i32::from(precision);
    match exact_ldexp10(time, exp) {
        Some(steps) if steps >= 0.0 && steps % 1.0 == 0.0 => Ok(steps as u64),
        _ => Err(SimError::TimeRounding {
            time,
            unit: unit.to_string(),
            precision: scale_time(precision).unwrap_or_else(|_| format!("1e{}s", precision)),
        }),
    }
}

pub(crate) fn time_scale(unit: &str) -> SimResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(SimError::TimeUnit(unit.to_string())),
    }
}

fn scale_time(unit: i8) -> SimResult<String> {
    match unit {
        -15 => Ok("fs".to_string()),
        -12 => Ok("ps".to_string()),
        -9 => Ok("ns".to_string()),
        -6 => Ok("us".to_string()),
        -3 => Ok("ms".to_string()),
        0 => Ok("sec".to_string()),
        _ => Err(SimError::TimeUnit(format!("1e{}s", unit))),
    }
}

// Like math.ldexp, but base 10. None if 10^|exp| doesn't fit a u64.
fn exact_ldexp10(frac: f64, exp: i32) -> Option<f64> {
    let scale = 10_u64.checked_pow(exp.unsigned_abs())? as f64;
    match exp >= 0 {
        true => Some(frac * scale),
        false => Some(frac / scale),
    }
}

pub(crate) fn ldexp10(frac: f64, exp: i32) -> f64 {
    exact_ldexp10(frac, exp).unwrap_or_else(|| frac * 10_f64.powi(exp))
}
