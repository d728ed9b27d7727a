//! In-process simulation kernel behind [`SIM_IF`].
//!
//! The kernel owns the signals of one [`Device`], the simulated time and the registered
//! callbacks. Each time slot fires due timers, then runs delta cycles (device evaluation,
//! edge callbacks, read-write callback) until nothing changes, then fires the read-only
//! callback and advances to the next timer.

use intmap::IntMap;
use num_format::{Locale, ToFormattedString};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::config::SimConfig;
use crate::device::{Device, PortDir, PortIo, Signal};
use crate::error::{SimError, SimResult};
use crate::report::SimReport;
use crate::signal::{ObjectKind, SimObject};
use crate::sim_if::{ldexp10, time_to_steps, SimCallback, SimIf, SIM_IF};
use crate::test::TbTests;
use crate::trigger::{self, EdgeKind};
use crate::{executor, utils};

const ROOT_HANDLE: usize = 1;

#[derive(Debug, Clone, Copy)]
enum CbKind {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

struct Watch {
    cb_hdl: usize,
    last: u64,
}

struct KernelState {
    config: SimConfig,
    timeout_steps: Option<u64>,
    time: u64,
    root_name: String,
    device: Box<dyn Device>,
    signals: IntMap<Signal>,
    ports: HashMap<String, usize>,
    next_cb_hdl: usize,
    callbacks: IntMap<CbKind>,
    // absolute time -> callback handle
    timers: BTreeMap<u64, usize>,
    // signal handle -> value seen when the callback was registered or last fired
    watches: BTreeMap<usize, Watch>,
    read_write: Option<usize>,
    read_only: Option<usize>,
    in_read_only: bool,
}

impl KernelState {
    fn signal(&self, obj: &SimObject) -> SimResult<&Signal> {
        if obj.handle == ROOT_HANDLE {
            return Err(SimError::NoValue(self.root_name.clone()));
        }
        self.signals
            .get(obj.handle as u64)
            .ok_or(SimError::UnknownHandle(obj.handle))
    }

    fn full_name(&self, signal: &Signal) -> String {
        format!("{}.{}", self.root_name, signal.name)
    }
}

thread_local! {
    static KERNEL: RefCell<Option<KernelState>> = RefCell::new(None);
}

fn with_state<R>(f: impl FnOnce(&mut KernelState) -> SimResult<R>) -> SimResult<R> {
    KERNEL.with(|k| {
        let mut k = k.try_borrow_mut().map_err(|_| SimError::Busy)?;
        match k.as_mut() {
            Some(state) => f(state),
            None => Err(SimError::NotRunning),
        }
    })
}

pub(crate) struct Kernel;

impl SimIf for Kernel {
    fn set_value(&self, obj: &SimObject, value: u64) -> SimResult<()> {
        with_state(|s| {
            if s.in_read_only {
                return Err(SimError::ReadOnlyPhase);
            }
            let signal = s.signal(obj)?;
            if signal.dir != PortDir::Input {
                return Err(SimError::NotWritable(s.full_name(signal)));
            }
            if let Some(signal) = s.signals.get_mut(obj.handle as u64) {
                signal.value = value & signal.mask();
            }
            Ok(())
        })
    }

    fn get_value(&self, obj: &SimObject) -> SimResult<u64> {
        with_state(|s| Ok(s.signal(obj)?.value))
    }

    fn get_value_bin(&self, obj: &SimObject) -> SimResult<String> {
        with_state(|s| {
            let signal = s.signal(obj)?;
            Ok(format!("{:0width$b}", signal.value, width = signal.width as usize))
        })
    }

    fn get_object_by_name(&self, name: &str) -> SimResult<SimObject> {
        with_state(|s| {
            if name == s.root_name {
                return Ok(SimObject { handle: ROOT_HANDLE, kind: ObjectKind::Hier });
            }
            let handle = name
                .strip_prefix(s.root_name.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|port| s.ports.get(port))
                .ok_or_else(|| SimError::UnknownObject(name.to_string()))?;
            let signal = s
                .signals
                .get(*handle as u64)
                .ok_or(SimError::UnknownHandle(*handle))?;
            Ok(SimObject { handle: *handle, kind: ObjectKind::Int(signal.width) })
        })
    }

    fn get_full_name(&self, obj: &SimObject) -> SimResult<String> {
        with_state(|s| match obj.handle {
            ROOT_HANDLE => Ok(s.root_name.clone()),
            _ => Ok(s.full_name(s.signal(obj)?)),
        })
    }

    fn get_root_object(&self) -> SimResult<SimObject> {
        with_state(|_| Ok(SimObject { handle: ROOT_HANDLE, kind: ObjectKind::Hier }))
    }

    fn get_sim_time_steps(&self) -> u64 {
        with_state(|s| Ok(s.time)).unwrap_or(0)
    }

    fn get_sim_precision(&self) -> i8 {
        with_state(|s| Ok(s.config.precision)).unwrap_or_else(|_| SimConfig::default().precision)
    }

    fn log(&self, msg: &str) {
        // never fail on logging, even when called while the kernel is busy
        let (quiet, time_ns) = KERNEL.with(|k| match k.try_borrow() {
            Ok(k) => match k.as_ref() {
                Some(s) => (
                    s.config.quiet,
                    Some(ldexp10(s.time as f64, i32::from(s.config.precision) + 9)),
                ),
                None => (false, None),
            },
            Err(_) => (false, None),
        });
        if quiet {
            return;
        }
        match time_ns {
            Some(t) => println!("{}", format_log_line(t, msg)),
            None => println!("{}", msg),
        }
    }

    fn register_callback(&self, cb: SimCallback) -> SimResult<usize> {
        with_state(|s| {
            let cb_hdl = s.next_cb_hdl;
            let kind = match cb {
                SimCallback::Time(t) => {
                    let t_abs = s.time + t;
                    if s.timers.contains_key(&t_abs) {
                        return Err(SimError::DuplicateCallback(format!("timer at {}", t_abs)));
                    }
                    s.timers.insert(t_abs, cb_hdl);
                    CbKind::Time(t_abs)
                }
                SimCallback::Edge(sig_hdl) => {
                    let last = s
                        .signals
                        .get(sig_hdl as u64)
                        .ok_or(SimError::UnknownHandle(sig_hdl))?
                        .value;
                    if s.watches.contains_key(&sig_hdl) {
                        return Err(SimError::DuplicateCallback(format!("edge on {}", sig_hdl)));
                    }
                    s.watches.insert(sig_hdl, Watch { cb_hdl, last });
                    CbKind::Edge(sig_hdl)
                }
                SimCallback::ReadWrite => {
                    if s.read_write.replace(cb_hdl).is_some() {
                        return Err(SimError::DuplicateCallback("read-write".to_string()));
                    }
                    CbKind::ReadWrite
                }
                SimCallback::ReadOnly => {
                    if s.read_only.replace(cb_hdl).is_some() {
                        return Err(SimError::DuplicateCallback("read-only".to_string()));
                    }
                    CbKind::ReadOnly
                }
            };
            s.next_cb_hdl += 1;
            s.callbacks.insert(cb_hdl as u64, kind);
            Ok(cb_hdl)
        })
    }

    fn cancel_callback(&self, cb_hdl: usize) -> SimResult<()> {
        with_state(|s| {
            let kind = s
                .callbacks
                .remove(cb_hdl as u64)
                .ok_or(SimError::UnknownCallback(cb_hdl))?;
            match kind {
                CbKind::Time(t_abs) => {
                    s.timers.remove(&t_abs);
                }
                CbKind::Edge(sig_hdl) => {
                    s.watches.remove(&sig_hdl);
                }
                CbKind::ReadWrite => s.read_write = None,
                CbKind::ReadOnly => s.read_only = None,
            }
            Ok(())
        })
    }
}

fn format_log_line(t_ns: f64, msg: &str) -> String {
    let int = t_ns.floor() as u64;
    let mut frac_str = format!("{:.3}", t_ns % 1.0);
    frac_str.remove(0);
    format!("{}{}ns {}", int.to_formatted_string(&Locale::en), frac_str, msg)
}

pub(crate) fn load(device: Box<dyn Device>, config: SimConfig) {
    let root_name = device.name().to_string();
    let mut signals = IntMap::new();
    let mut ports = HashMap::new();
    for (i, decl) in device.ports().into_iter().enumerate() {
        let handle = ROOT_HANDLE + 1 + i;
        ports.insert(decl.name.clone(), handle);
        signals.insert(
            handle as u64,
            Signal { name: decl.name, width: decl.width, dir: decl.dir, value: 0 },
        );
    }
    let timeout_steps = config
        .timeout_us
        .and_then(|us| time_to_steps(us as f64, "us", config.precision).ok());
    let state = KernelState {
        config,
        timeout_steps,
        time: 0,
        root_name,
        device,
        signals,
        ports,
        next_cb_hdl: 1,
        callbacks: IntMap::new(),
        timers: BTreeMap::new(),
        watches: BTreeMap::new(),
        read_write: None,
        read_only: None,
        in_read_only: false,
    };
    KERNEL.with(|k| *k.borrow_mut() = Some(state));
}

pub(crate) fn unload() {
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
    crate::clear_current_test();
    KERNEL.with(|k| k.borrow_mut().take());
}

pub(crate) fn timeout_steps() -> Option<u64> {
    with_state(|s| Ok(s.timeout_steps)).ok().flatten()
}

fn fire_timers() -> SimResult<()> {
    let due = with_state(|s| {
        let now = s.time;
        Ok(s.timers.remove(&now).map(|cb_hdl| {
            s.callbacks.remove(cb_hdl as u64);
            now
        }))
    })?;
    if let Some(t_abs) = due {
        trigger::react_time(t_abs);
    }
    Ok(())
}

fn eval_device() -> SimResult<()> {
    with_state(|s| {
        let KernelState { device, signals, ports, .. } = s;
        device.eval(&mut PortIo { signals, ports })
    })
}

fn detect_edges() -> SimResult<Vec<(usize, usize, EdgeKind)>> {
    with_state(|s| {
        let mut edges = Vec::new();
        for (sig_hdl, watch) in s.watches.iter_mut() {
            let Some(signal) = s.signals.get(*sig_hdl as u64) else { continue };
            if signal.value == watch.last {
                continue;
            }
            let edge = match (signal.width, signal.value & 1) {
                (1, 1) => EdgeKind::Rising,
                (1, _) => EdgeKind::Falling,
                _ => EdgeKind::Any,
            };
            watch.last = signal.value;
            edges.push((watch.cb_hdl, *sig_hdl, edge));
        }
        Ok(edges)
    })
}

fn callback_alive(cb_hdl: usize) -> bool {
    with_state(|s| Ok(s.callbacks.contains_key(cb_hdl as u64))).unwrap_or(false)
}

fn take_read_write() -> SimResult<bool> {
    with_state(|s| {
        Ok(match s.read_write.take() {
            Some(cb_hdl) => {
                s.callbacks.remove(cb_hdl as u64);
                true
            }
            None => false,
        })
    })
}

fn settle(max_deltas: u32) -> SimResult<()> {
    for _ in 0..max_deltas {
        eval_device()?;
        let edges = detect_edges()?;
        let mut active = !edges.is_empty();
        for (cb_hdl, sig_hdl, edge) in edges {
            // an earlier reaction may have torn this callback down
            if callback_alive(cb_hdl) {
                trigger::react_edge(sig_hdl, edge);
            }
        }
        if take_read_write()? {
            trigger::react_rw();
            active = true;
        }
        if !active {
            return Ok(());
        }
    }
    Err(SimError::DeltaOverflow(max_deltas))
}

fn fire_read_only() -> SimResult<()> {
    let fire = with_state(|s| {
        Ok(match s.read_only.take() {
            Some(cb_hdl) => {
                s.callbacks.remove(cb_hdl as u64);
                s.in_read_only = true;
                true
            }
            None => false,
        })
    })?;
    if fire {
        trigger::react_ro();
        with_state(|s| {
            s.in_read_only = false;
            Ok(())
        })?;
    }
    Ok(())
}

fn next_time() -> SimResult<Option<u64>> {
    with_state(|s| Ok(s.timers.keys().next().copied()))
}

fn advance(t: u64) -> SimResult<()> {
    with_state(|s| {
        s.time = t;
        Ok(())
    })
}

fn run_loop() -> SimResult<()> {
    let max_deltas = with_state(|s| Ok(s.config.max_deltas))?;
    loop {
        fire_timers()?;
        settle(max_deltas)?;
        fire_read_only()?;
        let Some(next) = next_time()? else { break };
        if let Some(deadline) = crate::current_test_deadline() {
            if next > deadline {
                advance(deadline)?;
                crate::fail_test("Test timed out");
                // start the next test, if any
                executor::run_once();
                continue;
            }
        }
        advance(next)?;
    }
    Ok(())
}

/// Runs `tests` in order against `device` and returns the results.
pub fn run_sim(device: Box<dyn Device>, tests: TbTests, config: SimConfig) -> SimReport {
    if let Some(seed) = config.seed {
        utils::seed(seed);
    }
    let tests = tests.filtered(config.testcase.as_deref());
    load(device, config.clone());
    let started = Instant::now();

    let outcome = crate::start_of_simulation(&tests).and_then(|_| run_loop());
    if let Err(e) = outcome {
        SIM_IF.log(&format!("Simulation error: {}", e));
        crate::fail_test(&e.to_string());
    }

    let report = crate::end_of_simulation(&tests, started.elapsed(), &config);
    unload();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Passive;

    fn loaded() {
        load(Box::new(Passive), SimConfig::default().quiet().without_results());
    }

    #[test]
    fn resolves_hierarchical_names() {
        loaded();
        let root = SIM_IF.get_root_object().unwrap();
        assert_eq!(SIM_IF.get_full_name(&root).unwrap(), "tt_um_passive");
        let uio_in = SIM_IF.get_object_by_name("tt_um_passive.uio_in").unwrap();
        assert_eq!(uio_in.kind(), ObjectKind::Int(8));
        assert_eq!(SIM_IF.get_full_name(&uio_in).unwrap(), "tt_um_passive.uio_in");
        assert!(matches!(
            SIM_IF.get_object_by_name("tt_um_passive.nope"),
            Err(SimError::UnknownObject(_))
        ));
        unload();
    }

    #[test]
    fn writes_are_masked_and_checked() {
        loaded();
        let ui_in = SIM_IF.get_object_by_name("tt_um_passive.ui_in").unwrap();
        SIM_IF.set_value(&ui_in, 0x140).unwrap();
        assert_eq!(SIM_IF.get_value(&ui_in), Ok(0x40));
        assert_eq!(SIM_IF.get_value_bin(&ui_in).unwrap(), "01000000");
        let uo_out = SIM_IF.get_object_by_name("tt_um_passive.uo_out").unwrap();
        assert!(matches!(SIM_IF.set_value(&uo_out, 1), Err(SimError::NotWritable(_))));
        let root = SIM_IF.get_root_object().unwrap();
        assert!(matches!(SIM_IF.set_value(&root, 1), Err(SimError::NoValue(_))));
        unload();
    }

    #[test]
    fn callbacks_register_once_and_cancel() {
        loaded();
        let rw = SIM_IF.register_callback(SimCallback::ReadWrite).unwrap();
        assert!(matches!(
            SIM_IF.register_callback(SimCallback::ReadWrite),
            Err(SimError::DuplicateCallback(_))
        ));
        SIM_IF.cancel_callback(rw).unwrap();
        assert_eq!(SIM_IF.cancel_callback(rw), Err(SimError::UnknownCallback(rw)));
        let timer = SIM_IF.register_callback(SimCallback::Time(10)).unwrap();
        assert_eq!(next_time(), Ok(Some(10)));
        SIM_IF.cancel_callback(timer).unwrap();
        assert_eq!(next_time(), Ok(None));
        unload();
    }

    #[test]
    fn not_running_without_device() {
        assert_eq!(SIM_IF.get_root_object(), Err(SimError::NotRunning));
        assert_eq!(SIM_IF.get_sim_time_steps(), 0);
    }

    #[test]
    fn log_lines_carry_sim_time() {
        assert_eq!(format_log_line(1_234_567.5, "hi"), "1,234,567.500ns hi");
        assert_eq!(format_log_line(0.0, "start"), "0.000ns start");
    }
}
