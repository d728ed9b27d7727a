use intmap::IntMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::error::{SimError, SimResult};
use crate::executor;
use crate::{
    signal::SimObject,
    sim_if::{SimCallback, SIM_IF},
    value::Val,
    TbResult,
};

struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

impl CallbackHandles {
    fn new() -> Self {
        CallbackHandles { handle: None, callbacks: VecDeque::new() }
    }
}

struct TriggerState {
    // key is signal handle
    edges: IntMap<CallbackHandles>,
    // key is absolute callback time in sim steps
    timers: IntMap<CallbackHandles>,
    read_only: CallbackHandles,
    read_write: CallbackHandles,
}

thread_local! {
    static TRIGGERS: RefCell<TriggerState> = RefCell::new(TriggerState {
        edges: IntMap::new(),
        timers: IntMap::new(),
        read_only: CallbackHandles::new(),
        read_write: CallbackHandles::new(),
    });
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

pub(crate) fn cancel_all_triggers() {
    let handles = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        let mut handles = Vec::new();
        // waiters are dropped with their wakers
        handles.extend(std::mem::replace(&mut t.read_only, CallbackHandles::new()).handle);
        handles.extend(std::mem::replace(&mut t.read_write, CallbackHandles::new()).handle);
        for (_, cb) in t.timers.drain() {
            handles.extend(cb.handle);
        }
        for (_, cb) in t.edges.drain() {
            handles.extend(cb.handle);
        }
        handles
    });
    for handle in handles {
        let _ = SIM_IF.cancel_callback(handle);
    }
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    fired: Arc<AtomicBool>,
    // Edge callbacks are shared per signal; each waiter remembers which edge it wants so the
    // callback does not have to be rescheduled for the others.
    edge_kind: EdgeKind,
}

impl TrigShared {
    fn fire(self) {
        self.fired.store(true, Ordering::Relaxed);
        self.waker.wake();
    }
}

#[derive(Clone, Debug)]
enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64),
    ReadWrite,
    ReadOnly,
    Invalid(SimError),
}

#[derive(Clone, Debug)]
pub struct Trigger {
    kind: TrigKind,
    fired: Option<Arc<AtomicBool>>,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger { kind, fired: None }
    }
    pub fn timer(time: u64, unit: &str) -> Self {
        match SIM_IF.get_sim_steps(time as f64, unit) {
            Ok(steps) => Trigger::timer_steps(steps),
            Err(e) => Trigger::new(TrigKind::Invalid(e)),
        }
    }
    pub fn timer_steps(steps: u64) -> Self {
        Trigger::new(TrigKind::Timer(steps))
    }
    pub async fn timer_ro(time: u64, unit: &str) -> TbResult {
        Trigger::timer(time, unit).await.into_result()?;
        Trigger::read_only().await.into_result()?;
        Ok(Val::None)
    }
    pub async fn timer_rw(time: u64, unit: &str) -> TbResult {
        Trigger::timer(time, unit).await.into_result()?;
        Trigger::read_write().await.into_result()?;
        Ok(Val::None)
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::new(TrigKind::ReadWrite)
    }
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly)
    }
}

impl Future for Trigger {
    type Output = Val;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(fired) = &self.fired {
            return match fired.load(Ordering::Relaxed) {
                true => Poll::Ready(Val::None),
                false => Poll::Pending,
            };
        }
        let fired = Arc::new(AtomicBool::new(false));
        self.fired = Some(fired.clone());
        let shared = TrigShared {
            waker: cx.waker().clone(),
            fired,
            edge_kind: EdgeKind::Any,
        };
        match register(&self.kind, shared) {
            Ok(()) => Poll::Pending,
            Err(e) => {
                SIM_IF.log(&format!("Could not register trigger: {}", e));
                Poll::Ready(Val::Error(e.to_string()))
            }
        }
    }
}

fn register(kind: &TrigKind, mut shared: TrigShared) -> SimResult<()> {
    TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        match *kind {
            TrigKind::ReadWrite => {
                if t.read_write.handle.is_none() {
                    let cb_hdl = SIM_IF.register_callback(SimCallback::ReadWrite)?;
                    t.read_write.handle.replace(cb_hdl);
                }
                t.read_write.callbacks.push_back(shared);
            }
            TrigKind::ReadOnly => {
                if t.read_only.handle.is_none() {
                    let cb_hdl = SIM_IF.register_callback(SimCallback::ReadOnly)?;
                    t.read_only.handle.replace(cb_hdl);
                }
                t.read_only.callbacks.push_back(shared);
            }
            TrigKind::Timer(steps) => {
                // keyed by absolute time since the kernel reports absolute time, not delta
                let abs_time = steps + SIM_IF.get_sim_time_steps();
                if let Some(callbacks) = t.timers.get_mut(abs_time) {
                    callbacks.callbacks.push_back(shared);
                } else {
                    let handle = SIM_IF.register_callback(SimCallback::Time(steps))?;
                    let mut callbacks = CallbackHandles::new();
                    callbacks.handle = Some(handle);
                    callbacks.callbacks.push_back(shared);
                    t.timers.insert(abs_time, callbacks);
                }
            }
            TrigKind::Edge(sig_hdl, edge_kind) => {
                shared.edge_kind = edge_kind;
                if let Some(callbacks) = t.edges.get_mut(sig_hdl as u64) {
                    callbacks.callbacks.push_back(shared);
                } else {
                    let handle = SIM_IF.register_callback(SimCallback::Edge(sig_hdl))?;
                    let mut callbacks = CallbackHandles::new();
                    callbacks.handle = Some(handle);
                    callbacks.callbacks.push_back(shared);
                    t.edges.insert(sig_hdl as u64, callbacks);
                }
            }
            TrigKind::Invalid(ref e) => return Err(e.clone()),
        }
        Ok(())
    })
}

pub(crate) fn react_time(t_abs: u64) {
    let wake = TRIGGERS.with(|t| t.borrow_mut().timers.remove(t_abs).map(|cb| cb.callbacks));
    wake_all(wake);
}

pub(crate) fn react_rw() {
    let wake = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        // the kernel callback is done once it fired
        t.read_write.handle = None;
        std::mem::take(&mut t.read_write.callbacks)
    });
    wake_all(Some(wake));
}

pub(crate) fn react_ro() {
    let wake = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        t.read_only.handle = None;
        std::mem::take(&mut t.read_only.callbacks)
    });
    wake_all(Some(wake));
}

pub(crate) fn react_edge(sig_hdl: usize, edge: EdgeKind) {
    let (wake, cancel) = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        let Some(mut callbacks) = t.edges.remove(sig_hdl as u64) else {
            return (None, None);
        };
        let (wake, resched): (VecDeque<TrigShared>, VecDeque<TrigShared>) =
            callbacks.callbacks.drain(..).partition(|trig| {
                edge == EdgeKind::Any || trig.edge_kind == EdgeKind::Any || trig.edge_kind == edge
            });
        if resched.is_empty() {
            // nobody waits for the other edge
            (Some(wake), callbacks.handle)
        } else {
            callbacks.callbacks = resched;
            t.edges.insert(sig_hdl as u64, callbacks);
            (Some(wake), None)
        }
    });
    if let Some(handle) = cancel {
        let _ = SIM_IF.cancel_callback(handle);
    }
    wake_all(wake);
}

fn wake_all(wake: Option<VecDeque<TrigShared>>) {
    if let Some(wake) = wake {
        if wake.is_empty() {
            return;
        }
        for shared in wake {
            shared.fire();
        }
        // execute woken tasks
        executor::run_once();
    }
}
