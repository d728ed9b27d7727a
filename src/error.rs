use thiserror::Error;

use crate::value::Val;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("simulation kernel is not running")]
    NotRunning,
    #[error("simulation kernel is busy")]
    Busy,
    #[error("no object named '{0}'")]
    UnknownObject(String),
    #[error("no object with handle {0}")]
    UnknownHandle(usize),
    #[error("object '{0}' does not carry a value")]
    NoValue(String),
    #[error("port '{0}' can't be driven from here")]
    NotWritable(String),
    #[error("signals can't be written during the read-only phase")]
    ReadOnlyPhase,
    #[error("unknown time unit '{0}'")]
    TimeUnit(String),
    #[error("can't convert {time} {unit} to sim steps without rounding (sim precision: {precision})")]
    TimeRounding {
        time: f64,
        unit: String,
        precision: String,
    },
    #[error("callback already registered: {0}")]
    DuplicateCallback(String),
    #[error("unknown callback handle {0}")]
    UnknownCallback(usize),
    #[error("no convergence after {0} delta cycles")]
    DeltaOverflow(u32),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("could not write report: {0}")]
    Report(String),
}

impl From<SimError> for Val {
    fn from(err: SimError) -> Self {
        Val::Error(err.to_string())
    }
}
