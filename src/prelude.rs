pub use crate::config::SimConfig;
pub use crate::control::{control_word, ControlWord};
pub use crate::device::{Device, Passive, PortDecl, PortDir, PortIo};
pub use crate::error::{SimError, SimResult};
pub use crate::executor::{JoinHandle, Task};
pub use crate::report::SimReport;
pub use crate::signal::{ObjectKind, SimObject};
pub use crate::sim_if::SIM_IF;
pub use crate::stepper::{StepCounter, StepStats};
pub use crate::tb_obj::TbObj;
pub use crate::test::{TbTests, Test};
pub use crate::trigger::{EdgeKind, Trigger};
pub use crate::value::Val;
pub use crate::{fail_test, pass_test, run_sim, testbench, utils, TbResult, CRATE_NAME};
pub use futures::future::FutureExt;
