use crate::error::SimResult;
use crate::sim_if::SIM_IF;
use crate::trigger::Trigger;
use crate::value::Val;
use crate::TbResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Int(u32),
    Hier,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> String {
        SIM_IF
            .get_full_name(self)
            .unwrap_or_else(|_| format!("<handle {}>", self.handle))
    }

    pub fn size(&self) -> u32 {
        match self.kind {
            ObjectKind::Int(size) => size,
            ObjectKind::Hier => 0,
        }
    }

    pub fn has_value(&self) -> bool {
        matches!(self.kind, ObjectKind::Int(_))
    }

    pub fn get_root() -> SimResult<Self> {
        SIM_IF.get_root_object()
    }

    pub fn from_name(full_name: &str) -> SimResult<Self> {
        SIM_IF.get_object_by_name(full_name)
    }

    pub fn get_child(&self, name: &str) -> SimResult<Self> {
        let mut child_name = SIM_IF.get_full_name(self)?;
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(child_name.as_str())
    }

    /// Child lookup for testbench code.
    ///
    /// # Panics
    ///
    /// Panics if there is no such child; use [`SimObject::get_child`] to handle it.
    pub fn c(&self, name: &str) -> Self {
        self.get_child(name)
            .unwrap_or_else(|_| panic!("Could not get object with name {}.{}", self.name(), name))
    }

    pub fn try_u64(&self) -> SimResult<u64> {
        SIM_IF.get_value(self)
    }

    pub fn try_set(&self, val: u64) -> SimResult<()> {
        SIM_IF.set_value(self, val)
    }

    pub fn u32(&self) -> u32 {
        self.try_u64()
            .unwrap_or_else(|e| panic!("Can't read {}: {}", self.name(), e)) as u32
    }

    pub fn i32(&self) -> i32 {
        self.u32() as i32
    }

    pub fn bin(&self) -> String {
        SIM_IF
            .get_value_bin(self)
            .unwrap_or_else(|e| panic!("Can't read {}: {}", self.name(), e))
    }

    pub fn set(&self, val: i32) {
        self.set_u32(val as u32)
    }

    pub fn set_u32(&self, val: u32) {
        self.try_set(u64::from(val))
            .unwrap_or_else(|e| panic!("Can't set {} to {}: {}", self.name(), val, e))
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub async fn rising_edge_ro(self) -> TbResult {
        self.rising_edge().await.into_result()?;
        Trigger::read_only().await.into_result()?;
        Ok(Val::None)
    }
    pub async fn rising_edge_rw(self) -> TbResult {
        self.rising_edge().await.into_result()?;
        Trigger::read_write().await.into_result()?;
        Ok(Val::None)
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}
