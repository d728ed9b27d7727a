//! Device models evaluated by the simulation kernel.
//!
//! A [`Device`] declares its ports and is evaluated once per delta cycle. It sees the port
//! values through [`PortIo`] and detects clock edges itself by remembering the previous
//! clock value, the same way generated RTL models do.

use intmap::IntMap;
use std::collections::HashMap;

use crate::error::{SimError, SimResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDir {
    Input,
    Output,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDecl {
    pub name: String,
    pub width: u32,
    pub dir: PortDir,
}

impl PortDecl {
    pub fn input(name: &str, width: u32) -> Self {
        Self { name: name.to_string(), width, dir: PortDir::Input }
    }
    pub fn output(name: &str, width: u32) -> Self {
        Self { name: name.to_string(), width, dir: PortDir::Output }
    }
}

/// Standard Tiny Tapeout user project pin set.
pub fn tt_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("clk", 1),
        PortDecl::input("rst_n", 1),
        PortDecl::input("ena", 1),
        PortDecl::input("ui_in", 8),
        PortDecl::input("uio_in", 8),
        PortDecl::output("uo_out", 8),
        PortDecl::output("uio_out", 8),
        PortDecl::output("uio_oe", 8),
    ]
}

pub trait Device {
    fn name(&self) -> &str;
    fn ports(&self) -> Vec<PortDecl>;
    fn eval(&mut self, io: &mut PortIo<'_>) -> SimResult<()>;
}

#[derive(Clone, Debug)]
pub(crate) struct Signal {
    pub(crate) name: String,
    pub(crate) width: u32,
    pub(crate) dir: PortDir,
    pub(crate) value: u64,
}

impl Signal {
    pub(crate) fn mask(&self) -> u64 {
        width_mask(self.width)
    }
}

pub(crate) fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1_u64 << width) - 1
    }
}

/// Port access handed to [`Device::eval`]. Devices may only drive their outputs.
pub struct PortIo<'a> {
    pub(crate) signals: &'a mut IntMap<Signal>,
    pub(crate) ports: &'a HashMap<String, usize>,
}

impl PortIo<'_> {
    fn signal(&self, port: &str) -> SimResult<&Signal> {
        self.ports
            .get(port)
            .and_then(|h| self.signals.get(*h as u64))
            .ok_or_else(|| SimError::UnknownObject(port.to_string()))
    }

    pub fn get(&self, port: &str) -> SimResult<u64> {
        Ok(self.signal(port)?.value)
    }

    pub fn get_bit(&self, port: &str) -> SimResult<bool> {
        Ok(self.get(port)? & 1 == 1)
    }

    pub fn set(&mut self, port: &str, value: u64) -> SimResult<()> {
        let handle = *self
            .ports
            .get(port)
            .ok_or_else(|| SimError::UnknownObject(port.to_string()))?;
        let signal = self
            .signals
            .get_mut(handle as u64)
            .ok_or(SimError::UnknownHandle(handle))?;
        if signal.dir != PortDir::Output {
            return Err(SimError::NotWritable(signal.name.clone()));
        }
        signal.value = value & signal.mask();
        Ok(())
    }
}

/// A device with the standard pin set that never drives anything.
#[derive(Debug, Default)]
pub struct Passive;

impl Device for Passive {
    fn name(&self) -> &str {
        "tt_um_passive"
    }
    fn ports(&self) -> Vec<PortDecl> {
        tt_ports()
    }
    fn eval(&mut self, _io: &mut PortIo<'_>) -> SimResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> (IntMap<Signal>, HashMap<String, usize>) {
        let mut signals = IntMap::new();
        let mut ports = HashMap::new();
        for (i, decl) in tt_ports().into_iter().enumerate() {
            let handle = i + 2;
            ports.insert(decl.name.clone(), handle);
            signals.insert(
                handle as u64,
                Signal { name: decl.name, width: decl.width, dir: decl.dir, value: 0 },
            );
        }
        (signals, ports)
    }

    #[test]
    fn outputs_are_masked_to_width() {
        let (mut signals, ports) = bank();
        let mut io = PortIo { signals: &mut signals, ports: &ports };
        io.set("uo_out", 0x1ff).unwrap();
        assert_eq!(io.get("uo_out"), Ok(0xff));
    }

    #[test]
    fn inputs_are_read_only_for_devices() {
        let (mut signals, ports) = bank();
        let mut io = PortIo { signals: &mut signals, ports: &ports };
        assert_eq!(io.set("clk", 1), Err(SimError::NotWritable("clk".to_string())));
        assert_eq!(io.get("nope"), Err(SimError::UnknownObject("nope".to_string())));
    }

    #[test]
    fn width_mask_covers_full_word() {
        assert_eq!(width_mask(1), 1);
        assert_eq!(width_mask(8), 0xff);
        assert_eq!(width_mask(64), u64::MAX);
    }
}
