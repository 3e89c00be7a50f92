// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt processing and the built-in DOS output service.
//!
//! The simulator does not model the real-mode interrupt vector table. INT is
//! interpreted directly: vector 0x21 reaches the built-in DOS service, every
//! other vector is logged and ignored. INTO pushes FLAGS, CS and IP and
//! clears IF and TF before taking vector 4, mirroring the hardware sequence,
//! and IRET undoes exactly those pushes.

use crate::{I8086, Register};
use crate::error::Error;
use crate::flags::Flags;
use crate::interpreter::InterpreterResult;
use crate::memory::{Memory, physical};

use log::warn;

use std::io::{self, Write};

/// The string terminator of the DOS AH=09h print service.
const STRING_TERMINATOR: u8 = b'$';

/// Receiver for bytes printed by the INT 21h output services.
///
/// One byte arrives per character; the `$` terminator is never delivered.
pub trait OutputSink {
    fn write_byte(&mut self, byte: u8);
}

/// Collects the printed bytes, mainly for tests and embedding.
impl OutputSink for Vec<u8> {
    fn write_byte(&mut self, byte: u8) {
        self.push(byte);
    }
}

/// Collects the printed bytes into a buffer the caller keeps a handle to.
impl OutputSink for std::rc::Rc<std::cell::RefCell<Vec<u8>>> {
    fn write_byte(&mut self, byte: u8) {
        self.borrow_mut().push(byte);
    }
}

/// Forwards the printed bytes to the process standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_byte(&mut self, byte: u8) {
        let _ = io::stdout().write_all(&[byte]);
    }
}

impl I8086 {
    pub(crate) fn execute_int(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let vector = self.fetch_byte(memory)?;
        self.interrupt(memory, vector)
    }

    /// INTO traps only when OF is set: push FLAGS, CS and IP, clear IF and
    /// TF, then take vector 4.
    pub(crate) fn execute_into(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        if !self.regs.flag(Flags::OF) {
            return Ok(());
        }
        let flags = self.regs.get(Register::Flags);
        let cs = self.regs.get(Register::Cs);
        let ip = self.regs.get(Register::Ip);
        self.push(memory, flags)?;
        self.push(memory, cs)?;
        self.push(memory, ip)?;
        self.regs.set_flag(Flags::IF, false);
        self.regs.set_flag(Flags::TF, false);
        self.interrupt(memory, 4)
    }

    /// IRET pops IP, CS and FLAGS, in that order.
    pub(crate) fn execute_iret(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let ip = self.pop(memory)?;
        let cs = self.pop(memory)?;
        let flags = self.pop(memory)?;
        self.regs.set(Register::Ip, ip);
        self.regs.set(Register::Cs, cs);
        self.regs.set(Register::Flags, flags);
        self.notify_control_flow(crate::ControlFlowEvent::Return);
        Ok(())
    }

    /// Dispatches a software interrupt by vector number.
    pub(crate) fn interrupt(&mut self, memory: &mut Memory, vector: u8) -> Result<(), Error> {
        match vector {
            0x21 => self.dos_service(memory),
            _ => {
                warn!("unhandled interrupt vector {vector:#04X}");
                Ok(())
            },
        }
    }

    /// The DOS function selected by AH.
    ///
    /// AH=09h writes the `$`-terminated string at DS:DX to the output sink;
    /// AH=02h writes the single character in DL. Anything else is ignored.
    fn dos_service(&mut self, memory: &mut Memory) -> Result<(), Error> {
        match self.regs.high_byte(Register::Ax)? {
            0x02 => {
                let byte = self.regs.low_byte(Register::Dx)?;
                self.sink_byte(byte);
                self.regs.set_low_byte(Register::Ax, byte)?;
            },
            0x09 => {
                let segment = self.regs.get(Register::Ds);
                let mut offset = self.regs.get(Register::Dx);
                loop {
                    let byte = memory.read_byte(physical(segment, offset))?;
                    if byte == STRING_TERMINATOR {
                        break;
                    }
                    self.sink_byte(byte);
                    offset = offset.wrapping_add(1);
                }
                self.regs.set_low_byte(Register::Ax, STRING_TERMINATOR)?;
            },
            function => warn!("unhandled DOS function AH={function:#04X}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::physical;

    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn int21_ah09_prints_until_terminator() {
        let mut memory = Memory::new(0x10000);
        let mut cpu = I8086::new();
        let output = Rc::new(RefCell::new(Vec::new()));
        cpu.set_output_sink(Box::new(output.clone()));

        let base = physical(cpu.regs.get(Register::Ds), 0x0040);
        memory.load_bytes(base, b"Hello$world").unwrap();
        cpu.regs.set(Register::Dx, 0x0040);
        cpu.regs.set_high_byte(Register::Ax, 0x09).unwrap();

        cpu.interrupt(&mut memory, 0x21).unwrap();

        // The terminator itself is not emitted.
        assert_eq!(*output.borrow(), b"Hello");
        assert_eq!(cpu.regs.low_byte(Register::Ax).unwrap(), b'$');
    }

    #[test]
    fn other_vectors_are_ignored() {
        let mut memory = Memory::new(0x1000);
        let mut cpu = I8086::new();
        let before = cpu.regs;
        cpu.interrupt(&mut memory, 0x10).unwrap();
        assert_eq!(cpu.regs, before);
    }
}
