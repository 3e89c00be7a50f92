// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Intel 8086 interpreter, assembler and debugger.
//!
//! This library simulates the user-visible behaviour of the Intel 8086
//! 16-bit microprocessor: the segmented 1 MiB memory model, the full
//! register file and FLAGS word, and an instruction engine dispatching on
//! the first opcode byte. A two-pass assembler for a MASM-flavoured subset
//! loads source programs straight into memory, and a small debugger drives
//! the core with address breakpoints and single stepping.
//!
//! The memory system is a separate value passed to the core on each step,
//! so the caller stays in control of ownership:
//!
//! ```
//! use i8086::{I8086, Memory, Register};
//!
//! let mut memory = Memory::new(0x1_0000);
//! // MOV AX, 0x1234; HLT
//! memory.load_bytes(0x0100, &[0xB8, 0x34, 0x12, 0xF4]).unwrap();
//!
//! let mut cpu = I8086::new();
//! cpu.run(&mut memory, None).unwrap();
//! assert_eq!(cpu.regs.get(Register::Ax), 0x1234);
//! assert!(cpu.halted);
//! ```
//!
//! Programs can also be assembled from source with
//! [Assembler](assembler::Assembler), which lays out the `.CODE`, `.DATA`
//! and `.STACK` sections, resolves labels and fixes up relative jumps. The
//! built-in INT 21h/AH=09h service prints a `$`-terminated string through a
//! caller-supplied [OutputSink].

pub mod addressing;
pub mod assembler;
pub mod debugger;
pub mod error;
pub mod flags;
pub mod isa;
pub mod memory;
pub mod profiler;
pub mod utils;
mod interpreter;
mod interrupt;

pub use error::Error;
pub use flags::Flags;
pub use interrupt::{OutputSink, StdoutSink};
pub use memory::Memory;
pub use profiler::{ControlFlowEvent, Profiler, SharedProfiler};

use std::collections::BTreeMap;

/// The fourteen 16-bit registers, in their architectural enumeration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Register {
    Ax,
    Bx,
    Cx,
    Dx,
    Sp,
    Bp,
    Si,
    Di,
    Cs,
    Ds,
    Ss,
    Es,
    Ip,
    Flags,
}

impl Register {
    /// All registers, in enumeration order.
    pub const ALL: [Self; 14] = [
        Self::Ax, Self::Bx, Self::Cx, Self::Dx,
        Self::Sp, Self::Bp, Self::Si, Self::Di,
        Self::Cs, Self::Ds, Self::Ss, Self::Es,
        Self::Ip, Self::Flags,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Ax => "AX",
            Self::Bx => "BX",
            Self::Cx => "CX",
            Self::Dx => "DX",
            Self::Sp => "SP",
            Self::Bp => "BP",
            Self::Si => "SI",
            Self::Di => "DI",
            Self::Cs => "CS",
            Self::Ds => "DS",
            Self::Ss => "SS",
            Self::Es => "ES",
            Self::Ip => "IP",
            Self::Flags => "FLAGS",
        }
    }

    /// Whether the register exposes AH/AL-style 8-bit halves.
    pub const fn has_byte_halves(self) -> bool {
        matches!(self, Self::Ax | Self::Bx | Self::Cx | Self::Dx)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The 8086 register file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    file: [u16; 14],
}

impl Registers {
    pub fn get(&self, reg: Register) -> u16 {
        self.file[reg as usize]
    }

    /// All writes are masked to 16 bits by the type.
    pub fn set(&mut self, reg: Register, value: u16) {
        self.file[reg as usize] = value;
    }

    /// The high byte of AX-DX. Fails for any other register.
    pub fn high_byte(&self, reg: Register) -> Result<u8, Error> {
        if reg.has_byte_halves() {
            Ok((self.get(reg) >> 8) as u8)
        } else {
            Err(Error::NotByteAddressable(reg))
        }
    }

    /// The low byte of AX-DX. Fails for any other register.
    pub fn low_byte(&self, reg: Register) -> Result<u8, Error> {
        if reg.has_byte_halves() {
            Ok(self.get(reg) as u8)
        } else {
            Err(Error::NotByteAddressable(reg))
        }
    }

    /// Sets the high byte of AX-DX, leaving the low byte unchanged.
    pub fn set_high_byte(&mut self, reg: Register, value: u8) -> Result<(), Error> {
        if reg.has_byte_halves() {
            self.set(reg, self.get(reg) & 0x00FF | (value as u16) << 8);
            Ok(())
        } else {
            Err(Error::NotByteAddressable(reg))
        }
    }

    /// Sets the low byte of AX-DX, leaving the high byte unchanged.
    pub fn set_low_byte(&mut self, reg: Register, value: u8) -> Result<(), Error> {
        if reg.has_byte_halves() {
            self.set(reg, self.get(reg) & 0xFF00 | value as u16);
            Ok(())
        } else {
            Err(Error::NotByteAddressable(reg))
        }
    }

    /// The FLAGS word as its typed view.
    pub fn flags(&self) -> Flags {
        Flags::from_bits_retain(self.get(Register::Flags))
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.set(Register::Flags, flags.bits());
    }

    pub fn flag(&self, flag: Flags) -> bool {
        self.flags().contains(flag)
    }

    /// Sets or clears a single flag, preserving every other bit.
    pub fn set_flag(&mut self, flag: Flags, set: bool) {
        let mut flags = self.flags();
        flags.set(flag, set);
        self.set_flags(flags);
    }

    /// Mapping from register name to its current 16-bit value.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u16> {
        Register::ALL
            .into_iter()
            .map(|reg| (reg.name(), self.get(reg)))
            .collect()
    }
}

/// An Intel 8086 core.
///
/// The core owns the register file and the halted state; memory is passed in
/// on each step. Call [reset](Self::reset) (done by [new](Self::new)) to
/// establish the COM-style initial layout, then drive it with
/// [execute_instruction](Self::execute_instruction) or [run](Self::run).
pub struct I8086 {
    /// The registers of the CPU.
    pub regs: Registers,
    /// True after HLT until the next reset. Steps taken while halted report no progress.
    pub halted: bool,
    instruction_count: u64,
    profiler: Option<SharedProfiler>,
    sink: Option<Box<dyn OutputSink>>,
}

impl I8086 {
    /// Creates a new core in its reset state.
    pub fn new() -> Self {
        let mut cpu = Self {
            regs: Registers::default(),
            halted: false,
            instruction_count: 0,
            profiler: None,
            sink: None,
        };
        cpu.reset();
        cpu
    }

    /// Reinitialises the register file and clears the halted state.
    ///
    /// The initial layout mimics a COM program: CS=DS=SS=ES=0x0010 so the
    /// base physical address is 0x0100, IP=0, SP=0xFFFE, everything else
    /// zero. The attached profiler and output sink are preserved.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.regs.set(Register::Cs, 0x0010);
        self.regs.set(Register::Ds, 0x0010);
        self.regs.set(Register::Ss, 0x0010);
        self.regs.set(Register::Es, 0x0010);
        self.regs.set(Register::Sp, 0xFFFE);
        self.halted = false;
        self.instruction_count = 0;
    }

    /// Attaches a profiling hook, replacing any previous one.
    pub fn set_profiler(&mut self, profiler: SharedProfiler) {
        self.profiler = Some(profiler);
    }

    /// Supplies the sink receiving bytes printed by the INT 21h service.
    pub fn set_output_sink(&mut self, sink: Box<dyn OutputSink>) {
        self.sink = Some(sink);
    }

    /// Takes the output sink back from the core.
    pub fn take_output_sink(&mut self) -> Option<Box<dyn OutputSink>> {
        self.sink.take()
    }

    /// Number of instructions executed since the last reset.
    pub fn instructions_executed(&self) -> u64 {
        self.instruction_count
    }

    pub(crate) fn count_instruction(&mut self) {
        self.instruction_count += 1;
    }

    pub(crate) fn profiler(&self) -> Option<&SharedProfiler> {
        self.profiler.as_ref()
    }

    pub(crate) fn notify_control_flow(&self, event: ControlFlowEvent) {
        if let Some(profiler) = &self.profiler {
            profiler.borrow_mut().control_flow(event);
        }
    }

    pub(crate) fn sink_byte(&mut self, byte: u8) {
        if let Some(sink) = &mut self.sink {
            sink.write_byte(byte);
        }
    }
}

impl Default for I8086 {
    fn default() -> Self {
        Self::new()
    }
}
