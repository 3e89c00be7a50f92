// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types of the simulator core.

use crate::Register;

use thiserror::Error;

/// Runtime faults raised by the memory system and the execution engine.
///
/// Any of these aborts the current `execute_instruction` step; drivers stop
/// their loop and leave the CPU state available for inspection.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// An access whose range crosses the configured memory size.
    #[error("memory access out of range: {len} byte(s) at {addr:#07X} (memory size {size:#X})")]
    AddressOutOfRange { addr: u32, len: u32, size: u32 },

    /// High/low byte access on a register other than AX-DX.
    #[error("register {0} has no 8-bit halves")]
    NotByteAddressable(Register),

    /// The fetched opcode has no decoded handler.
    #[error("unknown opcode {opcode:#04X} at {cs:#06X}:{ip:#06X}")]
    UnknownOpcode { opcode: u8, cs: u16, ip: u16 },

    /// The ModR/M reg field selects an extension the opcode group does not implement.
    #[error("opcode {opcode:#04X} does not implement ModR/M extension /{extension}")]
    UnsupportedExtension { opcode: u8, extension: u8 },

    /// DIV or IDIV with a zero divisor.
    #[error("division by zero")]
    DivideByZero,

    /// DIV or IDIV whose quotient does not fit the destination.
    #[error("division overflow")]
    DivideOverflow,
}

/// An assembler fault, tied to the 1-based source line it occurred on.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct AssemblyError {
    pub line: usize,
    pub kind: AssemblyErrorKind,
}

/// The reason a source line failed to assemble.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AssemblyErrorKind {
    #[error("cannot read source file: {0}")]
    Io(String),

    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),

    #[error("`{mnemonic}` expects {expected} operand(s), got {got}")]
    OperandCount {
        mnemonic: String,
        expected: usize,
        got: usize,
    },

    #[error("unsupported operand combination for `{0}`")]
    OperandCombination(String),

    #[error("register size mismatch between `{0}` and `{1}`")]
    RegisterSizeMismatch(String, String),

    #[error("immediate {value} does not fit in {bits} bits")]
    ImmediateOverflow { value: i64, bits: u32 },

    #[error("unknown label or variable `{0}`")]
    UnknownSymbol(String),

    #[error("short jump displacement {0} out of range -128..=127")]
    JumpOutOfRange(i32),

    #[error("malformed operand `{0}`")]
    MalformedOperand(String),

    #[error("cannot write program byte: {0}")]
    Emit(String),
}

impl AssemblyErrorKind {
    /// Attaches the offending source line number.
    pub fn on_line(self, line: usize) -> AssemblyError {
        AssemblyError { line, kind: self }
    }
}
