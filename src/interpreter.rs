// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The instruction handlers and the fetch/decode/execute loop.

use crate::{ControlFlowEvent, I8086, Register};
use crate::addressing::{ModRM, RmOperand};
use crate::error::Error;
use crate::flags::Flags;
use crate::isa::{Isa, opcode_has_modrm};
use crate::memory::{Memory, physical};
use crate::utils::{AluInt, parity};

use log::{debug, trace, warn};

use std::time::Instant;

/// Return type of the instruction handlers.
pub(super) type InterpreterResult = Result<(), Error>;

/// The eight operations of the standard ALU opcode layout, in the encoding
/// order shared by the direct opcodes (bits 3-5) and the 0x80-0x83 group
/// (ModR/M reg field).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AluOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

impl AluOp {
    const fn from_index(index: u8) -> Self {
        match index & 7 {
            0 => Self::Add,
            1 => Self::Or,
            2 => Self::Adc,
            3 => Self::Sbb,
            4 => Self::And,
            5 => Self::Sub,
            6 => Self::Xor,
            _ => Self::Cmp,
        }
    }

    /// CMP computes but never writes its result back.
    const fn writes_back(self) -> bool {
        !matches!(self, Self::Cmp)
    }
}

/// Maps each [Isa] entry to its handler. Indexed by `Isa as usize`.
pub(super) struct Execute;

impl Execute {
    pub(super) const EXECUTE: [fn(&mut I8086, &mut Memory, u8, u8) -> InterpreterResult;
        Isa::_Size as usize] = [
        I8086::execute_unknown,     // Unknown
        I8086::execute_aaa,         // Aaa
        I8086::execute_aad,         // Aad
        I8086::execute_aam,         // Aam
        I8086::execute_aas,         // Aas
        I8086::execute_alu,         // Adc
        I8086::execute_alu,         // Add
        I8086::execute_alu_imm,     // AluImm
        I8086::execute_alu,         // And
        I8086::execute_call,        // Call
        I8086::execute_call_far,    // CallFar
        I8086::execute_cbw,         // Cbw
        I8086::execute_clc,         // Clc
        I8086::execute_cld,         // Cld
        I8086::execute_cli,         // Cli
        I8086::execute_cmc,         // Cmc
        I8086::execute_alu,         // Cmp
        I8086::execute_cmps,        // Cmps
        I8086::execute_cwd,         // Cwd
        I8086::execute_daa,         // Daa
        I8086::execute_das,         // Das
        I8086::execute_dec_reg,     // DecReg
        I8086::execute_esc,         // Esc
        I8086::execute_group3,      // Group3
        I8086::execute_group4,      // Group4
        I8086::execute_group5,      // Group5
        I8086::execute_hlt,         // Hlt
        I8086::execute_in,          // In
        I8086::execute_inc_reg,     // IncReg
        I8086::execute_int,         // Int
        I8086::execute_into,        // Into
        I8086::execute_iret,        // Iret
        I8086::execute_jcc,         // Jcc
        I8086::execute_jcxz,        // Jcxz
        I8086::execute_jmp,         // Jmp
        I8086::execute_jmp_far,     // JmpFar
        I8086::execute_lahf,        // Lahf
        I8086::execute_lds,         // Lds
        I8086::execute_lea,         // Lea
        I8086::execute_les,         // Les
        I8086::execute_lock,        // Lock
        I8086::execute_lods,        // Lods
        I8086::execute_loop,        // Loop
        I8086::execute_loop,        // Loope
        I8086::execute_loop,        // Loopne
        I8086::execute_mov,         // Mov
        I8086::execute_mov_direct,  // MovDirect
        I8086::execute_mov_imm,     // MovImm
        I8086::execute_mov_imm_rm,  // MovImmRm
        I8086::execute_mov_segment, // MovSegment
        I8086::execute_movs,        // Movs
        I8086::execute_nop,         // Nop
        I8086::execute_alu,         // Or
        I8086::execute_out,         // Out
        I8086::execute_pop,         // Pop
        I8086::execute_popf,        // Popf
        I8086::execute_push,        // Push
        I8086::execute_pushf,       // Pushf
        I8086::execute_rep,         // Rep
        I8086::execute_rep,         // Repne
        I8086::execute_ret,         // Ret
        I8086::execute_ret_far,     // RetFar
        I8086::execute_sahf,        // Sahf
        I8086::execute_alu,         // Sbb
        I8086::execute_scas,        // Scas
        I8086::execute_shift,       // Shift
        I8086::execute_stc,         // Stc
        I8086::execute_std,         // Std
        I8086::execute_sti,         // Sti
        I8086::execute_stos,        // Stos
        I8086::execute_alu,         // Sub
        I8086::execute_test,        // Test
        I8086::execute_wait,        // Wait
        I8086::execute_xlat,        // Xlat
        I8086::execute_alu,         // Xor
    ];
}

impl I8086 {
    /// Runs one fetch/decode/execute step.
    ///
    /// Returns `Ok(true)` when an instruction was executed, `Ok(false)` when
    /// the CPU is halted, and `Err` when the step faulted. A faulting step
    /// does not corrupt state beyond the single failing operation.
    pub fn execute_instruction(&mut self, memory: &mut Memory) -> Result<bool, Error> {
        if self.halted {
            return Ok(false);
        }

        let started = Instant::now();
        let at = self.physical_ip();
        let opcode = self.fetch_byte(memory)?;
        trace!("{at:05X}: opcode {opcode:#04X}");

        self.dispatch(memory, opcode)?;
        self.count_instruction();

        if let Some(profiler) = self.profiler() {
            profiler.borrow_mut().instruction_executed(opcode, started.elapsed());
        }
        Ok(true)
    }

    /// Repeats [execute_instruction](Self::execute_instruction) until the CPU
    /// halts, the optional instruction budget is exhausted, or a step faults.
    ///
    /// Returns the number of instructions executed by this call.
    pub fn run(&mut self, memory: &mut Memory, max_instructions: Option<u64>) -> Result<u64, Error> {
        let mut executed = 0;
        loop {
            if max_instructions.is_some_and(|max| executed >= max) {
                break;
            }
            if !self.execute_instruction(memory)? {
                break;
            }
            executed += 1;
        }
        Ok(executed)
    }

    /// Resolves the handler for an already-fetched opcode byte and runs it,
    /// fetching the ModR/M byte first when the opcode takes one.
    pub(crate) fn dispatch(&mut self, memory: &mut Memory, opcode: u8) -> InterpreterResult {
        let isa = Isa::from(opcode);
        if isa == Isa::Unknown {
            return Err(Error::UnknownOpcode {
                opcode,
                cs: self.regs.get(Register::Cs),
                ip: self.regs.get(Register::Ip).wrapping_sub(1),
            });
        }

        let modrm = if opcode_has_modrm(opcode) {
            self.fetch_byte(memory)?
        } else {
            0
        };
        Execute::EXECUTE[isa as usize](self, memory, opcode, modrm)
    }

    fn execute_unknown(&mut self, _: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        Err(Error::UnknownOpcode {
            opcode,
            cs: self.regs.get(Register::Cs),
            ip: self.regs.get(Register::Ip).wrapping_sub(1),
        })
    }

    // ALU flag helpers, generic over the two operand widths.

    fn set_arith_flags<T: AluInt>(&mut self, res: T, carry: bool, aux: bool, overflow: bool) {
        let mut flags = self.regs.flags();
        flags.set(Flags::CF, carry);
        flags.set(Flags::AF, aux);
        flags.set(Flags::OF, overflow);
        flags.set(Flags::ZF, res == T::ZERO);
        flags.set(Flags::SF, res.msb());
        flags.set(Flags::PF, parity(res.low_byte()));
        self.regs.set_flags(flags);
    }

    fn add_value<T: AluInt>(&mut self, dst: T, src: T, with_carry: bool) -> T {
        let carry = with_carry && self.regs.flag(Flags::CF);
        let (res, carry_out) = dst.extended_add(src, carry);
        let aux = dst.low_nibble() + src.low_nibble() + carry as u16 > 0x0F;
        let overflow = (!(dst ^ src) & (dst ^ res)).msb();
        self.set_arith_flags(res, carry_out, aux, overflow);
        res
    }

    fn sub_value<T: AluInt>(&mut self, dst: T, src: T, with_borrow: bool) -> T {
        let borrow = with_borrow && self.regs.flag(Flags::CF);
        let (res, borrow_out) = dst.extended_sub(src, borrow);
        let aux = dst.low_nibble() < src.low_nibble() + borrow as u16;
        let overflow = ((dst ^ src) & (dst ^ res)).msb();
        self.set_arith_flags(res, borrow_out, aux, overflow);
        res
    }

    /// Flag update shared by AND, OR, XOR and TEST: CF and OF cleared, AF
    /// zeroed, ZF/SF/PF from the result.
    fn logic_value<T: AluInt>(&mut self, res: T) -> T {
        let mut flags = self.regs.flags();
        flags.set(Flags::CF, false);
        flags.set(Flags::OF, false);
        flags.set(Flags::AF, false);
        flags.set(Flags::ZF, res == T::ZERO);
        flags.set(Flags::SF, res.msb());
        flags.set(Flags::PF, parity(res.low_byte()));
        self.regs.set_flags(flags);
        res
    }

    fn alu<T: AluInt>(&mut self, op: AluOp, dst: T, src: T) -> T {
        match op {
            AluOp::Add => self.add_value(dst, src, false),
            AluOp::Adc => self.add_value(dst, src, true),
            AluOp::Sub | AluOp::Cmp => self.sub_value(dst, src, false),
            AluOp::Sbb => self.sub_value(dst, src, true),
            AluOp::And => self.logic_value(dst & src),
            AluOp::Or => self.logic_value(dst | src),
            AluOp::Xor => self.logic_value(dst ^ src),
        }
    }

    /// INC and DEC leave CF untouched.
    fn inc_value<T: AluInt>(&mut self, value: T) -> T {
        let carry = self.regs.flag(Flags::CF);
        let res = self.add_value(value, T::ONE, false);
        self.regs.set_flag(Flags::CF, carry);
        res
    }

    fn dec_value<T: AluInt>(&mut self, value: T) -> T {
        let carry = self.regs.flag(Flags::CF);
        let res = self.sub_value(value, T::ONE, false);
        self.regs.set_flag(Flags::CF, carry);
        res
    }

    // Arithmetic and logic.

    /// The six-opcode layout shared by ADD, OR, ADC, SBB, AND, SUB, XOR and
    /// CMP: four ModR/M forms plus the AL/AX immediate forms.
    fn execute_alu(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let op = AluOp::from_index(opcode >> 3);
        let word = opcode & 1 != 0;

        if opcode & 4 == 0 {
            let modrm = ModRM(modrm);
            let rm = self.rm_operand(memory, modrm)?;
            let to_rm = opcode & 2 == 0;

            if word {
                let rm_value = self.read_rm16(memory, rm)?;
                let reg_value = self.regs.reg16(modrm.reg());
                if to_rm {
                    let res = self.alu(op, rm_value, reg_value);
                    if op.writes_back() {
                        self.write_rm16(memory, rm, res)?;
                    }
                } else {
                    let res = self.alu(op, reg_value, rm_value);
                    if op.writes_back() {
                        self.regs.set_reg16(modrm.reg(), res);
                    }
                }
            } else {
                let rm_value = self.read_rm8(memory, rm)?;
                let reg_value = self.regs.reg8(modrm.reg());
                if to_rm {
                    let res = self.alu(op, rm_value, reg_value);
                    if op.writes_back() {
                        self.write_rm8(memory, rm, res)?;
                    }
                } else {
                    let res = self.alu(op, reg_value, rm_value);
                    if op.writes_back() {
                        self.regs.set_reg8(modrm.reg(), res);
                    }
                }
            }
        } else if word {
            let imm = self.fetch_word(memory)?;
            let dst = self.regs.get(Register::Ax);
            let res = self.alu(op, dst, imm);
            if op.writes_back() {
                self.regs.set(Register::Ax, res);
            }
        } else {
            let imm = self.fetch_byte(memory)?;
            let dst = self.regs.reg8(0);
            let res = self.alu(op, dst, imm);
            if op.writes_back() {
                self.regs.set_reg8(0, res);
            }
        }
        Ok(())
    }

    /// Immediate group 0x80-0x83; the operation comes from the reg field.
    fn execute_alu_imm(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let modrm = ModRM(modrm);
        let op = AluOp::from_index(modrm.reg());
        let rm = self.rm_operand(memory, modrm)?;

        match opcode & 3 {
            0 | 2 => {
                let dst = self.read_rm8(memory, rm)?;
                let imm = self.fetch_byte(memory)?;
                let res = self.alu(op, dst, imm);
                if op.writes_back() {
                    self.write_rm8(memory, rm, res)?;
                }
            },
            1 => {
                let dst = self.read_rm16(memory, rm)?;
                let imm = self.fetch_word(memory)?;
                let res = self.alu(op, dst, imm);
                if op.writes_back() {
                    self.write_rm16(memory, rm, res)?;
                }
            },
            _ => {
                // 0x83: sign-extended imm8 against a word operand.
                let dst = self.read_rm16(memory, rm)?;
                let imm = self.fetch_byte(memory)? as i8 as i16 as u16;
                let res = self.alu(op, dst, imm);
                if op.writes_back() {
                    self.write_rm16(memory, rm, res)?;
                }
            },
        }
        Ok(())
    }

    fn execute_inc_reg(&mut self, _: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let code = opcode & 7;
        let res = self.inc_value(self.regs.reg16(code));
        self.regs.set_reg16(code, res);
        Ok(())
    }

    fn execute_dec_reg(&mut self, _: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let code = opcode & 7;
        let res = self.dec_value(self.regs.reg16(code));
        self.regs.set_reg16(code, res);
        Ok(())
    }

    fn execute_test(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        match opcode {
            0x84 => {
                let modrm = ModRM(modrm);
                let rm = self.rm_operand(memory, modrm)?;
                let res = self.read_rm8(memory, rm)? & self.regs.reg8(modrm.reg());
                self.logic_value(res);
            },
            0x85 => {
                let modrm = ModRM(modrm);
                let rm = self.rm_operand(memory, modrm)?;
                let res = self.read_rm16(memory, rm)? & self.regs.reg16(modrm.reg());
                self.logic_value(res);
            },
            0xA8 => {
                let imm = self.fetch_byte(memory)?;
                let res = self.regs.reg8(0) & imm;
                self.logic_value(res);
            },
            _ => {
                let imm = self.fetch_word(memory)?;
                let res = self.regs.get(Register::Ax) & imm;
                self.logic_value(res);
            },
        }
        Ok(())
    }

    fn execute_cbw(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let extended = self.regs.reg8(0) as i8 as i16 as u16;
        self.regs.set(Register::Ax, extended);
        Ok(())
    }

    fn execute_cwd(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let high = if self.regs.get(Register::Ax) & 0x8000 != 0 {
            0xFFFF
        } else {
            0x0000
        };
        self.regs.set(Register::Dx, high);
        Ok(())
    }

    // Decimal adjust family.

    fn set_szp_byte(&mut self, value: u8) {
        let mut flags = self.regs.flags();
        flags.set(Flags::ZF, value == 0);
        flags.set(Flags::SF, value & 0x80 != 0);
        flags.set(Flags::PF, parity(value));
        self.regs.set_flags(flags);
    }

    fn execute_daa(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let old_al = self.regs.reg8(0);
        let old_cf = self.regs.flag(Flags::CF);
        let mut al = old_al;

        if al & 0x0F > 9 || self.regs.flag(Flags::AF) {
            al = al.wrapping_add(0x06);
            self.regs.set_flag(Flags::AF, true);
        } else {
            self.regs.set_flag(Flags::AF, false);
        }
        if old_al > 0x99 || old_cf {
            al = al.wrapping_add(0x60);
            self.regs.set_flag(Flags::CF, true);
        } else {
            self.regs.set_flag(Flags::CF, false);
        }

        self.regs.set_reg8(0, al);
        self.set_szp_byte(al);
        Ok(())
    }

    fn execute_das(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let old_al = self.regs.reg8(0);
        let old_cf = self.regs.flag(Flags::CF);
        let mut al = old_al;

        if al & 0x0F > 9 || self.regs.flag(Flags::AF) {
            al = al.wrapping_sub(0x06);
            self.regs.set_flag(Flags::AF, true);
        } else {
            self.regs.set_flag(Flags::AF, false);
        }
        if old_al > 0x99 || old_cf {
            al = al.wrapping_sub(0x60);
            self.regs.set_flag(Flags::CF, true);
        } else {
            self.regs.set_flag(Flags::CF, false);
        }

        self.regs.set_reg8(0, al);
        self.set_szp_byte(al);
        Ok(())
    }

    fn execute_aaa(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        if self.regs.reg8(0) & 0x0F > 9 || self.regs.flag(Flags::AF) {
            let al = self.regs.reg8(0).wrapping_add(6);
            let ah = self.regs.reg8(4).wrapping_add(1);
            self.regs.set_reg8(0, al);
            self.regs.set_reg8(4, ah);
            self.regs.set_flag(Flags::AF, true);
            self.regs.set_flag(Flags::CF, true);
        } else {
            self.regs.set_flag(Flags::AF, false);
            self.regs.set_flag(Flags::CF, false);
        }
        let al = self.regs.reg8(0) & 0x0F;
        self.regs.set_reg8(0, al);
        Ok(())
    }

    fn execute_aas(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        if self.regs.reg8(0) & 0x0F > 9 || self.regs.flag(Flags::AF) {
            let al = self.regs.reg8(0).wrapping_sub(6);
            let ah = self.regs.reg8(4).wrapping_sub(1);
            self.regs.set_reg8(0, al);
            self.regs.set_reg8(4, ah);
            self.regs.set_flag(Flags::AF, true);
            self.regs.set_flag(Flags::CF, true);
        } else {
            self.regs.set_flag(Flags::AF, false);
            self.regs.set_flag(Flags::CF, false);
        }
        let al = self.regs.reg8(0) & 0x0F;
        self.regs.set_reg8(0, al);
        Ok(())
    }

    fn execute_aam(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let base = self.fetch_byte(memory)?;
        if base == 0 {
            return Err(Error::DivideByZero);
        }
        let al = self.regs.reg8(0);
        self.regs.set_reg8(4, al / base);
        self.regs.set_reg8(0, al % base);
        self.set_szp_byte(al % base);
        Ok(())
    }

    fn execute_aad(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let base = self.fetch_byte(memory)?;
        let al = self
            .regs
            .reg8(4)
            .wrapping_mul(base)
            .wrapping_add(self.regs.reg8(0));
        self.regs.set_reg8(0, al);
        self.regs.set_reg8(4, 0);
        self.set_szp_byte(al);
        Ok(())
    }

    // Group 0xF6/0xF7: TEST, NOT, NEG, MUL, IMUL, DIV, IDIV.

    fn set_mul_flags(&mut self, upper_used: bool) {
        self.regs.set_flag(Flags::CF, upper_used);
        self.regs.set_flag(Flags::OF, upper_used);
    }

    fn execute_group3(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let modrm = ModRM(modrm);
        let word = opcode & 1 != 0;
        let rm = self.rm_operand(memory, modrm)?;

        match modrm.reg() {
            0 | 1 => {
                if word {
                    let value = self.read_rm16(memory, rm)?;
                    let imm = self.fetch_word(memory)?;
                    self.logic_value(value & imm);
                } else {
                    let value = self.read_rm8(memory, rm)?;
                    let imm = self.fetch_byte(memory)?;
                    self.logic_value(value & imm);
                }
            },
            2 => {
                // NOT does not affect flags.
                if word {
                    let value = self.read_rm16(memory, rm)?;
                    self.write_rm16(memory, rm, !value)?;
                } else {
                    let value = self.read_rm8(memory, rm)?;
                    self.write_rm8(memory, rm, !value)?;
                }
            },
            3 => {
                if word {
                    let value = self.read_rm16(memory, rm)?;
                    let res = self.sub_value(0u16, value, false);
                    self.write_rm16(memory, rm, res)?;
                } else {
                    let value = self.read_rm8(memory, rm)?;
                    let res = self.sub_value(0u8, value, false);
                    self.write_rm8(memory, rm, res)?;
                }
            },
            4 => {
                if word {
                    let src = self.read_rm16(memory, rm)? as u32;
                    let product = self.regs.get(Register::Ax) as u32 * src;
                    self.regs.set(Register::Ax, product as u16);
                    self.regs.set(Register::Dx, (product >> 16) as u16);
                    self.set_mul_flags(product >> 16 != 0);
                } else {
                    let src = self.read_rm8(memory, rm)? as u16;
                    let product = self.regs.reg8(0) as u16 * src;
                    self.regs.set(Register::Ax, product);
                    self.set_mul_flags(product >> 8 != 0);
                }
            },
            5 => {
                if word {
                    let src = self.read_rm16(memory, rm)? as i16 as i32;
                    let product = self.regs.get(Register::Ax) as i16 as i32 * src;
                    self.regs.set(Register::Ax, product as u16);
                    self.regs.set(Register::Dx, (product >> 16) as u16);
                    self.set_mul_flags(product != product as i16 as i32);
                } else {
                    let src = self.read_rm8(memory, rm)? as i8 as i16;
                    let product = self.regs.reg8(0) as i8 as i16 * src;
                    self.regs.set(Register::Ax, product as u16);
                    self.set_mul_flags(product != product as i8 as i16);
                }
            },
            6 => {
                if word {
                    let divisor = self.read_rm16(memory, rm)? as u32;
                    if divisor == 0 {
                        return Err(Error::DivideByZero);
                    }
                    let dividend =
                        (self.regs.get(Register::Dx) as u32) << 16 | self.regs.get(Register::Ax) as u32;
                    let quotient = dividend / divisor;
                    if quotient > 0xFFFF {
                        return Err(Error::DivideOverflow);
                    }
                    self.regs.set(Register::Ax, quotient as u16);
                    self.regs.set(Register::Dx, (dividend % divisor) as u16);
                } else {
                    let divisor = self.read_rm8(memory, rm)? as u16;
                    if divisor == 0 {
                        return Err(Error::DivideByZero);
                    }
                    let dividend = self.regs.get(Register::Ax);
                    let quotient = dividend / divisor;
                    if quotient > 0xFF {
                        return Err(Error::DivideOverflow);
                    }
                    self.regs.set_reg8(0, quotient as u8);
                    self.regs.set_reg8(4, (dividend % divisor) as u8);
                }
            },
            _ => {
                if word {
                    let divisor = self.read_rm16(memory, rm)? as i16 as i64;
                    if divisor == 0 {
                        return Err(Error::DivideByZero);
                    }
                    let dividend = ((self.regs.get(Register::Dx) as u32) << 16
                        | self.regs.get(Register::Ax) as u32) as i32 as i64;
                    let quotient = dividend / divisor;
                    if quotient < i16::MIN as i64 || quotient > i16::MAX as i64 {
                        return Err(Error::DivideOverflow);
                    }
                    self.regs.set(Register::Ax, quotient as u16);
                    self.regs.set(Register::Dx, (dividend % divisor) as u16);
                } else {
                    let divisor = self.read_rm8(memory, rm)? as i8 as i32;
                    if divisor == 0 {
                        return Err(Error::DivideByZero);
                    }
                    let dividend = self.regs.get(Register::Ax) as i16 as i32;
                    let quotient = dividend / divisor;
                    if quotient < i8::MIN as i32 || quotient > i8::MAX as i32 {
                        return Err(Error::DivideOverflow);
                    }
                    self.regs.set_reg8(0, quotient as u8);
                    self.regs.set_reg8(4, (dividend % divisor) as u8);
                }
            },
        }
        Ok(())
    }

    /// Group 0xFE: INC and DEC on r/m8.
    fn execute_group4(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let modrm = ModRM(modrm);
        let rm = self.rm_operand(memory, modrm)?;
        match modrm.reg() {
            0 => {
                let value = self.read_rm8(memory, rm)?;
                let res = self.inc_value(value);
                self.write_rm8(memory, rm, res)
            },
            1 => {
                let value = self.read_rm8(memory, rm)?;
                let res = self.dec_value(value);
                self.write_rm8(memory, rm, res)
            },
            extension => Err(Error::UnsupportedExtension { opcode, extension }),
        }
    }

    /// Group 0xFF: INC, DEC, near CALL/JMP and PUSH on r/m16. The far
    /// indirect forms are not implemented.
    fn execute_group5(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let modrm = ModRM(modrm);
        let rm = self.rm_operand(memory, modrm)?;
        match modrm.reg() {
            0 => {
                let value = self.read_rm16(memory, rm)?;
                let res = self.inc_value(value);
                self.write_rm16(memory, rm, res)
            },
            1 => {
                let value = self.read_rm16(memory, rm)?;
                let res = self.dec_value(value);
                self.write_rm16(memory, rm, res)
            },
            2 => {
                let target = self.read_rm16(memory, rm)?;
                let ip = self.regs.get(Register::Ip);
                self.push(memory, ip)?;
                self.regs.set(Register::Ip, target);
                self.notify_control_flow(ControlFlowEvent::Call);
                Ok(())
            },
            4 => {
                let target = self.read_rm16(memory, rm)?;
                self.regs.set(Register::Ip, target);
                self.notify_control_flow(ControlFlowEvent::Jump);
                Ok(())
            },
            6 => {
                let value = self.read_rm16(memory, rm)?;
                self.push(memory, value)
            },
            extension => Err(Error::UnsupportedExtension { opcode, extension }),
        }
    }

    // Data transfer.

    fn execute_mov(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let modrm = ModRM(modrm);
        let rm = self.rm_operand(memory, modrm)?;
        match opcode {
            0x88 => {
                let value = self.regs.reg8(modrm.reg());
                self.write_rm8(memory, rm, value)
            },
            0x89 => {
                let value = self.regs.reg16(modrm.reg());
                self.write_rm16(memory, rm, value)
            },
            0x8A => {
                let value = self.read_rm8(memory, rm)?;
                self.regs.set_reg8(modrm.reg(), value);
                Ok(())
            },
            _ => {
                let value = self.read_rm16(memory, rm)?;
                self.regs.set_reg16(modrm.reg(), value);
                Ok(())
            },
        }
    }

    /// 0x8C/0x8E: moves between a segment register and r/m16.
    fn execute_mov_segment(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let modrm = ModRM(modrm);
        let rm = self.rm_operand(memory, modrm)?;
        let segment = crate::addressing::SEGMENT_REG[(modrm.reg() & 3) as usize];
        if opcode == 0x8C {
            let value = self.regs.get(segment);
            self.write_rm16(memory, rm, value)
        } else {
            let value = self.read_rm16(memory, rm)?;
            self.regs.set(segment, value);
            Ok(())
        }
    }

    /// 0xA0-0xA3: accumulator moves with a direct 16-bit offset from DS.
    fn execute_mov_direct(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let offset = self.fetch_word(memory)?;
        let addr = physical(self.regs.get(Register::Ds), offset);
        match opcode {
            0xA0 => {
                let value = memory.read_byte(addr)?;
                self.regs.set_reg8(0, value);
            },
            0xA1 => {
                let value = memory.read_word(addr)?;
                self.regs.set(Register::Ax, value);
            },
            0xA2 => memory.write_byte(addr, self.regs.reg8(0))?,
            _ => memory.write_word(addr, self.regs.get(Register::Ax))?,
        }
        Ok(())
    }

    /// 0xB0-0xBF: immediate to register, the register number in the opcode.
    fn execute_mov_imm(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let code = opcode & 7;
        if opcode < 0xB8 {
            let imm = self.fetch_byte(memory)?;
            self.regs.set_reg8(code, imm);
        } else {
            let imm = self.fetch_word(memory)?;
            self.regs.set_reg16(code, imm);
        }
        Ok(())
    }

    /// 0xC6/0xC7: immediate to r/m.
    fn execute_mov_imm_rm(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let modrm = ModRM(modrm);
        if modrm.reg() != 0 {
            return Err(Error::UnsupportedExtension { opcode, extension: modrm.reg() });
        }
        let rm = self.rm_operand(memory, modrm)?;
        if opcode & 1 == 0 {
            let imm = self.fetch_byte(memory)?;
            self.write_rm8(memory, rm, imm)
        } else {
            let imm = self.fetch_word(memory)?;
            self.write_rm16(memory, rm, imm)
        }
    }

    fn execute_lea(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let modrm = ModRM(modrm);
        match self.rm_operand(memory, modrm)? {
            RmOperand::Memory { offset, .. } => {
                self.regs.set_reg16(modrm.reg(), offset);
                Ok(())
            },
            RmOperand::Register(_) => {
                Err(Error::UnsupportedExtension { opcode, extension: modrm.reg() })
            },
        }
    }

    fn load_far_pointer(
        &mut self,
        memory: &mut Memory,
        opcode: u8,
        modrm: u8,
        segment_reg: Register,
    ) -> InterpreterResult {
        let modrm = ModRM(modrm);
        match self.rm_operand(memory, modrm)? {
            RmOperand::Memory { segment, offset } => {
                let value = memory.read_word(physical(segment, offset))?;
                let segment_value = memory.read_word(physical(segment, offset.wrapping_add(2)))?;
                self.regs.set_reg16(modrm.reg(), value);
                self.regs.set(segment_reg, segment_value);
                Ok(())
            },
            RmOperand::Register(_) => {
                Err(Error::UnsupportedExtension { opcode, extension: modrm.reg() })
            },
        }
    }

    fn execute_les(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        self.load_far_pointer(memory, opcode, modrm, Register::Es)
    }

    fn execute_lds(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        self.load_far_pointer(memory, opcode, modrm, Register::Ds)
    }

    fn execute_xlat(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let offset = self
            .regs
            .get(Register::Bx)
            .wrapping_add(self.regs.reg8(0) as u16);
        let value = memory.read_byte(physical(self.regs.get(Register::Ds), offset))?;
        self.regs.set_reg8(0, value);
        Ok(())
    }

    // Stack.

    fn execute_push(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let value = self.regs.reg16(opcode & 7);
        self.push(memory, value)
    }

    fn execute_pop(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let value = self.pop(memory)?;
        self.regs.set_reg16(opcode & 7, value);
        Ok(())
    }

    fn execute_pushf(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let flags = self.regs.get(Register::Flags);
        self.push(memory, flags)
    }

    fn execute_popf(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let flags = self.pop(memory)?;
        self.regs.set(Register::Flags, flags);
        Ok(())
    }

    /// SAHF loads SF, ZF, AF, PF and CF from AH; the other bits are untouched.
    fn execute_sahf(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let ah = self.regs.reg8(4);
        let mut flags = self.regs.flags();
        flags.set(Flags::SF, ah & 0x80 != 0);
        flags.set(Flags::ZF, ah & 0x40 != 0);
        flags.set(Flags::AF, ah & 0x10 != 0);
        flags.set(Flags::PF, ah & 0x04 != 0);
        flags.set(Flags::CF, ah & 0x01 != 0);
        self.regs.set_flags(flags);
        Ok(())
    }

    fn execute_lahf(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let low = self.regs.get(Register::Flags) as u8;
        self.regs.set_reg8(4, low);
        Ok(())
    }

    // Port I/O. No bus is modelled: IN yields zero, OUT discards.

    fn execute_in(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let port = if opcode & 8 == 0 {
            self.fetch_byte(memory)? as u16
        } else {
            self.regs.get(Register::Dx)
        };
        debug!("IN from unconnected port {port:#06X}");
        if opcode & 1 == 0 {
            self.regs.set_reg8(0, 0);
        } else {
            self.regs.set(Register::Ax, 0);
        }
        Ok(())
    }

    fn execute_out(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let port = if opcode & 8 == 0 {
            self.fetch_byte(memory)? as u16
        } else {
            self.regs.get(Register::Dx)
        };
        let value = if opcode & 1 == 0 {
            self.regs.reg8(0) as u16
        } else {
            self.regs.get(Register::Ax)
        };
        debug!("OUT {value:#06X} to unconnected port {port:#06X}");
        Ok(())
    }

    // Shift and rotate group 0xD0-0xD3.

    fn set_shift_flags<T: AluInt>(&mut self, res: T) {
        let mut flags = self.regs.flags();
        flags.set(Flags::ZF, res == T::ZERO);
        flags.set(Flags::SF, res.msb());
        flags.set(Flags::PF, parity(res.low_byte()));
        self.regs.set_flags(flags);
    }

    /// One single-bit shift or rotate step. The operation is the ModR/M reg
    /// field; /6 is rejected by the caller.
    fn shift_step<T: AluInt>(&mut self, operation: u8, value: T) -> T {
        let carry = self.regs.flag(Flags::CF);
        match operation {
            0 => {
                // ROL
                let msb = value.msb();
                let res = value.shl1() | T::from_bit(msb);
                self.regs.set_flag(Flags::CF, msb);
                self.regs.set_flag(Flags::OF, res.msb() != msb);
                res
            },
            1 => {
                // ROR
                let lsb = value.lsb();
                let res = value.shr1() | if lsb { T::SIGN_BIT } else { T::ZERO };
                self.regs.set_flag(Flags::CF, lsb);
                self.regs.set_flag(Flags::OF, res.msb() != res.shl1().msb());
                res
            },
            2 => {
                // RCL
                let msb = value.msb();
                let res = value.shl1() | T::from_bit(carry);
                self.regs.set_flag(Flags::CF, msb);
                self.regs.set_flag(Flags::OF, res.msb() != msb);
                res
            },
            3 => {
                // RCR
                let lsb = value.lsb();
                let res = value.shr1() | if carry { T::SIGN_BIT } else { T::ZERO };
                self.regs.set_flag(Flags::CF, lsb);
                self.regs.set_flag(Flags::OF, res.msb() != res.shl1().msb());
                res
            },
            4 => {
                // SHL
                let msb = value.msb();
                let res = value.shl1();
                self.regs.set_flag(Flags::CF, msb);
                self.regs.set_flag(Flags::OF, res.msb() != msb);
                self.set_shift_flags(res);
                res
            },
            5 => {
                // SHR
                let lsb = value.lsb();
                let res = value.shr1();
                self.regs.set_flag(Flags::CF, lsb);
                self.regs.set_flag(Flags::OF, value.msb());
                self.set_shift_flags(res);
                res
            },
            _ => {
                // SAR
                let lsb = value.lsb();
                let res = value.sar1();
                self.regs.set_flag(Flags::CF, lsb);
                self.regs.set_flag(Flags::OF, false);
                self.set_shift_flags(res);
                res
            },
        }
    }

    fn execute_shift(&mut self, memory: &mut Memory, opcode: u8, modrm: u8) -> InterpreterResult {
        let modrm = ModRM(modrm);
        if modrm.reg() == 6 {
            return Err(Error::UnsupportedExtension { opcode, extension: 6 });
        }
        let rm = self.rm_operand(memory, modrm)?;
        let count = if opcode & 2 == 0 { 1 } else { self.regs.reg8(1) };

        if opcode & 1 != 0 {
            let mut value = self.read_rm16(memory, rm)?;
            for _ in 0..count {
                value = self.shift_step(modrm.reg(), value);
            }
            self.write_rm16(memory, rm, value)
        } else {
            let mut value = self.read_rm8(memory, rm)?;
            for _ in 0..count {
                value = self.shift_step(modrm.reg(), value);
            }
            self.write_rm8(memory, rm, value)
        }
    }

    // String operations. SI and DI move forward or backward under DF.

    fn string_advance(&mut self, reg: Register, word: bool) {
        let delta = if word { 2 } else { 1 };
        let value = self.regs.get(reg);
        let advanced = if self.regs.flag(Flags::DF) {
            value.wrapping_sub(delta)
        } else {
            value.wrapping_add(delta)
        };
        self.regs.set(reg, advanced);
    }

    fn movs_step(&mut self, memory: &mut Memory, word: bool) -> Result<(), Error> {
        let src = physical(self.regs.get(Register::Ds), self.regs.get(Register::Si));
        let dst = physical(self.regs.get(Register::Es), self.regs.get(Register::Di));
        if word {
            let value = memory.read_word(src)?;
            memory.write_word(dst, value)?;
        } else {
            let value = memory.read_byte(src)?;
            memory.write_byte(dst, value)?;
        }
        self.string_advance(Register::Si, word);
        self.string_advance(Register::Di, word);
        Ok(())
    }

    fn cmps_step(&mut self, memory: &mut Memory, word: bool) -> Result<(), Error> {
        let src = physical(self.regs.get(Register::Ds), self.regs.get(Register::Si));
        let dst = physical(self.regs.get(Register::Es), self.regs.get(Register::Di));
        if word {
            let a = memory.read_word(src)?;
            let b = memory.read_word(dst)?;
            self.sub_value(a, b, false);
        } else {
            let a = memory.read_byte(src)?;
            let b = memory.read_byte(dst)?;
            self.sub_value(a, b, false);
        }
        self.string_advance(Register::Si, word);
        self.string_advance(Register::Di, word);
        Ok(())
    }

    fn scas_step(&mut self, memory: &mut Memory, word: bool) -> Result<(), Error> {
        let dst = physical(self.regs.get(Register::Es), self.regs.get(Register::Di));
        if word {
            let b = memory.read_word(dst)?;
            let a = self.regs.get(Register::Ax);
            self.sub_value(a, b, false);
        } else {
            let b = memory.read_byte(dst)?;
            let a = self.regs.reg8(0);
            self.sub_value(a, b, false);
        }
        self.string_advance(Register::Di, word);
        Ok(())
    }

    fn stos_step(&mut self, memory: &mut Memory, word: bool) -> Result<(), Error> {
        let dst = physical(self.regs.get(Register::Es), self.regs.get(Register::Di));
        if word {
            memory.write_word(dst, self.regs.get(Register::Ax))?;
        } else {
            memory.write_byte(dst, self.regs.reg8(0))?;
        }
        self.string_advance(Register::Di, word);
        Ok(())
    }

    fn lods_step(&mut self, memory: &mut Memory, word: bool) -> Result<(), Error> {
        let src = physical(self.regs.get(Register::Ds), self.regs.get(Register::Si));
        if word {
            let value = memory.read_word(src)?;
            self.regs.set(Register::Ax, value);
        } else {
            let value = memory.read_byte(src)?;
            self.regs.set_reg8(0, value);
        }
        self.string_advance(Register::Si, word);
        Ok(())
    }

    fn execute_movs(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        self.movs_step(memory, opcode & 1 != 0)
    }

    fn execute_cmps(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        self.cmps_step(memory, opcode & 1 != 0)
    }

    fn execute_scas(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        self.scas_step(memory, opcode & 1 != 0)
    }

    fn execute_stos(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        self.stos_step(memory, opcode & 1 != 0)
    }

    fn execute_lods(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        self.lods_step(memory, opcode & 1 != 0)
    }

    /// REP/REPE (0xF3) and REPNE (0xF2).
    ///
    /// The prefixed primitive runs while CX is non-zero, decrementing CX
    /// after each iteration; CMPS and SCAS additionally stop as soon as ZF
    /// leaves the required state. With CX initially zero the primitive is
    /// skipped entirely but its opcode is still consumed.
    fn execute_rep(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let require_zf = opcode == 0xF3;
        let primitive = self.fetch_byte(memory)?;
        let word = primitive & 1 != 0;

        let (step, conditional): (fn(&mut I8086, &mut Memory, bool) -> Result<(), Error>, bool) =
            match Isa::from(primitive) {
                Isa::Movs => (I8086::movs_step, false),
                Isa::Stos => (I8086::stos_step, false),
                Isa::Lods => (I8086::lods_step, false),
                Isa::Cmps => (I8086::cmps_step, true),
                Isa::Scas => (I8086::scas_step, true),
                _ => {
                    warn!("REP prefix before non-string opcode {primitive:#04X}, prefix ignored");
                    return self.dispatch(memory, primitive);
                },
            };

        while self.regs.get(Register::Cx) != 0 {
            step(self, memory, word)?;
            let cx = self.regs.get(Register::Cx).wrapping_sub(1);
            self.regs.set(Register::Cx, cx);
            if conditional && self.regs.flag(Flags::ZF) != require_zf {
                break;
            }
        }
        Ok(())
    }

    // Control transfer.

    fn relative_jump(&mut self, displacement: i16) {
        let ip = self.regs.get(Register::Ip).wrapping_add(displacement as u16);
        self.regs.set(Register::Ip, ip);
    }

    fn execute_jcc(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let displacement = self.fetch_byte(memory)? as i8;
        if self.regs.flags().condition(opcode & 0x0F) {
            self.relative_jump(displacement as i16);
        }
        self.notify_control_flow(ControlFlowEvent::Jump);
        Ok(())
    }

    fn execute_jcxz(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let displacement = self.fetch_byte(memory)? as i8;
        if self.regs.get(Register::Cx) == 0 {
            self.relative_jump(displacement as i16);
        }
        self.notify_control_flow(ControlFlowEvent::Jump);
        Ok(())
    }

    fn execute_jmp(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let displacement = if opcode == 0xEB {
            self.fetch_byte(memory)? as i8 as i16
        } else {
            self.fetch_word(memory)? as i16
        };
        self.relative_jump(displacement);
        self.notify_control_flow(ControlFlowEvent::Jump);
        Ok(())
    }

    fn execute_jmp_far(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let offset = self.fetch_word(memory)?;
        let segment = self.fetch_word(memory)?;
        self.regs.set(Register::Ip, offset);
        self.regs.set(Register::Cs, segment);
        self.notify_control_flow(ControlFlowEvent::Jump);
        Ok(())
    }

    /// LOOP/LOOPE/LOOPNE decrement CX first, then jump on (CX != 0) and the
    /// opcode's ZF condition.
    fn execute_loop(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let displacement = self.fetch_byte(memory)? as i8;
        let cx = self.regs.get(Register::Cx).wrapping_sub(1);
        self.regs.set(Register::Cx, cx);

        let zf = self.regs.flag(Flags::ZF);
        let taken = cx != 0
            && match opcode {
                0xE1 => zf,
                0xE0 => !zf,
                _ => true,
            };
        if taken {
            self.relative_jump(displacement as i16);
        }
        self.notify_control_flow(ControlFlowEvent::Jump);
        Ok(())
    }

    fn execute_call(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let displacement = self.fetch_word(memory)? as i16;
        let ip = self.regs.get(Register::Ip);
        self.push(memory, ip)?;
        self.relative_jump(displacement);
        self.notify_control_flow(ControlFlowEvent::Call);
        Ok(())
    }

    fn execute_call_far(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let offset = self.fetch_word(memory)?;
        let segment = self.fetch_word(memory)?;
        let cs = self.regs.get(Register::Cs);
        let ip = self.regs.get(Register::Ip);
        self.push(memory, cs)?;
        self.push(memory, ip)?;
        self.regs.set(Register::Cs, segment);
        self.regs.set(Register::Ip, offset);
        self.notify_control_flow(ControlFlowEvent::Call);
        Ok(())
    }

    fn execute_ret(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let release = if opcode == 0xC2 {
            self.fetch_word(memory)?
        } else {
            0
        };
        let ip = self.pop(memory)?;
        self.regs.set(Register::Ip, ip);
        let sp = self.regs.get(Register::Sp).wrapping_add(release);
        self.regs.set(Register::Sp, sp);
        self.notify_control_flow(ControlFlowEvent::Return);
        Ok(())
    }

    fn execute_ret_far(&mut self, memory: &mut Memory, opcode: u8, _: u8) -> InterpreterResult {
        let release = if opcode == 0xCA {
            self.fetch_word(memory)?
        } else {
            0
        };
        let ip = self.pop(memory)?;
        let cs = self.pop(memory)?;
        self.regs.set(Register::Ip, ip);
        self.regs.set(Register::Cs, cs);
        let sp = self.regs.get(Register::Sp).wrapping_add(release);
        self.regs.set(Register::Sp, sp);
        self.notify_control_flow(ControlFlowEvent::Return);
        Ok(())
    }

    // Processor control.

    fn execute_nop(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        Ok(())
    }

    fn execute_wait(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        Ok(())
    }

    fn execute_hlt(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        self.halted = true;
        Ok(())
    }

    /// LOCK is a bus prefix; re-enter dispatch on the following opcode.
    fn execute_lock(&mut self, memory: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let opcode = self.fetch_byte(memory)?;
        self.dispatch(memory, opcode)
    }

    /// ESC hands the operand to an absent coprocessor: resolve and discard.
    fn execute_esc(&mut self, memory: &mut Memory, _: u8, modrm: u8) -> InterpreterResult {
        self.rm_operand(memory, ModRM(modrm))?;
        Ok(())
    }

    fn execute_clc(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        self.regs.set_flag(Flags::CF, false);
        Ok(())
    }

    fn execute_stc(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        self.regs.set_flag(Flags::CF, true);
        Ok(())
    }

    fn execute_cmc(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        let carry = self.regs.flag(Flags::CF);
        self.regs.set_flag(Flags::CF, !carry);
        Ok(())
    }

    fn execute_cld(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        self.regs.set_flag(Flags::DF, false);
        Ok(())
    }

    fn execute_std(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        self.regs.set_flag(Flags::DF, true);
        Ok(())
    }

    fn execute_cli(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        self.regs.set_flag(Flags::IF, false);
        Ok(())
    }

    fn execute_sti(&mut self, _: &mut Memory, _: u8, _: u8) -> InterpreterResult {
        self.regs.set_flag(Flags::IF, true);
        Ok(())
    }
}
