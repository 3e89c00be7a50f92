// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-pass assembler for a MASM-flavoured subset.
//!
//! The assembler lays the `.CODE`, `.DATA` and `.STACK` sections out at the
//! bases selected by the memory model, resolves labels and variables
//! (case-insensitively, folded to uppercase), and writes the encoded bytes
//! straight into [Memory]. It also establishes the initial CPU state: the
//! segment registers point at the section bases and IP at the entry point.
//!
//! Three walks over the preprocessed source keep label addresses exact:
//! a name-collection walk, a sizing walk that runs the real encoders with
//! placeholder symbol values (encoded length depends only on operand
//! shapes), and the emission walk with everything resolved.

mod encoder;
mod parser;

use crate::{I8086, Memory, Register};
use crate::error::{AssemblyError, AssemblyErrorKind};

use encoder::Ea;
use parser::RegOperand;

use log::debug;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// The three program sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Code,
    Data,
    Stack,
}

/// A resolved label or variable: its section and section-relative offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub section: Section,
    pub offset: u16,
}

/// Physical base addresses of the three sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentLayout {
    pub code: u32,
    pub data: u32,
    pub stack: u32,
}

impl SegmentLayout {
    /// The SMALL (and TINY) model: a COM-style layout below 0x0400.
    pub const SMALL: Self = Self { code: 0x0100, data: 0x0200, stack: 0x0300 };

    /// The larger models spread the sections 0x1000 bytes apart.
    pub const SPREAD: Self = Self { code: 0x1000, data: 0x2000, stack: 0x3000 };

    fn for_model(model: &str) -> Self {
        match model.to_ascii_uppercase().as_str() {
            "TINY" | "SMALL" => Self::SMALL,
            _ => Self::SPREAD,
        }
    }

    pub fn base(&self, section: Section) -> u32 {
        match section {
            Section::Code => self.code,
            Section::Data => self.data,
            Section::Stack => self.stack,
        }
    }
}

impl Default for SegmentLayout {
    fn default() -> Self {
        Self::SMALL
    }
}

/// A preprocessed source line: comment stripped, never blank.
struct Line {
    number: usize,
    text: String,
}

/// What a line asks the assembler to do, label prefix already removed.
enum Statement {
    Model(String),
    Section(Section, Option<String>),
    Org(String),
    End(Option<String>),
    Proc(String),
    Endp,
    Data { name: Option<String>, values: String },
    Instruction(String),
}

/// A parsed, symbol-resolved operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operand {
    Reg(RegOperand),
    Imm(i64),
    Mem(MemRef),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MemRef {
    /// A 16-bit absolute offset from DS.
    Direct(u16),
    /// A base/index form of the standard effective-address table.
    Indirect { rm: u8, disp: i16 },
}

impl MemRef {
    fn ea(self) -> Ea {
        match self {
            Self::Direct(offset) => Ea::direct(offset),
            Self::Indirect { rm, disp } => Ea::indirect(rm, disp),
        }
    }
}

/// The two-pass translator.
///
/// Symbol tables live for the duration of one `load_program`/
/// `assemble_source` call; each call discards the previous contents.
#[derive(Debug, Default)]
pub struct Assembler {
    labels: HashMap<String, Symbol>,
    variables: HashMap<String, Symbol>,
    layout: SegmentLayout,
    entry_point: Option<u16>,
    stack_size: Option<u16>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The section layout selected by the last load.
    pub fn layout(&self) -> SegmentLayout {
        self.layout
    }

    /// Looks up a label, case-insensitively.
    pub fn label(&self, name: &str) -> Option<Symbol> {
        self.labels.get(&name.to_ascii_uppercase()).copied()
    }

    /// Looks up a variable, case-insensitively.
    pub fn variable(&self, name: &str) -> Option<Symbol> {
        self.variables.get(&name.to_ascii_uppercase()).copied()
    }

    /// Reads an assembly source file and loads it per
    /// [assemble_source](Self::assemble_source).
    pub fn load_program(
        &mut self,
        path: &Path,
        cpu: &mut I8086,
        memory: &mut Memory,
    ) -> Result<(), AssemblyError> {
        let source = fs::read_to_string(path)
            .map_err(|e| AssemblyErrorKind::Io(e.to_string()).on_line(0))?;
        self.assemble_source(&source, cpu, memory)
    }

    /// Assembles the source into memory and initialises the CPU.
    ///
    /// On success: memory has been reset and the sections emitted at their
    /// bases; CS, DS and SS hold the section bases shifted right by 4; SP is
    /// the `.STACK` size when one was given; IP is the entry point (the END
    /// operand, else `start`, else `main`, else 0). On error the load is
    /// aborted and partial state remains; reset before retrying.
    pub fn assemble_source(
        &mut self,
        source: &str,
        cpu: &mut I8086,
        memory: &mut Memory,
    ) -> Result<(), AssemblyError> {
        self.labels.clear();
        self.variables.clear();
        self.layout = SegmentLayout::default();
        self.entry_point = None;
        self.stack_size = None;

        let lines = preprocess(source);
        self.collect_names(&lines);
        self.layout_pass(&lines)?;
        debug!(
            "layout: CODE={:#06X} DATA={:#06X} STACK={:#06X}, {} label(s), {} variable(s)",
            self.layout.code,
            self.layout.data,
            self.layout.stack,
            self.labels.len(),
            self.variables.len()
        );
        self.emit_pass(&lines, cpu, memory)
    }

    /// Registers every label and variable name so the sizing walk already
    /// classifies operands by their final shape.
    fn collect_names(&mut self, lines: &[Line]) {
        let mut section = Section::Code;
        for line in lines {
            let (label, statement) = classify(&line.text);
            if let Some(name) = label {
                self.define_label(&name, section, 0);
            }
            match statement {
                Some(Statement::Section(s, _)) => section = s,
                Some(Statement::Proc(name)) => self.define_label(&name, section, 0),
                Some(Statement::Data { name: Some(name), .. }) => {
                    self.define_variable(&name, section, 0)
                },
                _ => {},
            }
        }
    }

    /// The sizing walk: assigns every symbol its exact section offset.
    fn layout_pass(&mut self, lines: &[Line]) -> Result<(), AssemblyError> {
        let mut section = Section::Code;
        let mut cursors = [0u16; 3];

        for line in lines {
            let (label, statement) = classify(&line.text);
            if let Some(name) = label {
                self.define_label(&name, section, cursors[section as usize]);
            }
            let Some(statement) = statement else { continue };

            match statement {
                Statement::Model(model) => self.layout = SegmentLayout::for_model(&model),
                Statement::Section(s, size) => {
                    section = s;
                    if let Some(token) = size {
                        let size = parser::parse_value(&token)
                            .map_err(|k| k.on_line(line.number))?;
                        self.stack_size = Some(size as u16);
                    }
                },
                Statement::Org(token) => {
                    let addr = parser::parse_value(&token)
                        .map_err(|k| k.on_line(line.number))? as u32;
                    cursors[section as usize] =
                        addr.wrapping_sub(self.layout.base(section)) as u16;
                },
                Statement::End(_) => {},
                Statement::Proc(name) => {
                    self.define_label(&name, section, cursors[section as usize])
                },
                Statement::Endp => {},
                Statement::Data { name, values } => {
                    if let Some(name) = name {
                        self.define_variable(&name, section, cursors[section as usize]);
                    }
                    let bytes = data_bytes(&values).map_err(|k| k.on_line(line.number))?;
                    cursors[section as usize] =
                        cursors[section as usize].wrapping_add(bytes.len() as u16);
                },
                Statement::Instruction(text) => {
                    let addr = self.layout.base(section) + cursors[section as usize] as u32;
                    let bytes = self
                        .encode_instruction(&text, addr, true)
                        .map_err(|k| k.on_line(line.number))?;
                    cursors[section as usize] =
                        cursors[section as usize].wrapping_add(bytes.len() as u16);
                },
            }
        }
        Ok(())
    }

    /// The emission walk: encodes with resolved symbols and writes every
    /// byte through [Memory::write_byte].
    fn emit_pass(
        &mut self,
        lines: &[Line],
        cpu: &mut I8086,
        memory: &mut Memory,
    ) -> Result<(), AssemblyError> {
        memory.reset();
        cpu.reset();

        let mut section = Section::Code;
        let mut cursors = [0u16; 3];

        for line in lines {
            let (_, statement) = classify(&line.text);
            let Some(statement) = statement else { continue };

            match statement {
                Statement::Model(_) | Statement::Proc(_) | Statement::Endp => {},
                Statement::Section(s, _) => section = s,
                Statement::Org(token) => {
                    let addr = parser::parse_value(&token)
                        .map_err(|k| k.on_line(line.number))? as u32;
                    cursors[section as usize] =
                        addr.wrapping_sub(self.layout.base(section)) as u16;
                },
                Statement::End(name) => {
                    if let Some(name) = name {
                        let symbol = self
                            .jump_target(&name)
                            .ok_or_else(|| {
                                AssemblyErrorKind::UnknownSymbol(name.clone()).on_line(line.number)
                            })?;
                        self.entry_point = Some(symbol.offset);
                    }
                },
                Statement::Data { name: _, values } => {
                    let bytes = data_bytes(&values).map_err(|k| k.on_line(line.number))?;
                    self.write(memory, section, &mut cursors, &bytes, line.number)?;
                },
                Statement::Instruction(text) => {
                    let addr = self.layout.base(section) + cursors[section as usize] as u32;
                    let bytes = self
                        .encode_instruction(&text, addr, false)
                        .map_err(|k| k.on_line(line.number))?;
                    debug!("{addr:05X}: {text} -> {bytes:02X?}");
                    self.write(memory, section, &mut cursors, &bytes, line.number)?;
                },
            }
        }

        cpu.regs.set(Register::Cs, (self.layout.code >> 4) as u16);
        cpu.regs.set(Register::Ds, (self.layout.data >> 4) as u16);
        cpu.regs.set(Register::Ss, (self.layout.stack >> 4) as u16);
        if let Some(size) = self.stack_size {
            cpu.regs.set(Register::Sp, size);
        }

        let entry = self
            .entry_point
            .or_else(|| self.label("start").map(|s| s.offset))
            .or_else(|| self.label("main").map(|s| s.offset))
            .unwrap_or(0);
        cpu.regs.set(Register::Ip, entry);
        debug!("entry point IP={entry:#06X}");
        Ok(())
    }

    fn write(
        &self,
        memory: &mut Memory,
        section: Section,
        cursors: &mut [u16; 3],
        bytes: &[u8],
        line: usize,
    ) -> Result<(), AssemblyError> {
        for &byte in bytes {
            let addr = self.layout.base(section) + cursors[section as usize] as u32;
            memory
                .write_byte(addr, byte)
                .map_err(|e| AssemblyErrorKind::Emit(e.to_string()).on_line(line))?;
            cursors[section as usize] = cursors[section as usize].wrapping_add(1);
        }
        Ok(())
    }

    fn define_label(&mut self, name: &str, section: Section, offset: u16) {
        self.labels
            .insert(name.to_ascii_uppercase(), Symbol { section, offset });
    }

    fn define_variable(&mut self, name: &str, section: Section, offset: u16) {
        self.variables
            .insert(name.to_ascii_uppercase(), Symbol { section, offset });
    }

    /// Symbol lookup for value contexts (`OFFSET`, bare names): variables
    /// shadow labels.
    fn value_symbol(&self, name: &str) -> Option<Symbol> {
        self.variable(name).or_else(|| self.label(name))
    }

    /// Symbol lookup for transfer targets: labels shadow variables.
    fn jump_target(&self, name: &str) -> Option<Symbol> {
        self.label(name).or_else(|| self.variable(name))
    }

    fn symbol_physical(&self, symbol: Symbol) -> u32 {
        self.layout.base(symbol.section) + symbol.offset as u32
    }

    /// Encodes one instruction line at the given physical address.
    ///
    /// In lenient (sizing) mode unknown symbols resolve to placeholders and
    /// displacement range checks are skipped; the returned length is already
    /// exact because every encoding is sized by operand shape alone.
    fn encode_instruction(
        &self,
        text: &str,
        addr: u32,
        lenient: bool,
    ) -> Result<Vec<u8>, AssemblyErrorKind> {
        let (head, tail) = split_first_token(text);
        let mnemonic = head.to_ascii_uppercase();

        // REP prefixes: emit the prefix byte, then the prefixed instruction.
        if let Some(prefix) = rep_prefix(&mnemonic) {
            let mut out = vec![prefix];
            if !tail.is_empty() {
                out.extend(self.encode_instruction(tail, addr + 1, lenient)?);
            }
            return Ok(out);
        }

        if let Some(bytes) = zero_operand(&mnemonic) {
            if !tail.is_empty() {
                return Err(AssemblyErrorKind::OperandCount {
                    mnemonic,
                    expected: 0,
                    got: parser::split_operands(tail).len(),
                });
            }
            return Ok(bytes);
        }

        // Transfers take a raw label token instead of a value operand.
        if let Some(opcode) = short_transfer_opcode(&mnemonic) {
            let target = self.transfer_target(tail, &mnemonic, lenient)?;
            let displacement = target as i64 - (addr as i64 + 2);
            if !lenient && !(-128..=127).contains(&displacement) {
                return Err(AssemblyErrorKind::JumpOutOfRange(displacement as i32));
            }
            return Ok(encoder::short_jump(opcode, displacement as i8).to_vec());
        }
        if mnemonic == "JMP" || mnemonic == "CALL" {
            let opcode = if mnemonic == "JMP" { 0xE9 } else { 0xE8 };
            let target = self.transfer_target(tail, &mnemonic, lenient)?;
            let displacement = target as i64 - (addr as i64 + 3);
            return Ok(encoder::near_jump(opcode, displacement as i16).to_vec());
        }

        let raw = parser::split_operands(tail);
        let mut operands = Vec::with_capacity(raw.len());
        for token in &raw {
            operands.push(self.resolve_operand(token, lenient)?);
        }

        self.encode_operation(&mnemonic, &operands, &raw)
    }

    fn transfer_target(
        &self,
        tail: &str,
        mnemonic: &str,
        lenient: bool,
    ) -> Result<u32, AssemblyErrorKind> {
        let raw = parser::split_operands(tail);
        let [target] = raw.as_slice() else {
            return Err(AssemblyErrorKind::OperandCount {
                mnemonic: mnemonic.to_string(),
                expected: 1,
                got: raw.len(),
            });
        };
        match self.jump_target(target) {
            Some(symbol) => Ok(self.symbol_physical(symbol)),
            None if lenient => Ok(0),
            None => Err(AssemblyErrorKind::UnknownSymbol(target.clone())),
        }
    }

    fn resolve_operand(&self, token: &str, lenient: bool) -> Result<Operand, AssemblyErrorKind> {
        let upper = token.to_ascii_uppercase();

        if let Some(name) = upper.strip_prefix("OFFSET") {
            if name.starts_with(char::is_whitespace) {
                let name = name.trim();
                return match self.value_symbol(name) {
                    Some(symbol) => Ok(Operand::Imm(symbol.offset as i64)),
                    None if lenient => Ok(Operand::Imm(0)),
                    None => Err(AssemblyErrorKind::UnknownSymbol(name.to_string())),
                };
            }
        }

        if upper == "@DATA" {
            return Ok(Operand::Imm((self.layout.data >> 4) as i64));
        }

        if let Some(reg) = RegOperand::from_name(token) {
            return Ok(Operand::Reg(reg));
        }

        // A quoted single character is an immediate byte.
        if let Some(inner) = token
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .or_else(|| token.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
        {
            if inner.len() == 1 {
                return Ok(Operand::Imm(inner.as_bytes()[0] as i64));
            }
        }

        if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            return self.resolve_memory(token, inner, lenient);
        }

        if parser::is_identifier(token) {
            if let Some(symbol) = self.value_symbol(token) {
                return Ok(Operand::Mem(MemRef::Direct(symbol.offset)));
            }
        }

        if let Ok(value) = parser::parse_value(token) {
            return Ok(Operand::Imm(value));
        }

        if parser::is_identifier(token) {
            return if lenient {
                Ok(Operand::Imm(0))
            } else {
                Err(AssemblyErrorKind::UnknownSymbol(token.to_string()))
            };
        }
        Err(AssemblyErrorKind::MalformedOperand(token.to_string()))
    }

    /// Parses the inside of a bracketed memory operand: a direct address, a
    /// known variable, or a `[BX]`-family base/index form with an optional
    /// numeric displacement.
    fn resolve_memory(
        &self,
        token: &str,
        inner: &str,
        lenient: bool,
    ) -> Result<Operand, AssemblyErrorKind> {
        let mut base_regs: Vec<u8> = Vec::new();
        let mut displacement = 0i64;
        let mut saw_symbol = false;

        for term in inner.split('+').map(str::trim) {
            match RegOperand::from_name(term) {
                Some(RegOperand::R16(code)) if matches!(code, 3 | 5 | 6 | 7) => {
                    base_regs.push(code);
                },
                Some(_) => {
                    return Err(AssemblyErrorKind::MalformedOperand(token.to_string()));
                },
                None => {
                    if parser::is_identifier(term) {
                        if let Some(symbol) = self.value_symbol(term) {
                            displacement += symbol.offset as i64;
                            saw_symbol = true;
                            continue;
                        }
                        if parser::parse_value(term).is_err() {
                            if lenient {
                                saw_symbol = true;
                                continue;
                            }
                            return Err(AssemblyErrorKind::UnknownSymbol(term.to_string()));
                        }
                    }
                    displacement += parser::parse_value(term)?;
                },
            }
        }

        if saw_symbol && !base_regs.is_empty() {
            return Err(AssemblyErrorKind::MalformedOperand(token.to_string()));
        }

        base_regs.sort_unstable();
        let rm = match base_regs.as_slice() {
            [] => return Ok(Operand::Mem(MemRef::Direct(displacement as u16))),
            [3, 6] => 0, // BX+SI
            [3, 7] => 1, // BX+DI
            [5, 6] => 2, // BP+SI
            [5, 7] => 3, // BP+DI
            [6] => 4,    // SI
            [7] => 5,    // DI
            [5] => 6,    // BP
            [3] => 7,    // BX
            _ => return Err(AssemblyErrorKind::MalformedOperand(token.to_string())),
        };

        if !(-0x8000..=0x7FFF).contains(&displacement) {
            return Err(AssemblyErrorKind::ImmediateOverflow { value: displacement, bits: 16 });
        }
        Ok(Operand::Mem(MemRef::Indirect { rm, disp: displacement as i16 }))
    }

    fn encode_operation(
        &self,
        mnemonic: &str,
        operands: &[Operand],
        raw: &[String],
    ) -> Result<Vec<u8>, AssemblyErrorKind> {
        match mnemonic {
            "MOV" => {
                let (dst, src) = two_operands(mnemonic, operands)?;
                encode_mov(mnemonic, dst, src, raw)
            },
            "ADD" | "OR" | "ADC" | "SBB" | "AND" | "SUB" | "XOR" | "CMP" => {
                let (dst, src) = two_operands(mnemonic, operands)?;
                let index = alu_index(mnemonic);
                encode_alu(mnemonic, index, dst, src, raw)
            },
            "TEST" => {
                let (dst, src) = two_operands(mnemonic, operands)?;
                encode_test(mnemonic, dst, src, raw)
            },
            "NOT" | "NEG" | "MUL" | "IMUL" | "DIV" | "IDIV" => {
                let operand = one_operand(mnemonic, operands)?;
                let extension = match mnemonic {
                    "NOT" => 2,
                    "NEG" => 3,
                    "MUL" => 4,
                    "IMUL" => 5,
                    "DIV" => 6,
                    _ => 7,
                };
                encode_group3(mnemonic, extension, operand, raw)
            },
            "INC" | "DEC" => {
                let operand = one_operand(mnemonic, operands)?;
                let extension = (mnemonic == "DEC") as u8;
                match operand {
                    Operand::Reg(RegOperand::R16(reg)) => Ok(vec![if extension == 0 {
                        encoder::inc_reg(*reg)
                    } else {
                        encoder::dec_reg(*reg)
                    }]),
                    Operand::Reg(RegOperand::R8(reg)) => {
                        Ok(encoder::with_ea(0xFE, extension, &Ea::register(*reg)))
                    },
                    Operand::Mem(mem) => Ok(encoder::with_ea(0xFF, extension, &mem.ea())),
                    _ => Err(combination(mnemonic)),
                }
            },
            "PUSH" | "POP" => {
                let operand = one_operand(mnemonic, operands)?;
                match operand {
                    Operand::Reg(RegOperand::R16(reg)) => Ok(vec![if mnemonic == "PUSH" {
                        encoder::push_reg(*reg)
                    } else {
                        encoder::pop_reg(*reg)
                    }]),
                    _ => Err(combination(mnemonic)),
                }
            },
            "ROL" | "ROR" | "RCL" | "RCR" | "SHL" | "SAL" | "SHR" | "SAR" => {
                let (dst, count) = two_operands(mnemonic, operands)?;
                let extension = match mnemonic {
                    "ROL" => 0,
                    "ROR" => 1,
                    "RCL" => 2,
                    "RCR" => 3,
                    "SHL" | "SAL" => 4,
                    "SHR" => 5,
                    _ => 7,
                };
                encode_shift(mnemonic, extension, dst, count)
            },
            "LEA" => {
                let (dst, src) = two_operands(mnemonic, operands)?;
                match (dst, src) {
                    (Operand::Reg(RegOperand::R16(reg)), Operand::Mem(mem)) => {
                        Ok(encoder::with_ea(0x8D, *reg, &mem.ea()))
                    },
                    _ => Err(combination(mnemonic)),
                }
            },
            "INT" => {
                let operand = one_operand(mnemonic, operands)?;
                match operand {
                    Operand::Imm(vector) => Ok(encoder::int(immediate8(*vector)?).to_vec()),
                    _ => Err(combination(mnemonic)),
                }
            },
            "RET" => match operands {
                [] => Ok(vec![0xC3]),
                [Operand::Imm(release)] => {
                    let release = immediate16(*release)?;
                    Ok(vec![0xC2, release as u8, (release >> 8) as u8])
                },
                _ => Err(combination(mnemonic)),
            },
            _ => Err(AssemblyErrorKind::UnknownMnemonic(mnemonic.to_string())),
        }
    }
}

// Free helpers shared by the encode paths.

fn combination(mnemonic: &str) -> AssemblyErrorKind {
    AssemblyErrorKind::OperandCombination(mnemonic.to_string())
}

fn two_operands<'a>(
    mnemonic: &str,
    operands: &'a [Operand],
) -> Result<(&'a Operand, &'a Operand), AssemblyErrorKind> {
    match operands {
        [dst, src] => Ok((dst, src)),
        _ => Err(AssemblyErrorKind::OperandCount {
            mnemonic: mnemonic.to_string(),
            expected: 2,
            got: operands.len(),
        }),
    }
}

fn one_operand<'a>(
    mnemonic: &str,
    operands: &'a [Operand],
) -> Result<&'a Operand, AssemblyErrorKind> {
    match operands {
        [operand] => Ok(operand),
        _ => Err(AssemblyErrorKind::OperandCount {
            mnemonic: mnemonic.to_string(),
            expected: 1,
            got: operands.len(),
        }),
    }
}

fn immediate8(value: i64) -> Result<u8, AssemblyErrorKind> {
    if (-128..=255).contains(&value) {
        Ok(value as u8)
    } else {
        Err(AssemblyErrorKind::ImmediateOverflow { value, bits: 8 })
    }
}

fn immediate16(value: i64) -> Result<u16, AssemblyErrorKind> {
    if (-32768..=65535).contains(&value) {
        Ok(value as u16)
    } else {
        Err(AssemblyErrorKind::ImmediateOverflow { value, bits: 16 })
    }
}

fn size_mismatch(raw: &[String]) -> AssemblyErrorKind {
    let dst = raw.first().cloned().unwrap_or_default();
    let src = raw.get(1).cloned().unwrap_or_default();
    AssemblyErrorKind::RegisterSizeMismatch(dst, src)
}

fn alu_index(mnemonic: &str) -> u8 {
    match mnemonic {
        "ADD" => 0,
        "OR" => 1,
        "ADC" => 2,
        "SBB" => 3,
        "AND" => 4,
        "SUB" => 5,
        "XOR" => 6,
        _ => 7,
    }
}

fn encode_mov(
    mnemonic: &str,
    dst: &Operand,
    src: &Operand,
    raw: &[String],
) -> Result<Vec<u8>, AssemblyErrorKind> {
    use Operand::*;
    use RegOperand::*;

    match (dst, src) {
        (Reg(R8(reg)), Imm(value)) => Ok(encoder::mov_reg_imm8(*reg, immediate8(*value)?).to_vec()),
        (Reg(R16(reg)), Imm(value)) => {
            Ok(encoder::mov_reg_imm16(*reg, immediate16(*value)?).to_vec())
        },
        (Reg(R8(d)), Reg(R8(s))) => Ok(encoder::with_ea(0x88, *s, &Ea::register(*d))),
        (Reg(R16(d)), Reg(R16(s))) => Ok(encoder::with_ea(0x89, *s, &Ea::register(*d))),
        (Reg(R16(d)), Reg(Segment(s))) => Ok(encoder::with_ea(0x8C, *s, &Ea::register(*d))),
        (Reg(Segment(d)), Reg(R16(s))) => Ok(encoder::with_ea(0x8E, *d, &Ea::register(*s))),
        (Reg(R8(d)), Mem(mem)) => Ok(encoder::with_ea(0x8A, *d, &mem.ea())),
        (Reg(R16(d)), Mem(mem)) => Ok(encoder::with_ea(0x8B, *d, &mem.ea())),
        (Reg(Segment(d)), Mem(mem)) => Ok(encoder::with_ea(0x8E, *d, &mem.ea())),
        (Mem(mem), Reg(R8(s))) => Ok(encoder::with_ea(0x88, *s, &mem.ea())),
        (Mem(mem), Reg(R16(s))) => Ok(encoder::with_ea(0x89, *s, &mem.ea())),
        (Mem(mem), Reg(Segment(s))) => Ok(encoder::with_ea(0x8C, *s, &mem.ea())),
        (Reg(R8(_)), Reg(R16(_))) | (Reg(R16(_)), Reg(R8(_))) => Err(size_mismatch(raw)),
        _ => Err(combination(mnemonic)),
    }
}

fn encode_alu(
    mnemonic: &str,
    index: u8,
    dst: &Operand,
    src: &Operand,
    raw: &[String],
) -> Result<Vec<u8>, AssemblyErrorKind> {
    use Operand::*;
    use RegOperand::*;

    let base = index << 3;
    match (dst, src) {
        (Reg(R8(0)), Imm(value)) => Ok(encoder::acc_imm8(base, immediate8(*value)?).to_vec()),
        (Reg(R16(0)), Imm(value)) => Ok(encoder::acc_imm16(base, immediate16(*value)?).to_vec()),
        (Reg(R8(reg)), Imm(value)) => Ok(encoder::with_ea_imm8(
            0x80,
            index,
            &Ea::register(*reg),
            immediate8(*value)?,
        )),
        (Reg(R16(reg)), Imm(value)) => Ok(encoder::with_ea_imm16(
            0x81,
            index,
            &Ea::register(*reg),
            immediate16(*value)?,
        )),
        (Reg(R8(d)), Reg(R8(s))) => Ok(encoder::with_ea(base, *s, &Ea::register(*d))),
        (Reg(R16(d)), Reg(R16(s))) => Ok(encoder::with_ea(base + 1, *s, &Ea::register(*d))),
        (Reg(R8(d)), Mem(mem)) => Ok(encoder::with_ea(base + 2, *d, &mem.ea())),
        (Reg(R16(d)), Mem(mem)) => Ok(encoder::with_ea(base + 3, *d, &mem.ea())),
        (Mem(mem), Reg(R8(s))) => Ok(encoder::with_ea(base, *s, &mem.ea())),
        (Mem(mem), Reg(R16(s))) => Ok(encoder::with_ea(base + 1, *s, &mem.ea())),
        (Reg(R8(_)), Reg(R16(_))) | (Reg(R16(_)), Reg(R8(_))) => Err(size_mismatch(raw)),
        _ => Err(combination(mnemonic)),
    }
}

fn encode_test(
    mnemonic: &str,
    dst: &Operand,
    src: &Operand,
    raw: &[String],
) -> Result<Vec<u8>, AssemblyErrorKind> {
    use Operand::*;
    use RegOperand::*;

    match (dst, src) {
        (Reg(R8(0)), Imm(value)) => Ok(vec![0xA8, immediate8(*value)?]),
        (Reg(R16(0)), Imm(value)) => {
            let imm = immediate16(*value)?;
            Ok(vec![0xA9, imm as u8, (imm >> 8) as u8])
        },
        (Reg(R8(reg)), Imm(value)) => Ok(encoder::with_ea_imm8(
            0xF6,
            0,
            &Ea::register(*reg),
            immediate8(*value)?,
        )),
        (Reg(R16(reg)), Imm(value)) => Ok(encoder::with_ea_imm16(
            0xF7,
            0,
            &Ea::register(*reg),
            immediate16(*value)?,
        )),
        (Reg(R8(d)), Reg(R8(s))) => Ok(encoder::with_ea(0x84, *s, &Ea::register(*d))),
        (Reg(R16(d)), Reg(R16(s))) => Ok(encoder::with_ea(0x85, *s, &Ea::register(*d))),
        (Mem(mem), Reg(R8(s))) | (Reg(R8(s)), Mem(mem)) => {
            Ok(encoder::with_ea(0x84, *s, &mem.ea()))
        },
        (Mem(mem), Reg(R16(s))) | (Reg(R16(s)), Mem(mem)) => {
            Ok(encoder::with_ea(0x85, *s, &mem.ea()))
        },
        (Reg(R8(_)), Reg(R16(_))) | (Reg(R16(_)), Reg(R8(_))) => Err(size_mismatch(raw)),
        _ => Err(combination(mnemonic)),
    }
}

fn encode_group3(
    mnemonic: &str,
    extension: u8,
    operand: &Operand,
    _raw: &[String],
) -> Result<Vec<u8>, AssemblyErrorKind> {
    match operand {
        Operand::Reg(RegOperand::R8(reg)) => {
            Ok(encoder::with_ea(0xF6, extension, &Ea::register(*reg)))
        },
        Operand::Reg(RegOperand::R16(reg)) => {
            Ok(encoder::with_ea(0xF7, extension, &Ea::register(*reg)))
        },
        Operand::Mem(mem) => Ok(encoder::with_ea(0xF7, extension, &mem.ea())),
        _ => Err(combination(mnemonic)),
    }
}

fn encode_shift(
    mnemonic: &str,
    extension: u8,
    dst: &Operand,
    count: &Operand,
) -> Result<Vec<u8>, AssemblyErrorKind> {
    // Only the "by 1" and "by CL" counts exist on the 8086.
    let by_cl = match count {
        Operand::Imm(1) => false,
        Operand::Reg(RegOperand::R8(1)) => true,
        _ => return Err(combination(mnemonic)),
    };

    match dst {
        Operand::Reg(RegOperand::R8(reg)) => {
            let opcode = if by_cl { 0xD2 } else { 0xD0 };
            Ok(encoder::with_ea(opcode, extension, &Ea::register(*reg)))
        },
        Operand::Reg(RegOperand::R16(reg)) => {
            let opcode = if by_cl { 0xD3 } else { 0xD1 };
            Ok(encoder::with_ea(opcode, extension, &Ea::register(*reg)))
        },
        Operand::Mem(mem) => {
            let opcode = if by_cl { 0xD3 } else { 0xD1 };
            Ok(encoder::with_ea(opcode, extension, &mem.ea()))
        },
        _ => Err(combination(mnemonic)),
    }
}

fn rep_prefix(mnemonic: &str) -> Option<u8> {
    match mnemonic {
        "REP" | "REPE" | "REPZ" => Some(0xF3),
        "REPNE" | "REPNZ" => Some(0xF2),
        _ => None,
    }
}

/// The rel8 transfers: conditional jumps, JCXZ and the LOOP family.
fn short_transfer_opcode(mnemonic: &str) -> Option<u8> {
    let condition = match mnemonic {
        "JO" => 0x0,
        "JNO" => 0x1,
        "JB" | "JC" | "JNAE" => 0x2,
        "JNB" | "JNC" | "JAE" => 0x3,
        "JE" | "JZ" => 0x4,
        "JNE" | "JNZ" => 0x5,
        "JBE" | "JNA" => 0x6,
        "JA" | "JNBE" => 0x7,
        "JS" => 0x8,
        "JNS" => 0x9,
        "JP" | "JPE" => 0xA,
        "JNP" | "JPO" => 0xB,
        "JL" | "JNGE" => 0xC,
        "JGE" | "JNL" => 0xD,
        "JLE" | "JNG" => 0xE,
        "JG" | "JNLE" => 0xF,
        "JCXZ" => return Some(0xE3),
        "LOOP" => return Some(0xE2),
        "LOOPE" | "LOOPZ" => return Some(0xE1),
        "LOOPNE" | "LOOPNZ" => return Some(0xE0),
        _ => return None,
    };
    Some(0x70 | condition)
}

fn zero_operand(mnemonic: &str) -> Option<Vec<u8>> {
    let byte = match mnemonic {
        "NOP" => 0x90,
        "HLT" => 0xF4,
        "CBW" => 0x98,
        "CWD" => 0x99,
        "WAIT" => 0x9B,
        "PUSHF" => 0x9C,
        "POPF" => 0x9D,
        "SAHF" => 0x9E,
        "LAHF" => 0x9F,
        "XLAT" | "XLATB" => 0xD7,
        "INTO" => 0xCE,
        "IRET" => 0xCF,
        "MOVSB" => 0xA4,
        "MOVSW" => 0xA5,
        "CMPSB" => 0xA6,
        "CMPSW" => 0xA7,
        "STOSB" => 0xAA,
        "STOSW" => 0xAB,
        "LODSB" => 0xAC,
        "LODSW" => 0xAD,
        "SCASB" => 0xAE,
        "SCASW" => 0xAF,
        "CMC" => 0xF5,
        "CLC" => 0xF8,
        "STC" => 0xF9,
        "CLI" => 0xFA,
        "STI" => 0xFB,
        "CLD" => 0xFC,
        "STD" => 0xFD,
        _ => return None,
    };
    Some(vec![byte])
}

/// Emits the byte values of a `DB` operand list: quoted strings contribute
/// their characters, everything else one numeric byte.
fn data_bytes(values: &str) -> Result<Vec<u8>, AssemblyErrorKind> {
    let items = parser::split_operands(values);
    if items.is_empty() {
        return Err(AssemblyErrorKind::MalformedOperand(values.trim().to_string()));
    }

    let mut out = Vec::new();
    for item in items {
        let quoted = (item.starts_with('\'') && item.ends_with('\'') && item.len() >= 2)
            || (item.starts_with('"') && item.ends_with('"') && item.len() >= 2);
        if quoted {
            out.extend_from_slice(item[1..item.len() - 1].as_bytes());
        } else {
            out.push(parser::parse_value(&item)? as u8);
        }
    }
    Ok(out)
}

fn split_first_token(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(index) => (&text[..index], text[index..].trim()),
        None => (text, ""),
    }
}

fn preprocess(source: &str) -> Vec<Line> {
    source
        .lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let text = parser::strip_comment(raw).trim();
            if text.is_empty() {
                None
            } else {
                Some(Line { number: index + 1, text: text.to_string() })
            }
        })
        .collect()
}

/// Splits a line into an optional leading label and the remaining statement.
fn classify(text: &str) -> (Option<String>, Option<Statement>) {
    let mut text = text.trim();
    let mut label = None;

    if let Some(index) = text.find(':') {
        let candidate = text[..index].trim();
        if parser::is_identifier(candidate) {
            label = Some(candidate.to_string());
            text = text[index + 1..].trim();
        }
    }
    if text.is_empty() {
        return (label, None);
    }

    let (head, tail) = split_first_token(text);
    let head_upper = head.to_ascii_uppercase();
    let (next, next_tail) = split_first_token(tail);

    let statement = match head_upper.as_str() {
        ".MODEL" => Statement::Model(if next.is_empty() { "SMALL".into() } else { next.into() }),
        ".CODE" => Statement::Section(Section::Code, None),
        ".DATA" => Statement::Section(Section::Data, None),
        ".STACK" => Statement::Section(
            Section::Stack,
            if next.is_empty() { None } else { Some(next.to_string()) },
        ),
        ".ORG" | "ORG" => Statement::Org(next.to_string()),
        "END" => Statement::End(if next.is_empty() { None } else { Some(next.to_string()) }),
        "ENDP" => Statement::Endp,
        "PROC" => {
            if next.is_empty() {
                Statement::Endp
            } else {
                Statement::Proc(next.to_string())
            }
        },
        "DB" => Statement::Data { name: None, values: tail.to_string() },
        _ => {
            if next.eq_ignore_ascii_case("PROC") {
                Statement::Proc(head.to_string())
            } else if next.eq_ignore_ascii_case("ENDP") {
                Statement::Endp
            } else if next.eq_ignore_ascii_case("DB") {
                Statement::Data { name: Some(head.to_string()), values: next_tail.to_string() }
            } else {
                Statement::Instruction(text.to_string())
            }
        },
    };
    (label, Some(statement))
}
