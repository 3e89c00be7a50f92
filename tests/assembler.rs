// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assembling source programs and running the results.

use pretty_assertions::assert_eq;

use i8086::{Flags, I8086, Memory, Register};
use i8086::assembler::{Assembler, Section};
use i8086::error::AssemblyErrorKind;

use std::cell::RefCell;
use std::rc::Rc;

fn assemble(source: &str) -> (Assembler, I8086, Memory) {
    let mut assembler = Assembler::new();
    let mut cpu = I8086::new();
    let mut memory = Memory::new(0x2_0000);
    assembler
        .assemble_source(source, &mut cpu, &mut memory)
        .unwrap();
    (assembler, cpu, memory)
}

#[test]
fn load_establishes_segment_registers_and_entry() {
    let (assembler, cpu, _) = assemble(
        "\
.MODEL SMALL
.DATA
value DB 1
.CODE
start:
  NOP
  HLT
END start
",
    );

    let layout = assembler.layout();
    assert_eq!((cpu.regs.get(Register::Cs) as u32) << 4, layout.code);
    assert_eq!((cpu.regs.get(Register::Ds) as u32) << 4, layout.data);
    assert_eq!((cpu.regs.get(Register::Ss) as u32) << 4, layout.stack);
    assert_eq!(cpu.regs.get(Register::Ip), 0);
    assert_eq!(layout.code, 0x0100);
    assert_eq!(layout.data, 0x0200);
    assert_eq!(layout.stack, 0x0300);
}

#[test]
fn emitted_bytes_are_exact() {
    let (_, _, memory) = assemble(
        "\
.CODE
start:
  MOV AX, 0x1234
  MOV BX, 0x5678
  ADD AX, BX
  MOV CX, AX
  HLT
END start
",
    );

    assert_eq!(
        memory.dump(0x0100, 11).unwrap(),
        vec![0xB8, 0x34, 0x12, 0xBB, 0x78, 0x56, 0x01, 0xD8, 0x89, 0xC1, 0xF4]
    );
}

#[test]
fn dos_print_program_reaches_the_sink() {
    let source = "\
.MODEL SMALL
.DATA
msg DB 'Hi$'
.CODE
start:
  MOV AX, @DATA
  MOV DS, AX
  MOV AH, 09h
  MOV DX, OFFSET msg
  INT 21h
  HLT
END start
";
    let (_, mut cpu, mut memory) = assemble(source);
    let output = Rc::new(RefCell::new(Vec::new()));
    cpu.set_output_sink(Box::new(output.clone()));

    cpu.run(&mut memory, None).unwrap();

    assert_eq!(*output.borrow(), b"Hi");
    assert!(cpu.halted);
}

#[test]
fn cmp_and_conditional_jumps() {
    let source = "\
.CODE
start:
  MOV AX, 3
  MOV BX, 3
  CMP AX, BX
  JNE bad
  MOV CX, 1
  JMP done
bad:
  MOV CX, 2
done:
  HLT
END start
";
    let (_, mut cpu, mut memory) = assemble(source);
    cpu.run(&mut memory, None).unwrap();

    assert_eq!(cpu.regs.get(Register::Cx), 1);
    assert!(cpu.regs.flags().contains(Flags::ZF));
    assert!(cpu.halted);
}

#[test]
fn push_pop_round_trip() {
    let source = "\
.CODE
start:
  MOV AX, 0xBEEF
  PUSH AX
  MOV AX, 0
  POP AX
  HLT
END start
";
    let (_, mut cpu, mut memory) = assemble(source);
    let initial_sp = cpu.regs.get(Register::Sp);
    cpu.run(&mut memory, None).unwrap();

    assert_eq!(cpu.regs.get(Register::Ax), 0xBEEF);
    assert_eq!(cpu.regs.get(Register::Sp), initial_sp);
}

#[test]
fn loops_and_data_access() {
    // Sums the five data bytes into AL.
    let source = "\
.MODEL SMALL
.DATA
values DB 1, 2, 3, 4, 5
.CODE
start:
  MOV AX, @DATA
  MOV DS, AX
  MOV BX, OFFSET values
  MOV CX, 5
  MOV AL, 0
again:
  ADD AL, [BX]
  INC BX
  LOOP again
  HLT
END start
";
    let (_, mut cpu, mut memory) = assemble(source);
    cpu.run(&mut memory, None).unwrap();

    assert_eq!(cpu.regs.low_byte(Register::Ax).unwrap(), 15);
    assert_eq!(cpu.regs.get(Register::Cx), 0);
}

#[test]
fn entry_point_fallbacks() {
    // No END operand: `start` wins.
    let (_, cpu, _) = assemble(".CODE\nNOP\nstart:\n  HLT\nEND\n");
    assert_eq!(cpu.regs.get(Register::Ip), 1);

    // Neither start nor an END operand: `main` wins.
    let (_, cpu, _) = assemble(".CODE\nNOP\nNOP\nmain:\n  HLT\nEND\n");
    assert_eq!(cpu.regs.get(Register::Ip), 2);

    // Nothing named: offset zero.
    let (_, cpu, _) = assemble(".CODE\nNOP\nHLT\n");
    assert_eq!(cpu.regs.get(Register::Ip), 0);
}

#[test]
fn symbols_are_case_insensitive() {
    let source = "\
.MODEL SMALL
.DATA
Msg DB 'ok$'
.CODE
Start:
  MOV DX, OFFSET MSG
  MOV AX, OFFSET msg
  HLT
END start
";
    let (assembler, mut cpu, mut memory) = assemble(source);
    cpu.run(&mut memory, None).unwrap();

    assert_eq!(cpu.regs.get(Register::Dx), 0);
    assert_eq!(cpu.regs.get(Register::Ax), 0);
    assert!(assembler.variable("MSG").is_some());
    assert_eq!(assembler.variable("msg").unwrap().section, Section::Data);
}

#[test]
fn stack_directive_sets_sp() {
    let (_, cpu, _) = assemble(".STACK 100h\n.CODE\nstart:\n  HLT\nEND start\n");
    assert_eq!(cpu.regs.get(Register::Sp), 0x0100);
    assert_eq!((cpu.regs.get(Register::Ss) as u32) << 4, 0x0300);
}

#[test]
fn proc_labels_are_call_targets() {
    let source = "\
.CODE
start:
  CALL doubler
  CALL doubler
  HLT
doubler PROC
  ADD AX, AX
  RET
doubler ENDP
END start
";
    let (_, mut cpu, mut memory) = assemble(source);
    cpu.regs.set(Register::Ax, 3);
    cpu.run(&mut memory, None).unwrap();
    assert_eq!(cpu.regs.get(Register::Ax), 12);
}

#[test]
fn short_jump_range_boundaries() {
    let mut cpu = I8086::new();
    let mut memory = Memory::new(0x2_0000);

    // Displacement +127 assembles.
    let mut source = String::from(".CODE\nstart:\n  JE far_away\n");
    for _ in 0..127 {
        source.push_str("  NOP\n");
    }
    source.push_str("far_away:\n  HLT\nEND start\n");
    assert!(Assembler::new()
        .assemble_source(&source, &mut cpu, &mut memory)
        .is_ok());

    // Displacement +128 is rejected.
    let mut source = String::from(".CODE\nstart:\n  JE far_away\n");
    for _ in 0..128 {
        source.push_str("  NOP\n");
    }
    source.push_str("far_away:\n  HLT\nEND start\n");
    let error = Assembler::new()
        .assemble_source(&source, &mut cpu, &mut memory)
        .unwrap_err();
    assert_eq!(error.kind, AssemblyErrorKind::JumpOutOfRange(128));
    assert_eq!(error.line, 3);

    // Displacement -128 assembles.
    let mut source = String::from(".CODE\nstart:\nback:\n");
    for _ in 0..126 {
        source.push_str("  NOP\n");
    }
    source.push_str("  JE back\n  HLT\nEND start\n");
    assert!(Assembler::new()
        .assemble_source(&source, &mut cpu, &mut memory)
        .is_ok());

    // Displacement -129 is rejected.
    let mut source = String::from(".CODE\nstart:\nback:\n");
    for _ in 0..127 {
        source.push_str("  NOP\n");
    }
    source.push_str("  JE back\n  HLT\nEND start\n");
    let error = Assembler::new()
        .assemble_source(&source, &mut cpu, &mut memory)
        .unwrap_err();
    assert_eq!(error.kind, AssemblyErrorKind::JumpOutOfRange(-129));
}

#[test]
fn unknown_label_reports_the_line() {
    let error = Assembler::new()
        .assemble_source(
            ".CODE\nstart:\n  JMP nowhere\nEND start\n",
            &mut I8086::new(),
            &mut Memory::new(0x2_0000),
        )
        .unwrap_err();
    assert_eq!(error.kind, AssemblyErrorKind::UnknownSymbol("nowhere".into()));
    assert_eq!(error.line, 3);
}

#[test]
fn mixed_db_values_and_strings() {
    let (assembler, _, memory) = assemble(
        ".MODEL SMALL\n.DATA\nmsg DB 'Hi', 13, 10, '$'\nafter DB 0xAA\n.CODE\nstart:\n  HLT\nEND start\n",
    );
    assert_eq!(
        memory.dump(0x0200, 6).unwrap(),
        vec![b'H', b'i', 13, 10, b'$', 0xAA]
    );
    assert_eq!(assembler.variable("after").unwrap().offset, 5);
}

#[test]
fn immediate_overflow_is_rejected() {
    let error = Assembler::new()
        .assemble_source(
            ".CODE\nstart:\n  MOV AL, 0x1FF\nEND start\n",
            &mut I8086::new(),
            &mut Memory::new(0x2_0000),
        )
        .unwrap_err();
    assert_eq!(
        error.kind,
        AssemblyErrorKind::ImmediateOverflow { value: 0x1FF, bits: 8 }
    );
}

#[test]
fn register_size_mismatch_is_rejected() {
    let error = Assembler::new()
        .assemble_source(
            ".CODE\nstart:\n  MOV AL, BX\nEND start\n",
            &mut I8086::new(),
            &mut Memory::new(0x2_0000),
        )
        .unwrap_err();
    assert!(matches!(error.kind, AssemblyErrorKind::RegisterSizeMismatch(_, _)));
}

#[test]
fn unknown_mnemonic_is_rejected() {
    let error = Assembler::new()
        .assemble_source(
            ".CODE\nstart:\n  BLORP AX, 1\nEND start\n",
            &mut I8086::new(),
            &mut Memory::new(0x2_0000),
        )
        .unwrap_err();
    assert_eq!(error.kind, AssemblyErrorKind::UnknownMnemonic("BLORP".into()));
}

#[test]
fn string_copy_program() {
    let source = "\
.MODEL SMALL
.DATA
src DB 'rustacean'
.CODE
start:
  MOV AX, @DATA
  MOV DS, AX
  MOV AX, 0x50
  MOV ES, AX
  MOV SI, OFFSET src
  MOV DI, 0
  MOV CX, 9
  CLD
  REP MOVSB
  HLT
END start
";
    let (_, mut cpu, mut memory) = assemble(source);
    cpu.run(&mut memory, None).unwrap();

    assert_eq!(memory.dump(0x0500, 9).unwrap(), b"rustacean");
    assert_eq!(cpu.regs.get(Register::Cx), 0);
}

#[test]
fn larger_models_spread_the_sections() {
    let (assembler, cpu, _) = assemble(".MODEL LARGE\n.CODE\nstart:\n  HLT\nEND start\n");
    assert_eq!(assembler.layout().code, 0x1000);
    assert_eq!(assembler.layout().data, 0x2000);
    assert_eq!(assembler.layout().stack, 0x3000);
    assert_eq!(cpu.regs.get(Register::Cs), 0x0100);
}
