// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end execution scenarios over raw machine code.

use pretty_assertions::assert_eq;

use i8086::{Error, Flags, I8086, Memory, Register};

/// Loads the code at the COM base, runs until halt, and returns the state.
fn run_bytes(code: &[u8]) -> (I8086, Memory) {
    let mut memory = Memory::new(0x2_0000);
    memory.load_bytes(0x0100, code).unwrap();
    let mut cpu = I8086::new();
    cpu.run(&mut memory, None).unwrap();
    (cpu, memory)
}

#[test]
fn mov_add_hlt() {
    // MOV AX, 0x1234; MOV BX, 0x5678; ADD AX, BX; MOV CX, AX; HLT
    let (cpu, _) = run_bytes(&[
        0xB8, 0x34, 0x12, 0xBB, 0x78, 0x56, 0x01, 0xD8, 0x89, 0xC1, 0xF4,
    ]);

    assert_eq!(cpu.regs.get(Register::Ax), 0x68AC);
    assert_eq!(cpu.regs.get(Register::Bx), 0x5678);
    assert_eq!(cpu.regs.get(Register::Cx), 0x68AC);
    assert!(cpu.halted);
    assert_eq!(cpu.instructions_executed(), 5);
}

#[test]
fn loop_decrements_and_jumps() {
    // MOV CX, 5; MOV AX, 0; again: INC AX; LOOP again; HLT
    let (cpu, _) = run_bytes(&[
        0xB9, 0x05, 0x00, 0xB8, 0x00, 0x00, 0x40, 0xE2, 0xFD, 0xF4,
    ]);

    assert_eq!(cpu.regs.get(Register::Ax), 0x0005);
    assert_eq!(cpu.regs.get(Register::Cx), 0x0000);
    assert!(cpu.halted);
}

#[test]
fn add_al_flag_laws() {
    // For each pair: MOV AL, x; ADD AL, y; HLT.
    for (x, y) in [
        (0x7Fu8, 0x01u8),
        (0xFF, 0x01),
        (0x80, 0x80),
        (0x01, 0x02),
        (0x00, 0x00),
        (0x12, 0xEE),
    ] {
        let (cpu, _) = run_bytes(&[0xB0, x, 0x04, y, 0xF4]);
        let r = x.wrapping_add(y);
        let flags = cpu.regs.flags();

        assert_eq!(cpu.regs.low_byte(Register::Ax).unwrap(), r);
        assert_eq!(flags.contains(Flags::CF), x as u16 + y as u16 > 0xFF, "CF for {x:#X}+{y:#X}");
        assert_eq!(flags.contains(Flags::ZF), r == 0, "ZF for {x:#X}+{y:#X}");
        assert_eq!(flags.contains(Flags::SF), r & 0x80 != 0, "SF for {x:#X}+{y:#X}");
        assert_eq!(
            flags.contains(Flags::OF),
            (x ^ !y) & (x ^ r) & 0x80 != 0,
            "OF for {x:#X}+{y:#X}"
        );
        assert_eq!(
            flags.contains(Flags::PF),
            r.count_ones() % 2 == 0,
            "PF for {x:#X}+{y:#X}"
        );
    }
}

#[test]
fn sub_borrow_and_compare() {
    // MOV AL, 3; CMP AL, 5; HLT -> borrow sets CF, result negative.
    let (cpu, _) = run_bytes(&[0xB0, 0x03, 0x3C, 0x05, 0xF4]);
    let flags = cpu.regs.flags();
    assert_eq!(cpu.regs.low_byte(Register::Ax).unwrap(), 3);
    assert!(flags.contains(Flags::CF));
    assert!(flags.contains(Flags::SF));
    assert!(!flags.contains(Flags::ZF));
}

#[test]
fn inc_preserves_carry() {
    // MOV AX, 0xFFFF; STC; INC AX; HLT
    let (cpu, _) = run_bytes(&[0xB8, 0xFF, 0xFF, 0xF9, 0x40, 0xF4]);
    let flags = cpu.regs.flags();
    assert_eq!(cpu.regs.get(Register::Ax), 0);
    assert!(flags.contains(Flags::CF));
    assert!(flags.contains(Flags::ZF));

    // MOV AX, 0x7FFF; INC AX -> overflow at the 0x7FFF/0x8000 boundary.
    let (cpu, _) = run_bytes(&[0xB8, 0xFF, 0x7F, 0x40, 0xF4]);
    assert!(cpu.regs.flags().contains(Flags::OF));
    assert!(cpu.regs.flags().contains(Flags::SF));
}

#[test]
fn push_pop_round_trip() {
    // MOV AX, 0xBEEF; PUSH AX; MOV AX, 0; POP BX; HLT
    let (cpu, _) = run_bytes(&[0xB8, 0xEF, 0xBE, 0x50, 0xB8, 0x00, 0x00, 0x5B, 0xF4]);
    assert_eq!(cpu.regs.get(Register::Bx), 0xBEEF);
    assert_eq!(cpu.regs.get(Register::Sp), 0xFFFE);
}

#[test]
fn sp_wraps_through_zero() {
    let mut memory = Memory::new(0x2_0000);
    let mut cpu = I8086::new();
    cpu.regs.set(Register::Sp, 0x0000);
    cpu.push(&mut memory, 0xABCD).unwrap();
    assert_eq!(cpu.regs.get(Register::Sp), 0xFFFE);
    assert_eq!(cpu.pop(&memory).unwrap(), 0xABCD);
    assert_eq!(cpu.regs.get(Register::Sp), 0x0000);
}

#[test]
fn ip_wraps_at_64k() {
    let mut memory = Memory::new(0x2_0000);
    memory.write_byte(0xFFFF, 0x90).unwrap(); // NOP at CS:0xFFFF
    memory.write_byte(0x0000, 0xF4).unwrap(); // HLT at CS:0x0000
    let mut cpu = I8086::new();
    cpu.regs.set(Register::Cs, 0x0000);
    cpu.regs.set(Register::Ip, 0xFFFF);
    cpu.run(&mut memory, None).unwrap();
    assert!(cpu.halted);
    assert_eq!(cpu.regs.get(Register::Ip), 0x0001);
}

#[test]
fn unknown_opcode_stops_with_error() {
    let mut memory = Memory::new(0x2_0000);
    memory.load_bytes(0x0100, &[0x90, 0x0F]).unwrap();
    let mut cpu = I8086::new();
    let result = cpu.run(&mut memory, None);
    assert_eq!(
        result,
        Err(Error::UnknownOpcode { opcode: 0x0F, cs: 0x0010, ip: 0x0001 })
    );
    assert!(!cpu.halted);
}

#[test]
fn halted_cpu_reports_no_progress_until_reset() {
    let mut memory = Memory::new(0x2_0000);
    memory.load_bytes(0x0100, &[0xF4]).unwrap();
    let mut cpu = I8086::new();
    cpu.run(&mut memory, None).unwrap();
    assert!(cpu.halted);
    assert_eq!(cpu.execute_instruction(&mut memory).unwrap(), false);

    cpu.reset();
    assert!(!cpu.halted);
}

#[test]
fn mul_and_div_word() {
    // MOV AX, 0x1234; MOV BX, 0x0100; MUL BX; HLT
    let (cpu, _) = run_bytes(&[0xB8, 0x34, 0x12, 0xBB, 0x00, 0x01, 0xF7, 0xE3, 0xF4]);
    assert_eq!(cpu.regs.get(Register::Ax), 0x3400);
    assert_eq!(cpu.regs.get(Register::Dx), 0x0012);
    assert!(cpu.regs.flags().contains(Flags::CF));
    assert!(cpu.regs.flags().contains(Flags::OF));

    // MOV DX, 0; MOV AX, 100; MOV BX, 7; DIV BX; HLT
    let (cpu, _) = run_bytes(&[
        0xBA, 0x00, 0x00, 0xB8, 0x64, 0x00, 0xBB, 0x07, 0x00, 0xF7, 0xF3, 0xF4,
    ]);
    assert_eq!(cpu.regs.get(Register::Ax), 14);
    assert_eq!(cpu.regs.get(Register::Dx), 2);
}

#[test]
fn divide_faults_are_structured() {
    // MOV BL, 0; DIV BL
    let mut memory = Memory::new(0x2_0000);
    memory.load_bytes(0x0100, &[0xB3, 0x00, 0xF6, 0xF3]).unwrap();
    let mut cpu = I8086::new();
    assert_eq!(cpu.run(&mut memory, None), Err(Error::DivideByZero));

    // MOV AX, 0x0200; MOV BL, 1; DIV BL -> quotient 0x200 overflows AL.
    let mut memory = Memory::new(0x2_0000);
    memory
        .load_bytes(0x0100, &[0xB8, 0x00, 0x02, 0xB3, 0x01, 0xF6, 0xF3])
        .unwrap();
    let mut cpu = I8086::new();
    assert_eq!(cpu.run(&mut memory, None), Err(Error::DivideOverflow));
}

#[test]
fn idiv_truncates_toward_zero() {
    // MOV AX, -7 (0xFFF9); CWD; MOV BX, 2; IDIV BX; HLT
    let (cpu, _) = run_bytes(&[
        0xB8, 0xF9, 0xFF, 0x99, 0xBB, 0x02, 0x00, 0xF7, 0xFB, 0xF4,
    ]);
    assert_eq!(cpu.regs.get(Register::Ax), (-3i16) as u16);
    assert_eq!(cpu.regs.get(Register::Dx), (-1i16) as u16);
}

#[test]
fn shifts_and_rotates() {
    // MOV AL, 0x81; ROL AL, 1; HLT -> 0x03, CF set.
    let (cpu, _) = run_bytes(&[0xB0, 0x81, 0xD0, 0xC0, 0xF4]);
    assert_eq!(cpu.regs.low_byte(Register::Ax).unwrap(), 0x03);
    assert!(cpu.regs.flags().contains(Flags::CF));

    // MOV AL, 0x81; SHR AL, 1; HLT -> 0x40, CF set (bit 0 out), OF = old MSB.
    let (cpu, _) = run_bytes(&[0xB0, 0x81, 0xD0, 0xE8, 0xF4]);
    assert_eq!(cpu.regs.low_byte(Register::Ax).unwrap(), 0x40);
    assert!(cpu.regs.flags().contains(Flags::CF));
    assert!(cpu.regs.flags().contains(Flags::OF));

    // MOV AX, 0x8000; MOV CL, 3; SAR AX, CL; HLT -> sign fills in.
    let (cpu, _) = run_bytes(&[0xB8, 0x00, 0x80, 0xB1, 0x03, 0xD3, 0xF8, 0xF4]);
    assert_eq!(cpu.regs.get(Register::Ax), 0xF000);
}

#[test]
fn movsb_honours_direction_flag() {
    let mut memory = Memory::new(0x2_0000);
    // CLD; MOV CX, 3; REP MOVSB; HLT
    memory
        .load_bytes(0x0100, &[0xFC, 0xB9, 0x03, 0x00, 0xF3, 0xA4, 0xF4])
        .unwrap();
    memory.load_bytes(0x0400, b"abc").unwrap();

    let mut cpu = I8086::new();
    cpu.regs.set(Register::Ds, 0x0040); // source 0x0400
    cpu.regs.set(Register::Es, 0x0050); // destination 0x0500
    cpu.regs.set(Register::Si, 0x0000);
    cpu.regs.set(Register::Di, 0x0000);
    cpu.run(&mut memory, None).unwrap();

    assert_eq!(memory.dump(0x0500, 3).unwrap(), b"abc");
    assert_eq!(cpu.regs.get(Register::Si), 3);
    assert_eq!(cpu.regs.get(Register::Di), 3);
    assert_eq!(cpu.regs.get(Register::Cx), 0);
}

#[test]
fn rep_with_cx_zero_is_skipped() {
    let mut memory = Memory::new(0x2_0000);
    // MOV CX, 0; REP MOVSB; HLT
    memory
        .load_bytes(0x0100, &[0xB9, 0x00, 0x00, 0xF3, 0xA4, 0xF4])
        .unwrap();
    let mut cpu = I8086::new();
    cpu.regs.set(Register::Si, 0x1111);
    cpu.regs.set(Register::Di, 0x2222);
    cpu.run(&mut memory, None).unwrap();

    // The prefixed instruction was consumed but had no effect.
    assert!(cpu.halted);
    assert_eq!(cpu.regs.get(Register::Cx), 0);
    assert_eq!(cpu.regs.get(Register::Si), 0x1111);
    assert_eq!(cpu.regs.get(Register::Di), 0x2222);
}

#[test]
fn repne_scasb_finds_a_byte() {
    let mut memory = Memory::new(0x2_0000);
    // MOV AL, 'c'; MOV CX, 8; REPNE SCASB; HLT
    memory
        .load_bytes(0x0100, &[0xB0, b'c', 0xB9, 0x08, 0x00, 0xF2, 0xAE, 0xF4])
        .unwrap();
    memory.load_bytes(0x0500, b"abcdefgh").unwrap();

    let mut cpu = I8086::new();
    cpu.regs.set(Register::Es, 0x0050);
    cpu.regs.set(Register::Di, 0x0000);
    cpu.run(&mut memory, None).unwrap();

    // Stopped after the match at index 2: DI one past it, ZF set.
    assert_eq!(cpu.regs.get(Register::Di), 3);
    assert_eq!(cpu.regs.get(Register::Cx), 5);
    assert!(cpu.regs.flags().contains(Flags::ZF));
}

#[test]
fn conditional_jump_taken_and_not_taken() {
    // MOV AX, 3; CMP AX, 3; JNE +2 (skips MOV CL, 1); MOV CL, 1; HLT
    let (cpu, _) = run_bytes(&[
        0xB8, 0x03, 0x00, 0x3D, 0x03, 0x00, 0x75, 0x02, 0xB1, 0x01, 0xF4,
    ]);
    assert_eq!(cpu.regs.low_byte(Register::Cx).unwrap(), 1);
    assert!(cpu.regs.flags().contains(Flags::ZF));

    // MOV AX, 3; CMP AX, 4; JNE +2; MOV CL, 1; HLT -> jump taken.
    let (cpu, _) = run_bytes(&[
        0xB8, 0x03, 0x00, 0x3D, 0x04, 0x00, 0x75, 0x02, 0xB1, 0x01, 0xF4,
    ]);
    assert_eq!(cpu.regs.low_byte(Register::Cx).unwrap(), 0);
}

#[test]
fn call_and_ret() {
    // CALL +1 (over the HLT); HLT; MOV AX, 7; RET
    let (cpu, _) = run_bytes(&[
        0xE8, 0x01, 0x00, // CALL 0x0004
        0xF4, // HLT
        0xB8, 0x07, 0x00, // MOV AX, 7
        0xC3, // RET -> back to the HLT
    ]);
    assert_eq!(cpu.regs.get(Register::Ax), 7);
    assert!(cpu.halted);
    assert_eq!(cpu.regs.get(Register::Sp), 0xFFFE);
}

#[test]
fn xchg_of_segment_values_via_mov() {
    // MOV AX, 0x0200; MOV DS, AX; MOV BX, DS; HLT
    let (cpu, _) = run_bytes(&[0xB8, 0x00, 0x02, 0x8E, 0xD8, 0x8C, 0xDB, 0xF4]);
    assert_eq!(cpu.regs.get(Register::Ds), 0x0200);
    assert_eq!(cpu.regs.get(Register::Bx), 0x0200);
}

#[test]
fn lea_and_xlat() {
    let mut memory = Memory::new(0x2_0000);
    // MOV BX, 0x0040; LEA CX, [BX+2]; MOV AL, 2; XLAT; HLT
    memory
        .load_bytes(
            0x0100,
            &[0xBB, 0x40, 0x00, 0x8D, 0x4F, 0x02, 0xB0, 0x02, 0xD7, 0xF4],
        )
        .unwrap();
    // Translation table at DS:0x0040.
    memory.load_bytes(0x0140, &[0x10, 0x20, 0x30, 0x40]).unwrap();
    let mut cpu = I8086::new();
    cpu.run(&mut memory, None).unwrap();

    assert_eq!(cpu.regs.get(Register::Cx), 0x0042);
    assert_eq!(cpu.regs.low_byte(Register::Ax).unwrap(), 0x30);
}

#[test]
fn into_pushes_frame_when_overflow_set() {
    let mut memory = Memory::new(0x2_0000);
    // MOV AL, 0x7F; ADD AL, 1 (sets OF); INTO; HLT
    memory
        .load_bytes(0x0100, &[0xB0, 0x7F, 0x04, 0x01, 0xCE, 0xF4])
        .unwrap();
    let mut cpu = I8086::new();
    cpu.run(&mut memory, None).unwrap();

    // FLAGS, CS and IP were pushed; IF and TF cleared.
    assert_eq!(cpu.regs.get(Register::Sp), 0xFFF8);
    assert!(!cpu.regs.flags().contains(Flags::IF));
    assert!(!cpu.regs.flags().contains(Flags::TF));
    let pushed_ip = memory
        .dump(cpu.physical_address(cpu.regs.get(Register::Ss), 0xFFF8), 2)
        .unwrap();
    assert_eq!(pushed_ip, vec![0x05, 0x00]);
}

#[test]
fn instruction_budget_stops_the_run() {
    let mut memory = Memory::new(0x2_0000);
    // again: JMP again
    memory.load_bytes(0x0100, &[0xEB, 0xFE]).unwrap();
    let mut cpu = I8086::new();
    let executed = cpu.run(&mut memory, Some(100)).unwrap();
    assert_eq!(executed, 100);
    assert!(!cpu.halted);
}

#[test]
fn profiler_observes_execution() {
    use i8086::profiler::ExecutionProfiler;
    use std::cell::RefCell;
    use std::rc::Rc;

    let profiler = Rc::new(RefCell::new(ExecutionProfiler::new()));
    let mut memory = Memory::new(0x2_0000);
    memory
        .load_bytes(0x0100, &[0xB8, 0x34, 0x12, 0xE2, 0xFE, 0xF4])
        .unwrap();

    let mut cpu = I8086::new();
    cpu.regs.set(Register::Cx, 3);
    cpu.set_profiler(profiler.clone());
    memory.set_profiler(profiler.clone());
    cpu.run(&mut memory, None).unwrap();

    let stats = profiler.borrow();
    // MOV + 3x LOOP + HLT.
    assert_eq!(stats.instructions, 5);
    assert_eq!(stats.opcode_counts[&0xE2], 3);
    assert_eq!(stats.jumps, 3);
    assert!(stats.reads.values().sum::<u64>() > 0);
}
