// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Benchmark for the interpreter step.
//!
//! Make sure the result of the benchmarked function is used,
//! whether by sending it to black_box, or to return it from the closure.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use i8086::{I8086, Memory};

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut memory = Memory::new(0x2_0000);
    // again: JMP again. The benchmark re-executes the same instruction.
    memory.load_bytes(0x0100, &[0xEB, 0xFE]).unwrap();
    let mut cpu = I8086::new();

    c.bench_function("execute_instruction", |b| {
        b.iter(|| black_box(cpu.execute_instruction(black_box(&mut memory))))
    });

    c.bench_function("run_1000", |b| {
        b.iter(|| black_box(cpu.run(black_box(&mut memory), Some(1000))))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
