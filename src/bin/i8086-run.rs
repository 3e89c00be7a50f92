// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assembles an 8086 source program and runs it to completion, printing the
//! final register and flag state. Breakpoints switch the run into the
//! debugger's run-to-breakpoint loop.

use clap::Parser;

use i8086::{I8086, Memory, StdoutSink};
use i8086::assembler::Assembler;
use i8086::debugger::{Debugger, StopReason};
use i8086::memory::MAX_MEMORY;

use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "i8086-run", about = "Assemble and run an Intel 8086 program")]
struct Args {
    /// Assembly source file.
    source: PathBuf,

    /// Stop after this many instructions.
    #[arg(long)]
    max_instructions: Option<u64>,

    /// Break at a physical address (repeatable, e.g. --break 0x0106).
    #[arg(long = "break", value_parser = parse_address)]
    breakpoints: Vec<u32>,

    /// Dump this many bytes of the data segment after the run.
    #[arg(long)]
    dump: Option<u32>,
}

fn parse_address(token: &str) -> Result<u32, String> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => token.parse(),
    };
    parsed.map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        },
    }
}

fn run(args: &Args) -> Result<(), String> {
    let mut memory = Memory::new(MAX_MEMORY);
    let mut cpu = I8086::new();
    cpu.set_output_sink(Box::new(StdoutSink));

    let mut assembler = Assembler::new();
    assembler
        .load_program(&args.source, &mut cpu, &mut memory)
        .map_err(|e| e.to_string())?;

    if args.breakpoints.is_empty() {
        cpu.run(&mut memory, args.max_instructions)
            .map_err(|e| e.to_string())?;
    } else {
        let mut debugger = Debugger::new();
        for &addr in &args.breakpoints {
            debugger.toggle_breakpoint(addr);
        }
        loop {
            match debugger
                .run_to_breakpoint(&mut cpu, &mut memory)
                .map_err(|e| e.to_string())?
            {
                StopReason::Breakpoint(addr) => {
                    println!("breakpoint hit at {addr:05X}");
                    print_state(&cpu);
                    debugger.toggle_breakpoint(addr);
                },
                StopReason::Halted | StopReason::SingleStep => break,
            }
        }
    }

    println!("\nexecuted {} instruction(s)", cpu.instructions_executed());
    print_state(&cpu);

    if let Some(len) = args.dump {
        let base = assembler.layout().data;
        let bytes = memory.dump(base, len).map_err(|e| e.to_string())?;
        println!("\ndata segment at {base:05X}:");
        for (index, chunk) in bytes.chunks(16).enumerate() {
            print!("{:05X}:", base as usize + index * 16);
            for byte in chunk {
                print!(" {byte:02X}");
            }
            println!();
        }
    }
    Ok(())
}

fn print_state(cpu: &I8086) {
    let registers = cpu.regs.snapshot();
    let mut line = String::new();
    for (index, (name, value)) in registers.iter().enumerate() {
        line.push_str(&format!("{name}={value:04X} "));
        if index % 7 == 6 {
            line.push('\n');
        }
    }
    println!("{}", line.trim_end());

    let flags: Vec<String> = cpu
        .regs
        .flags()
        .snapshot()
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    println!("{}", flags.join(" "));
}
