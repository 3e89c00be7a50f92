// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Execution-observer hooks.
//!
//! A [Profiler] can be attached to [Memory](crate::Memory), to
//! [I8086](crate::I8086), or (through the shared handle) to both at once.
//! Callbacks are invoked from inside the core primitives, in the order the
//! events occur, and an attached hook survives a reset of either component.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::rc::Rc;
use std::time::Duration;

/// A control-transfer kind reported to the profiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlFlowEvent {
    /// An unconditional, conditional or loop jump instruction.
    Jump,
    /// A near or far CALL.
    Call,
    /// Any RET form or IRET.
    Return,
}

/// Observer interface for memory traffic, executed instructions and control flow.
///
/// Every callback has an empty default body, so implementations only override
/// the events they care about.
pub trait Profiler {
    /// A byte was read from the given physical address.
    fn memory_read(&mut self, addr: u32) {
        let _ = addr;
    }

    /// A byte was written at the given physical address.
    fn memory_write(&mut self, addr: u32) {
        let _ = addr;
    }

    /// An instruction finished executing, with its first opcode byte and the
    /// wall time its handler took.
    fn instruction_executed(&mut self, opcode: u8, elapsed: Duration) {
        let _ = (opcode, elapsed);
    }

    /// A jump, call or return was executed.
    fn control_flow(&mut self, event: ControlFlowEvent) {
        let _ = event;
    }
}

/// Shared handle under which a profiler is attached to the core components.
pub type SharedProfiler = Rc<RefCell<dyn Profiler>>;

/// A ready-made profiler collecting execution statistics.
#[derive(Debug, Default)]
pub struct ExecutionProfiler {
    /// Executions per first opcode byte.
    pub opcode_counts: BTreeMap<u8, u64>,
    /// Read count per physical address.
    pub reads: BTreeMap<u32, u64>,
    /// Write count per physical address.
    pub writes: BTreeMap<u32, u64>,
    pub jumps: u64,
    pub calls: u64,
    pub returns: u64,
    pub instructions: u64,
    /// Total handler wall time.
    pub total_time: Duration,
}

impl ExecutionProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards all collected data.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// The `n` most accessed physical addresses, reads and writes combined.
    pub fn hotspots(&self, n: usize) -> Vec<(u32, u64)> {
        let mut combined: BTreeMap<u32, u64> = self.reads.clone();
        for (&addr, &count) in &self.writes {
            *combined.entry(addr).or_default() += count;
        }
        let mut all: Vec<_> = combined.into_iter().collect();
        all.sort_by(|a, b| b.1.cmp(&a.1));
        all.truncate(n);
        all
    }

    /// A human-readable summary of the collected statistics.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "instructions executed: {}", self.instructions);
        let _ = writeln!(out, "total handler time: {:?}", self.total_time);
        let _ = writeln!(
            out,
            "memory reads: {}, writes: {}",
            self.reads.values().sum::<u64>(),
            self.writes.values().sum::<u64>()
        );
        let _ = writeln!(
            out,
            "jumps: {}, calls: {}, returns: {}",
            self.jumps, self.calls, self.returns
        );
        let mut opcodes: Vec<_> = self.opcode_counts.iter().collect();
        opcodes.sort_by(|a, b| b.1.cmp(a.1));
        for (opcode, count) in opcodes.into_iter().take(10) {
            let _ = writeln!(out, "  opcode {opcode:#04X}: {count}");
        }
        out
    }
}

impl Profiler for ExecutionProfiler {
    fn memory_read(&mut self, addr: u32) {
        *self.reads.entry(addr).or_default() += 1;
    }

    fn memory_write(&mut self, addr: u32) {
        *self.writes.entry(addr).or_default() += 1;
    }

    fn instruction_executed(&mut self, opcode: u8, elapsed: Duration) {
        self.instructions += 1;
        self.total_time += elapsed;
        *self.opcode_counts.entry(opcode).or_default() += 1;
    }

    fn control_flow(&mut self, event: ControlFlowEvent) {
        match event {
            ControlFlowEvent::Jump => self.jumps += 1,
            ControlFlowEvent::Call => self.calls += 1,
            ControlFlowEvent::Return => self.returns += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_counts() {
        let mut p = ExecutionProfiler::new();
        p.memory_read(0x100);
        p.memory_read(0x100);
        p.memory_write(0x100);
        p.instruction_executed(0x90, Duration::from_nanos(10));
        p.control_flow(ControlFlowEvent::Call);

        assert_eq!(p.reads[&0x100], 2);
        assert_eq!(p.writes[&0x100], 1);
        assert_eq!(p.opcode_counts[&0x90], 1);
        assert_eq!(p.calls, 1);
        assert_eq!(p.hotspots(1), vec![(0x100, 3)]);
    }
}
