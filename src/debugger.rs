// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Address breakpoints and the stepping/run drivers.

use crate::{I8086, Memory};
use crate::error::Error;

use log::debug;

use std::collections::BTreeSet;

/// Why [run_to_breakpoint](Debugger::run_to_breakpoint) stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The physical address of CS:IP entered the breakpoint set. The
    /// instruction at that address has not been executed.
    Breakpoint(u32),
    /// The CPU reported no progress (HLT).
    Halted,
    /// Single-step mode was active, so one instruction was executed.
    SingleStep,
}

/// Drives a CPU under breakpoint control.
///
/// The debugger observes the CPU and memory but owns neither; mutation goes
/// exclusively through `execute_instruction`.
#[derive(Debug, Default)]
pub struct Debugger {
    breakpoints: BTreeSet<u32>,
    step_mode: bool,
    last_error: Option<Error>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or removes a physical breakpoint address; returns the new
    /// membership.
    pub fn toggle_breakpoint(&mut self, addr: u32) -> bool {
        if self.breakpoints.remove(&addr) {
            debug!("breakpoint removed at {addr:05X}");
            false
        } else {
            debug!("breakpoint set at {addr:05X}");
            self.breakpoints.insert(addr);
            true
        }
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.breakpoints.iter().copied()
    }

    /// When set, `run_to_breakpoint` stops after every instruction.
    pub fn set_step_mode(&mut self, enabled: bool) {
        self.step_mode = enabled;
    }

    /// The error that stopped the last drive, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Executes a single instruction; returns whether progress was made.
    pub fn step_instruction(&mut self, cpu: &mut I8086, memory: &mut Memory) -> Result<bool, Error> {
        self.record(cpu.execute_instruction(memory))
    }

    /// Runs until a breakpoint, a halt, single-step mode, or a failing step.
    ///
    /// Breakpoints are checked against physical CS:IP before executing, so
    /// the instruction at a hit breakpoint is the first one not executed.
    /// Errors propagate to the caller with the CPU left in the failing state.
    pub fn run_to_breakpoint(
        &mut self,
        cpu: &mut I8086,
        memory: &mut Memory,
    ) -> Result<StopReason, Error> {
        loop {
            let at = cpu.physical_ip();
            if self.breakpoints.contains(&at) {
                debug!("breakpoint hit at {at:05X}");
                return Ok(StopReason::Breakpoint(at));
            }
            if !self.record(cpu.execute_instruction(memory))? {
                return Ok(StopReason::Halted);
            }
            if self.step_mode {
                return Ok(StopReason::SingleStep);
            }
        }
    }

    fn record<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(error) = &result {
            self.last_error = Some(error.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_reports_membership() {
        let mut debugger = Debugger::new();
        assert!(debugger.toggle_breakpoint(0x0106));
        assert!(!debugger.toggle_breakpoint(0x0106));
        assert!(debugger.toggle_breakpoint(0x0106));
        debugger.clear_breakpoints();
        assert_eq!(debugger.breakpoints().count(), 0);
    }

    #[test]
    fn step_on_halted_cpu_reports_no_progress() {
        let mut memory = Memory::new(0x1000);
        let mut cpu = I8086::new();
        cpu.halted = true;
        let mut debugger = Debugger::new();
        assert_eq!(debugger.step_instruction(&mut cpu, &mut memory), Ok(false));
    }

    #[test]
    fn failing_step_is_recorded() {
        let mut memory = Memory::new(0x1000);
        let mut cpu = I8086::new();
        // 0x0F has no handler on the 8086 subset.
        memory.load_bytes(0x0100, &[0x0F]).unwrap();
        let mut debugger = Debugger::new();
        assert!(debugger.run_to_breakpoint(&mut cpu, &mut memory).is_err());
        assert!(debugger.last_error().is_some());
    }
}
