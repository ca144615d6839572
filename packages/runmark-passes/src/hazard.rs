//! Hazard classification.
//!
//! Both tests are pure. The register test runs against the registers read and written since the
//! last flush; the memory test compares two instructions directly.

use std::collections::HashSet;
use std::fmt;

use runmark_ir::instr::Instr;
use runmark_ir::reg::Reg;

/// Why an instruction cannot join the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hazard {
    ReadAfterWrite(Reg),
    WriteAfterRead(Reg),
    WriteAfterWrite(Reg),
    /// Both instructions access memory, at least one of them stores, and they read the same
    /// register.
    Memory(Reg),
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hazard::ReadAfterWrite(reg) => write!(f, "read-after-write on {reg}"),
            Hazard::WriteAfterRead(reg) => write!(f, "write-after-read on {reg}"),
            Hazard::WriteAfterWrite(reg) => write!(f, "write-after-write on {reg}"),
            Hazard::Memory(reg) => write!(f, "memory through {reg}"),
        }
    }
}

/// Find the first register hazard of `instr`, checking its operands in document order.
pub fn find_register_hazard(
    instr: &Instr,
    live_regs: &HashSet<Reg>,
    def_regs: &HashSet<Reg>,
) -> Option<Hazard> {
    for op in instr.reg_operands() {
        let Some(reg) = op.reg else {
            continue;
        };
        if op.role.is_use() && def_regs.contains(&reg) {
            return Some(Hazard::ReadAfterWrite(reg));
        }
        if op.role.is_def() {
            if live_regs.contains(&reg) {
                return Some(Hazard::WriteAfterRead(reg));
            }
            if def_regs.contains(&reg) {
                return Some(Hazard::WriteAfterWrite(reg));
            }
        }
    }
    None
}

pub fn register_hazard(instr: &Instr, live_regs: &HashSet<Reg>, def_regs: &HashSet<Reg>) -> bool {
    find_register_hazard(instr, live_regs, def_regs).is_some()
}

/// The register through which `a` and `b` may alias.
///
/// Offsets are never compared: two accesses through the same base register are assumed to
/// overlap. Two loads never conflict.
pub fn find_memory_hazard(a: &Instr, b: &Instr) -> Option<Hazard> {
    if !a.may_access_memory() || !b.may_access_memory() {
        return None;
    }
    if !a.may_store() && !b.may_store() {
        return None;
    }
    a.uses()
        .find(|reg| b.uses().any(|other| other == *reg))
        .map(Hazard::Memory)
}

pub fn memory_hazard(a: &Instr, b: &Instr) -> bool {
    find_memory_hazard(a, b).is_some()
}
