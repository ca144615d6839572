//! Per-block run state.

use std::collections::HashSet;

use runmark_ir::block::InstrId;
use runmark_ir::instr::Instr;
use runmark_ir::reg::Reg;

/// A run of independent instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// The first instruction of the run. Its marker goes right before it.
    pub start: InstrId,
    /// Number of instructions in the run. Never 0.
    pub len: u32,
}

/// The state of one block's scan.
///
/// The register sets are cleared only when an open run is flushed. A hazard found while no run
/// is open leaves them alone, so later instructions are still checked against everything seen
/// since the last flush.
#[derive(Debug, Default)]
pub struct RunState {
    /// Registers read since the last flush.
    pub live_regs: HashSet<Reg>,
    /// Registers written since the last flush.
    pub def_regs: HashSet<Reg>,
    run: Option<Run>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the open run, 0 when idle.
    pub fn count(&self) -> u32 {
        self.run.map_or(0, |run| run.len)
    }

    /// Where the marker of the open run goes.
    pub fn insert_pos(&self) -> Option<InstrId> {
        self.run.map(|run| run.start)
    }

    pub fn is_accumulating(&self) -> bool {
        self.run.is_some()
    }

    /// Add an independent instruction, opening a run at it if none is open.
    pub fn extend(&mut self, id: InstrId) {
        match &mut self.run {
            Some(run) => run.len += 1,
            None => self.run = Some(Run { start: id, len: 1 }),
        }
    }

    /// Close the open run and clear the register sets. Does nothing when idle.
    pub fn flush(&mut self) -> Option<Run> {
        let run = self.run.take()?;
        self.live_regs.clear();
        self.def_regs.clear();
        Some(run)
    }

    /// End the scan, returning the run still open at the end of the block.
    pub fn finish(self) -> Option<Run> {
        self.run
    }

    /// Record the registers `instr` reads and writes, in operand order.
    pub fn fold(&mut self, instr: &Instr) {
        for op in instr.reg_operands() {
            let Some(reg) = op.reg else {
                continue;
            };
            if op.role.is_def() {
                self.def_regs.insert(reg);
                self.live_regs.remove(&reg);
            }
            if op.role.is_use() {
                self.live_regs.insert(reg);
            }
        }
    }
}
