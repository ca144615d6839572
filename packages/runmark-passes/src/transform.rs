//! Splitting a block into runs of independent instructions.

use std::fmt;

use runmark_ir::block::{Block, InstrId};
use runmark_ir::instr::Instr;

use crate::config::{PassConfig, TerminatorPolicy};
use crate::hazard::{find_memory_hazard, find_register_hazard, Hazard};
use crate::marker::{emit, MarkerFactory};
use crate::state::{Run, RunState};

/// What the scan decided about one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Independent of everything since the last flush. Part of a run.
    RunMember,
    /// Depends on an earlier instruction. Closes the open run, if any, and belongs to none.
    Boundary(Hazard),
    /// A barrier, branch or inline escape under [`TerminatorPolicy::FlushAndSkip`].
    Terminator,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::RunMember => write!(f, "member"),
            Classification::Boundary(hazard) => write!(f, "boundary ({hazard})"),
            Classification::Terminator => write!(f, "terminator"),
        }
    }
}

/// The result of scanning a block, before any marker is inserted.
///
/// Markers and metadata are never classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPlan {
    pub classified: Vec<(InstrId, Classification)>,
    /// Runs in block order.
    pub runs: Vec<Run>,
}

impl BlockPlan {
    pub fn members(&self) -> usize {
        self.count(|class| matches!(class, Classification::RunMember))
    }

    pub fn boundaries(&self) -> usize {
        self.count(|class| matches!(class, Classification::Boundary(_)))
    }

    pub fn terminators(&self) -> usize {
        self.count(|class| matches!(class, Classification::Terminator))
    }

    fn count(&self, f: impl Fn(&Classification) -> bool) -> usize {
        self.classified.iter().filter(|(_, class)| f(class)).count()
    }
}

/// Scan `block` once, front to back, and find its runs.
///
/// The block is not changed. Markers already in the block are skipped, so planning a block that
/// was already transformed gives the same runs again.
pub fn plan_runs(block: &Block, config: &PassConfig) -> BlockPlan {
    let mut state = RunState::new();
    let mut plan = BlockPlan::default();
    // Earlier instructions that later memory accesses are compared against.
    let mut scanned: Vec<&Instr> = Vec::new();

    for (id, instr) in block.iter() {
        if instr.is_marker() || instr.is_metadata_only() {
            continue;
        }

        if config.policy == TerminatorPolicy::FlushAndSkip && instr.is_run_terminator() {
            if let Some(run) = state.flush() {
                tracing::debug!(len = run.len, "run closed by `{}`", instr.opcode);
                plan.runs.push(run);
            }
            tracing::trace!("{instr} ; terminator");
            plan.classified.push((id, Classification::Terminator));
            continue;
        }

        let hazard = find_register_hazard(instr, &state.live_regs, &state.def_regs).or_else(|| {
            scanned
                .iter()
                .rev()
                .find_map(|prev| find_memory_hazard(instr, prev))
        });
        let class = match hazard {
            None => {
                state.extend(id);
                Classification::RunMember
            }
            Some(hazard) => {
                if let Some(run) = state.flush() {
                    tracing::debug!(len = run.len, "run closed by {hazard}");
                    plan.runs.push(run);
                }
                Classification::Boundary(hazard)
            }
        };
        tracing::trace!("{instr} ; {class}");
        state.fold(instr);
        scanned.push(instr);
        plan.classified.push((id, class));
    }

    if let Some(run) = state.finish() {
        plan.runs.push(run);
    }
    plan
}

/// Inserts a marker in front of every run of a block.
pub struct BlockTransformer<'a> {
    config: &'a PassConfig,
    factory: &'a dyn MarkerFactory,
}

impl<'a> BlockTransformer<'a> {
    pub fn new(config: &'a PassConfig, factory: &'a dyn MarkerFactory) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &PassConfig {
        self.config
    }

    /// Returns `true` if the markers of the block changed.
    pub fn run_on_block(&self, block: &mut Block) -> bool {
        let plan = plan_runs(block, self.config);
        self.apply(block, &plan)
    }

    /// Mark the runs of a plan made by [`plan_runs`] on this same block.
    ///
    /// Markers already in front of a run are reused. Markers that no longer belong to any run are
    /// removed.
    pub fn apply(&self, block: &mut Block, plan: &BlockPlan) -> bool {
        let mut changed = false;
        let mut marked = Vec::with_capacity(plan.runs.len());
        for run in &plan.runs {
            let emitted = emit(block, run.start, self.config.carrier, run.len, self.factory);
            changed |= emitted.changed();
            marked.push(emitted.id());
        }

        let before = block.len();
        block.retain(|id, instr| !instr.is_marker() || marked.contains(&id));
        if block.len() != before {
            tracing::debug!(removed = before - block.len(), "dropped stale markers");
            changed = true;
        }
        changed
    }
}
