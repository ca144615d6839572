use std::fmt;

use runmark_ir::block::{Block, Function};
use runmark_ir::visitor::{walk_function_mut, VisitorMut};

use crate::config::PassConfig;
use crate::marker::MarkerFactory;
use crate::transform::{plan_runs, BlockTransformer};

/// Totals over every block the pass has visited.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub functions: usize,
    pub blocks: usize,
    /// Blocks whose markers changed.
    pub modified_blocks: usize,
    /// Runs marked. Equal to the number of markers in the output.
    pub markers: usize,
    pub run_members: usize,
    pub boundaries: usize,
    pub terminators: usize,
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "functions:       {}", self.functions)?;
        writeln!(f, "blocks:          {}", self.blocks)?;
        writeln!(f, "modified blocks: {}", self.modified_blocks)?;
        writeln!(f, "markers:         {}", self.markers)?;
        writeln!(f, "run members:     {}", self.run_members)?;
        writeln!(f, "boundaries:      {}", self.boundaries)?;
        write!(f, "terminators:     {}", self.terminators)
    }
}

/// Inserts run markers into every block of a module.
pub struct InsertRunMarkers<'a> {
    transformer: BlockTransformer<'a>,
    pub stats: PassStats,
}

impl<'a> InsertRunMarkers<'a> {
    pub fn new(config: &'a PassConfig, factory: &'a dyn MarkerFactory) -> Self {
        Self {
            transformer: BlockTransformer::new(config, factory),
            stats: PassStats::default(),
        }
    }
}

impl<'a> VisitorMut for InsertRunMarkers<'a> {
    fn visit_function(&mut self, function: &mut Function) {
        let _span = tracing::debug_span!("function", name = %function.name).entered();
        tracing::debug!(blocks = function.blocks.len(), "inserting run markers");
        self.stats.functions += 1;
        walk_function_mut(self, function);
    }

    fn visit_block(&mut self, block: &mut Block) {
        let label = block.label.as_deref().unwrap_or("<entry>");
        tracing::debug!(label, instrs = block.len(), "visiting block");

        let plan = plan_runs(block, self.transformer.config());
        self.stats.blocks += 1;
        self.stats.markers += plan.runs.len();
        self.stats.run_members += plan.members();
        self.stats.boundaries += plan.boundaries();
        self.stats.terminators += plan.terminators();
        if self.transformer.apply(block, &plan) {
            self.stats.modified_blocks += 1;
        }

        for instr in block.instrs() {
            tracing::trace!("{instr}");
        }
    }
}
