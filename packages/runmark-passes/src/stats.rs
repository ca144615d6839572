use std::collections::HashMap;
use std::fmt;

use runmark_ir::block::{Function, InstrId};
use runmark_ir::instr::{Instr, InstrKind};
use runmark_ir::visitor::{walk_function, Visitor};

const KIND_ORDER: [InstrKind; 12] = [
    InstrKind::Alu,
    InstrKind::Load,
    InstrKind::Store,
    InstrKind::Atomic,
    InstrKind::Branch,
    InstrKind::Jump,
    InstrKind::Call,
    InstrKind::Fence,
    InstrKind::InlineAsm,
    InstrKind::Meta,
    InstrKind::Marker,
    InstrKind::Unknown,
];

/// Counts the instructions of a module by kind, and the markers and run lengths already in it.
#[derive(Debug, Default)]
pub struct CollectStats {
    pub functions: usize,
    pub by_kind: HashMap<InstrKind, usize>,
    /// Sum of the counts carried by every marker.
    pub marked_instrs: u64,
}

impl CollectStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.by_kind.values().sum()
    }

    pub fn count(&self, kind: InstrKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

impl Visitor for CollectStats {
    fn visit_function(&mut self, function: &Function) {
        self.functions += 1;
        walk_function(self, function);
    }

    fn visit_instr(&mut self, _id: InstrId, instr: &Instr) {
        *self.by_kind.entry(instr.kind).or_default() += 1;
        if let Some(count) = instr.marker_count() {
            self.marked_instrs += u64::from(count);
        }
    }
}

impl fmt::Display for CollectStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "functions: {}", self.functions)?;
        writeln!(f, "instructions: {}", self.total())?;
        for kind in KIND_ORDER {
            let count = self.count(kind);
            if count != 0 {
                writeln!(f, "  {kind:?}: {count}")?;
            }
        }
        write!(f, "marked instructions: {}", self.marked_instrs)
    }
}
