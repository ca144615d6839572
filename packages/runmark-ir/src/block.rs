//! Basic blocks, functions and modules.

use std::ops::{Index, IndexMut};

use la_arena::{Arena, Idx};
use smol_str::SmolStr;

use crate::instr::Instr;

/// A stable handle to an instruction in a [`Block`]. Inserting other instructions never
/// invalidates it.
pub type InstrId = Idx<Instr>;

/// A straight-line sequence of instructions.
#[derive(Debug, Clone, Default)]
pub struct Block {
    /// `None` for the entry block, which is labelled by its function.
    pub label: Option<SmolStr>,
    instrs: Arena<Instr>,
    /// The order of the instructions.
    layout: Vec<InstrId>,
}

impl Block {
    pub fn new(label: Option<SmolStr>) -> Self {
        Self {
            label,
            instrs: Arena::new(),
            layout: Vec::new(),
        }
    }

    /// Append an instruction to the end of the block.
    pub fn push(&mut self, instr: Instr) -> InstrId {
        let id = self.instrs.alloc(instr);
        self.layout.push(id);
        id
    }

    /// Insert `instr` immediately before `anchor`. The relative order of all existing
    /// instructions is preserved.
    ///
    /// # Panics
    /// Panics if `anchor` is not part of this block.
    pub fn insert_before(&mut self, anchor: InstrId, instr: Instr) -> InstrId {
        let pos = self
            .position(anchor)
            .unwrap_or_else(|| panic!("instruction {anchor:?} is not in this block"));
        let id = self.instrs.alloc(instr);
        self.layout.insert(pos, id);
        id
    }

    /// The index of `id` in the block's order.
    pub fn position(&self, id: InstrId) -> Option<usize> {
        self.layout.iter().position(|x| *x == id)
    }

    /// The instruction directly before `id`, if any.
    pub fn prev(&self, id: InstrId) -> Option<InstrId> {
        let pos = self.position(id)?;
        pos.checked_sub(1).map(|prev| self.layout[prev])
    }

    /// Drop every instruction for which `keep` returns `false`. Ids of kept instructions stay valid.
    pub fn retain(&mut self, mut keep: impl FnMut(InstrId, &Instr) -> bool) {
        let instrs = &self.instrs;
        self.layout.retain(|id| keep(*id, &instrs[*id]));
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstrId, &Instr)> + '_ {
        self.layout.iter().map(|id| (*id, &self.instrs[*id]))
    }

    pub fn instrs(&self) -> impl Iterator<Item = &Instr> + '_ {
        self.layout.iter().map(|id| &self.instrs[*id])
    }

    pub fn len(&self) -> usize {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }
}

impl Index<InstrId> for Block {
    type Output = Instr;

    fn index(&self, id: InstrId) -> &Self::Output {
        &self.instrs[id]
    }
}

impl IndexMut<InstrId> for Block {
    fn index_mut(&mut self, id: InstrId) -> &mut Self::Output {
        &mut self.instrs[id]
    }
}

impl FromIterator<Instr> for Block {
    fn from_iter<T: IntoIterator<Item = Instr>>(iter: T) -> Self {
        let mut block = Block::new(None);
        for instr in iter {
            block.push(instr);
        }
        block
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: SmolStr,
    /// Blocks in layout order. The first block is the entry block.
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn new(name: SmolStr) -> Self {
        Self {
            name,
            blocks: vec![Block::new(None)],
        }
    }

    /// The block new instructions are appended to.
    pub fn last_block_mut(&mut self) -> &mut Block {
        if self.blocks.is_empty() {
            self.blocks.push(Block::new(None));
        }
        let last = self.blocks.len() - 1;
        &mut self.blocks[last]
    }
}

/// A parsed assembly file.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Directives that come before the first function, kept verbatim.
    pub header: Vec<SmolStr>,
    pub functions: Vec<Function>,
}
