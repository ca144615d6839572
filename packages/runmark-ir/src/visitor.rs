use crate::block::{Block, Function, InstrId, Module};
use crate::instr::Instr;

pub trait Visitor {
    fn visit_module(&mut self, module: &Module) {
        walk_module(self, module)
    }

    fn visit_function(&mut self, function: &Function) {
        walk_function(self, function)
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block)
    }

    fn visit_instr(&mut self, _id: InstrId, _instr: &Instr) {}
}

pub fn walk_module<T: Visitor + ?Sized>(visitor: &mut T, module: &Module) {
    for function in &module.functions {
        visitor.visit_function(function);
    }
}

pub fn walk_function<T: Visitor + ?Sized>(visitor: &mut T, function: &Function) {
    for block in &function.blocks {
        visitor.visit_block(block);
    }
}

pub fn walk_block<T: Visitor + ?Sized>(visitor: &mut T, block: &Block) {
    for (id, instr) in block.iter() {
        visitor.visit_instr(id, instr);
    }
}

/// Like [`Visitor`], but may change the blocks it visits. Passes that insert instructions are
/// written against this trait.
pub trait VisitorMut {
    fn visit_module(&mut self, module: &mut Module) {
        walk_module_mut(self, module)
    }

    fn visit_function(&mut self, function: &mut Function) {
        walk_function_mut(self, function)
    }

    fn visit_block(&mut self, _block: &mut Block) {}
}

pub fn walk_module_mut<T: VisitorMut + ?Sized>(visitor: &mut T, module: &mut Module) {
    for function in &mut module.functions {
        visitor.visit_function(function);
    }
}

pub fn walk_function_mut<T: VisitorMut + ?Sized>(visitor: &mut T, function: &mut Function) {
    for block in &mut function.blocks {
        visitor.visit_block(block);
    }
}
