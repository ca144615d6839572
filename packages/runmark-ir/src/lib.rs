//! Machine instruction model and RISC-V assembly text format for runmark.

pub mod block;
pub mod instr;
pub mod lexer;
pub mod opcode;
pub mod parser;
pub mod print;
pub mod reg;
pub mod visitor;
