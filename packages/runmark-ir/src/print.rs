//! Print assembly.
//!
//! The [`fmt::Display`] impls produce text the parser accepts again, so an annotated module can
//! be read back in.

use std::{fmt, io};

use yansi::Paint;

use crate::block::{Block, Function, Module};
use crate::instr::{Instr, InstrKind, Offset, Operand, RegOperand, Reloc};

const INDENT: &str = "    ";

/// Print a module with colors: labels in bold, markers highlighted and metadata dimmed.
pub fn print_module(module: &Module, f: &mut dyn io::Write) -> io::Result<()> {
    for line in &module.header {
        writeln!(f, "{INDENT}{line}")?;
    }
    for function in &module.functions {
        writeln!(f, "{}:", Paint::new(&function.name).bold())?;
        for block in &function.blocks {
            if let Some(label) = &block.label {
                writeln!(f, "{}:", Paint::new(label).bold())?;
            }
            for instr in block.instrs() {
                match instr.kind {
                    InstrKind::Marker => writeln!(f, "{INDENT}{}", Paint::yellow(instr))?,
                    InstrKind::Meta => {
                        writeln!(f, "{INDENT}{}", Paint::rgb(150, 150, 150, instr))?
                    }
                    _ => writeln!(f, "{INDENT}{instr}")?,
                }
            }
        }
    }
    Ok(())
}

impl fmt::Display for RegOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reg {
            Some(reg) => write!(f, "{reg}"),
            None => f.write_str("_"),
        }
    }
}

impl fmt::Display for Reloc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}({})", self.op, self.symbol)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Imm(value) => write!(f, "{value}"),
            Offset::Reloc(reloc) => write!(f, "{reloc}"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(value) => write!(f, "{value}"),
            Operand::Reloc(reloc) => write!(f, "{reloc}"),
            Operand::Mem { offset, base } => write!(f, "{offset}({base})"),
            Operand::Label(label) => write!(f, "{label}"),
            Operand::Text(text) => write!(f, "{text}"),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut explicit = self.operands.iter().filter(|op| !op.is_implicit());
        match self.kind {
            InstrKind::InlineAsm => {
                write!(f, "{} \"", self.opcode)?;
                for op in explicit {
                    write!(f, "{op}")?;
                }
                return f.write_str("\"");
            }
            InstrKind::Meta => {
                f.write_str(&self.opcode)?;
                for op in explicit {
                    write!(f, " {op}")?;
                }
                return Ok(());
            }
            _ => {}
        }
        match explicit.next() {
            None => f.write_str(&self.opcode),
            Some(first) => {
                write!(f, "{:<7} {first}", self.opcode.as_str())?;
                for op in explicit {
                    write!(f, ", {op}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            writeln!(f, "{label}:")?;
        }
        for instr in self.instrs() {
            writeln!(f, "{INDENT}{instr}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.header {
            writeln!(f, "{INDENT}{line}")?;
        }
        for function in &self.functions {
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
