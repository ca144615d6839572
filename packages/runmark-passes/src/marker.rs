//! Marker emission.

use runmark_ir::block::{Block, InstrId};
use runmark_ir::instr::{Instr, InstrKind, Operand, RegOperand, Role};
use runmark_ir::opcode::MARKER_MNEMONIC;
use runmark_ir::reg::Reg;

/// Builds the target's marker instruction.
pub trait MarkerFactory {
    /// A marker announcing a run of `count` instructions. `carrier` is an inert placeholder
    /// operand.
    fn build_marker(&self, carrier: Reg, count: u32) -> Instr;
}

/// `noopn <carrier>, <count>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noopn;

impl MarkerFactory for Noopn {
    fn build_marker(&self, carrier: Reg, count: u32) -> Instr {
        Instr::new(
            MARKER_MNEMONIC,
            InstrKind::Marker,
            vec![
                Operand::Reg(RegOperand::new(Some(carrier), Role::UseDef)),
                Operand::Imm(count.into()),
            ],
        )
    }
}

/// What [`emit`] did to the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emitted {
    Inserted(InstrId),
    /// The marker in front of the run announced another count or carrier and was rebuilt.
    Replaced(InstrId),
    /// The run already had this exact marker.
    Kept(InstrId),
}

impl Emitted {
    pub fn id(self) -> InstrId {
        match self {
            Emitted::Inserted(id) | Emitted::Replaced(id) | Emitted::Kept(id) => id,
        }
    }

    pub fn changed(self) -> bool {
        !matches!(self, Emitted::Kept(_))
    }
}

/// Mark a run of `count` instructions starting at `position`.
///
/// A marker directly in front of `position` is reused, so annotated input gets one marker per run.
pub fn emit(
    block: &mut Block,
    position: InstrId,
    carrier: Reg,
    count: u32,
    factory: &dyn MarkerFactory,
) -> Emitted {
    let marker = factory.build_marker(carrier, count);
    debug_assert!(marker.is_marker(), "marker factory built a non-marker instruction");
    match block.prev(position).filter(|prev| block[*prev].is_marker()) {
        Some(existing) if block[existing] == marker => Emitted::Kept(existing),
        Some(existing) => {
            block[existing] = marker;
            Emitted::Replaced(existing)
        }
        None => Emitted::Inserted(block.insert_before(position, marker)),
    }
}
