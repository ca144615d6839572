//! RISC-V opcode table.
//!
//! Maps a mnemonic to its [`InstrKind`] and to the shapes its explicit operands may take. The
//! parser picks the form matching what was written and uses it to give every register operand its
//! role.

use std::fmt;

use crate::instr::{InstrKind, Role};
use crate::reg::Reg;

/// Mnemonic of the independent-run marker.
pub const MARKER_MNEMONIC: &str = "noopn";

/// Mnemonic of inline assembly escapes, `asm "<text>"`.
pub const INLINE_ASM_MNEMONIC: &str = "asm";

/// What an explicit operand must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// A destination register.
    Dst,
    /// A source register.
    Src,
    /// A register that is read and written, as carried by markers.
    Tied,
    Imm,
    /// `offset(base)`; the base register is read.
    Mem,
    Label,
}

impl fmt::Display for OperandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperandShape::Dst => "a destination register",
            OperandShape::Src => "a source register",
            OperandShape::Tied => "a register",
            OperandShape::Imm => "an immediate",
            OperandShape::Mem => "a memory operand",
            OperandShape::Label => "a label",
        };
        f.write_str(s)
    }
}

/// One way of writing the operands of a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Form {
    pub shape: &'static [OperandShape],
    /// Register operands implied by this form, e.g. the link register of `call`.
    pub implicit: &'static [(Reg, Role)],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub kind: InstrKind,
    /// The usual form of the mnemonic.
    pub form: Form,
    /// Other accepted forms, e.g. `jal ra, f` next to `jal f`.
    pub alt: &'static [Form],
    /// Extra operands (e.g. the predecessor/successor sets of `fence`) are accepted as labels.
    pub variadic: bool,
}

impl OpcodeInfo {
    pub fn forms(&self) -> impl Iterator<Item = Form> + '_ {
        std::iter::once(self.form).chain(self.alt.iter().copied())
    }

    /// Whether `form` accepts `count` explicit operands.
    pub fn accepts_count(&self, form: &Form, count: usize) -> bool {
        if self.variadic {
            count >= form.shape.len()
        } else {
            count == form.shape.len()
        }
    }
}

use OperandShape::*;

const RRR: &[OperandShape] = &[Dst, Src, Src];
const RRI: &[OperandShape] = &[Dst, Src, Imm];
const RI: &[OperandShape] = &[Dst, Imm];
const RL: &[OperandShape] = &[Dst, Label];
const RR: &[OperandShape] = &[Dst, Src];
const LOAD: &[OperandShape] = &[Dst, Mem];
const STORE: &[OperandShape] = &[Src, Mem];
const AMO: &[OperandShape] = &[Dst, Src, Mem];
const BR2: &[OperandShape] = &[Src, Src, Label];
const BR1: &[OperandShape] = &[Src, Label];
const L: &[OperandShape] = &[Label];
const R: &[OperandShape] = &[Src];
const NONE: &[OperandShape] = &[];
const MARKER: &[OperandShape] = &[Tied, Imm];

const DEF_RA: &[(Reg, Role)] = &[(Reg::RA, Role::Def)];
const USE_RA: &[(Reg, Role)] = &[(Reg::RA, Role::Use)];

const fn explicit(shape: &'static [OperandShape]) -> Form {
    Form {
        shape,
        implicit: &[],
    }
}

/// `jal rd, target` links through `rd` instead of `ra`.
const JAL_ALT: &[Form] = &[explicit(RL)];
/// `jalr rd, offset(rs)` and `jalr rd, rs, offset`.
const JALR_ALT: &[Form] = &[explicit(LOAD), explicit(RRI)];
/// `jr offset(rs)`.
const JR_ALT: &[Form] = &[explicit(&[Mem])];

const fn info(
    kind: InstrKind,
    shape: &'static [OperandShape],
    implicit: &'static [(Reg, Role)],
) -> OpcodeInfo {
    OpcodeInfo {
        kind,
        form: Form { shape, implicit },
        alt: &[],
        variadic: false,
    }
}

/// Look up a mnemonic. Returns `None` for mnemonics that are not in the table.
pub fn lookup(mnemonic: &str) -> Option<OpcodeInfo> {
    use InstrKind::*;

    // Acquire/release orderings do not change the operands of atomics.
    let base = [".aqrl", ".aq", ".rl"]
        .iter()
        .find_map(|suffix| mnemonic.strip_suffix(suffix))
        .unwrap_or(mnemonic);

    let found = match base {
        "add" | "sub" | "sll" | "slt" | "sltu" | "xor" | "srl" | "sra" | "or" | "and" | "mul"
        | "mulh" | "mulhu" | "mulhsu" | "div" | "divu" | "rem" | "remu" | "addw" | "subw"
        | "sllw" | "srlw" | "sraw" | "mulw" | "divw" | "divuw" | "remw" | "remuw" | "sgt"
        | "sgtu" => info(Alu, RRR, &[]),
        "addi" | "slti" | "sltiu" | "xori" | "ori" | "andi" | "slli" | "srli" | "srai"
        | "addiw" | "slliw" | "srliw" | "sraiw" => info(Alu, RRI, &[]),
        "lui" | "auipc" | "li" => info(Alu, RI, &[]),
        "la" | "lla" => info(Alu, RL, &[]),
        "mv" | "not" | "neg" | "negw" | "sext.w" | "seqz" | "snez" | "sltz" | "sgtz" => {
            info(Alu, RR, &[])
        }
        "nop" => info(Alu, NONE, &[]),
        "lb" | "lh" | "lw" | "ld" | "lbu" | "lhu" | "lwu" => info(Load, LOAD, &[]),
        "sb" | "sh" | "sw" | "sd" => info(Store, STORE, &[]),
        "lr.w" | "lr.d" => info(Atomic, LOAD, &[]),
        "sc.w" | "sc.d" | "amoswap.w" | "amoswap.d" | "amoadd.w" | "amoadd.d" | "amoand.w"
        | "amoand.d" | "amoor.w" | "amoor.d" | "amoxor.w" | "amoxor.d" | "amomax.w"
        | "amomax.d" | "amomaxu.w" | "amomaxu.d" | "amomin.w" | "amomin.d" | "amominu.w"
        | "amominu.d" => info(Atomic, AMO, &[]),
        "beq" | "bne" | "blt" | "bge" | "bltu" | "bgeu" | "bgt" | "ble" | "bgtu" | "bleu" => {
            info(Branch, BR2, &[])
        }
        "beqz" | "bnez" | "blez" | "bgez" | "bltz" | "bgtz" => info(Branch, BR1, &[]),
        "j" | "tail" => info(Jump, L, &[]),
        "jr" => OpcodeInfo {
            alt: JR_ALT,
            ..info(Jump, R, &[])
        },
        "ret" => info(Jump, NONE, USE_RA),
        "call" => info(Call, L, DEF_RA),
        "jal" => OpcodeInfo {
            alt: JAL_ALT,
            ..info(Call, L, DEF_RA)
        },
        "jalr" => OpcodeInfo {
            alt: JALR_ALT,
            ..info(Call, R, DEF_RA)
        },
        "fence" => OpcodeInfo {
            variadic: true,
            ..info(Fence, NONE, &[])
        },
        "fence.i" | "ecall" | "ebreak" => info(Fence, NONE, &[]),
        MARKER_MNEMONIC => info(Marker, MARKER, &[]),
        _ => return None,
    };
    Some(found)
}
