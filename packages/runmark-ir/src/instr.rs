//! Machine instructions.

use smol_str::SmolStr;

use crate::reg::Reg;

/// How an instruction accesses a register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The register is read.
    Use,
    /// The register is written.
    Def,
    /// The register is read and written by the same operand (a tied operand).
    UseDef,
}

impl Role {
    pub fn is_use(self) -> bool {
        matches!(self, Role::Use | Role::UseDef)
    }

    pub fn is_def(self) -> bool {
        matches!(self, Role::Def | Role::UseDef)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegOperand {
    /// `None` is the "no register" placeholder. It never takes part in any dependency.
    pub reg: Option<Reg>,
    pub role: Role,
    /// Implied by the mnemonic and not written in the assembly text, e.g. `ra` for `call`.
    pub implicit: bool,
}

impl RegOperand {
    pub fn new(reg: Option<Reg>, role: Role) -> Self {
        Self {
            reg,
            role,
            implicit: false,
        }
    }

    pub fn use_(reg: Reg) -> Self {
        Self::new(Some(reg), Role::Use)
    }

    pub fn def(reg: Reg) -> Self {
        Self::new(Some(reg), Role::Def)
    }

    pub fn into_implicit(self) -> Self {
        Self {
            implicit: true,
            ..self
        }
    }
}

/// A relocation operator applied to a symbol, e.g. `%hi(msg)` or `%pcrel_lo(.Lpcrel_hi0)`.
///
/// The linker resolves it to a constant, so it reads no register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reloc {
    /// The operator without the `%`.
    pub op: SmolStr,
    pub symbol: SmolStr,
}

/// The offset of a memory reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offset {
    Imm(i64),
    Reloc(Reloc),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(RegOperand),
    Imm(i64),
    /// An immediate computed by the linker.
    Reloc(Reloc),
    /// A memory reference `offset(base)`.
    Mem { offset: Offset, base: RegOperand },
    /// A branch target or symbol.
    Label(SmolStr),
    /// Verbatim text, e.g. the arguments of a directive or the body of inline assembly.
    Text(SmolStr),
}

impl Operand {
    /// The register read or written by this operand, if any.
    pub fn reg_operand(&self) -> Option<&RegOperand> {
        match self {
            Operand::Reg(reg) => Some(reg),
            Operand::Mem { base, .. } => Some(base),
            Operand::Imm(_) | Operand::Reloc(_) | Operand::Label(_) | Operand::Text(_) => None,
        }
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, Operand::Reg(reg) if reg.implicit)
    }
}

/// The closed set of instruction categories. Every behavioral predicate of an instruction is
/// derived from its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrKind {
    /// Register-to-register computation.
    Alu,
    Load,
    Store,
    /// Atomic memory operation: reads and writes memory.
    Atomic,
    /// Conditional branch.
    Branch,
    /// Unconditional control transfer, including returns and indirect jumps.
    Jump,
    Call,
    /// Memory fences and environment calls.
    Fence,
    /// Inline assembly. Its effects are opaque.
    InlineAsm,
    /// Directives with no runtime effect, such as `.loc` and `.cfi_*`.
    Meta,
    /// An independent-run marker.
    Marker,
    /// A mnemonic that is not in the opcode table. Treated as a barrier because its side effects
    /// are not known.
    Unknown,
}

impl InstrKind {
    pub fn may_access_memory(self) -> bool {
        matches!(
            self,
            InstrKind::Load
                | InstrKind::Store
                | InstrKind::Atomic
                | InstrKind::Call
                | InstrKind::Fence
                | InstrKind::InlineAsm
                | InstrKind::Unknown
        )
    }

    pub fn may_store(self) -> bool {
        matches!(
            self,
            InstrKind::Store
                | InstrKind::Atomic
                | InstrKind::Call
                | InstrKind::Fence
                | InstrKind::InlineAsm
                | InstrKind::Unknown
        )
    }

    pub fn is_barrier(self) -> bool {
        matches!(
            self,
            InstrKind::Jump | InstrKind::Call | InstrKind::Fence | InstrKind::Unknown
        )
    }

    pub fn is_branch(self) -> bool {
        matches!(self, InstrKind::Branch | InstrKind::Jump)
    }

    pub fn is_inline_escape(self) -> bool {
        self == InstrKind::InlineAsm
    }

    pub fn is_metadata_only(self) -> bool {
        self == InstrKind::Meta
    }

    pub fn is_marker(self) -> bool {
        self == InstrKind::Marker
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub opcode: SmolStr,
    pub kind: InstrKind,
    /// Operands in document order. Implicit register operands come last.
    pub operands: Vec<Operand>,
}

impl Instr {
    pub fn new(opcode: impl Into<SmolStr>, kind: InstrKind, operands: Vec<Operand>) -> Self {
        Self {
            opcode: opcode.into(),
            kind,
            operands,
        }
    }

    /// All register operands, including memory bases, in document order.
    pub fn reg_operands(&self) -> impl Iterator<Item = &RegOperand> + '_ {
        self.operands.iter().filter_map(Operand::reg_operand)
    }

    /// Registers read by this instruction. "No register" operands are skipped.
    pub fn uses(&self) -> impl Iterator<Item = Reg> + '_ {
        self.reg_operands()
            .filter(|op| op.role.is_use())
            .filter_map(|op| op.reg)
    }

    /// Registers written by this instruction. "No register" operands are skipped.
    pub fn defs(&self) -> impl Iterator<Item = Reg> + '_ {
        self.reg_operands()
            .filter(|op| op.role.is_def())
            .filter_map(|op| op.reg)
    }

    pub fn may_access_memory(&self) -> bool {
        self.kind.may_access_memory()
    }

    pub fn may_store(&self) -> bool {
        self.kind.may_store()
    }

    pub fn is_barrier(&self) -> bool {
        self.kind.is_barrier()
    }

    pub fn is_branch(&self) -> bool {
        self.kind.is_branch()
    }

    pub fn is_inline_escape(&self) -> bool {
        self.kind.is_inline_escape()
    }

    pub fn is_metadata_only(&self) -> bool {
        self.kind.is_metadata_only()
    }

    pub fn is_marker(&self) -> bool {
        self.kind.is_marker()
    }

    /// Whether this instruction ends an independent run unconditionally when terminators are
    /// not treated as ordinary instructions.
    pub fn is_run_terminator(&self) -> bool {
        self.is_barrier() || self.is_branch() || self.is_inline_escape()
    }

    /// The run length announced by a marker.
    pub fn marker_count(&self) -> Option<u32> {
        if !self.is_marker() {
            return None;
        }
        self.operands.iter().find_map(|op| match op {
            Operand::Imm(count) => u32::try_from(*count).ok(),
            _ => None,
        })
    }
}
