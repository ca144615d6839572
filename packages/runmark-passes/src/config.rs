//! Pass configuration.

use runmark_ir::reg::Reg;

/// How barriers, branches and inline assembly are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminatorPolicy {
    /// Always close the open run and skip the instruction: it never joins a run and is never
    /// scanned for hazards.
    #[default]
    FlushAndSkip,
    /// Classify them like any other instruction, through their register and memory operands.
    Ordinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassConfig {
    /// Placeholder register carried by every marker.
    pub carrier: Reg,
    pub policy: TerminatorPolicy,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            carrier: Reg::T3,
            policy: TerminatorPolicy::default(),
        }
    }
}
