//! Registers.

use std::fmt;

/// ABI names of the RISC-V integer registers, indexed by register number.
const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// A machine register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    /// Integer register `x0..=x31`.
    X(u8),
    /// A virtual register that has not been allocated yet, written `%N`.
    Virt(u32),
}

impl Reg {
    pub const RA: Reg = Reg::X(1);
    /// `t3`, the carrier register of the markers emitted by default.
    pub const T3: Reg = Reg::X(28);

    /// Look up a register by its ABI name (`a0`), its architectural name (`x10`), or the `fp`
    /// alias of `s0`.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "fp" {
            return Some(Reg::X(8));
        }
        if let Some(idx) = ABI_NAMES.iter().position(|abi| *abi == name) {
            return Some(Reg::X(idx as u8));
        }
        let num = name.strip_prefix('x')?;
        // Reject `x01` and friends so every register has a single spelling.
        if num.len() > 1 && num.starts_with('0') {
            return None;
        }
        match num.parse::<u8>() {
            Ok(idx) if idx < 32 => Some(Reg::X(idx)),
            _ => None,
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::X(idx) => match ABI_NAMES.get(*idx as usize) {
                Some(name) => f.write_str(name),
                None => write!(f, "x{idx}"),
            },
            Reg::Virt(idx) => write!(f, "%{idx}"),
        }
    }
}
