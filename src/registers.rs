//! Named register values captured at the time of the exception.

use serde::Serialize;

/// Positional register names. The first 17 are common to both layouts,
/// the fault status and VFP registers only exist in extended dumps.
pub const REGISTER_NAMES: [&str; 23] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "sp", "lr",
    "pc", "cpsr", "dfsr", "ifsr", "far", "fpexc", "fpinst", "fpinst2",
];

pub const R0: usize = 0;
pub const SP: usize = 13;
pub const LR: usize = 14;
pub const PC: usize = 15;
pub const CPSR: usize = 16;
pub const DFSR: usize = 17;
pub const IFSR: usize = 18;
pub const FAR: usize = 19;
pub const FPEXC: usize = 20;

/// Thumb state flag in the CPSR.
pub const CPSR_THUMB_BIT: u32 = 1 << 5;

/// Processor mode field in the CPSR (low nibble, M[4] is always set).
pub const CPSR_MODE_MASK: u32 = 0xF;

/// Name of the register at `index`; registers past the named set are
/// labelled by position.
pub fn register_name(index: usize) -> String {
    REGISTER_NAMES
        .get(index)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("reg{}", index))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedRegister {
    pub name: String,
    pub value: u32,
}

/// Ordered register values as stored in the dump.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterSet {
    values: Vec<u32>,
}

impl RegisterSet {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.values.get(index).copied()
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn r0(&self) -> u32 {
        self.get(R0).unwrap_or(0)
    }

    pub fn sp(&self) -> u32 {
        self.get(SP).unwrap_or(0)
    }

    pub fn pc(&self) -> u32 {
        self.get(PC).unwrap_or(0)
    }

    pub fn cpsr(&self) -> u32 {
        self.get(CPSR).unwrap_or(0)
    }

    /// FPEXC, only present in extended dumps.
    pub fn fpexc(&self) -> Option<u32> {
        self.get(FPEXC)
    }

    pub fn is_thumb(&self) -> bool {
        self.cpsr() & CPSR_THUMB_BIT != 0
    }

    /// Width of the instruction at `pc`, 2 in Thumb state and 4 in ARM state.
    pub fn instruction_width(&self) -> u32 {
        if self.is_thumb() {
            2
        } else {
            4
        }
    }

    pub fn named(&self) -> impl Iterator<Item = NamedRegister> + '_ {
        self.values.iter().enumerate().map(|(i, &value)| NamedRegister {
            name: register_name(i),
            value,
        })
    }
}
