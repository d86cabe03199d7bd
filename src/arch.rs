use crate::error::Error;
use std::fmt;
use strum_macros::Display;

/// Instruction set family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum IsaKind {
    #[strum(serialize = "x86-64")]
    X86_64,
    #[strum(serialize = "x86")]
    X86,
    #[strum(serialize = "aarch64")]
    Aarch64,
    #[strum(serialize = "rv32")]
    Riscv32,
    #[strum(serialize = "rv64")]
    Riscv64,
}

/// Target instruction set description.
///
/// An architecture is identified by its name (e.g. `i386:x86-64`, `riscv:rv64`),
/// extension disassemblers are registered against these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Architecture {
    name: &'static str,
    kind: IsaKind,
}

const KNOWN: [Architecture; 5] = [
    Architecture::new("i386:x86-64", IsaKind::X86_64),
    Architecture::new("i386", IsaKind::X86),
    Architecture::new("aarch64", IsaKind::Aarch64),
    Architecture::new("riscv:rv32", IsaKind::Riscv32),
    Architecture::new("riscv:rv64", IsaKind::Riscv64),
];

impl Architecture {
    const fn new(name: &'static str, kind: IsaKind) -> Self {
        Self { name, kind }
    }

    pub const X86_64: Architecture = KNOWN[0];
    pub const X86: Architecture = KNOWN[1];
    pub const AARCH64: Architecture = KNOWN[2];
    pub const RISCV32: Architecture = KNOWN[3];
    pub const RISCV64: Architecture = KNOWN[4];

    /// Find architecture by its name.
    pub fn by_name(name: &str) -> Result<Self, Error> {
        KNOWN
            .iter()
            .find(|arch| arch.name == name)
            .copied()
            .ok_or_else(|| Error::UnsupportedArchitecture(name.to_string()))
    }

    /// All architectures known to the builtin disassembler.
    pub fn all() -> &'static [Architecture] {
        &KNOWN
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> IsaKind {
        self.kind
    }

    /// Width of an address in bits.
    pub fn address_bits(&self) -> u32 {
        match self.kind {
            IsaKind::X86_64 | IsaKind::Aarch64 | IsaKind::Riscv64 => 64,
            IsaKind::X86 | IsaKind::Riscv32 => 32,
        }
    }

    /// Mask an address (or a wrapped negative value) into the address space.
    pub fn wrap_address(&self, value: i128) -> u64 {
        let mask: u128 = (1u128 << self.address_bits()) - 1;
        (value as u128 & mask) as u64
    }

    /// Smallest unit the instruction stream is fetched in.
    pub fn min_insn_unit(&self) -> usize {
        match self.kind {
            IsaKind::X86_64 | IsaKind::X86 => 1,
            IsaKind::Aarch64 => 4,
            IsaKind::Riscv32 | IsaKind::Riscv64 => 2,
        }
    }

    /// Longest possible instruction.
    pub fn max_insn_len(&self) -> usize {
        match self.kind {
            IsaKind::X86_64 | IsaKind::X86 => 15,
            IsaKind::Aarch64 | IsaKind::Riscv32 | IsaKind::Riscv64 => 4,
        }
    }

    pub fn is_riscv(&self) -> bool {
        matches!(self.kind, IsaKind::Riscv32 | IsaKind::Riscv64)
    }

    /// Architecture of an object file.
    pub fn from_object(arch: object::Architecture) -> Result<Self, Error> {
        match arch {
            object::Architecture::X86_64 => Ok(Self::X86_64),
            object::Architecture::I386 => Ok(Self::X86),
            object::Architecture::Aarch64 => Ok(Self::AARCH64),
            object::Architecture::Riscv32 => Ok(Self::RISCV32),
            object::Architecture::Riscv64 => Ok(Self::RISCV64),
            other => Err(Error::UnsupportedArchitecture(format!("{other:?}"))),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
