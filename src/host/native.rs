use crate::arch::{Architecture, IsaKind};
use crate::config;
use crate::config::Syntax;
use crate::error::Error;
use crate::host::{DecodeInfo, NativeDecoder};
use crate::weak_error;
use capstone::arch::BuildsCapstone;
use capstone::arch::BuildsCapstoneExtraMode;
use capstone::arch::BuildsCapstoneSyntax;
use capstone::Capstone;
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Text emitted for bytes that do not form a valid instruction.
pub const BAD_INSN: &str = "(bad)";

/// Builtin disassembler based on capstone.
///
/// Instruction bytes are fetched through [`DecodeInfo`], one minimal instruction unit
/// at a time, so the decoder works equally with the host memory and with redirected
/// memory sources.
pub struct CapstoneDecoder {
    syntax: Syntax,
    engines: RefCell<HashMap<IsaKind, Capstone>>,
}

impl Default for CapstoneDecoder {
    fn default() -> Self {
        Self::new(config::current().syntax)
    }
}

impl CapstoneDecoder {
    /// Create a new [`CapstoneDecoder`].
    ///
    /// # Arguments
    ///
    /// * `syntax`: assembler syntax for x86 family
    pub fn new(syntax: Syntax) -> Self {
        Self {
            syntax,
            engines: RefCell::new(HashMap::new()),
        }
    }

    fn build_engine(&self, kind: IsaKind) -> Result<Capstone, Error> {
        use capstone::arch;

        let x86_syntax = match self.syntax {
            Syntax::Att => arch::x86::ArchSyntax::Att,
            Syntax::Intel => arch::x86::ArchSyntax::Intel,
        };

        let cs = match kind {
            IsaKind::X86_64 => Capstone::new()
                .x86()
                .mode(arch::x86::ArchMode::Mode64)
                .syntax(x86_syntax)
                .build(),
            IsaKind::X86 => Capstone::new()
                .x86()
                .mode(arch::x86::ArchMode::Mode32)
                .syntax(x86_syntax)
                .build(),
            IsaKind::Aarch64 => Capstone::new()
                .arm64()
                .mode(arch::arm64::ArchMode::Arm)
                .build(),
            IsaKind::Riscv32 => Capstone::new()
                .riscv()
                .mode(arch::riscv::ArchMode::RiscV32)
                .extra_mode([arch::riscv::ArchExtraMode::RiscVC].into_iter())
                .build(),
            IsaKind::Riscv64 => Capstone::new()
                .riscv()
                .mode(arch::riscv::ArchMode::RiscV64)
                .extra_mode([arch::riscv::ArchExtraMode::RiscVC].into_iter())
                .build(),
        };

        cs.map_err(Error::DisAsmInit)
    }

    /// Decode first instruction of `bytes`, return its length and text.
    fn decode(&self, arch: &Architecture, bytes: &[u8], address: u64) -> Option<(usize, String)> {
        if bytes.is_empty() {
            return None;
        }

        let mut engines = self.engines.borrow_mut();
        if !engines.contains_key(&arch.kind()) {
            let engine = weak_error!(self.build_engine(arch.kind()))?;
            engines.insert(arch.kind(), engine);
        }
        let cs = engines.get(&arch.kind())?;

        let insns = cs.disasm_count(bytes, address, 1).ok()?;
        let insn = insns.iter().next()?;

        let mnemonic = insn.mnemonic().unwrap_or_default();
        let text = match insn.op_str() {
            Some(operands) if !operands.is_empty() => format!("{mnemonic} {operands}"),
            _ => mnemonic.to_string(),
        };
        Some((insn.len(), text))
    }
}

impl NativeDecoder for CapstoneDecoder {
    fn print_insn(
        &self,
        arch: &Architecture,
        address: u64,
        info: &mut dyn DecodeInfo,
    ) -> Option<NonZeroUsize> {
        let unit = arch.min_insn_unit();
        let mut bytes = Vec::with_capacity(arch.max_insn_len());

        // fetch unit by unit, stop as soon as the bytes hold a whole instruction
        let mut failed_at = None;
        while bytes.len() < arch.max_insn_len() {
            let at = address.wrapping_add(bytes.len() as u64);
            let mut chunk = vec![0; unit];
            if info.read_memory(at, &mut chunk).is_err() {
                failed_at = Some(at);
                break;
            }
            bytes.extend_from_slice(&chunk);

            if let Some((len, text)) = self.decode(arch, &bytes, address) {
                if len <= bytes.len() {
                    info.print(&text);
                    return NonZeroUsize::new(len);
                }
            }
        }

        match failed_at {
            Some(at) => {
                info.memory_error(-1, at);
                None
            }
            None => {
                info.print(BAD_INSN);
                NonZeroUsize::new(unit)
            }
        }
    }
}
