//! Disassembler for custom (vendor specific) RISC-V instructions.
//!
//! Instructions are described in a TOML file, each one by its format, fixed encoding bits
//! and a text template:
//!
//! ```toml
//! [[instruction]]
//! type = "R"
//! opcode = "0x63"
//! funct3 = "0x2"
//! funct7 = "0x5"
//! str = "add_x $rd, $rs1, $rs2"
//! ```
//!
//! Template placeholders are `$rd`, `$rs1`, `$rs2`, `$imm` (sign extended immediate),
//! `$uimm` (raw immediate) and `$dest` (formatted branch target or immediate address).
//! Instructions that match nothing in the description go to the builtin disassembler.
//! With `style_disassembly` on, the output is colorized either way.

mod format;
mod ser;

pub use format::{Fields, Functs, InsnFormat};

use crate::arch::Architecture;
use crate::config;
use crate::config::Theme;
use crate::disasm::{
    builtin_disassemble, syntax_highlight, Bridge, Disassembler, DisassembleInfo,
};
use crate::error::Error;
use crate::{br_info, weak_error};
use ser::{Description, RawInsn, RawNumber};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

/// A single described instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomInsn {
    format: InsnFormat,
    template: String,
    match_bits: u32,
    mask: u32,
}

impl CustomInsn {
    pub fn new(format: InsnFormat, functs: Functs, template: impl Into<String>) -> Self {
        let (match_bits, mask) = format.match_mask(&functs);
        Self {
            format,
            template: template.into(),
            match_bits,
            mask,
        }
    }

    fn from_raw(raw: &RawInsn) -> Result<Self, Error> {
        let format = InsnFormat::from_str(&raw.ty)
            .map_err(|_| Error::CustomInsn(format!("unknown instruction type `{}`", raw.ty)))?;

        let number = |n: &RawNumber| n.value().map_err(|e| Error::CustomInsn(e.to_string()));
        let optional = |n: &Option<RawNumber>| n.as_ref().map(number).transpose();
        let functs = Functs {
            opcode: number(&raw.opcode)?,
            funct3: optional(&raw.funct3)?,
            funct4: optional(&raw.funct4)?,
            funct7: optional(&raw.funct7)?,
        };

        for &required in format.required_functs() {
            let present = match required {
                "funct3" => functs.funct3.is_some(),
                "funct4" => functs.funct4.is_some(),
                _ => functs.funct7.is_some(),
            };
            if !present {
                return Err(Error::CustomInsn(format!(
                    "{format}-type instruction `{}` requires {required}",
                    raw.template
                )));
            }
        }

        Ok(Self::new(format, functs, raw.template.clone()))
    }

    pub fn format(&self) -> InsnFormat {
        self.format
    }

    /// Instruction length in bytes.
    pub fn length(&self) -> usize {
        self.format.length()
    }

    /// True if `word` of `length` bytes is an instance of this instruction.
    pub fn matches(&self, word: u32, length: usize) -> bool {
        length == self.length() && word & self.mask == self.match_bits
    }

    /// Render instruction text for `word` decoded at request address.
    pub fn render(&self, word: u32, info: &DisassembleInfo) -> Result<String, Error> {
        let arch = info.architecture()?;
        let address = info.address()?;
        let fields = self.format.fields(word);

        let dest = match fields.imm {
            Some(imm) => {
                let target = if self.format.is_pc_relative() {
                    arch.wrap_address(address as i128 + imm as i128)
                } else {
                    arch.wrap_address(imm as i128)
                };
                Some(info.format_address(target)?)
            }
            None => None,
        };

        Ok(format::expand(&self.template, |name| match name {
            "rd" => fields.rd.map(ToString::to_string),
            "rs1" => fields.rs1.map(ToString::to_string),
            "rs2" => fields.rs2.map(ToString::to_string),
            "imm" => fields.imm.map(|v| v.to_string()),
            "uimm" => fields.uimm.map(|v| v.to_string()),
            "dest" => dest.clone(),
            _ => None,
        }))
    }
}

/// Set of described custom instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomInsnTable {
    insns: Vec<CustomInsn>,
}

impl CustomInsnTable {
    pub fn new(insns: Vec<CustomInsn>) -> Self {
        Self { insns }
    }

    /// Parse a description. Malformed entries (unknown type, bad numbers, missing
    /// function codes) are skipped with a warning.
    pub fn parse(data: &str) -> Result<Self, Error> {
        let description: Description = toml::de::from_str(data)?;
        let insns = description
            .instruction
            .iter()
            .filter_map(|raw| weak_error!(CustomInsn::from_raw(raw), "skip instruction:"))
            .collect();
        Ok(Self { insns })
    }

    /// Load a description file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// Find first instruction matching `word` of `length` bytes.
    pub fn find(&self, word: u32, length: usize) -> Option<&CustomInsn> {
        self.insns.iter().find(|insn| insn.matches(word, length))
    }
}

/// Extension disassembler that renders custom instructions and leaves everything else
/// to the builtin disassembler. Output is colorized if a style theme is set.
pub struct CustomInsnDisassembler {
    display: Cell<bool>,
    style: Cell<Option<Theme>>,
    path: RefCell<Option<PathBuf>>,
    table: RefCell<Option<Rc<CustomInsnTable>>>,
}

impl Default for CustomInsnDisassembler {
    fn default() -> Self {
        let config = config::current();
        Self {
            display: Cell::new(config.custom_insn_display),
            style: Cell::new(config.style_disassembly.then_some(config.theme)),
            path: RefCell::new(config.custom_insn_file.clone()),
            table: RefCell::default(),
        }
    }
}

impl CustomInsnDisassembler {
    /// Create disassembler configured by the current [`config::BridgeConfig`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create disassembler that reads instructions from description file at `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            display: Cell::new(true),
            style: Cell::default(),
            path: RefCell::new(Some(path.into())),
            table: RefCell::default(),
        }
    }

    /// Create disassembler over an already loaded table.
    pub fn with_table(table: CustomInsnTable) -> Self {
        Self {
            display: Cell::new(true),
            style: Cell::default(),
            path: RefCell::default(),
            table: RefCell::new(Some(Rc::new(table))),
        }
    }

    pub fn display(&self) -> bool {
        self.display.get()
    }

    /// Enable or disable custom instruction display, when disabled every instruction
    /// goes to the builtin disassembler.
    pub fn set_display(&self, display: bool) {
        self.display.set(display);
    }

    pub fn style(&self) -> Option<Theme> {
        self.style.get()
    }

    /// Set output color theme, `None` disables styling.
    pub fn set_style(&self, theme: Option<Theme>) {
        self.style.set(theme);
    }

    /// Change description file, the loaded one is discarded.
    pub fn set_path(&self, path: Option<PathBuf>) {
        *self.path.borrow_mut() = path;
        self.discard_cache();
    }

    /// Forget loaded description, it will be loaded again on next use.
    pub fn discard_cache(&self) {
        self.table.borrow_mut().take();
    }

    fn table(&self) -> Rc<CustomInsnTable> {
        if let Some(table) = self.table.borrow().as_ref() {
            return table.clone();
        }

        let table = match self.path.borrow().as_deref() {
            Some(path) => {
                let table = weak_error!(
                    CustomInsnTable::load(path),
                    "load custom instruction description:"
                )
                .unwrap_or_default();
                br_info!(
                    "{} custom instructions loaded from {}",
                    table.len(),
                    path.display()
                );
                table
            }
            None => CustomInsnTable::default(),
        };

        let table = Rc::new(table);
        *self.table.borrow_mut() = Some(table.clone());
        table
    }

    fn decode(&self, info: &DisassembleInfo) -> Result<(), Error> {
        if !self.display() {
            return builtin_disassemble(info, None);
        }

        let table = self.table();

        // low two bits 0b11 mean a 32-bit instruction, compressed otherwise
        let first = info.read_memory(1, 0)?[0];
        let length = if first & 0b11 == 0b11 { 4 } else { 2 };
        let bytes = info.read_memory(length, 0)?;
        let word = bytes
            .iter()
            .rev()
            .fold(0u32, |word, &b| word << 8 | b as u32);

        match table.find(word, length) {
            Some(insn) => info.set_result(length, &insn.render(word, info)?),
            None => builtin_disassemble(info, None),
        }
    }
}

impl Disassembler for CustomInsnDisassembler {
    fn name(&self) -> &str {
        "custom-insn"
    }

    fn disassemble(&self, info: &DisassembleInfo) -> Result<(), Error> {
        self.decode(info)?;
        match self.style() {
            Some(theme) => syntax_highlight(info, theme),
            None => Ok(()),
        }
    }
}

/// Register `disassembler` for every RISC-V architecture.
pub fn register_for_riscv(bridge: &Bridge, disassembler: Rc<CustomInsnDisassembler>) {
    Architecture::all()
        .iter()
        .filter(|arch| arch.is_riscv())
        .for_each(|arch| {
            let hook: Rc<dyn Disassembler> = disassembler.clone();
            bridge.register_disassembler(Some(hook), Some(arch.name()));
        });
}
