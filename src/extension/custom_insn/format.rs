use strum_macros::{Display, EnumString};

const X_REGS: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "fp", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// Registers addressable by 3-bit fields of compressed instructions (x8-x15).
const C_REGS: [&str; 8] = ["fp", "s1", "a0", "a1", "a2", "a3", "a4", "a5"];

/// RISC-V instruction format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum InsnFormat {
    R,
    I,
    S,
    #[strum(serialize = "B", serialize = "SB")]
    B,
    U,
    #[strum(serialize = "J", serialize = "UJ")]
    J,
    CR,
    CI,
    CSS,
    CIW,
    CL,
    CS,
    CB,
    CJ,
}

/// Fixed part of an instruction encoding: opcode and function codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Functs {
    pub opcode: u32,
    pub funct3: Option<u32>,
    pub funct4: Option<u32>,
    pub funct7: Option<u32>,
}

/// Operands decoded from an instruction word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    pub rd: Option<&'static str>,
    pub rs1: Option<&'static str>,
    pub rs2: Option<&'static str>,
    /// Raw immediate, as encoded (scaled where the format scales it).
    pub uimm: Option<u64>,
    /// Sign extended immediate.
    pub imm: Option<i64>,
}

#[inline(always)]
fn bits(word: u32, hi: u32, lo: u32) -> u32 {
    (word >> lo) & ((1 << (hi - lo + 1)) - 1)
}

#[inline(always)]
fn sign_extend(value: u32, width: u32) -> i64 {
    let shift = 64 - width;
    ((value as i64) << shift) >> shift
}

fn x_reg(word: u32, hi: u32, lo: u32) -> Option<&'static str> {
    Some(X_REGS[bits(word, hi, lo) as usize])
}

fn c_reg(word: u32, hi: u32, lo: u32) -> Option<&'static str> {
    Some(C_REGS[bits(word, hi, lo) as usize])
}

impl InsnFormat {
    /// Instruction length in bytes.
    pub fn length(self) -> usize {
        if self.is_compressed() {
            2
        } else {
            4
        }
    }

    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            InsnFormat::CR
                | InsnFormat::CI
                | InsnFormat::CSS
                | InsnFormat::CIW
                | InsnFormat::CL
                | InsnFormat::CS
                | InsnFormat::CB
                | InsnFormat::CJ
        )
    }

    /// True if immediate is an offset from the instruction address.
    pub fn is_pc_relative(self) -> bool {
        matches!(
            self,
            InsnFormat::B | InsnFormat::J | InsnFormat::CB | InsnFormat::CJ
        )
    }

    /// Function codes this format requires, in `funct*` attribute names.
    pub fn required_functs(self) -> &'static [&'static str] {
        match self {
            InsnFormat::R => &["funct3", "funct7"],
            InsnFormat::U | InsnFormat::J => &[],
            InsnFormat::CR => &["funct4"],
            _ => &["funct3"],
        }
    }

    /// Return `(match, mask)` pair: a word is an instance of the instruction
    /// if `word & mask == match`.
    pub fn match_mask(self, functs: &Functs) -> (u32, u32) {
        let funct3 = functs.funct3.unwrap_or_default();
        match self {
            InsnFormat::R => (
                functs.opcode | funct3 << 12 | functs.funct7.unwrap_or_default() << 25,
                0x7f | 0x7 << 12 | 0x7f << 25,
            ),
            InsnFormat::I | InsnFormat::S | InsnFormat::B => {
                (functs.opcode | funct3 << 12, 0x7f | 0x7 << 12)
            }
            InsnFormat::U | InsnFormat::J => (functs.opcode, 0x7f),
            InsnFormat::CR => (
                functs.opcode | functs.funct4.unwrap_or_default() << 12,
                0x3 | 0xf << 12,
            ),
            _ => (functs.opcode | funct3 << 13, 0x3 | 0x7 << 13),
        }
    }

    /// Decode instruction operands.
    pub fn fields(self, word: u32) -> Fields {
        let (rd, rs1, rs2, uimm, width) = match self {
            InsnFormat::R => (
                x_reg(word, 11, 7),
                x_reg(word, 19, 15),
                x_reg(word, 24, 20),
                None,
                0,
            ),
            InsnFormat::I => (
                x_reg(word, 11, 7),
                x_reg(word, 19, 15),
                None,
                Some(bits(word, 31, 20)),
                12,
            ),
            InsnFormat::S => (
                None,
                x_reg(word, 19, 15),
                x_reg(word, 24, 20),
                Some(bits(word, 11, 7) | bits(word, 31, 25) << 5),
                12,
            ),
            InsnFormat::B => (
                None,
                x_reg(word, 19, 15),
                x_reg(word, 24, 20),
                Some(
                    bits(word, 11, 8) << 1
                        | bits(word, 30, 25) << 5
                        | bits(word, 7, 7) << 11
                        | bits(word, 31, 31) << 12,
                ),
                13,
            ),
            InsnFormat::U => (x_reg(word, 11, 7), None, None, Some(bits(word, 31, 12)), 0),
            InsnFormat::J => (
                x_reg(word, 11, 7),
                None,
                None,
                Some(
                    bits(word, 30, 21) << 1
                        | bits(word, 20, 20) << 11
                        | bits(word, 19, 12) << 12
                        | bits(word, 31, 31) << 20,
                ),
                21,
            ),
            InsnFormat::CR => (
                x_reg(word, 11, 7),
                x_reg(word, 11, 7),
                x_reg(word, 6, 2),
                None,
                0,
            ),
            InsnFormat::CI => (
                x_reg(word, 11, 7),
                x_reg(word, 11, 7),
                None,
                Some(bits(word, 6, 2) | bits(word, 12, 12) << 5),
                6,
            ),
            InsnFormat::CSS => (
                None,
                None,
                x_reg(word, 6, 2),
                Some(bits(word, 12, 9) << 2 | bits(word, 8, 7) << 6),
                8,
            ),
            InsnFormat::CIW => (
                c_reg(word, 4, 2),
                None,
                None,
                Some(
                    bits(word, 5, 5) << 3
                        | bits(word, 6, 6) << 2
                        | bits(word, 12, 11) << 4
                        | bits(word, 10, 7) << 6,
                ),
                10,
            ),
            InsnFormat::CL => (
                c_reg(word, 4, 2),
                c_reg(word, 9, 7),
                None,
                Some(bits(word, 5, 5) << 6 | bits(word, 6, 6) << 2 | bits(word, 12, 10) << 3),
                7,
            ),
            InsnFormat::CS => (
                None,
                c_reg(word, 9, 7),
                c_reg(word, 4, 2),
                Some(bits(word, 6, 5) | bits(word, 12, 10) << 2),
                5,
            ),
            InsnFormat::CB => (
                None,
                c_reg(word, 9, 7),
                None,
                Some(
                    bits(word, 4, 3) << 1
                        | bits(word, 2, 2) << 5
                        | bits(word, 11, 10) << 3
                        | bits(word, 6, 5) << 6
                        | bits(word, 12, 12) << 8,
                ),
                9,
            ),
            InsnFormat::CJ => (
                None,
                None,
                None,
                Some(
                    bits(word, 5, 3) << 1
                        | bits(word, 11, 11) << 4
                        | bits(word, 2, 2) << 5
                        | bits(word, 7, 7) << 6
                        | bits(word, 6, 6) << 7
                        | bits(word, 10, 9) << 8
                        | bits(word, 8, 8) << 10
                        | bits(word, 12, 12) << 11,
                ),
                12,
            ),
        };

        let imm = uimm.map(|raw| match width {
            // U-type immediates are never signed
            0 => raw as i64,
            width => sign_extend(raw, width),
        });

        Fields {
            rd,
            rs1,
            rs2,
            uimm: uimm.map(u64::from),
            imm,
        }
    }
}

/// Substitute `$name` placeholders in `template`, unknown placeholders are kept as is.
pub fn expand(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        let name = &after[..name_len];

        match lookup(name) {
            Some(value) if !name.is_empty() => out.push_str(&value),
            _ => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[name_len..];
    }
    out.push_str(rest);
    out
}
