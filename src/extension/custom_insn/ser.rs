use serde::Deserialize;

/// Number in a description file: either a TOML integer or a hex string (`"0x63"` or `"63"`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub(super) enum RawNumber {
    Int(u32),
    Hex(String),
}

impl RawNumber {
    pub(super) fn value(&self) -> anyhow::Result<u32> {
        match self {
            RawNumber::Int(v) => Ok(*v),
            RawNumber::Hex(s) => {
                let digits = s
                    .trim()
                    .trim_start_matches("0x")
                    .trim_start_matches("0X");
                u32::from_str_radix(digits, 16)
                    .map_err(|e| anyhow::anyhow!("invalid number `{s}`: {e}"))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct RawInsn {
    #[serde(rename = "type")]
    pub(super) ty: String,
    pub(super) opcode: RawNumber,
    pub(super) funct3: Option<RawNumber>,
    pub(super) funct4: Option<RawNumber>,
    pub(super) funct7: Option<RawNumber>,
    #[serde(rename = "str")]
    pub(super) template: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Description {
    #[serde(default)]
    pub(super) instruction: Vec<RawInsn>,
}
