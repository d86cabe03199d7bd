use crate::error::Error;
use crate::{muted_error, weak_error};
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Assembler syntax used by the builtin disassembler for x86 targets.
#[derive(Copy, Clone, PartialEq, Debug, Default, Deserialize, EnumString, Display, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    #[default]
    #[strum(serialize = "att")]
    Att,
    #[strum(serialize = "intel")]
    Intel,
}

/// Color theme for disassembly styling.
#[derive(Copy, Clone, PartialEq, Debug, Default, Deserialize, EnumString, Display, IntoStaticStr)]
pub enum Theme {
    #[strum(serialize = "inspired_github")]
    #[serde(rename = "inspired_github")]
    InspiredGitHub,
    #[strum(serialize = "solarized_dark")]
    #[serde(rename = "solarized_dark")]
    SolarizedDark,
    #[strum(serialize = "solarized_light")]
    #[serde(rename = "solarized_light")]
    SolarizedLight,
    #[strum(serialize = "base16_eighties_dark")]
    #[serde(rename = "base16_eighties_dark")]
    Base16EightiesDark,
    #[strum(serialize = "base16_mocha_dark")]
    #[serde(rename = "base16_mocha_dark")]
    Base16MochaDark,
    #[default]
    #[strum(serialize = "base16_ocean_dark")]
    #[serde(rename = "base16_ocean_dark")]
    Base16OceanDark,
    #[strum(serialize = "base16_ocean_light")]
    #[serde(rename = "base16_ocean_light")]
    Base16OceanLight,
}

impl Theme {
    pub fn to_syntect_name(self) -> &'static str {
        match self {
            Theme::InspiredGitHub => "InspiredGitHub",
            Theme::SolarizedDark => "Solarized (dark)",
            Theme::SolarizedLight => "Solarized (light)",
            Theme::Base16EightiesDark => "base16-eighties.dark",
            Theme::Base16MochaDark => "base16-mocha.dark",
            Theme::Base16OceanDark => "base16-ocean.dark",
            Theme::Base16OceanLight => "base16-ocean.light",
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Decode custom instructions described in `custom_insn_file`.
    pub custom_insn_display: bool,
    /// Path to custom instruction description (TOML).
    pub custom_insn_file: Option<PathBuf>,
    /// Assembler syntax for x86 targets.
    pub syntax: Syntax,
    /// Colorize disassembly produced by extension disassemblers.
    pub style_disassembly: bool,
    /// Disassembly color theme.
    pub theme: Theme,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            custom_insn_display: true,
            custom_insn_file: None,
            syntax: Syntax::Att,
            style_disassembly: true,
            theme: Theme::default(),
        }
    }
}

impl BridgeConfig {
    const DEFAULT_PATH: &'static str = ".config/disb/config.toml";

    /// Parse configuration from a TOML document.
    pub fn parse(data: &str) -> Result<Self, Error> {
        Ok(toml::de::from_str(data)?)
    }

    /// Load configuration from file, if `path` is [`None`] then `~/.config/disb/config.toml`
    /// is used. Return default configuration on errors.
    pub fn load(path: Option<&Path>) -> Self {
        let data = match path {
            None => {
                let Some(home) = home::home_dir() else {
                    return Self::default();
                };
                match muted_error!(read_to_string(home.join(Self::DEFAULT_PATH))) {
                    Some(data) => data,
                    None => return Self::default(),
                }
            }
            Some(path) => match weak_error!(read_to_string(path), "load config file:") {
                Some(data) => data,
                None => return Self::default(),
            },
        };

        weak_error!(Self::parse(&data), "parse config file:").unwrap_or_default()
    }
}

/// Read-only configuration (set only once, at startup).
static CONFIG: OnceLock<BridgeConfig> = OnceLock::new();

/// Set initial configuration. Return `false` if configuration already set.
pub fn set(config: BridgeConfig) -> bool {
    CONFIG.set(config).is_ok()
}

/// Return current configuration, default one if nothing was set.
pub fn current() -> &'static BridgeConfig {
    CONFIG.get_or_init(BridgeConfig::default)
}
