use crate::config;
use crate::config::Theme;
use crate::disasm::builtin::builtin_disassemble;
use crate::disasm::registry::Disassembler;
use crate::disasm::request::DisassembleInfo;
use crate::error::Error;
use crate::weak_error;
use anyhow::anyhow;
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, ThemeSet};
use syntect::parsing::{SyntaxDefinition, SyntaxSet, SyntaxSetBuilder};
use syntect::util::as_24_bit_terminal_escaped;

const ASM_SYNTAX_NAME: &str = "Disassembly";

const ASM_SYNTAX: &str = r#"%YAML 1.2
---
name: Disassembly
scope: source.disasm
contexts:
  main:
    - match: ';.*$'
      scope: comment.line.disasm
    - match: '<[^>]*>'
      scope: entity.name.function.disasm
    - match: '^\s*[A-Za-z_][\w.]*'
      scope: keyword.other.mnemonic.disasm
    - match: '[$#]?-?\b(0x[0-9a-fA-F]+|[0-9]+)\b'
      scope: constant.numeric.disasm
    - match: '%?\b[A-Za-z][A-Za-z0-9]*\b'
      scope: variable.other.register.disasm
"#;

/// Reset all terminal attributes.
const RESET: &str = "\x1b[0m";

struct AsmHighlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl AsmHighlighter {
    fn new() -> anyhow::Result<Self> {
        let definition = SyntaxDefinition::load_from_str(ASM_SYNTAX, false, None)?;
        let mut builder = SyntaxSetBuilder::new();
        builder.add(definition);
        Ok(Self {
            syntax_set: builder.build(),
            theme_set: ThemeSet::load_defaults(),
        })
    }

    fn highlight(&self, text: &str, theme: Theme) -> anyhow::Result<String> {
        let syntax = self
            .syntax_set
            .find_syntax_by_name(ASM_SYNTAX_NAME)
            .ok_or_else(|| anyhow!("disassembly syntax not found"))?;
        let theme = self
            .theme_set
            .themes
            .get(theme.to_syntect_name())
            .ok_or_else(|| anyhow!("unknown theme `{theme}`"))?;

        let mut h = HighlightLines::new(syntax, theme);
        let ranges: Vec<(Style, &str)> = h.highlight_line(text, &self.syntax_set)?;
        Ok(format!("{}{RESET}", as_24_bit_terminal_escaped(&ranges[..], false)))
    }
}

static HIGHLIGHTER: OnceLock<Option<AsmHighlighter>> = OnceLock::new();

fn highlighter() -> Option<&'static AsmHighlighter> {
    HIGHLIGHTER
        .get_or_init(|| weak_error!(AsmHighlighter::new(), "disassembly styling unavailable:"))
        .as_ref()
}

/// Colorize the current result of `info` with terminal escape sequences.
///
/// Result length stays the same. Does nothing if `info` has no result or if styling
/// is unavailable.
pub fn syntax_highlight(info: &DisassembleInfo, theme: Theme) -> Result<(), Error> {
    let Some(result) = info.result()? else {
        return Ok(());
    };
    let Some(highlighter) = highlighter() else {
        return Ok(());
    };

    if let Some(styled) = weak_error!(
        highlighter.highlight(result.text(), theme),
        "style disassembly:"
    ) {
        info.set_result(result.length().get(), &styled)?;
    }
    Ok(())
}

/// Remove terminal escape sequences from a styled text.
pub fn strip_styles(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            chars.by_ref().find(|&c| c == 'm');
        } else {
            out.push(c);
        }
    }
    out
}

/// Builtin disassembler with colorized output.
pub struct HighlightingDisassembler {
    theme: Theme,
}

impl Default for HighlightingDisassembler {
    fn default() -> Self {
        Self::new(config::current().theme)
    }
}

impl HighlightingDisassembler {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }
}

impl Disassembler for HighlightingDisassembler {
    fn name(&self) -> &str {
        "syntax-highlighting"
    }

    fn disassemble(&self, info: &DisassembleInfo) -> Result<(), Error> {
        builtin_disassemble(info, None)?;
        syntax_highlight(info, self.theme)
    }
}
