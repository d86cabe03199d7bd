//! Disassembly bridge between the host engine and extension disassemblers.

mod bridge;
mod builtin;
mod registry;
mod request;
mod source;
mod style;

pub use bridge::{Bridge, DecodeOutcome, Line};
pub use builtin::builtin_disassemble;
pub use registry::{from_fn, Disassembler, HookRegistry};
pub use request::{DecodeResult, DisassembleInfo};
pub use source::MemorySource;
pub use style::{strip_styles, syntax_highlight, HighlightingDisassembler};

use crate::arch::Architecture;
use crate::host::Host;

/// Format an address in the style of disassembler output, e.g. `0x1004 <main+4>`.
pub fn format_address(host: &Host, arch: &Architecture, address: u64) -> String {
    host.format_address(arch, address)
}
