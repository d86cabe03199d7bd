//! Extensible instruction disassembly bridge.
//!
//! The host engine asks the [`disasm::Bridge`] to disassemble one instruction at a time.
//! If an extension disassembler is registered for the target architecture, it receives a
//! short-lived [`disasm::DisassembleInfo`] and may produce the result itself, wrap the builtin
//! disassembler (optionally over a redirected memory source) or decline.

pub mod arch;
pub mod config;
pub mod disasm;
pub mod error;
pub mod extension;
pub mod host;
pub mod log;

pub use error::{Error, MemoryError};
