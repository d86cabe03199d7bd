//! Extension disassemblers shipped with the bridge.

pub mod custom_insn;
