//! Host engine collaborators.
//!
//! The bridge never decodes instructions or touches target memory itself, it consumes
//! a native decoder, a default memory reader, a diagnostic sink and (optionally) a symbol
//! resolver through the narrow traits of this module.

pub mod memory;
pub mod native;
pub mod symbol;

use crate::arch::Architecture;
use crate::br_warn;
use crate::error::MemoryError;
use std::num::NonZeroUsize;
use std::rc::Rc;

pub use memory::{ImageMemory, ProcessMemory};
pub use native::CapstoneDecoder;
pub use symbol::SymbolTable;

/// Contract between a native decoder and whoever drives it.
///
/// The decoder fetches instruction bytes with `read_memory`, reports a faulting address with
/// `memory_error` and emits the instruction text (possibly in pieces) with `print`.
pub trait DecodeInfo {
    /// Fill `buf` with target bytes starting at `address`.
    fn read_memory(&mut self, address: u64, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Record a memory fault at `address`. `status` is the read status, `-1` for failures.
    fn memory_error(&mut self, status: i32, address: u64);

    /// Append text to the disassembly result.
    fn print(&mut self, text: &str);
}

/// Builtin instruction decoder of the host engine.
pub trait NativeDecoder {
    /// Decode a single instruction at `address`.
    /// Return instruction length or `None` if decoding failed.
    fn print_insn(
        &self,
        arch: &Architecture,
        address: u64,
        info: &mut dyn DecodeInfo,
    ) -> Option<NonZeroUsize>;
}

/// Default target memory access.
pub trait TargetMemory {
    fn read(&self, address: u64, length: usize) -> Result<Vec<u8>, MemoryError>;
}

/// Per-call native decode context: the place where the host collects disassembly output
/// and memory faults.
pub trait NativeSink {
    /// Native error-reporting callback.
    fn memory_error(&mut self, status: i32, address: u64);

    /// Native output sink.
    fn print(&mut self, text: &str);
}

/// Diagnostic channel, receives reports about misbehaving extensions.
pub trait Diagnostics {
    fn report(&self, fault: &str);
}

/// Map addresses to symbols.
pub trait SymbolResolver {
    /// Return name of a symbol containing `address` and offset of `address` from its start.
    fn resolve(&self, address: u64) -> Option<(&str, u64)>;
}

/// Diagnostics that go into the application log.
#[derive(Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, fault: &str) {
        br_warn!("{fault}");
    }
}

/// Native sink that accumulates output in memory.
#[derive(Default, Debug)]
pub struct BufferSink {
    /// Every `print` call, in order.
    pub prints: Vec<String>,
    /// Every reported memory fault, in order.
    pub memory_errors: Vec<(i32, u64)>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text emitted so far.
    pub fn text(&self) -> String {
        self.prints.concat()
    }

    /// Drop everything collected so far.
    pub fn clear(&mut self) {
        self.prints.clear();
        self.memory_errors.clear();
    }
}

impl NativeSink for BufferSink {
    fn memory_error(&mut self, status: i32, address: u64) {
        self.memory_errors.push((status, address));
    }

    fn print(&mut self, text: &str) {
        self.prints.push(text.to_string());
    }
}

/// Services of the host engine used by the bridge.
#[derive(Clone)]
pub struct Host {
    decoder: Rc<dyn NativeDecoder>,
    memory: Rc<dyn TargetMemory>,
    diagnostics: Rc<dyn Diagnostics>,
    symbols: Option<Rc<dyn SymbolResolver>>,
}

impl Host {
    /// Create a new [`Host`], diagnostics go to the application log.
    pub fn new(decoder: Rc<dyn NativeDecoder>, memory: Rc<dyn TargetMemory>) -> Self {
        Self {
            decoder,
            memory,
            diagnostics: Rc::new(LogDiagnostics),
            symbols: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Rc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_symbols(mut self, symbols: Rc<dyn SymbolResolver>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    pub fn decoder(&self) -> &dyn NativeDecoder {
        self.decoder.as_ref()
    }

    pub fn memory(&self) -> &dyn TargetMemory {
        self.memory.as_ref()
    }

    pub fn diagnostics(&self) -> &dyn Diagnostics {
        self.diagnostics.as_ref()
    }

    /// Run the native decoder directly against the host memory, output and errors go to `sink`.
    pub fn native_decode(
        &self,
        arch: &Architecture,
        address: u64,
        sink: &mut dyn NativeSink,
    ) -> Option<NonZeroUsize> {
        let mut info = HostDecodeInfo {
            memory: self.memory.as_ref(),
            sink,
        };
        self.decoder.print_insn(arch, address, &mut info)
    }

    /// Format an address the way disassembler output does: `0x401000 <main+4>`.
    pub fn format_address(&self, arch: &Architecture, address: u64) -> String {
        let address = arch.wrap_address(address as i128);
        let symbol = self.symbols.as_ref().and_then(|s| s.resolve(address));
        match symbol {
            Some((name, 0)) => format!("{address:#x} <{name}>"),
            Some((name, offset)) => format!("{address:#x} <{name}+{offset}>"),
            None => format!("{address:#x}"),
        }
    }
}

/// Read bytes through a [`TargetMemory`] into a caller buffer.
fn read_exact(
    memory: &dyn TargetMemory,
    address: u64,
    buf: &mut [u8],
) -> Result<(), MemoryError> {
    let data = memory.read(address, buf.len())?;
    if data.len() != buf.len() {
        return Err(MemoryError::Read {
            length: buf.len(),
            address,
        });
    }
    buf.copy_from_slice(&data);
    Ok(())
}

struct HostDecodeInfo<'a> {
    memory: &'a dyn TargetMemory,
    sink: &'a mut dyn NativeSink,
}

impl DecodeInfo for HostDecodeInfo<'_> {
    fn read_memory(&mut self, address: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        read_exact(self.memory, address, buf)
    }

    fn memory_error(&mut self, status: i32, address: u64) {
        self.sink.memory_error(status, address);
    }

    fn print(&mut self, text: &str) {
        self.sink.print(text);
    }
}
