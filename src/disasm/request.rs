use crate::arch::Architecture;
use crate::disasm::source::{self, MemorySource};
use crate::error::{Error, MemoryError};
use crate::host::Host;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::num::NonZeroUsize;
use std::rc::Rc;

/// Disassembled instruction: length in bytes and its textual representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    length: NonZeroUsize,
    text: String,
}

impl DecodeResult {
    pub fn length(&self) -> NonZeroUsize {
        self.length
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Default)]
struct RequestState {
    result: Option<DecodeResult>,
    memory_error: Option<u64>,
    memory_source: Option<Rc<dyn MemorySource>>,
}

struct Request {
    valid: Cell<bool>,
    arch: Architecture,
    address: u64,
    host: Host,
    state: RefCell<RequestState>,
}

/// A single disassembly request, passed to extension disassemblers.
///
/// This is a cheap handle, extension code may clone and keep it, but the request is only
/// usable until the bridge call that created it returns. After that every method fails
/// with [`Error::InvalidRequest`].
#[derive(Clone)]
pub struct DisassembleInfo(Rc<Request>);

impl DisassembleInfo {
    pub(super) fn new(host: Host, arch: Architecture, address: u64) -> Self {
        Self(Rc::new(Request {
            valid: Cell::new(true),
            arch,
            address,
            host,
            state: RefCell::new(RequestState::default()),
        }))
    }

    /// False if the request is no longer valid.
    pub fn is_valid(&self) -> bool {
        self.0.valid.get()
    }

    fn ensure_valid(&self) -> Result<&Request, Error> {
        if self.is_valid() {
            Ok(&self.0)
        } else {
            Err(Error::InvalidRequest)
        }
    }

    /// Address of the instruction to disassemble.
    pub fn address(&self) -> Result<u64, Error> {
        Ok(self.ensure_valid()?.address)
    }

    /// Architecture in which to disassemble.
    pub fn architecture(&self) -> Result<Architecture, Error> {
        Ok(self.ensure_valid()?.arch)
    }

    /// Current disassembly text, [`None`] if no result is set.
    pub fn text(&self) -> Result<Option<String>, Error> {
        let req = self.ensure_valid()?;
        let state = req.state.borrow();
        Ok(state.result.as_ref().map(|r| r.text.clone()))
    }

    /// Length of the current result in bytes, [`None`] if no result is set.
    pub fn length(&self) -> Result<Option<usize>, Error> {
        let req = self.ensure_valid()?;
        let state = req.state.borrow();
        Ok(state.result.as_ref().map(|r| r.length.get()))
    }

    /// Current result.
    pub fn result(&self) -> Result<Option<DecodeResult>, Error> {
        let req = self.ensure_valid()?;
        let state = req.state.borrow();
        Ok(state.result.clone())
    }

    /// Address of the recorded memory error.
    pub fn memory_error_address(&self) -> Result<Option<u64>, Error> {
        let req = self.ensure_valid()?;
        let state = req.state.borrow();
        Ok(state.memory_error)
    }

    /// Read `length` bytes at `offset` from the start of the instruction.
    ///
    /// Bytes come from the memory source installed by
    /// [`builtin_disassemble`](crate::disasm::builtin_disassemble) if any, from the host memory
    /// otherwise. A failed read does not change the request state.
    pub fn read_memory(&self, length: usize, offset: i64) -> Result<Vec<u8>, Error> {
        let req = self.ensure_valid()?;
        let address = req.arch.wrap_address(req.address as i128 + offset as i128);
        Ok(self.read_at(address, length)?)
    }

    /// Set disassembly result, discarding any previous result or memory error.
    ///
    /// # Arguments
    ///
    /// * `length`: instruction length, must be greater than zero
    /// * `text`: instruction text, must not be empty
    pub fn set_result(&self, length: usize, text: &str) -> Result<(), Error> {
        let req = self.ensure_valid()?;
        let Some(length) = NonZeroUsize::new(length) else {
            return Err(Error::InvalidArgument(
                "length must be greater than 0".to_string(),
            ));
        };
        if text.is_empty() {
            return Err(Error::InvalidArgument(
                "string must not be empty".to_string(),
            ));
        }

        let mut state = req.state.borrow_mut();
        state.memory_error = None;
        state.result = Some(DecodeResult {
            length,
            text: text.to_string(),
        });
        Ok(())
    }

    /// Mark request as failed because memory at `offset` from the instruction start
    /// is unavailable. Any previous result is discarded, only the first memory error is kept.
    pub fn report_memory_error(&self, offset: i64) -> Result<(), Error> {
        let req = self.ensure_valid()?;
        let address = req.arch.wrap_address(req.address as i128 + offset as i128);
        let mut state = req.state.borrow_mut();
        state.result = None;
        state.memory_error.get_or_insert(address);
        Ok(())
    }

    /// Format an address in the style of disassembler output: `0x1000 <main+4>`.
    pub fn format_address(&self, address: u64) -> Result<String, Error> {
        let req = self.ensure_valid()?;
        Ok(req.host.format_address(&req.arch, address))
    }

    pub(super) fn host(&self) -> &Host {
        &self.0.host
    }

    /// Read target memory at an absolute address, through the installed memory source if any.
    pub(super) fn read_at(&self, address: u64, length: usize) -> Result<Vec<u8>, MemoryError> {
        let memory_source = self.0.state.borrow().memory_source.clone();
        source::read_redirected(
            memory_source.as_deref(),
            &self.0.host,
            self.0.address,
            address,
            length,
        )
    }

    /// Install memory source for the lifetime of returned guard.
    pub(super) fn install_memory_source(
        &self,
        memory_source: Rc<dyn MemorySource>,
    ) -> Result<MemorySourceGuard, Error> {
        let req = self.ensure_valid()?;
        let mut state = req.state.borrow_mut();
        if state.memory_source.is_some() {
            return Err(Error::NestedMemorySource);
        }
        state.memory_source = Some(memory_source);
        Ok(MemorySourceGuard(self.clone()))
    }

    pub(super) fn has_memory_source(&self) -> bool {
        self.0.state.borrow().memory_source.is_some()
    }

    /// Forget current result and memory error.
    pub(super) fn clear_outcome(&self) {
        let mut state = self.0.state.borrow_mut();
        state.result = None;
        state.memory_error = None;
    }

    /// Record a memory error reported by a decoder, keep the first one.
    pub(super) fn record_memory_error(&self, address: u64) {
        let mut state = self.0.state.borrow_mut();
        state.result = None;
        state.memory_error.get_or_insert(address);
    }

    /// Current result and memory error, regardless of validity.
    pub(super) fn outcome(&self) -> (Option<DecodeResult>, Option<u64>) {
        let state = self.0.state.borrow();
        (state.result.clone(), state.memory_error)
    }

    fn invalidate(&self) {
        self.0.valid.set(false);
        *self.0.state.borrow_mut() = RequestState::default();
    }
}

impl fmt::Debug for DisassembleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("DisassembleInfo(<invalid>)");
        }
        f.debug_struct("DisassembleInfo")
            .field("architecture", &self.0.arch.name())
            .field("address", &format_args!("{:#x}", self.0.address))
            .finish()
    }
}

/// Uninstalls a memory source when dropped.
pub(super) struct MemorySourceGuard(DisassembleInfo);

impl Drop for MemorySourceGuard {
    fn drop(&mut self) {
        self.0 .0.state.borrow_mut().memory_source = None;
    }
}

/// Owns a request for the duration of one bridge call, invalidates it when dropped.
pub(super) struct RequestGuard(DisassembleInfo);

impl RequestGuard {
    pub(super) fn new(host: Host, arch: Architecture, address: u64) -> Self {
        Self(DisassembleInfo::new(host, arch, address))
    }

    pub(super) fn info(&self) -> &DisassembleInfo {
        &self.0
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.0.invalidate();
    }
}
