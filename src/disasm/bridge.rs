use crate::arch::Architecture;
use crate::disasm::registry::{Disassembler, HookRegistry};
use crate::disasm::request::RequestGuard;
use crate::error::{Error, MemoryError};
use crate::host::{BufferSink, Host, NativeSink};
use crate::br_debug;
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;

/// Verdict of a single [`Bridge::disassemble_one`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Instruction decoded by an extension, text already sent to the native sink.
    Decoded(NonZeroUsize),
    /// No extension result, caller must run the native decoder.
    Deferred,
    /// Memory at address is unavailable, already reported to the native sink.
    Failed(u64),
}

/// A single disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub address: u64,
    pub length: NonZeroUsize,
    pub text: String,
}

/// Entry point of the host engine: routes every instruction either to a registered
/// extension disassembler or to the native decoder.
pub struct Bridge {
    host: Host,
    hooks: RefCell<HookRegistry>,
}

impl Bridge {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            hooks: RefCell::default(),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Register an extension disassembler, return previously registered one.
    /// See [`HookRegistry::register`].
    pub fn register_disassembler(
        &self,
        hook: Option<Rc<dyn Disassembler>>,
        architecture: Option<&str>,
    ) -> Option<Rc<dyn Disassembler>> {
        self.hooks.borrow_mut().register(hook, architecture)
    }

    /// Disassemble one instruction with an extension disassembler.
    ///
    /// Extension faults never escape this call, they go to the host diagnostics and
    /// result in [`DecodeOutcome::Deferred`]. A memory error returned by the extension is
    /// [`DecodeOutcome::Failed`] only if the request has a memory error recorded, otherwise
    /// it is [`DecodeOutcome::Deferred`] too.
    ///
    /// # Arguments
    ///
    /// * `arch`: target architecture
    /// * `address`: instruction address
    /// * `sink`: native decode context, receives instruction text or memory fault
    pub fn disassemble_one(
        &self,
        arch: &Architecture,
        address: u64,
        sink: &mut dyn NativeSink,
    ) -> DecodeOutcome {
        // registry borrow must end before the hook runs, hooks may (un)register
        let hook = {
            let hooks = self.hooks.borrow();
            if hooks.is_empty() {
                return DecodeOutcome::Deferred;
            }
            hooks.lookup(arch)
        };
        let Some(hook) = hook else {
            return DecodeOutcome::Deferred;
        };

        let guard = RequestGuard::new(self.host.clone(), *arch, address);
        let raised = match hook.disassemble(guard.info()) {
            Ok(()) => None,
            Err(Error::Memory(err)) => Some(err),
            Err(err) => {
                self.host.diagnostics().report(&format!(
                    "disassembler `{}` failed at {address:#x}: {err:#}",
                    hook.name()
                ));
                return DecodeOutcome::Deferred;
            }
        };

        let (result, memory_error) = guard.info().outcome();
        drop(guard);

        if let Some(fault) = memory_error {
            sink.memory_error(-1, fault);
            return DecodeOutcome::Failed(fault);
        }
        // memory error that never reached the request, let the native decoder try
        if let Some(err) = raised {
            br_debug!("disassembler `{}` falls back after: {err}", hook.name());
            return DecodeOutcome::Deferred;
        }

        match result {
            Some(result) => {
                sink.print(result.text());
                DecodeOutcome::Decoded(result.length())
            }
            None => DecodeOutcome::Deferred,
        }
    }

    /// Disassemble one instruction the way the host engine does: extension disassembler
    /// first, native decoder if the extension declines.
    /// Return instruction length or `None` if instruction bytes are unavailable.
    pub fn disassemble(
        &self,
        arch: &Architecture,
        address: u64,
        sink: &mut dyn NativeSink,
    ) -> Option<NonZeroUsize> {
        match self.disassemble_one(arch, address, sink) {
            DecodeOutcome::Decoded(length) => Some(length),
            DecodeOutcome::Failed(_) => None,
            DecodeOutcome::Deferred => self.host.native_decode(arch, address, sink),
        }
    }

    /// Disassemble up to `count` consecutive instructions starting at `start`.
    /// Stops at the first memory failure, which becomes the last element.
    pub fn disassemble_range(
        &self,
        arch: &Architecture,
        start: u64,
        count: usize,
    ) -> Vec<Result<Line, MemoryError>> {
        let mut lines = vec![];
        let mut address = start;

        for _ in 0..count {
            let mut sink = BufferSink::new();
            match self.disassemble(arch, address, &mut sink) {
                Some(length) => {
                    lines.push(Ok(Line {
                        address,
                        length,
                        text: sink.text(),
                    }));
                    address = arch.wrap_address(address as i128 + length.get() as i128);
                }
                None => {
                    let err = match sink.memory_errors.first() {
                        Some(&(_, address)) => MemoryError::At(address),
                        None => MemoryError::Unattributed,
                    };
                    lines.push(Err(err));
                    break;
                }
            }
        }

        lines
    }
}
