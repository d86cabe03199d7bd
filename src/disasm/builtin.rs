use crate::disasm::request::DisassembleInfo;
use crate::disasm::source::MemorySource;
use crate::error::{Error, MemoryError};
use crate::host::DecodeInfo;
use std::rc::Rc;

/// Disassemble the requested instruction with the builtin (native) disassembler.
///
/// Any previous result or memory error of `info` is discarded. On success `info` holds the
/// builtin result. On failure a memory error is returned: with the faulting address if the
/// native decoder reported one, unattributed otherwise.
///
/// # Arguments
///
/// * `info`: disassembly request
/// * `memory_source`: if set, instruction bytes are read from it instead of the target memory,
///   only for the duration of this call
pub fn builtin_disassemble(
    info: &DisassembleInfo,
    memory_source: Option<Rc<dyn MemorySource>>,
) -> Result<(), Error> {
    let arch = info.architecture()?;
    let address = info.address()?;

    let _source_guard = memory_source
        .map(|src| info.install_memory_source(src))
        .transpose()?;

    info.clear_outcome();

    let host = info.host().clone();
    let mut delegate = DelegateInfo {
        request: info,
        text: String::new(),
    };

    match host.decoder().print_insn(&arch, address, &mut delegate) {
        Some(length) => info.set_result(length.get(), &delegate.text),
        None => {
            let err = match info.memory_error_address()? {
                Some(address) => MemoryError::At(address),
                None => MemoryError::Unattributed,
            };
            Err(Error::Memory(err))
        }
    }
}

/// Native decode context that reads through the request (and its memory source)
/// and collects the output locally.
struct DelegateInfo<'a> {
    request: &'a DisassembleInfo,
    text: String,
}

impl DecodeInfo for DelegateInfo<'_> {
    fn read_memory(&mut self, address: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let data = self.request.read_at(address, buf.len())?;
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn memory_error(&mut self, _: i32, address: u64) {
        self.request.record_memory_error(address);
    }

    fn print(&mut self, text: &str) {
        self.text.push_str(text);
    }
}
