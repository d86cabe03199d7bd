use crate::error::{Error, MemoryError};
use crate::host::Host;

/// Alternative source of instruction bytes.
///
/// Passed to [`builtin_disassemble`](crate::disasm::builtin_disassemble) to make the builtin
/// disassembler decode something other than the target memory, e.g. a patched instruction.
pub trait MemorySource {
    /// Read `length` bytes at `offset` from the start of the instruction being disassembled.
    ///
    /// Returning [`Error::Memory`] means the bytes are unavailable, any other error is
    /// considered a bug in the memory source and is reported through the host diagnostics.
    /// Both fail the read.
    fn read_memory(&self, length: usize, offset: i64) -> Result<Vec<u8>, Error>;
}

impl<F> MemorySource for F
where
    F: Fn(usize, i64) -> Result<Vec<u8>, Error>,
{
    fn read_memory(&self, length: usize, offset: i64) -> Result<Vec<u8>, Error> {
        self(length, offset)
    }
}

/// Read `length` bytes at `address`, either from `memory_source` (if present) or from
/// the host memory.
///
/// # Arguments
///
/// * `memory_source`: installed memory source
/// * `host`: host services, default memory and diagnostics
/// * `insn_address`: address of the instruction under disassembly, memory source offsets
///   are relative to it
/// * `address`: read address
/// * `length`: number of bytes to read
pub(super) fn read_redirected(
    memory_source: Option<&dyn MemorySource>,
    host: &Host,
    insn_address: u64,
    address: u64,
    length: usize,
) -> Result<Vec<u8>, MemoryError> {
    let failed = MemoryError::Read { length, address };

    let Some(memory_source) = memory_source else {
        return match host.memory().read(address, length) {
            Ok(data) if data.len() == length => Ok(data),
            _ => Err(failed),
        };
    };

    let offset = address.wrapping_sub(insn_address) as i64;
    match memory_source.read_memory(length, offset) {
        Ok(data) if data.len() == length => Ok(data),
        Ok(data) => {
            let err = Error::InvalidArgument(format!(
                "result from read_memory is incorrectly sized buffer (expected {length} bytes, got {})",
                data.len()
            ));
            host.diagnostics().report(&format!("memory source: {err}"));
            Err(failed)
        }
        Err(Error::Memory(_)) => Err(failed),
        Err(err) => {
            host.diagnostics().report(&format!("memory source: {err:#}"));
            Err(failed)
        }
    }
}
