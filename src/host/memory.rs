use crate::error::{Error, MemoryError};
use crate::host::TargetMemory;
use crate::muted_error;
use nix::sys::uio;
use nix::sys::uio::RemoteIoVec;
use nix::unistd::Pid;
use std::io::IoSliceMut;

/// Memory image held in a local buffer, e.g. a section of an object file.
#[derive(Debug, Clone)]
pub struct ImageMemory {
    base: u64,
    bytes: Vec<u8>,
}

impl ImageMemory {
    /// Create a new [`ImageMemory`].
    ///
    /// # Arguments
    ///
    /// * `base`: address of the first byte
    /// * `bytes`: image content
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True if `address` lies inside the image.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address - self.base < self.bytes.len() as u64
    }
}

impl TargetMemory for ImageMemory {
    fn read(&self, address: u64, length: usize) -> Result<Vec<u8>, MemoryError> {
        let err = MemoryError::Read { length, address };
        let start = address.checked_sub(self.base).ok_or(err)?;
        let start = usize::try_from(start).map_err(|_| err)?;
        let end = start.checked_add(length).ok_or(err)?;
        self.bytes.get(start..end).map(<[u8]>::to_vec).ok_or(err)
    }
}

/// Memory of a running process.
#[derive(Debug, Clone, Copy)]
pub struct ProcessMemory {
    pid: Pid,
}

impl ProcessMemory {
    pub fn new(pid: Pid) -> Self {
        Self { pid }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Read `length` bytes at `address` with a single `process_vm_readv` call.
    pub fn read_raw(&self, address: u64, length: usize) -> Result<Vec<u8>, Error> {
        let mut buff = Vec::new();
        buff.try_reserve_exact(length)
            .map_err(|_| MemoryError::Read { length, address })?;
        buff.resize(length, 0);
        let local_iov = IoSliceMut::new(buff.as_mut_slice());
        let remote_iov = RemoteIoVec {
            base: address as usize,
            len: length,
        };

        let read = uio::process_vm_readv(self.pid, &mut [local_iov], &[remote_iov])
            .map_err(Error::Ptrace)?;
        buff.truncate(read);
        Ok(buff)
    }
}

impl TargetMemory for ProcessMemory {
    fn read(&self, address: u64, length: usize) -> Result<Vec<u8>, MemoryError> {
        match muted_error!(self.read_raw(address, length), "read process memory:") {
            Some(data) if data.len() == length => Ok(data),
            _ => Err(MemoryError::Read { length, address }),
        }
    }
}
