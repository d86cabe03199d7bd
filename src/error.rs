use std::fmt;

/// Failure to obtain instruction bytes.
///
/// This is an expected condition: the target memory may be unmapped, or a memory source
/// override may refuse the read. Both "address known" and "address unknown" outcomes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// Read of `length` bytes starting at `address` failed.
    Read { length: usize, address: u64 },
    /// Decoder reported a faulting address.
    At(u64),
    /// Decoder failed without saying where.
    Unattributed,
}

impl MemoryError {
    /// Faulting address, if known.
    pub fn address(&self) -> Option<u64> {
        match self {
            MemoryError::Read { address, .. } => Some(*address),
            MemoryError::At(address) => Some(*address),
            MemoryError::Unattributed => None,
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::Read { length, address } => {
                write!(f, "failed to read {length} bytes at {address:#x}")
            }
            MemoryError::At(address) => write!(f, "failed to read memory at {address:#x}"),
            MemoryError::Unattributed => f.write_str("failed to read memory"),
        }
    }
}

impl std::error::Error for MemoryError {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- request contract errors -----------------------------------
    #[error("DisassembleInfo is no longer valid")]
    InvalidRequest,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("memory source already installed on this request")]
    NestedMemorySource,

    // --------------------------------- memory errors ---------------------------------------------
    #[error(transparent)]
    Memory(#[from] MemoryError),

    // --------------------------------- extension errors ------------------------------------------
    #[error("extension: {0:#}")]
    Extension(#[from] anyhow::Error),
    #[error("custom instruction description: {0}")]
    CustomInsn(String),

    // --------------------------------- disasm ----------------------------------------------------
    #[error("install disassembler: {0}")]
    DisAsmInit(capstone::Error),
    #[error("unsupported architecture `{0}`")]
    UnsupportedArchitecture(String),

    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("object file parsing error: {0}")]
    ObjParsing(#[from] object::Error),
    #[error("config parsing error: {0}")]
    ConfigParsing(#[from] toml::de::Error),
    #[error("process_vm_readv syscall error: {0}")]
    Ptrace(nix::Error),
}

impl Error {
    /// True if error is an expected "instruction bytes are unavailable" condition.
    pub fn is_memory_error(&self) -> bool {
        matches!(self, Error::Memory(_))
    }

    /// Return memory error description if error is a memory error.
    pub fn as_memory_error(&self) -> Option<MemoryError> {
        match self {
            Error::Memory(e) => Some(*e),
            _ => None,
        }
    }

    /// Return a hint to a host - continue after error or stop whole process.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::InvalidRequest => false,
            Error::InvalidArgument(_) => false,
            Error::NestedMemorySource => false,
            Error::Memory(_) => false,
            Error::Extension(_) => false,
            Error::CustomInsn(_) => false,
            Error::UnsupportedArchitecture(_) => false,
            Error::IO(_) => false,
            Error::ConfigParsing(_) => false,
            Error::Ptrace(_) => false,

            // currently fatal errors
            Error::DisAsmInit(_) => true,
            Error::ObjParsing(_) => true,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                if $crate::log::is_enabled() {
                    $log_fn!(target: $crate::log::TARGET, "{:#}", e);
                }
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                if $crate::log::is_enabled() {
                    $log_fn!(target: $crate::log::TARGET, concat!($msg, " {:#}"), e);
                }
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
