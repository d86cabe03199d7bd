//! Bridge logging.
//!
//! `br_*` macros forward to the `log` facade under the `"disasm"` target, so a host can
//! filter bridge messages (e.g. `RUST_LOG=disasm=debug`) apart from its own. The switch
//! below turns them off altogether, e.g. while a host renders diagnostics itself.

use std::sync::atomic::{AtomicBool, Ordering};

/// Log target used by the disassembly bridge.
pub const TARGET: &str = "disasm";

static ENABLED: AtomicBool = AtomicBool::new(true);

#[inline(always)]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

/// Silence bridge logging, useful for hosts that render diagnostics themselves.
pub fn disable() {
    ENABLED.store(false, Ordering::SeqCst)
}

pub fn enable() {
    ENABLED.store(true, Ordering::SeqCst)
}

#[macro_export]
macro_rules! br_info {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::info!(target: $target, $($arg)+)
        }
    };
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::info!(target: $crate::log::TARGET, $($arg)+)
        }
    };
}

#[macro_export]
macro_rules! br_warn {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::warn!(target: $target, $($arg)+)
        }
    };
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::warn!(target: $crate::log::TARGET, $($arg)+)
        }
    };
}

#[macro_export]
macro_rules! br_error {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::error!(target: $target, $($arg)+)
        }
    };
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::error!(target: $crate::log::TARGET, $($arg)+)
        }
    };
}

#[macro_export]
macro_rules! br_debug {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::debug!(target: $target, $($arg)+)
        }
    };
    ($($arg:tt)+) => {
        if $crate::log::is_enabled() {
            log::debug!(target: $crate::log::TARGET, $($arg)+)
        }
    };
}
