mod common;

mod lifecycle;

use crate::common::{make_bridge, TestHook, TestInfo, BASE};
use disbridge::arch::Architecture;
use disbridge::disasm::{builtin_disassemble, DecodeOutcome, MemorySource};
use disbridge::host::BufferSink;
use disbridge::{Error, MemoryError};
use serial_test::serial;
use std::num::NonZeroUsize;
use std::rc::Rc;

const X86: Architecture = Architecture::X86_64;

fn len(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[test]
fn test_no_hook_means_native_decoding() {
    let (bridge, diagnostics) = make_bridge(vec![0x90, 0x48, 0x89, 0xe5]);

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Deferred);
    assert!(sink.prints.is_empty());
    assert!(sink.memory_errors.is_empty());

    let mut native = BufferSink::new();
    let native_len = bridge.host().native_decode(&X86, BASE + 1, &mut native);
    let mut bridged = BufferSink::new();
    let bridged_len = bridge.disassemble(&X86, BASE + 1, &mut bridged);
    assert_eq!(native_len, bridged_len);
    assert_eq!(native.text(), bridged.text());
    assert_eq!(diagnostics.count(), 0);
}

#[test]
fn test_hook_sets_result() {
    let (bridge, _) = make_bridge(vec![0x90; 4]);
    let info = TestInfo::default();
    bridge.register_disassembler(
        Some(TestHook::new("set", info.clone(), |req, _| {
            req.set_result(4, "add r0, r1")
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Decoded(len(4)));
    assert_eq!(sink.prints, vec!["add r0, r1".to_string()]);
    assert!(sink.memory_errors.is_empty());
    assert_eq!(info.calls.get(), 1);
}

#[test]
fn test_hook_reports_memory_error() {
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("mem", TestInfo::default(), |req, _| {
            req.report_memory_error(2)
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Failed(0x1002));
    assert_eq!(sink.memory_errors, vec![(-1, 0x1002)]);
    assert!(sink.prints.is_empty());
    assert_eq!(diagnostics.count(), 0);
}

#[test]
fn test_hook_fault_is_reported_and_deferred() {
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("broken", TestInfo::default(), |req, _| {
            req.set_result(1, "nop")?;
            Err(anyhow::anyhow!("unsupported operand type").into())
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Deferred);
    assert!(sink.prints.is_empty());
    assert_eq!(diagnostics.count(), 1);
    let report = diagnostics.last().unwrap();
    assert!(report.contains("broken"));
    assert!(report.contains("unsupported operand type"));

    // full path falls back to the native decoder
    let mut sink = BufferSink::new();
    assert_eq!(bridge.disassemble(&X86, BASE, &mut sink), Some(len(1)));
    assert_eq!(sink.text(), "nop");
}

#[test]
fn test_invalid_argument_from_hook_is_a_fault() {
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("zero", TestInfo::default(), |req, _| {
            req.set_result(0, "x")
        })),
        None,
    );

    assert_outcome!(bridge, X86, BASE, DecodeOutcome::Deferred);
    assert_eq!(diagnostics.count(), 1);
}

#[test]
fn test_short_override_buffer() {
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    let info = TestInfo::default();
    bridge.register_disassembler(
        Some(TestHook::new("short", info.clone(), |req, seen| {
            let short: Rc<dyn MemorySource> =
                Rc::new(|len: usize, _: i64| -> Result<Vec<u8>, Error> {
                    Ok(vec![0x90; len.saturating_sub(3)])
                });
            let res = builtin_disassemble(req, Some(short));
            if let Err(ref err) = res {
                seen.errors.borrow_mut().push(err.to_string());
                assert!(err.is_memory_error());
            }
            res
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Failed(BASE));
    assert_eq!(sink.memory_errors, vec![(-1, BASE)]);
    assert_eq!(info.errors.borrow().len(), 1);

    // rejected read is reported
    assert_eq!(diagnostics.count(), 1);
    assert!(diagnostics
        .last()
        .unwrap()
        .contains("incorrectly sized buffer"));
}

#[test]
fn test_override_fault_is_reported() {
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("faulty-source", TestInfo::default(), |req, _| {
            let faulty: Rc<dyn MemorySource> =
                Rc::new(|_: usize, _: i64| -> Result<Vec<u8>, Error> {
                    Err(anyhow::anyhow!("index out of range").into())
                });
            builtin_disassemble(req, Some(faulty))
        })),
        None,
    );

    assert_outcome!(bridge, X86, BASE, DecodeOutcome::Failed(BASE));
    assert!(diagnostics.last().unwrap().contains("index out of range"));
}

#[test]
fn test_override_memory_error_is_silent() {
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("missing", TestInfo::default(), |req, _| {
            let missing: Rc<dyn MemorySource> =
                Rc::new(|_: usize, offset: i64| -> Result<Vec<u8>, Error> {
                    Err(MemoryError::At(BASE + offset as u64).into())
                });
            builtin_disassemble(req, Some(missing))
        })),
        None,
    );

    assert_outcome!(bridge, X86, BASE, DecodeOutcome::Failed(BASE));
    assert_eq!(diagnostics.count(), 0);
}

#[test]
fn test_override_patches_instruction() {
    // nop at BASE, hook shows it as int3 (a software breakpoint)
    let (bridge, _) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("patch", TestInfo::default(), |req, _| {
            let patched: Rc<dyn MemorySource> =
                Rc::new(|len: usize, offset: i64| -> Result<Vec<u8>, Error> {
                    let image = [0xcc, 0x90, 0x90, 0x90];
                    let start = offset as usize;
                    match image.get(start..start + len) {
                        Some(bytes) => Ok(bytes.to_vec()),
                        None => Err(MemoryError::Unattributed.into()),
                    }
                });
            builtin_disassemble(req, Some(patched))
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Decoded(len(1)));
    assert_eq!(sink.text(), "int3");
}

#[test]
fn test_wrap_builtin_result() {
    let (bridge, _) = make_bridge(vec![0x90, 0x90]);
    bridge.register_disassembler(
        Some(TestHook::new("comment", TestInfo::default(), |req, _| {
            builtin_disassemble(req, None)?;
            let text = req.text()?.unwrap_or_default();
            let length = req.length()?.unwrap_or_default();
            req.set_result(length, &format!("{text}\t; at {}", req.format_address(req.address()?)?))
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE + 1, DecodeOutcome::Decoded(len(1)));
    assert_eq!(sink.text(), "nop\t; at 0x1001 <main+1>");
}

#[test]
fn test_raised_read_error_falls_back() {
    // one nop, hook wants more bytes than there are
    let (bridge, diagnostics) = make_bridge(vec![0x90]);
    let info = TestInfo::default();
    bridge.register_disassembler(
        Some(TestHook::new("greedy", info.clone(), |req, _| {
            let bytes = req.read_memory(4, 0)?;
            req.set_result(bytes.len(), "greedy")
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Deferred);
    assert!(sink.memory_errors.is_empty());
    assert!(sink.prints.is_empty());

    let mut sink = BufferSink::new();
    assert_eq!(bridge.disassemble(&X86, BASE, &mut sink), Some(len(1)));
    assert_eq!(sink.text(), "nop");
    assert!(sink.memory_errors.is_empty());
    assert_eq!(diagnostics.count(), 0);
}

#[test]
fn test_huge_read_is_a_memory_error() {
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    let info = TestInfo::default();
    bridge.register_disassembler(
        Some(TestHook::new("huge", info.clone(), |req, seen| {
            let err = req.read_memory(usize::MAX, 0).unwrap_err();
            assert_eq!(
                err.as_memory_error(),
                Some(MemoryError::Read {
                    length: usize::MAX,
                    address: BASE
                })
            );
            seen.errors.borrow_mut().push(err.to_string());
            Err(err)
        })),
        None,
    );

    assert_outcome!(bridge, X86, BASE, DecodeOutcome::Deferred);
    assert_eq!(info.errors.borrow().len(), 1);
    assert_eq!(diagnostics.count(), 0);
}

#[test]
fn test_override_serves_only_instruction_bytes() {
    // reader knows nothing past the single byte nop
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("exact", TestInfo::default(), |req, _| {
            let exact: Rc<dyn MemorySource> =
                Rc::new(|len: usize, offset: i64| -> Result<Vec<u8>, Error> {
                    match (len, offset) {
                        (1, 0) => Ok(vec![0xcc]),
                        _ => Err(anyhow::anyhow!("read past instruction").into()),
                    }
                });
            builtin_disassemble(req, Some(exact))
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Decoded(len(1)));
    assert_eq!(sink.text(), "int3");
    assert_eq!(diagnostics.count(), 0);
}

#[test]
fn test_hook_declines() {
    let (bridge, _) = make_bridge(vec![0x90; 4]);
    let info = TestInfo::default();
    bridge.register_disassembler(
        Some(TestHook::new("decline", info.clone(), |_, _| Ok(()))),
        Some(X86.name()),
    );

    assert_outcome!(bridge, X86, BASE, DecodeOutcome::Deferred);
    let mut sink = BufferSink::new();
    assert_eq!(bridge.disassemble(&X86, BASE, &mut sink), Some(len(1)));
    assert_eq!(sink.text(), "nop");
    assert_eq!(info.calls.get(), 2);
}

#[test]
#[serial]
fn test_faults_reported_with_logging_disabled() {
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("broken", TestInfo::default(), |_, _| {
            Err(Error::CustomInsn("bad template".to_string()))
        })),
        None,
    );

    disbridge::log::disable();
    assert_outcome!(bridge, X86, BASE, DecodeOutcome::Deferred);
    disbridge::log::enable();

    assert_eq!(diagnostics.count(), 1);
}
