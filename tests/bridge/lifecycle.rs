use crate::common::{make_bridge, TestHook, TestInfo, BASE};
use crate::{assert_outcome, len, X86};
use disbridge::arch::Architecture;
use disbridge::disasm::{builtin_disassemble, Bridge, DecodeOutcome, MemorySource};
use disbridge::host::BufferSink;
use disbridge::Error;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[test]
fn test_retained_request_is_invalidated() {
    let (bridge, _) = make_bridge(vec![0x90; 4]);
    let info = TestInfo::default();
    bridge.register_disassembler(
        Some(TestHook::new("keep", info.clone(), |req, _| {
            assert!(req.is_valid());
            req.set_result(1, "kept")
        })),
        None,
    );

    assert_outcome!(bridge, X86, BASE, DecodeOutcome::Decoded(len(1)));

    let retained = info.retained.borrow_mut().take().unwrap();
    assert!(!retained.is_valid());
    assert!(matches!(retained.address(), Err(Error::InvalidRequest)));
    assert!(matches!(retained.text(), Err(Error::InvalidRequest)));
    assert!(matches!(retained.read_memory(1, 0), Err(Error::InvalidRequest)));
    assert!(matches!(
        retained.set_result(1, "late"),
        Err(Error::InvalidRequest)
    ));
    assert!(matches!(
        builtin_disassemble(&retained, None),
        Err(Error::InvalidRequest)
    ));
}

#[test]
fn test_every_call_gets_a_fresh_request() {
    let (bridge, _) = make_bridge(vec![0x90; 4]);
    let previous = Rc::new(RefCell::new(None));
    let info = TestInfo::default();
    {
        let previous = previous.clone();
        bridge.register_disassembler(
            Some(TestHook::new("fresh", info.clone(), move |req, _| {
                // nothing leaks from the previous call
                assert_eq!(req.text()?, None);
                assert_eq!(req.memory_error_address()?, None);
                if let Some(prev) = previous.replace(Some(req.clone())) {
                    assert!(!prev.is_valid());
                }
                req.set_result(1, "fresh")
            })),
            None,
        );
    }

    for offset in 0..3 {
        assert_outcome!(bridge, X86, BASE + offset, DecodeOutcome::Decoded(len(1)));
    }
    assert_eq!(info.calls.get(), 3);
}

#[test]
fn test_nested_override_is_rejected() {
    let (bridge, diagnostics) = make_bridge(vec![0x90; 4]);
    let info = TestInfo::default();
    bridge.register_disassembler(
        Some(TestHook::new("nested", info.clone(), |req, seen| {
            let inner_req = req.clone();
            let seen_inner = seen.clone();
            let outer: Rc<dyn MemorySource> =
                Rc::new(move |len: usize, _: i64| -> Result<Vec<u8>, Error> {
                    let inner: Rc<dyn MemorySource> =
                        Rc::new(|len: usize, _: i64| -> Result<Vec<u8>, Error> {
                            Ok(vec![0xcc; len])
                        });
                    if let Err(err) = builtin_disassemble(&inner_req, Some(inner)) {
                        seen_inner.errors.borrow_mut().push(err.to_string());
                    }
                    Ok(vec![0x90; len])
                });
            builtin_disassemble(req, Some(outer))?;

            // the override is gone once the delegate returns
            assert_eq!(req.read_memory(1, 0)?, vec![0x90]);
            Ok(())
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Decoded(len(1)));
    assert_eq!(sink.text(), "nop");
    let errors = info.errors.borrow();
    assert!(!errors.is_empty());
    assert!(errors
        .iter()
        .all(|e| e == &Error::NestedMemorySource.to_string()));
    assert_eq!(diagnostics.count(), 0);
}

#[test]
fn test_reentrant_disassembly() {
    let bridge = Rc::new(make_bridge(vec![0x90, 0x90, 0x90, 0x90]).0);
    let weak: Weak<Bridge> = Rc::downgrade(&bridge);

    bridge.register_disassembler(
        Some(TestHook::new("reentrant", TestInfo::default(), move |req, _| {
            let address = req.address()?;
            if address != BASE {
                return req.set_result(1, "inner");
            }

            let Some(bridge) = weak.upgrade() else {
                return Ok(());
            };
            let mut sink = BufferSink::new();
            let outcome = bridge.disassemble_one(&req.architecture()?, address + 1, &mut sink);
            assert_eq!(outcome, DecodeOutcome::Decoded(len(1)));

            // outer request is untouched by the inner one
            assert!(req.is_valid());
            assert_eq!(req.text()?, None);
            req.set_result(2, &format!("outer+{}", sink.text()))
        })),
        None,
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Decoded(len(2)));
    assert_eq!(sink.text(), "outer+inner");
}

#[test]
fn test_hook_may_unregister_itself() {
    let bridge = Rc::new(make_bridge(vec![0x90; 4]).0);
    let weak = Rc::downgrade(&bridge);

    bridge.register_disassembler(
        Some(TestHook::new("once", TestInfo::default(), move |req, _| {
            if let Some(bridge) = weak.upgrade() {
                assert!(bridge.register_disassembler(None, None).is_some());
            }
            req.set_result(1, "once")
        })),
        None,
    );

    assert_outcome!(bridge, X86, BASE, DecodeOutcome::Decoded(len(1)));
    assert_outcome!(bridge, X86, BASE, DecodeOutcome::Deferred);
}

#[test]
fn test_architecture_hook_wins() {
    let (bridge, _) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("global", TestInfo::default(), |req, _| {
            req.set_result(1, "global")
        })),
        None,
    );
    bridge.register_disassembler(
        Some(TestHook::new("x86", TestInfo::default(), |req, _| {
            req.set_result(1, "x86")
        })),
        Some("i386"),
    );

    let sink = assert_outcome!(bridge, X86, BASE, DecodeOutcome::Decoded(len(1)));
    assert_eq!(sink.text(), "global");
    let sink = assert_outcome!(
        bridge,
        Architecture::X86,
        BASE,
        DecodeOutcome::Decoded(len(1))
    );
    assert_eq!(sink.text(), "x86");
}

#[test]
fn test_range_through_hooks() {
    // nop; nop; nop; nop
    let (bridge, _) = make_bridge(vec![0x90; 4]);
    bridge.register_disassembler(
        Some(TestHook::new("odd", TestInfo::default(), |req, _| {
            match req.address()? % 2 {
                0 => Ok(()),
                _ => req.set_result(1, "odd"),
            }
        })),
        None,
    );

    let lines = bridge.disassemble_range(&X86, BASE, 5);
    let texts: Vec<_> = lines
        .iter()
        .map(|l| match l {
            Ok(line) => line.text.clone(),
            Err(e) => e.to_string(),
        })
        .collect();
    assert_eq!(
        texts,
        vec!["nop", "odd", "nop", "odd", "failed to read memory at 0x1004"]
    );
}
