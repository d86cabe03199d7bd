use disbridge::disasm::{Bridge, Disassembler, DisassembleInfo};
use disbridge::host::{CapstoneDecoder, Diagnostics, Host, ImageMemory, SymbolTable};
use disbridge::Error;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Base address of test memory images.
pub const BASE: u64 = 0x1000;

/// Diagnostics that keep every report.
#[derive(Clone, Default)]
pub struct TestDiagnostics {
    pub reports: Rc<RefCell<Vec<String>>>,
}

impl TestDiagnostics {
    pub fn count(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn last(&self) -> Option<String> {
        self.reports.borrow().last().cloned()
    }
}

impl Diagnostics for TestDiagnostics {
    fn report(&self, fault: &str) {
        self.reports.borrow_mut().push(fault.to_string());
    }
}

/// Observations made by a [`TestHook`].
#[derive(Clone, Default)]
pub struct TestInfo {
    pub calls: Rc<Cell<usize>>,
    pub retained: Rc<RefCell<Option<DisassembleInfo>>>,
    pub errors: Rc<RefCell<Vec<String>>>,
}

type HookFn = dyn Fn(&DisassembleInfo, &TestInfo) -> Result<(), Error>;

/// Extension disassembler driven by a closure, keeps the last request it has seen.
pub struct TestHook {
    name: String,
    info: TestInfo,
    f: Box<HookFn>,
}

impl TestHook {
    pub fn new(
        name: &str,
        info: TestInfo,
        f: impl Fn(&DisassembleInfo, &TestInfo) -> Result<(), Error> + 'static,
    ) -> Rc<dyn Disassembler> {
        Rc::new(Self {
            name: name.to_string(),
            info,
            f: Box::new(f),
        })
    }
}

impl Disassembler for TestHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn disassemble(&self, info: &DisassembleInfo) -> Result<(), Error> {
        self.info.calls.set(self.info.calls.get() + 1);
        self.info.retained.replace(Some(info.clone()));
        (self.f)(info, &self.info)
    }
}

/// Bridge over an in-memory image at [`BASE`], with a `main` symbol covering the image.
pub fn make_bridge(bytes: Vec<u8>) -> (Bridge, TestDiagnostics) {
    let diagnostics = TestDiagnostics::default();
    let symbols = SymbolTable::new([(BASE, bytes.len() as u64, "main".to_string())]);
    let host = Host::new(
        Rc::new(CapstoneDecoder::default()),
        Rc::new(ImageMemory::new(BASE, bytes)),
    )
    .with_diagnostics(Rc::new(diagnostics.clone()))
    .with_symbols(Rc::new(symbols));
    (Bridge::new(host), diagnostics)
}

#[macro_export]
macro_rules! assert_outcome {
    ($bridge: expr, $arch: expr, $addr: expr, $expected: expr) => {{
        let mut sink = disbridge::host::BufferSink::new();
        let outcome = $bridge.disassemble_one(&$arch, $addr, &mut sink);
        assert_eq!(outcome, $expected);
        sink
    }};
}
