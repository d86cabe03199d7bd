use crate::arch::Architecture;
use crate::disasm::request::DisassembleInfo;
use crate::error::Error;
use std::collections::HashMap;
use std::rc::Rc;

/// Extension disassembler, a hook called once per instruction.
pub trait Disassembler {
    /// Return disassembler name, used in diagnostics.
    fn name(&self) -> &str;

    /// Disassemble instruction described by `info`.
    ///
    /// The hook may set a result (or a memory error) on `info`, run the builtin disassembler
    /// over it, or do nothing, in which case the builtin disassembler is used.
    /// A returned memory error is an expected outcome, any other error is reported as
    /// a fault of the disassembler and the builtin disassembler is used instead.
    ///
    /// # Arguments
    ///
    /// * `info`: disassembly request, valid only until this call returns
    fn disassemble(&self, info: &DisassembleInfo) -> Result<(), Error>;
}

struct FnDisassembler<F> {
    name: String,
    f: F,
}

impl<F> Disassembler for FnDisassembler<F>
where
    F: Fn(&DisassembleInfo) -> Result<(), Error>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn disassemble(&self, info: &DisassembleInfo) -> Result<(), Error> {
        (self.f)(info)
    }
}

/// Make a disassembler from a closure.
pub fn from_fn<F>(name: impl Into<String>, f: F) -> Rc<dyn Disassembler>
where
    F: Fn(&DisassembleInfo) -> Result<(), Error> + 'static,
{
    Rc::new(FnDisassembler {
        name: name.into(),
        f,
    })
}

/// Registered extension disassemblers.
#[derive(Default)]
pub struct HookRegistry {
    global: Option<Rc<dyn Disassembler>>,
    by_arch: HashMap<String, Rc<dyn Disassembler>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a disassembler. Return previously registered one.
    ///
    /// # Arguments
    ///
    /// * `hook`: new disassembler, `None` removes the current one
    /// * `architecture`: architecture name, `None` means any architecture without
    ///   its own disassembler
    pub fn register(
        &mut self,
        hook: Option<Rc<dyn Disassembler>>,
        architecture: Option<&str>,
    ) -> Option<Rc<dyn Disassembler>> {
        match (architecture, hook) {
            (None, hook) => std::mem::replace(&mut self.global, hook),
            (Some(name), Some(hook)) => self.by_arch.insert(name.to_string(), hook),
            (Some(name), None) => self.by_arch.remove(name),
        }
    }

    /// Find a disassembler for the architecture.
    pub fn lookup(&self, arch: &Architecture) -> Option<Rc<dyn Disassembler>> {
        self.by_arch
            .get(arch.name())
            .or(self.global.as_ref())
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.by_arch.is_empty()
    }
}
