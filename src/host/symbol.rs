use crate::error::Error;
use crate::host::SymbolResolver;
use itertools::Itertools;
use object::{Object, ObjectSymbol, SymbolKind};
use std::path::Path;

#[derive(Debug, Clone)]
struct Symbol {
    address: u64,
    size: u64,
    name: String,
}

/// Sorted table of code symbols.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Create table from `(address, size, name)` triples. Zero size means that symbol
    /// spans up to the next one.
    pub fn new(symbols: impl IntoIterator<Item = (u64, u64, String)>) -> Self {
        let symbols = symbols
            .into_iter()
            .map(|(address, size, name)| Symbol {
                address,
                size,
                name,
            })
            .sorted_by_key(|s| s.address)
            .dedup_by(|a, b| a.address == b.address)
            .collect();
        Self { symbols }
    }

    /// Load text symbols from an object file, rust names are demangled.
    pub fn from_object(data: &[u8]) -> Result<Self, Error> {
        let file = object::File::parse(data)?;
        let symbols = file
            .symbols()
            .filter(|s| s.kind() == SymbolKind::Text && s.address() != 0)
            .filter_map(|s| {
                let name = s.name().ok()?;
                if name.is_empty() {
                    return None;
                }
                Some((
                    s.address(),
                    s.size(),
                    format!("{:#}", rustc_demangle::demangle(name)),
                ))
            });
        Ok(Self::new(symbols))
    }

    /// Load text symbols from an object file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = std::fs::read(path)?;
        Self::from_object(&data)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolResolver for SymbolTable {
    fn resolve(&self, address: u64) -> Option<(&str, u64)> {
        let idx = self.symbols.partition_point(|s| s.address <= address);
        let symbol = self.symbols.get(idx.checked_sub(1)?)?;
        let offset = address - symbol.address;
        if symbol.size != 0 && offset >= symbol.size {
            return None;
        }
        Some((symbol.name.as_str(), offset))
    }
}
