use std::collections::HashMap;

/// An interned identifier name. Only meaningful together with the
/// `SymbolTable` of the tree that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(usize);

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<String>,
    string_to_symbol: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing symbol if it was seen before.
    pub fn to_sym(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.lookup(name) {
            return sym;
        }
        let sym = Symbol(self.symbols.len());
        self.string_to_symbol.insert(name.to_string(), sym);
        self.symbols.push(name.to_string());
        sym
    }

    pub fn from_sym(&self, sym: Symbol) -> &str {
        &self.symbols[sym.0]
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.string_to_symbol.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
