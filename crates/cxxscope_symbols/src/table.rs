//! The symbol table: arenas of scopes and symbols for one translation unit.

use crate::scope::{Scope, ScopeKind};
use crate::symbol::{Symbol, SymbolKind};
use cxxscope_ptree::{Encoding, NodeKey, ScopeId, SymbolId};
use rustc_hash::FxHashMap;
use std::fmt;

/// Why a declaration could not be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redeclaration {
    /// The symbol the declaration collides with.
    pub previous: SymbolId,
    /// A second definition of something already defined.
    pub redefinition: bool,
}

/// How a new declaration relates to an existing symbol of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compatibility {
    /// Both may be bound side by side (overloads, class vs. object names).
    Coexist,
    /// The declaration refers to the existing symbol.
    Merge,
    Conflict,
    Redefinition,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    node_scopes: FxHashMap<NodeKey, ScopeId>,
    search_base_classes: bool,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// The global namespace; always the first scope.
    pub const GLOBAL: ScopeId = ScopeId(0);

    pub fn new() -> Self {
        let global = Scope::new(
            ScopeKind::Namespace {
                name: Encoding::new(),
                fragments: Vec::new(),
                using: Vec::new(),
            },
            None,
        );
        Self {
            scopes: vec![global],
            symbols: Vec::new(),
            node_scopes: FxHashMap::default(),
            search_base_classes: true,
        }
    }

    /// Whether unqualified lookup from a class scope visits its bases
    /// before the enclosing scope.
    pub fn search_base_classes(&self) -> bool {
        self.search_base_classes
    }

    pub fn set_search_base_classes(&mut self, enabled: bool) {
        self.search_base_classes = enabled;
    }

    // ========================================================================
    // Access
    // ========================================================================

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub(crate) fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn get_symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(i, s)| (ScopeId(i as u32), s))
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(i as u32), s))
    }

    /// Scope created for a parse-tree node by a previous binding pass.
    pub fn find_scope(&self, node: NodeKey) -> Option<ScopeId> {
        self.node_scopes.get(&node).copied()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    pub fn create_scope(&mut self, kind: ScopeKind, outer: Option<ScopeId>, node: Option<NodeKey>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(kind, outer));
        if let Some(outer) = outer {
            self.scopes[outer.index()].nested.push(id);
        }
        if let Some(node) = node {
            self.node_scopes.insert(node, id);
        }
        tracing::debug!(scope = %id, outer = ?outer, "created scope");
        id
    }

    pub fn set_node_scope(&mut self, node: NodeKey, scope: ScopeId) {
        self.node_scopes.insert(node, scope);
    }

    /// Bind `symbol` in `scope`, applying the redeclaration rules.
    ///
    /// Returns the new symbol, or the existing one the declaration merged
    /// into (a namespace reopening, a prototype followed by its definition,
    /// a forward class declaration followed by the class body, ...).
    pub fn declare(&mut self, scope: ScopeId, symbol: Symbol) -> Result<SymbolId, Redeclaration> {
        let existing = self.scope(scope).symbols_named(&symbol.name).to_vec();
        if let Some(&previous) = existing
            .iter()
            .find(|&&id| self.symbol(id).declarations.contains(&symbol.node))
        {
            return Err(Redeclaration {
                previous,
                redefinition: false,
            });
        }
        for &id in &existing {
            match self.compatibility(id, &symbol) {
                Compatibility::Coexist => continue,
                Compatibility::Merge => {
                    self.merge(id, symbol);
                    return Ok(id);
                }
                Compatibility::Conflict => {
                    return Err(Redeclaration {
                        previous: id,
                        redefinition: false,
                    })
                }
                Compatibility::Redefinition => {
                    return Err(Redeclaration {
                        previous: id,
                        redefinition: true,
                    })
                }
            }
        }
        tracing::trace!(name = %symbol.name.unmangled(), kind = %symbol.kind, scope = %scope, "declare");
        Ok(self.add_symbol(scope, symbol))
    }

    /// Append a symbol without any redeclaration check.
    pub fn add_symbol(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        let name = symbol.name.clone();
        self.symbols.push(symbol);
        self.scopes[scope.index()].bind(name, id);
        id
    }

    /// Make an existing symbol visible under `name` in `scope`, as a
    /// using-declaration does. Returns false when it is already visible
    /// there.
    pub fn alias(&mut self, scope: ScopeId, name: Encoding, id: SymbolId) -> bool {
        self.scopes[scope.index()].bind(name, id)
    }

    /// Record a using-directive nominating `target` in `scope`.
    pub fn add_using(&mut self, scope: ScopeId, target: ScopeId) -> bool {
        self.scopes[scope.index()].add_using(target)
    }

    /// Record `base` as a direct base of the class scope `class`.
    pub fn add_base(&mut self, class: ScopeId, base: ScopeId) -> bool {
        if class == base {
            return false;
        }
        match &mut self.scopes[class.index()].kind {
            ScopeKind::Class { bases, .. } if !bases.contains(&base) => {
                bases.push(base);
                true
            }
            _ => false,
        }
    }

    /// Note another `namespace` block that reopens `namespace`.
    pub(crate) fn add_fragment(&mut self, namespace: ScopeId, node: NodeKey) {
        if let ScopeKind::Namespace { fragments, .. } = &mut self.scopes[namespace.index()].kind {
            if !fragments.contains(&node) {
                fragments.push(node);
            }
        }
    }

    /// Move `scope` under a new enclosing scope.
    pub(crate) fn reparent(&mut self, scope: ScopeId, outer: ScopeId) {
        let previous = self.scopes[scope.index()].outer;
        if previous == Some(outer) || scope == outer {
            return;
        }
        if let Some(previous) = previous {
            self.scopes[previous.index()].nested.retain(|&id| id != scope);
        }
        self.scopes[scope.index()].outer = Some(outer);
        self.scopes[outer.index()].nested.push(scope);
    }

    fn compatibility(&self, id: SymbolId, new: &Symbol) -> Compatibility {
        use SymbolKind::*;
        let old = self.symbol(id);
        let same_type = old.type_encoding == new.type_encoding;
        let definitions = |a: bool, b: bool| {
            if a && b {
                Compatibility::Redefinition
            } else {
                Compatibility::Merge
            }
        };
        match (&old.kind, &new.kind) {
            (Namespace, Namespace) => Compatibility::Merge,
            (Function { defined: a, .. }, Function { defined: b, .. })
            | (FunctionTemplate { defined: a, .. }, FunctionTemplate { defined: b, .. }) => {
                if same_type {
                    definitions(*a, *b)
                } else {
                    Compatibility::Coexist
                }
            }
            (Function { .. }, FunctionTemplate { .. }) | (FunctionTemplate { .. }, Function { .. }) => {
                Compatibility::Coexist
            }
            (Class { defined: a }, Class { defined: b })
            | (ClassTemplate { defined: a }, ClassTemplate { defined: b }) => definitions(*a, *b),
            (Enum, Enum) => Compatibility::Redefinition,
            (Typedef { .. }, Typedef { .. }) if same_type => Compatibility::Merge,
            (Class { .. } | Enum | ClassTemplate { .. }, Typedef { aliased: Some(target) }) if *target == id => {
                Compatibility::Merge
            }
            (Variable { defined: a }, Variable { defined: b }) if same_type => definitions(*a, *b),
            (Variable { defined: false }, Const { .. }) | (Const { .. }, Variable { defined: false })
                if same_type =>
            {
                Compatibility::Merge
            }
            (Class { .. } | Enum | ClassTemplate { .. }, kind) if kind.is_value() || kind.is_function() => {
                Compatibility::Coexist
            }
            (kind, Class { .. } | Enum | ClassTemplate { .. }) if kind.is_value() || kind.is_function() => {
                Compatibility::Coexist
            }
            _ => Compatibility::Conflict,
        }
    }

    fn merge(&mut self, id: SymbolId, new: Symbol) {
        use SymbolKind::*;
        let symbol = self.symbol_mut(id);
        symbol.declarations.push(new.node);
        let becomes_definition = new.is_defined() && !symbol.is_defined();
        let becomes_const = matches!((&symbol.kind, &new.kind), (Variable { .. }, Const { .. }));
        if becomes_const {
            symbol.kind = new.kind;
        } else {
            match (&mut symbol.kind, new.kind) {
                (Variable { defined }, Variable { defined: d })
                | (Class { defined }, Class { defined: d })
                | (ClassTemplate { defined }, ClassTemplate { defined: d }) => *defined |= d,
                (
                    Function {
                        default_args,
                        defined,
                        ..
                    },
                    Function {
                        default_args: n,
                        defined: d,
                        ..
                    },
                )
                | (
                    FunctionTemplate {
                        default_args,
                        defined,
                        ..
                    },
                    FunctionTemplate {
                        default_args: n,
                        defined: d,
                        ..
                    },
                ) => {
                    *default_args = (*default_args).max(n);
                    *defined |= d;
                }
                _ => {}
            }
        }
        if becomes_definition {
            symbol.node = new.node;
            symbol.span = new.span;
        }
        tracing::trace!(symbol = %id, "merged declaration");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Follow typedef chains to the aliased class, enum, or template.
    pub fn resolve_typedef(&self, id: SymbolId) -> SymbolId {
        let mut current = id;
        for _ in 0..self.symbols.len() {
            match self.symbol(current).kind {
                SymbolKind::Typedef { aliased: Some(next) } if next != current => current = next,
                _ => break,
            }
        }
        current
    }

    /// Names of the enclosing namespaces and classes of `scope`, outermost
    /// first.
    pub fn scope_path(&self, scope: ScopeId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            match &s.kind {
                ScopeKind::Namespace { name, .. } | ScopeKind::Class { name, .. } | ScopeKind::Function { name, .. }
                    if !name.is_empty() =>
                {
                    path.push(name.unmangled());
                }
                _ => {}
            }
            current = s.outer;
        }
        path.reverse();
        path
    }

    /// `A::B::name` spelling of a symbol.
    pub fn qualified_name(&self, id: SymbolId) -> String {
        let symbol = self.symbol(id);
        let mut path = self.scope_path(symbol.scope);
        path.push(symbol.name_text());
        path.join("::")
    }

    // ========================================================================
    // Dumping
    // ========================================================================

    /// Write `scope` and its symbols, then each enclosing scope in turn.
    pub fn dump(&self, scope: ScopeId, sink: &mut impl fmt::Write) -> fmt::Result {
        let mut current = Some(scope);
        while let Some(id) = current {
            self.dump_scope(id, sink)?;
            current = self.scope(id).outer;
        }
        Ok(())
    }

    /// Write every scope of the table in creation order.
    pub fn dump_all(&self, sink: &mut impl fmt::Write) -> fmt::Result {
        for (id, _) in self.scopes() {
            self.dump_scope(id, sink)?;
        }
        Ok(())
    }

    fn dump_scope(&self, id: ScopeId, sink: &mut impl fmt::Write) -> fmt::Result {
        let scope = self.scope(id);
        write!(sink, "{} {}", id, scope.describe())?;
        if let Some(outer) = scope.outer {
            write!(sink, " (in {})", outer)?;
        }
        writeln!(sink)?;
        for &used in scope.using() {
            writeln!(sink, "  using {}", self.scope(used).describe())?;
        }
        for &base in scope.bases() {
            writeln!(sink, "  base {}", self.scope(base).describe())?;
        }
        for (name, ids) in scope.iter() {
            for &symbol_id in ids {
                let symbol = self.symbol(symbol_id);
                write!(sink, "  {}: {}", name.unmangled(), symbol.kind)?;
                if !symbol.type_encoding.is_empty() && !symbol.is_type_name() {
                    write!(sink, " `{}`", symbol.type_encoding.unmangled())?;
                }
                if let Some(value) = symbol.kind.constant_value() {
                    write!(sink, " = {}", value)?;
                }
                if symbol.scope != id {
                    write!(sink, " (from {})", symbol.scope)?;
                }
                writeln!(sink)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;
    use cxxscope_ptree::{NodeFactory, TokenKind};

    fn function(name: &str, ty: &str, defined: bool, node: NodeKey) -> Symbol {
        Symbol::new(
            Encoding::simple_name(name),
            SymbolKind::Function {
                params: 0,
                default_args: 0,
                ellipsis: false,
                defined,
            },
            Encoding::from_bytes(ty.as_bytes()),
            SymbolTable::GLOBAL,
            node,
            None,
        )
    }

    #[test]
    fn test_prototype_then_definition_merges() {
        let arena = Bump::new();
        let factory = NodeFactory::new(&arena);
        let key = |pos| factory.atom(TokenKind::Identifier, "f", pos).key();

        let mut table = SymbolTable::new();
        let proto = table.declare(SymbolTable::GLOBAL, function("f", "Fv_i", false, key(0))).unwrap();
        let def = table.declare(SymbolTable::GLOBAL, function("f", "Fv_i", true, key(1))).unwrap();
        assert_eq!(proto, def);
        assert!(table.symbol(def).is_defined());
        assert_eq!(table.symbol(def).declarations.len(), 2);

        let again = table.declare(SymbolTable::GLOBAL, function("f", "Fv_i", true, key(2)));
        assert!(again.unwrap_err().redefinition);
    }

    #[test]
    fn test_overloads_coexist() {
        let arena = Bump::new();
        let factory = NodeFactory::new(&arena);
        let key = |pos| factory.atom(TokenKind::Identifier, "f", pos).key();

        let mut table = SymbolTable::new();
        table.declare(SymbolTable::GLOBAL, function("f", "Fv_i", false, key(0))).unwrap();
        table.declare(SymbolTable::GLOBAL, function("f", "Fi_i", false, key(1))).unwrap();
        let name = Encoding::simple_name("f");
        assert_eq!(table.scope(SymbolTable::GLOBAL).symbols_named(&name).len(), 2);
    }

    #[test]
    fn test_same_node_is_always_a_redeclaration() {
        let arena = Bump::new();
        let node = NodeFactory::new(&arena).atom(TokenKind::Identifier, "f", 0).key();

        let mut table = SymbolTable::new();
        let first = table.declare(SymbolTable::GLOBAL, function("f", "Fv_i", false, node)).unwrap();
        let second = table.declare(SymbolTable::GLOBAL, function("f", "Fv_i", false, node));
        assert_eq!(
            second,
            Err(Redeclaration {
                previous: first,
                redefinition: false
            })
        );
        assert_eq!(table.symbol_count(), 1);
    }
}
