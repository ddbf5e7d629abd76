//! Scope records.
//!
//! Every declarative region is one [`Scope`] in the table's arena. The
//! region-specific data lives in [`ScopeKind`]; the outer link is a handle,
//! so the hierarchy has no ownership cycles.

use cxxscope_ptree::{Encoding, NodeKey, ScopeId, SymbolId};
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub enum ScopeKind {
    /// A namespace, including the global one. Reopened namespaces add
    /// fragments instead of new scopes.
    Namespace {
        name: Encoding,
        fragments: Vec<NodeKey>,
        using: Vec<ScopeId>,
    },
    Class {
        name: Encoding,
        spec: NodeKey,
        bases: Vec<ScopeId>,
    },
    /// A function body. Its outermost block shares this scope.
    Function {
        name: Encoding,
        decl: NodeKey,
        parameters: Option<ScopeId>,
        using: Vec<ScopeId>,
    },
    /// Parameters of a function declarator.
    Prototype { decl: NodeKey },
    /// A nested block or `for` statement.
    Local { block: NodeKey, using: Vec<ScopeId> },
    TemplateParameters { decl: NodeKey },
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub outer: Option<ScopeId>,
    /// Scopes whose `outer` is this one, in creation order.
    pub nested: Vec<ScopeId>,
    symbols: IndexMap<Encoding, Vec<SymbolId>>,
}

impl Scope {
    pub fn new(kind: ScopeKind, outer: Option<ScopeId>) -> Self {
        Self {
            kind,
            outer,
            nested: Vec::new(),
            symbols: IndexMap::new(),
        }
    }

    /// Declared name of the region; empty for blocks, prototypes, and
    /// template parameter lists.
    pub fn name(&self) -> Encoding {
        match &self.kind {
            ScopeKind::Namespace { name, .. }
            | ScopeKind::Class { name, .. }
            | ScopeKind::Function { name, .. } => name.clone(),
            _ => Encoding::new(),
        }
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.kind, ScopeKind::Namespace { .. })
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, ScopeKind::Class { .. })
    }

    /// Namespaces nominated by using-directives in this scope.
    pub fn using(&self) -> &[ScopeId] {
        match &self.kind {
            ScopeKind::Namespace { using, .. }
            | ScopeKind::Function { using, .. }
            | ScopeKind::Local { using, .. } => using,
            _ => &[],
        }
    }

    /// Record a using-directive. Returns false when the scope kind cannot
    /// hold one (classes, prototypes, template parameter lists).
    pub(crate) fn add_using(&mut self, target: ScopeId) -> bool {
        match &mut self.kind {
            ScopeKind::Namespace { using, .. }
            | ScopeKind::Function { using, .. }
            | ScopeKind::Local { using, .. } => {
                if !using.contains(&target) {
                    using.push(target);
                }
                true
            }
            _ => false,
        }
    }

    pub fn bases(&self) -> &[ScopeId] {
        match &self.kind {
            ScopeKind::Class { bases, .. } => bases,
            _ => &[],
        }
    }

    /// All symbols bound to `name` in this scope's own table.
    pub fn symbols_named(&self, name: &Encoding) -> &[SymbolId] {
        self.symbols.get(name).map_or(&[], Vec::as_slice)
    }

    /// Bound names in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Encoding, &[SymbolId])> {
        self.symbols.iter().map(|(name, ids)| (name, ids.as_slice()))
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.values().map(Vec::len).sum()
    }

    /// Bind `id` under `name`. A handle already bound to the name is not
    /// added again.
    pub(crate) fn bind(&mut self, name: Encoding, id: SymbolId) -> bool {
        let ids = self.symbols.entry(name).or_default();
        if ids.contains(&id) {
            return false;
        }
        ids.push(id);
        true
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            ScopeKind::Namespace { name, .. } if name.is_empty() => "global namespace".to_string(),
            ScopeKind::Namespace { name, .. } => format!("namespace {}", name.unmangled()),
            ScopeKind::Class { name, .. } => format!("class {}", name.unmangled()),
            ScopeKind::Function { name, .. } => format!("function {}", name.unmangled()),
            ScopeKind::Prototype { .. } => "prototype".to_string(),
            ScopeKind::Local { .. } => "block".to_string(),
            ScopeKind::TemplateParameters { .. } => "template parameters".to_string(),
        }
    }
}
