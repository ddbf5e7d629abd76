//! Name lookup.
//!
//! Lookup runs against a populated [`SymbolTable`] and never mutates it.
//! [`SymbolTable::find`] applies the hiding rules to one scope's own table;
//! the unqualified and qualified algorithms decide which scopes to visit and
//! in what order; [`SymbolTable::lookup`] walks the components of a
//! qualified name.

use crate::scope::ScopeKind;
use crate::symbol::SymbolKind;
use crate::table::SymbolTable;
use bitflags::bitflags;
use cxxscope_core::text::TextSpan;
use cxxscope_diagnostics::{messages, Diagnostic};
use cxxscope_ptree::{Encoding, ScopeId, SymbolId};
use indexmap::IndexSet;
use rustc_hash::FxHashSet;

bitflags! {
    /// What kind of name a lookup is for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LookupContext: u8 {
        /// A nested-name-specifier (`X` in `X::y`): objects, enumerators,
        /// and functions are ignored.
        const SCOPE = 1 << 0;
        /// Searching a namespace nominated by a using-directive.
        const USING = 1 << 1;
        /// An elaborated type specifier (`struct X`): only classes and enums.
        const ELABORATED = 1 << 2;
        /// Only type names.
        const TYPE = 1 << 3;
        /// The declarator-id of a declaration; qualified lookup of a simple
        /// name does not look through using-directives.
        const DECLARATION = 1 << 4;
    }
}

impl LookupContext {
    pub const DEFAULT: LookupContext = LookupContext::empty();
}

// ============================================================================
// Results
// ============================================================================

/// Symbols found by a lookup, without duplicates, in the order found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSet {
    ids: IndexSet<SymbolId>,
    dependent: bool,
}

impl SymbolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The result of looking into a template type parameter.
    pub fn dependent() -> Self {
        Self {
            ids: IndexSet::new(),
            dependent: true,
        }
    }

    pub fn insert(&mut self, id: SymbolId) -> bool {
        self.ids.insert(id)
    }

    pub fn extend(&mut self, other: SymbolSet) {
        self.dependent |= other.dependent;
        self.ids.extend(other.ids);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && !self.dependent
    }

    pub fn is_dependent(&self) -> bool {
        self.dependent
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.ids.iter().copied()
    }

    pub fn first(&self) -> Option<SymbolId> {
        self.ids.first().copied()
    }

    /// The only symbol, if there is exactly one.
    pub fn single(&self) -> Option<SymbolId> {
        if self.ids.len() == 1 {
            self.first()
        } else {
            None
        }
    }

    pub fn to_vec(&self) -> Vec<SymbolId> {
        self.ids.iter().copied().collect()
    }

    fn retain(&mut self, mut keep: impl FnMut(SymbolId) -> bool) {
        self.ids.retain(|&id| keep(id));
    }
}

impl FromIterator<SymbolId> for SymbolSet {
    fn from_iter<I: IntoIterator<Item = SymbolId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
            dependent: false,
        }
    }
}

/// Classification of a [`SymbolSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    Resolved(SymbolId),
    /// Several functions; overload resolution picks one.
    Overloaded(Vec<SymbolId>),
    /// Several declarations that are not all functions.
    Ambiguous(Vec<SymbolId>),
    /// Named through a template type parameter.
    Dependent,
}

impl Resolution {
    pub fn classify(table: &SymbolTable, set: &SymbolSet) -> Resolution {
        if set.is_dependent() {
            return Resolution::Dependent;
        }
        match set.len() {
            0 => Resolution::Unresolved,
            1 => set.first().map_or(Resolution::Unresolved, Resolution::Resolved),
            _ if set.iter().all(|id| table.symbol(id).is_function()) => Resolution::Overloaded(set.to_vec()),
            _ => Resolution::Ambiguous(set.to_vec()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_) | Resolution::Overloaded(_))
    }
}

/// Failure while walking the components of a qualified name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum LookupError {
    #[error("'{name}' is not declared")]
    #[diagnostic(code(cxxscope::lookup::undefined))]
    Undefined { name: String },

    #[error("'{name}' is not a namespace or class")]
    #[diagnostic(code(cxxscope::lookup::not_a_scope))]
    NotAScope { name: String },

    #[error("reference to '{name}' is ambiguous")]
    #[diagnostic(code(cxxscope::lookup::ambiguous))]
    Ambiguous { name: String, candidates: Vec<SymbolId> },
}

impl LookupError {
    pub fn name(&self) -> &str {
        match self {
            LookupError::Undefined { name }
            | LookupError::NotAScope { name }
            | LookupError::Ambiguous { name, .. } => name,
        }
    }

    /// The catalogue diagnostic for this error at `span`.
    pub fn to_diagnostic(&self, table: &SymbolTable, file: &str, span: Option<TextSpan>) -> Diagnostic {
        let mut diagnostic = match self {
            LookupError::Undefined { name } => Diagnostic::new(&messages::CANNOT_FIND_NAME_0, &[name]),
            LookupError::NotAScope { name } => {
                Diagnostic::new(&messages::_0_IS_NOT_A_NAMESPACE_OR_CLASS, &[name])
            }
            LookupError::Ambiguous { name, candidates } => Diagnostic::new(
                &messages::REFERENCE_TO_0_IS_AMBIGUOUS,
                &[name, &candidate_list(table, candidates)],
            ),
        };
        diagnostic.file = Some(file.to_string());
        diagnostic.span = span;
        diagnostic
    }
}

/// `A::y, B::y` for a diagnostic.
pub fn candidate_list(table: &SymbolTable, candidates: &[SymbolId]) -> String {
    candidates
        .iter()
        .map(|&id| table.qualified_name(id))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where a nested-name-specifier component leads.
enum Step {
    Scope(ScopeId),
    Dependent,
}

// ============================================================================
// Algorithms
// ============================================================================

impl SymbolTable {
    /// Symbols bound to `name` in `scope` itself, after the hiding rules
    /// for `context`.
    pub fn find(&self, scope: ScopeId, name: &Encoding, context: LookupContext) -> SymbolSet {
        let mut set: SymbolSet = self.scope(scope).symbols_named(name).iter().copied().collect();
        if context.contains(LookupContext::SCOPE) {
            set.retain(|id| !self.symbol(id).kind.is_value());
        } else if context.contains(LookupContext::ELABORATED) {
            set.retain(|id| matches!(self.symbol(id).kind, SymbolKind::Class { .. } | SymbolKind::Enum));
        } else if context.contains(LookupContext::TYPE) {
            set.retain(|id| self.symbol(id).is_type_name());
        } else if set.iter().any(|id| !self.symbol(id).is_type_name()) {
            set.retain(|id| !self.symbol(id).is_type_name());
        }
        set
    }

    /// Unqualified lookup of a simple name starting at `scope`.
    pub fn lookup_unqualified(&self, scope: ScopeId, name: &Encoding, context: LookupContext) -> SymbolSet {
        let mut searched = FxHashSet::default();
        self.unqualified(scope, name, context, &mut searched)
    }

    fn unqualified(
        &self,
        scope: ScopeId,
        name: &Encoding,
        context: LookupContext,
        searched: &mut FxHashSet<ScopeId>,
    ) -> SymbolSet {
        let s = self.scope(scope);
        tracing::trace!(name = %name.unmangled(), scope = %scope, ?context, "unqualified lookup");
        let mut set = match &s.kind {
            ScopeKind::Namespace { .. } => {
                searched.insert(scope);
                let mut set = self.find(scope, name, context);
                if set.is_empty() {
                    set = self.through_using(s.using(), name, context, searched);
                }
                let stop = !set.is_empty()
                    || context.contains(LookupContext::USING)
                    || s.outer.map_or(true, |outer| searched.contains(&outer));
                if stop {
                    return set;
                }
                set
            }
            ScopeKind::Function { parameters, .. } => {
                let mut set = self.find(scope, name, context);
                if set.is_empty() {
                    if let Some(parameters) = parameters {
                        set = self.find(*parameters, name, context);
                    }
                }
                if set.is_empty() {
                    set = self.through_using(s.using(), name, context, searched);
                }
                set
            }
            ScopeKind::Local { .. } => {
                let mut set = self.find(scope, name, context);
                if set.is_empty() {
                    set = self.through_using(s.using(), name, context, searched);
                }
                set
            }
            ScopeKind::Class { .. } => {
                let mut set = self.find(scope, name, context);
                if set.is_empty() && self.search_base_classes() {
                    let mut visited = FxHashSet::default();
                    visited.insert(scope);
                    for &base in s.bases() {
                        set.extend(self.class_members(base, name, context, &mut visited));
                    }
                }
                set
            }
            ScopeKind::Prototype { .. } | ScopeKind::TemplateParameters { .. } => self.find(scope, name, context),
        };
        if set.is_empty() {
            if let Some(outer) = s.outer {
                set = self.unqualified(outer, name, context, searched);
            }
        }
        set
    }

    /// Unqualified lookup in each not yet searched nominated namespace.
    fn through_using(
        &self,
        using: &[ScopeId],
        name: &Encoding,
        context: LookupContext,
        searched: &mut FxHashSet<ScopeId>,
    ) -> SymbolSet {
        let mut set = SymbolSet::new();
        for &target in using {
            if !searched.contains(&target) {
                set.extend(self.unqualified(target, name, context | LookupContext::USING, searched));
            }
        }
        set
    }

    /// Members of a class and, when it has none of that name, of its bases.
    fn class_members(
        &self,
        scope: ScopeId,
        name: &Encoding,
        context: LookupContext,
        visited: &mut FxHashSet<ScopeId>,
    ) -> SymbolSet {
        if !visited.insert(scope) {
            return SymbolSet::new();
        }
        let mut set = self.find(scope, name, context);
        if set.is_empty() {
            for &base in self.scope(scope).bases() {
                set.extend(self.class_members(base, name, context, visited));
            }
        }
        set
    }

    /// Lookup of `name` as a member of `scope` (the part after `X::`).
    pub fn lookup_qualified(&self, scope: ScopeId, name: &Encoding, context: LookupContext) -> SymbolSet {
        let s = self.scope(scope);
        tracing::trace!(name = %name.unmangled(), scope = %scope, ?context, "qualified lookup");
        match &s.kind {
            ScopeKind::Namespace { .. } | ScopeKind::Function { .. } => {
                let set = self.find(scope, name, context);
                if !set.is_empty()
                    || (context.contains(LookupContext::DECLARATION) && name.is_simple_name())
                {
                    return set;
                }
                let mut visited = FxHashSet::default();
                visited.insert(scope);
                let mut set = SymbolSet::new();
                for &target in s.using() {
                    set.extend(self.nominated_members(target, name, context, &mut visited));
                }
                set
            }
            ScopeKind::Class { .. } => {
                let mut visited = FxHashSet::default();
                self.class_members(scope, name, context, &mut visited)
            }
            _ => self.find(scope, name, context),
        }
    }

    /// A namespace's own declarations of `name`, or when it has none, those
    /// of the namespaces it nominates in turn. Each namespace is visited once.
    fn nominated_members(
        &self,
        scope: ScopeId,
        name: &Encoding,
        context: LookupContext,
        visited: &mut FxHashSet<ScopeId>,
    ) -> SymbolSet {
        if !visited.insert(scope) {
            return SymbolSet::new();
        }
        let mut set = self.find(scope, name, context);
        if set.is_empty() {
            for &target in self.scope(scope).using() {
                set.extend(self.nominated_members(target, name, context, visited));
            }
        }
        set
    }

    /// Look up a simple or qualified name from `scope`.
    ///
    /// An empty set means the final component was not found. Errors are
    /// reserved for the components before it: each must name exactly one
    /// namespace, class, or class template.
    pub fn lookup(&self, name: &Encoding, scope: ScopeId, context: LookupContext) -> Result<SymbolSet, LookupError> {
        if !name.is_qualified() {
            return Ok(self.lookup_unqualified(scope, &lookup_key(name), context));
        }
        let components = name.names();
        let Some((last, prefix)) = components.split_last() else {
            return Ok(SymbolSet::new());
        };
        let mut current = scope;
        for (i, component) in prefix.iter().enumerate() {
            if i == 0 && component.is_global_scope() {
                current = SymbolTable::GLOBAL;
                continue;
            }
            let key = lookup_key(component);
            let set = if i == 0 {
                self.lookup_unqualified(current, &key, LookupContext::SCOPE)
            } else {
                self.lookup_qualified(current, &key, LookupContext::SCOPE)
            };
            match self.scope_of(&set, component)? {
                Step::Scope(next) => current = next,
                Step::Dependent => return Ok(SymbolSet::dependent()),
            }
        }
        Ok(self.lookup_qualified(current, &lookup_key(last), context))
    }

    /// The scope a name used as a nested-name-specifier denotes: `A::B` in
    /// `A::B::x`, a base class, or the target of a using-directive.
    /// `Ok(None)` for a name that depends on a template parameter.
    pub fn lookup_scope(&self, name: &Encoding, scope: ScopeId) -> Result<Option<ScopeId>, LookupError> {
        if name.is_global_scope() {
            return Ok(Some(SymbolTable::GLOBAL));
        }
        let set = self.lookup(name, scope, LookupContext::SCOPE)?;
        match self.scope_of(&set, &name.last_name())? {
            Step::Scope(target) => Ok(Some(target)),
            Step::Dependent => Ok(None),
        }
    }

    /// The scope a nested-name-specifier component denotes.
    fn scope_of(&self, set: &SymbolSet, component: &Encoding) -> Result<Step, LookupError> {
        let name = component.unmangled();
        if set.is_dependent() {
            return Ok(Step::Dependent);
        }
        let id = match set.len() {
            0 => return Err(LookupError::Undefined { name }),
            1 => set.first().ok_or_else(|| LookupError::Undefined { name: name.clone() })?,
            _ => {
                return Err(LookupError::Ambiguous {
                    name,
                    candidates: set.to_vec(),
                })
            }
        };
        let target = self.symbol(self.resolve_typedef(id));
        match target.kind {
            SymbolKind::TypeParameter => Ok(Step::Dependent),
            SymbolKind::Namespace | SymbolKind::Class { .. } | SymbolKind::ClassTemplate { .. } => {
                target.defines.map(Step::Scope).ok_or(LookupError::NotAScope { name })
            }
            _ => Err(LookupError::NotAScope { name }),
        }
    }
}

/// The key a name is bound under: template-ids are found through their
/// template name.
pub fn lookup_key(name: &Encoding) -> Encoding {
    if name.is_template_id() {
        name.get_template_name()
    } else {
        name.clone()
    }
}
