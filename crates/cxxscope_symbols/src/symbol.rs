//! Symbol definitions.

use cxxscope_core::text::TextSpan;
use cxxscope_ptree::{Encoding, NodeKey, ScopeId, SymbolId};
use std::fmt;

/// What a symbol names, with the facts the redeclaration rules and the
/// evaluators need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Variable {
        defined: bool,
    },
    /// A const-qualified integral variable with a constant initializer.
    Const {
        value: Option<i64>,
    },
    Enumerator {
        value: Option<i64>,
    },
    Class {
        defined: bool,
    },
    Enum,
    Typedef {
        aliased: Option<SymbolId>,
    },
    TypeParameter,
    Function {
        params: usize,
        default_args: usize,
        ellipsis: bool,
        defined: bool,
    },
    FunctionTemplate {
        params: usize,
        default_args: usize,
        ellipsis: bool,
        defined: bool,
    },
    ClassTemplate {
        defined: bool,
    },
    Namespace,
}

impl SymbolKind {
    pub fn is_type_name(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class { .. }
                | SymbolKind::Enum
                | SymbolKind::Typedef { .. }
                | SymbolKind::TypeParameter
                | SymbolKind::ClassTemplate { .. }
        )
    }

    pub fn is_function(&self) -> bool {
        matches!(self, SymbolKind::Function { .. } | SymbolKind::FunctionTemplate { .. })
    }

    /// Kinds that are invisible to a lookup for a nested-name-specifier.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            SymbolKind::Variable { .. }
                | SymbolKind::Const { .. }
                | SymbolKind::Enumerator { .. }
                | SymbolKind::Function { .. }
        )
    }

    /// Arity facts of a function or function template.
    pub fn signature(&self) -> Option<(usize, usize, bool)> {
        match *self {
            SymbolKind::Function {
                params,
                default_args,
                ellipsis,
                ..
            }
            | SymbolKind::FunctionTemplate {
                params,
                default_args,
                ellipsis,
                ..
            } => Some((params, default_args, ellipsis)),
            _ => None,
        }
    }

    /// Integral value of a constant or enumerator.
    pub fn constant_value(&self) -> Option<i64> {
        match *self {
            SymbolKind::Const { value } | SymbolKind::Enumerator { value } => value,
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SymbolKind::Variable { .. } => "variable",
            SymbolKind::Const { .. } => "constant",
            SymbolKind::Enumerator { .. } => "enumerator",
            SymbolKind::Class { .. } => "class",
            SymbolKind::Enum => "enum",
            SymbolKind::Typedef { .. } => "typedef",
            SymbolKind::TypeParameter => "type parameter",
            SymbolKind::Function { .. } => "function",
            SymbolKind::FunctionTemplate { .. } => "function template",
            SymbolKind::ClassTemplate { .. } => "class template",
            SymbolKind::Namespace => "namespace",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A named entity declared in a scope.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Name as declared in its scope: a simple name, or a template-id for
    /// specializations.
    pub name: Encoding,
    pub kind: SymbolKind,
    /// Declared type. Classes and enums use their own name.
    pub type_encoding: Encoding,
    /// The declaring scope.
    pub scope: ScopeId,
    /// The defining declaration when there is one, otherwise the first.
    pub node: NodeKey,
    pub span: Option<TextSpan>,
    /// Every declaration node merged into this symbol.
    pub declarations: Vec<NodeKey>,
    /// Scope introduced by a namespace, class, function, or template.
    pub defines: Option<ScopeId>,
}

impl Symbol {
    pub fn new(
        name: Encoding,
        kind: SymbolKind,
        type_encoding: Encoding,
        scope: ScopeId,
        node: NodeKey,
        span: Option<TextSpan>,
    ) -> Self {
        Self {
            name,
            kind,
            type_encoding,
            scope,
            node,
            span,
            declarations: vec![node],
            defines: None,
        }
    }

    /// Source-like spelling of the name.
    pub fn name_text(&self) -> String {
        match self.name.identifier() {
            Some(text) => text.to_string(),
            None => self.name.unmangled(),
        }
    }

    /// Whether this declaration is a definition.
    pub fn is_defined(&self) -> bool {
        match self.kind {
            SymbolKind::Variable { defined }
            | SymbolKind::Class { defined }
            | SymbolKind::ClassTemplate { defined }
            | SymbolKind::Function { defined, .. }
            | SymbolKind::FunctionTemplate { defined, .. } => defined,
            _ => true,
        }
    }

    pub fn is_type_name(&self) -> bool {
        self.kind.is_type_name()
    }

    pub fn is_function(&self) -> bool {
        self.kind.is_function()
    }
}
