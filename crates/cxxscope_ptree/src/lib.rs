//! cxxscope_ptree: the concrete parse tree.
//!
//! Nodes are cons-style lists of atoms allocated in a per-unit arena.
//! Declarators, names, and class/enum specifiers carry mangled
//! [`Encoding`]s computed by the parser, which the symbol table uses as keys.

pub mod encoding;
pub mod kind;
pub mod node;
pub mod ops;
pub mod types;

pub use encoding::Encoding;
pub use kind::{keyword_kind, ListKind, TokenKind};
pub use node::{Atom, List, Node, NodeFactory, NodeKey};
pub use types::{ScopeId, SymbolId};
