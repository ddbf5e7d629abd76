//! cxxscope_symbols: scopes, symbols, and name lookup.
//!
//! The binder walks a parse tree and fills a [`SymbolTable`]: one scope per
//! namespace, class, function, prototype, block, and template parameter
//! list, each holding the symbols declared in it. Lookup then answers what a
//! name means from any of those scopes, following using-directives and base
//! classes.

mod binder;
mod const_eval;
mod lookup;
mod scope;
mod symbol;
mod table;

pub use binder::{bind_tree, BindOptions, Binder, ShapeError};
pub use const_eval::{evaluate_const, size_of, ConstEvaluator};
pub use lookup::{candidate_list, lookup_key, LookupContext, LookupError, Resolution, SymbolSet};
pub use scope::{Scope, ScopeKind};
pub use symbol::{Symbol, SymbolKind};
pub use table::{Redeclaration, SymbolTable};
