//! cxxscope_analysis: expression types, overload resolution, and the
//! resolution pass over a bound tree.

mod overload;
mod type_eval;
mod walker;

pub use overload::{resolve_funcall, OverloadError, Rank};
pub use type_eval::{type_of, TypeEvaluator};
pub use walker::{walk_tree, Reference, WalkOptions, WalkOutput, Walker};
