//! cxxscope_core: shared building blocks for the cxxscope pipeline.
//!
//! Provides the per-translation-unit arena and source positions used by
//! every later stage (scanner, parser, symbol table, analysis).

pub mod arena;
pub mod text;

pub use arena::UnitArena;
pub use text::{LineAndColumn, LineMap, TextPos, TextSpan};
