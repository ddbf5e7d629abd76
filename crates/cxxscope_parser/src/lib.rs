//! cxxscope_parser: recursive descent parser for a C++ subset.
//!
//! Builds the cons-cell parse tree from the scanner's token stream and
//! annotates declarators, names, and class/enum specifiers with their
//! encoded names and types.

mod parser;
mod precedence;

pub use parser::{parse, ParseError, ParseOutput, Parser, ParserOptions};
