//! cxxscope_scanner: C++ lexer.
//!
//! Turns source text into [`Token`]s whose text borrows from the source
//! buffer. Whitespace, comments, and preprocessor lines are skipped. The
//! parser pulls tokens through [`TokenStream`], which buffers as far ahead as
//! the parser asks.

mod scanner;
mod token;

pub use scanner::{tokenize, Scanner};
pub use token::{Token, TokenStream};
