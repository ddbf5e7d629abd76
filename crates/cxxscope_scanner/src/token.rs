//! Tokens and the buffered token stream.

use crate::scanner::Scanner;
use cxxscope_core::text::{TextPos, TextSpan};
use cxxscope_diagnostics::DiagnosticCollection;
use cxxscope_ptree::TokenKind;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub pos: TextPos,
}

impl<'a> Token<'a> {
    #[inline]
    pub fn end(&self) -> TextPos {
        self.pos + self.text.len() as TextPos
    }

    #[inline]
    pub fn span(&self) -> TextSpan {
        TextSpan::new(self.pos, self.text.len() as TextPos)
    }

    #[inline]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Pull-style access to the scanner with unbounded lookahead.
pub struct TokenStream<'a> {
    scanner: Scanner<'a>,
    buffer: VecDeque<Token<'a>>,
}

impl<'a> TokenStream<'a> {
    pub fn new(scanner: Scanner<'a>) -> Self {
        Self {
            scanner,
            buffer: VecDeque::new(),
        }
    }

    /// The `n`-th token ahead of the cursor (0 is the next token).
    /// Past the end every lookahead yields `EndOfFile`.
    pub fn look_ahead(&mut self, n: usize) -> Token<'a> {
        while self.buffer.len() <= n {
            let token = self.scanner.scan();
            self.buffer.push_back(token);
        }
        self.buffer[n]
    }

    #[inline]
    pub fn peek(&mut self) -> Token<'a> {
        self.look_ahead(0)
    }

    #[inline]
    pub fn peek_kind(&mut self, n: usize) -> TokenKind {
        self.look_ahead(n).kind
    }

    /// Consume the next token.
    pub fn get(&mut self) -> Token<'a> {
        let token = self.peek();
        if token.kind != TokenKind::EndOfFile {
            self.buffer.pop_front();
        }
        token
    }

    /// Split a leading `>>` into two `>` tokens, for closing nested template
    /// argument lists.
    pub fn split_shift(&mut self) {
        let token = self.peek();
        if token.kind == TokenKind::GreaterGreater {
            self.buffer[0] = Token {
                kind: TokenKind::Greater,
                text: &token.text[..1],
                pos: token.pos,
            };
            self.buffer.insert(
                1,
                Token {
                    kind: TokenKind::Greater,
                    text: &token.text[1..],
                    pos: token.pos + 1,
                },
            );
        }
    }

    pub fn source(&self) -> &'a str {
        self.scanner.source()
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticCollection {
        self.scanner.take_diagnostics()
    }
}
