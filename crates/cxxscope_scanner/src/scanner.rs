//! The scanner proper.
//!
//! Works on bytes for the ASCII fast path and falls back to `char` decoding
//! only for non-ASCII identifier characters.

use crate::token::Token;
use cxxscope_core::text::{TextPos, TextSpan};
use cxxscope_diagnostics::{messages, Diagnostic, DiagnosticCollection, DiagnosticMessage};
use cxxscope_ptree::{keyword_kind, TokenKind};
use memchr::memmem;
use unicode_xid::UnicodeXID;

pub struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    file_name: &'a str,
    pos: usize,
    token_start: usize,
    /// Only whitespace seen since the last newline; a `#` here starts a
    /// preprocessor line.
    at_line_start: bool,
    cxx: bool,
    diagnostics: DiagnosticCollection,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str, file_name: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            file_name,
            pos: 0,
            token_start: 0,
            at_line_start: true,
            cxx: true,
            diagnostics: DiagnosticCollection::new(),
        }
    }

    /// In C mode the C++-only keywords scan as identifiers.
    pub fn with_cxx(mut self, cxx: bool) -> Self {
        self.cxx = cxx;
        self
    }

    pub fn source(&self) -> &'a str {
        self.text
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticCollection {
        std::mem::take(&mut self.diagnostics)
    }

    // ========================================================================
    // Character helpers
    // ========================================================================

    #[inline]
    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    #[inline]
    fn current_byte(&self) -> u8 {
        self.byte_at(self.pos)
    }

    #[inline]
    fn byte_at(&self, pos: usize) -> u8 {
        self.bytes.get(pos).copied().unwrap_or(0)
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        self.text.get(pos..).and_then(|s| s.chars().next())
    }

    fn error(&mut self, start: usize, end: usize, message: &DiagnosticMessage, args: &[&str]) {
        let span = TextSpan::from_bounds(start as TextPos, end as TextPos);
        self.diagnostics
            .add(Diagnostic::with_location(self.file_name, span, message, args));
    }

    fn make(&self, kind: TokenKind) -> Token<'a> {
        Token {
            kind,
            text: &self.text[self.token_start..self.pos],
            pos: self.token_start as TextPos,
        }
    }

    // ========================================================================
    // Main scan
    // ========================================================================

    pub fn scan(&mut self) -> Token<'a> {
        loop {
            self.skip_trivia();
            self.token_start = self.pos;
            if self.is_eof() {
                return self.make(TokenKind::EndOfFile);
            }
            self.at_line_start = false;

            let ch = self.current_byte();
            let kind = match ch {
                b'0'..=b'9' => self.scan_number(),
                b'.' if self.byte_at(self.pos + 1).is_ascii_digit() => self.scan_number(),
                b'"' => self.scan_string_literal(),
                b'\'' => self.scan_char_literal(),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => self.scan_identifier(),
                _ if ch >= 0x80 => {
                    match self.char_at(self.pos) {
                        Some(c) if c.is_xid_start() => self.scan_identifier(),
                        Some(c) => {
                            self.pos += c.len_utf8();
                            self.report_invalid_character(c);
                            continue;
                        }
                        None => {
                            self.pos += 1;
                            continue;
                        }
                    }
                }
                _ => match self.scan_punctuator() {
                    Some(kind) => kind,
                    None => {
                        let c = ch as char;
                        self.pos += 1;
                        self.report_invalid_character(c);
                        continue;
                    }
                },
            };
            return self.make(kind);
        }
    }

    fn report_invalid_character(&mut self, c: char) {
        let text = c.to_string();
        self.error(self.token_start, self.pos, &messages::INVALID_CHARACTER, &[&text]);
    }

    // ========================================================================
    // Trivia
    // ========================================================================

    fn skip_trivia(&mut self) {
        while !self.is_eof() {
            match self.current_byte() {
                b'\n' => {
                    self.pos += 1;
                    self.at_line_start = true;
                }
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.byte_at(self.pos + 1) == b'/' => {
                    self.pos = match memchr::memchr(b'\n', &self.bytes[self.pos..]) {
                        Some(offset) => self.pos + offset,
                        None => self.bytes.len(),
                    };
                }
                b'/' if self.byte_at(self.pos + 1) == b'*' => self.skip_block_comment(),
                b'#' if self.at_line_start => self.skip_preprocessor_line(),
                b'\\' if matches!(self.byte_at(self.pos + 1), b'\n' | b'\r') => {
                    self.pos += 1;
                }
                _ => return,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let start = self.pos;
        let body = self.pos + 2;
        match memmem::find(&self.bytes[body..], b"*/") {
            Some(offset) => {
                if memchr::memchr(b'\n', &self.bytes[body..body + offset]).is_some() {
                    self.at_line_start = true;
                }
                self.pos = body + offset + 2;
            }
            None => {
                self.pos = self.bytes.len();
                self.error(start, self.pos, &messages::UNTERMINATED_COMMENT, &[]);
            }
        }
    }

    /// Skip a `#` line, honoring backslash continuations.
    fn skip_preprocessor_line(&mut self) {
        while !self.is_eof() {
            match memchr::memchr(b'\n', &self.bytes[self.pos..]) {
                Some(offset) => {
                    let newline = self.pos + offset;
                    let continued = self.bytes[self.pos..newline]
                        .iter()
                        .rev()
                        .find(|&&b| b != b'\r')
                        == Some(&b'\\');
                    self.pos = newline + 1;
                    if !continued {
                        self.at_line_start = true;
                        return;
                    }
                }
                None => self.pos = self.bytes.len(),
            }
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn scan_number(&mut self) -> TokenKind {
        let mut is_float = false;
        if self.current_byte() == b'0' && matches!(self.byte_at(self.pos + 1), b'x' | b'X') {
            self.pos += 2;
            while self.current_byte().is_ascii_hexdigit() {
                self.pos += 1;
            }
        } else {
            self.skip_digits();
            if self.current_byte() == b'.' {
                is_float = true;
                self.pos += 1;
                self.skip_digits();
            }
            if matches!(self.current_byte(), b'e' | b'E') {
                let sign = matches!(self.byte_at(self.pos + 1), b'+' | b'-') as usize;
                if self.byte_at(self.pos + 1 + sign).is_ascii_digit() {
                    is_float = true;
                    self.pos += 1 + sign;
                    self.skip_digits();
                }
            }
        }
        while matches!(self.current_byte(), b'u' | b'U' | b'l' | b'L' | b'f' | b'F') {
            self.pos += 1;
        }
        if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntegerLiteral
        }
    }

    fn skip_digits(&mut self) {
        while self.current_byte().is_ascii_digit() {
            self.pos += 1;
        }
    }

    fn scan_string_literal(&mut self) -> TokenKind {
        if self.scan_quoted(b'"') {
            TokenKind::StringLiteral
        } else {
            self.error(
                self.token_start,
                self.pos,
                &messages::UNTERMINATED_STRING_LITERAL,
                &[],
            );
            TokenKind::StringLiteral
        }
    }

    fn scan_char_literal(&mut self) -> TokenKind {
        if !self.scan_quoted(b'\'') {
            self.error(
                self.token_start,
                self.pos,
                &messages::UNTERMINATED_CHARACTER_LITERAL,
                &[],
            );
        }
        TokenKind::CharLiteral
    }

    /// Scan from the opening quote at `pos` up to and including the closing
    /// one. Returns false if the line or file ends first.
    fn scan_quoted(&mut self, quote: u8) -> bool {
        self.pos += 1;
        while !self.is_eof() {
            let ch = self.current_byte();
            if ch == quote {
                self.pos += 1;
                return true;
            }
            match ch {
                b'\\' => self.pos += 2,
                b'\n' => return false,
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.bytes.len());
        false
    }

    // ========================================================================
    // Identifiers and keywords
    // ========================================================================

    fn scan_identifier(&mut self) -> TokenKind {
        while !self.is_eof() {
            let ch = self.current_byte();
            if ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$' {
                self.pos += 1;
            } else if ch >= 0x80 {
                match self.char_at(self.pos) {
                    Some(c) if c.is_xid_continue() => self.pos += c.len_utf8(),
                    _ => break,
                }
            } else {
                break;
            }
        }

        let text = &self.text[self.token_start..self.pos];
        // Wide and unicode literal prefixes.
        if matches!(text, "L" | "u" | "U" | "u8") {
            match self.current_byte() {
                b'"' => return self.scan_string_literal(),
                b'\'' => return self.scan_char_literal(),
                _ => {}
            }
        }

        match keyword_kind(text) {
            Some(kind) if self.cxx || !kind.is_cxx_only() => kind,
            _ => TokenKind::Identifier,
        }
    }

    // ========================================================================
    // Punctuators
    // ========================================================================

    /// Longest-match punctuator at `pos`.
    fn scan_punctuator(&mut self) -> Option<TokenKind> {
        let next = self.byte_at(self.pos + 1);
        let next2 = self.byte_at(self.pos + 2);
        let (kind, len) = match self.current_byte() {
            b'{' => (TokenKind::OpenBrace, 1),
            b'}' => (TokenKind::CloseBrace, 1),
            b'(' => (TokenKind::OpenParen, 1),
            b')' => (TokenKind::CloseParen, 1),
            b'[' => (TokenKind::OpenBracket, 1),
            b']' => (TokenKind::CloseBracket, 1),
            b';' => (TokenKind::Semicolon, 1),
            b',' => (TokenKind::Comma, 1),
            b'?' => (TokenKind::Question, 1),
            b'~' => (TokenKind::Tilde, 1),
            b':' => match next {
                b':' => (TokenKind::ColonColon, 2),
                _ => (TokenKind::Colon, 1),
            },
            b'.' => match (next, next2) {
                (b'.', b'.') => (TokenKind::Ellipsis, 3),
                (b'*', _) => (TokenKind::DotStar, 2),
                _ => (TokenKind::Dot, 1),
            },
            b'-' => match (next, next2) {
                (b'>', b'*') => (TokenKind::ArrowStar, 3),
                (b'>', _) => (TokenKind::Arrow, 2),
                (b'-', _) => (TokenKind::MinusMinus, 2),
                (b'=', _) => (TokenKind::MinusEquals, 2),
                _ => (TokenKind::Minus, 1),
            },
            b'+' => match next {
                b'+' => (TokenKind::PlusPlus, 2),
                b'=' => (TokenKind::PlusEquals, 2),
                _ => (TokenKind::Plus, 1),
            },
            b'*' => match next {
                b'=' => (TokenKind::StarEquals, 2),
                _ => (TokenKind::Star, 1),
            },
            b'/' => match next {
                b'=' => (TokenKind::SlashEquals, 2),
                _ => (TokenKind::Slash, 1),
            },
            b'%' => match next {
                b'=' => (TokenKind::PercentEquals, 2),
                _ => (TokenKind::Percent, 1),
            },
            b'&' => match next {
                b'&' => (TokenKind::AmpAmp, 2),
                b'=' => (TokenKind::AmpEquals, 2),
                _ => (TokenKind::Amp, 1),
            },
            b'|' => match next {
                b'|' => (TokenKind::BarBar, 2),
                b'=' => (TokenKind::BarEquals, 2),
                _ => (TokenKind::Bar, 1),
            },
            b'^' => match next {
                b'=' => (TokenKind::CaretEquals, 2),
                _ => (TokenKind::Caret, 1),
            },
            b'!' => match next {
                b'=' => (TokenKind::ExclaimEquals, 2),
                _ => (TokenKind::Exclaim, 1),
            },
            b'=' => match next {
                b'=' => (TokenKind::EqualsEquals, 2),
                _ => (TokenKind::Equals, 1),
            },
            b'<' => match (next, next2) {
                (b'<', b'=') => (TokenKind::LessLessEquals, 3),
                (b'<', _) => (TokenKind::LessLess, 2),
                (b'=', _) => (TokenKind::LessEquals, 2),
                _ => (TokenKind::Less, 1),
            },
            b'>' => match (next, next2) {
                (b'>', b'=') => (TokenKind::GreaterGreaterEquals, 3),
                (b'>', _) => (TokenKind::GreaterGreater, 2),
                (b'=', _) => (TokenKind::GreaterEquals, 2),
                _ => (TokenKind::Greater, 1),
            },
            _ => return None,
        };
        self.pos += len;
        Some(kind)
    }
}

/// Scan all of `text` into a vector, ending with the `EndOfFile` token.
pub fn tokenize<'a>(text: &'a str, file_name: &'a str, cxx: bool) -> (Vec<Token<'a>>, DiagnosticCollection) {
    let mut scanner = Scanner::new(text, file_name).with_cxx(cxx);
    let mut tokens = Vec::new();
    loop {
        let token = scanner.scan();
        tokens.push(token);
        if token.kind == TokenKind::EndOfFile {
            break;
        }
    }
    (tokens, scanner.take_diagnostics())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text, "t.cc", true)
            .0
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_longest_match() {
        assert_eq!(
            kinds("->* >>= ... ::"),
            vec![
                TokenKind::ArrowStar,
                TokenKind::GreaterGreaterEquals,
                TokenKind::Ellipsis,
                TokenKind::ColonColon,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_unterminated_comment_reports() {
        let (_, diagnostics) = tokenize("int /* open", "t.cc", true);
        assert_eq!(diagnostics.count_of(&messages::UNTERMINATED_COMMENT), 1);
    }
}
