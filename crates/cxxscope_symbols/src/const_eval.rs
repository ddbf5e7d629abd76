//! Integral constant evaluation.
//!
//! The evaluator folds an expression subtree to an `i64`. Anything it does
//! not understand clears its validity flag instead of failing, so callers
//! check [`ConstEvaluator::is_valid`] (or use [`evaluate_const`], which
//! folds both into an `Option`).

use crate::lookup::LookupContext;
use crate::table::SymbolTable;
use cxxscope_ptree::{ops, Encoding, ListKind, Node, ScopeId, TokenKind};

pub struct ConstEvaluator<'t> {
    table: &'t SymbolTable,
    scope: ScopeId,
    extended: bool,
    valid: bool,
}

/// Value of `node` in `scope`, or `None` when it is not an integral
/// constant expression.
pub fn evaluate_const(table: &SymbolTable, scope: ScopeId, node: &Node<'_>) -> Option<i64> {
    ConstEvaluator::new(table, scope).evaluate(node)
}

impl<'t> ConstEvaluator<'t> {
    pub fn new(table: &'t SymbolTable, scope: ScopeId) -> Self {
        Self {
            table,
            scope,
            extended: false,
            valid: true,
        }
    }

    /// Also fold `sizeof(<builtin>)` and casts of constants.
    pub fn with_extended_folding(mut self, enabled: bool) -> Self {
        self.extended = enabled;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn evaluate(&mut self, node: &Node<'_>) -> Option<i64> {
        self.valid = true;
        let value = self.eval(Some(node));
        self.valid.then_some(value)
    }

    fn invalid(&mut self) -> i64 {
        self.valid = false;
        0
    }

    fn eval(&mut self, node: Option<&Node<'_>>) -> i64 {
        if !self.valid {
            return 0;
        }
        let Some(node) = node else {
            return self.invalid();
        };
        match node {
            Node::Atom(atom) => match atom.kind {
                TokenKind::IntegerLiteral => parse_integer(atom.text).unwrap_or_else(|| self.invalid()),
                TokenKind::FloatLiteral => parse_float(atom.text).unwrap_or_else(|| self.invalid()),
                TokenKind::CharLiteral => parse_char(atom.text).unwrap_or_else(|| self.invalid()),
                TokenKind::True => 1,
                TokenKind::False => 0,
                TokenKind::Identifier => self.named(&Encoding::simple_name(atom.text)),
                _ => self.invalid(),
            },
            Node::List(list) => match list.kind {
                ListKind::Name => match node.encoded_name() {
                    Some(name) => self.named(&name),
                    None => self.invalid(),
                },
                ListKind::ParenExpr => self.eval(ops::second(node)),
                ListKind::InfixExpr => self.infix(node),
                ListKind::UnaryExpr => self.unary(node),
                ListKind::CondExpr => {
                    // [cond ? then : else]
                    let condition = self.eval(ops::first(node));
                    if condition != 0 {
                        self.eval(ops::third(node))
                    } else {
                        self.eval(ops::nth(node, 4))
                    }
                }
                ListKind::CastExpr if self.extended => {
                    // [( TypeId ) operand]
                    let ty = ops::second(node).and_then(Node::encoded_type);
                    let value = self.eval(ops::nth(node, 3));
                    self.convert(value, ty)
                }
                ListKind::FstyleCastExpr if self.extended => {
                    // [type ( args ) ]
                    let args = ops::third(node);
                    if ops::length(args) != 1 {
                        return self.invalid();
                    }
                    let value = self.eval(args.and_then(ops::first));
                    self.convert(value, node.encoded_type())
                }
                ListKind::SizeofExpr if self.extended => {
                    // [sizeof ( TypeId )]
                    let ty = ops::third(node)
                        .filter(|n| n.is_a(ListKind::TypeId))
                        .and_then(Node::encoded_type);
                    match ty
                        .and_then(|t| size_of(t.as_bytes()))
                        .and_then(|size| i64::try_from(size).ok())
                    {
                        Some(size) => size,
                        None => self.invalid(),
                    }
                }
                _ => self.invalid(),
            },
        }
    }

    /// Value of a named constant or enumerator.
    fn named(&mut self, name: &Encoding) -> i64 {
        let set = match self.table.lookup(name, self.scope, LookupContext::DEFAULT) {
            Ok(set) => set,
            Err(_) => return self.invalid(),
        };
        let value = set
            .single()
            .and_then(|id| self.table.symbol(id).kind.constant_value());
        value.unwrap_or_else(|| self.invalid())
    }

    fn infix(&mut self, node: &Node<'_>) -> i64 {
        let op = ops::second(node).map(Node::text).unwrap_or_default();
        let lhs = self.eval(ops::first(node));
        match op {
            "&&" if lhs == 0 => return 0,
            "||" if lhs != 0 => return 1,
            _ => {}
        }
        let rhs = self.eval(ops::third(node));
        if !self.valid {
            return 0;
        }
        match op {
            "+" => lhs.wrapping_add(rhs),
            "-" => lhs.wrapping_sub(rhs),
            "*" => lhs.wrapping_mul(rhs),
            "/" if rhs == 0 => self.invalid(),
            "/" => lhs.wrapping_div(rhs),
            "%" if rhs == 0 => self.invalid(),
            "%" => lhs.wrapping_rem(rhs),
            "<<" | ">>" if !(0..64).contains(&rhs) => self.invalid(),
            "<<" => lhs.wrapping_shl(rhs as u32),
            ">>" => lhs >> rhs,
            "<" => (lhs < rhs) as i64,
            ">" => (lhs > rhs) as i64,
            "<=" => (lhs <= rhs) as i64,
            ">=" => (lhs >= rhs) as i64,
            "==" => (lhs == rhs) as i64,
            "!=" => (lhs != rhs) as i64,
            "&" => lhs & rhs,
            "|" => lhs | rhs,
            "^" => lhs ^ rhs,
            "&&" | "||" => (rhs != 0) as i64,
            _ => self.invalid(),
        }
    }

    fn unary(&mut self, node: &Node<'_>) -> i64 {
        let op = ops::first(node).map(Node::text).unwrap_or_default();
        let operand = self.eval(ops::second(node));
        match op {
            "+" => operand,
            "-" => operand.wrapping_neg(),
            "!" => (operand == 0) as i64,
            "~" => !operand,
            _ => self.invalid(),
        }
    }

    /// Convert to an integral type, truncating to its width.
    fn convert(&mut self, value: i64, ty: Option<Encoding>) -> i64 {
        let Some(ty) = ty.map(|t| t.strip_cv()) else {
            return self.invalid();
        };
        match ty.as_bytes() {
            b"b" => (value != 0) as i64,
            b"c" | b"Sc" => value as i8 as i64,
            b"Uc" => value as u8 as i64,
            b"s" | b"w" => value as i16 as i64,
            b"Us" => value as u16 as i64,
            b"i" | b"l" => value as i32 as i64,
            b"Ui" | b"Ul" => value as u32 as i64,
            b"j" | b"Uj" => value,
            _ => self.invalid(),
        }
    }
}

/// Size in bytes of a builtin, pointer, or array type. `None` when the
/// size does not fit in a `u64`.
pub fn size_of(ty: &[u8]) -> Option<u64> {
    match ty.first()? {
        b'b' | b'c' => Some(1),
        b'w' | b's' => Some(2),
        b'i' | b'l' | b'f' => Some(4),
        b'j' | b'd' | b'r' => Some(8),
        b'P' => Some(4),
        b'S' | b'U' | b'C' | b'V' | b'R' => size_of(&ty[1..]),
        b'A' => {
            let digits_end = ty.iter().position(|&b| b == b'_')?;
            let count: u64 = std::str::from_utf8(&ty[1..digits_end]).ok()?.parse().ok()?;
            count.checked_mul(size_of(&ty[digits_end + 1..])?)
        }
        _ => None,
    }
}

// ============================================================================
// Literals
// ============================================================================

fn parse_integer(text: &str) -> Option<i64> {
    let digits = text.trim_end_matches(&['u', 'U', 'l', 'L'][..]);
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<u64>().ok()?
    };
    Some(value as i64)
}

fn parse_float(text: &str) -> Option<i64> {
    let digits = text.trim_end_matches(&['f', 'F', 'l', 'L'][..]);
    digits.parse::<f64>().ok().map(|v| v as i64)
}

fn parse_char(text: &str) -> Option<i64> {
    let start = text.find('\'')?;
    let body = text.get(start + 1..text.len().checked_sub(1)?)?;
    let mut chars = body.chars();
    let first = chars.next()?;
    if first != '\\' {
        return Some(first as i64);
    }
    let escaped = chars.next()?;
    let value = match escaped {
        'n' => 10,
        't' => 9,
        'r' => 13,
        'v' => 11,
        'b' => 8,
        'f' => 12,
        'a' => 7,
        'x' => i64::from_str_radix(chars.as_str(), 16).ok()?,
        '0'..='7' => {
            let mut digits = String::from(escaped);
            digits.push_str(chars.as_str());
            i64::from_str_radix(&digits, 8).ok()?
        }
        other => other as i64,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_literals() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("0x1F"), Some(31));
        assert_eq!(parse_integer("017"), Some(15));
        assert_eq!(parse_integer("10UL"), Some(10));
        assert_eq!(parse_integer("0"), Some(0));
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(parse_char("'a'"), Some(97));
        assert_eq!(parse_char("'\\n'"), Some(10));
        assert_eq!(parse_char("'\\0'"), Some(0));
        assert_eq!(parse_char("'\\x41'"), Some(65));
        assert_eq!(parse_char("L'b'"), Some(98));
    }

    #[test]
    fn test_size_of() {
        assert_eq!(size_of(b"i"), Some(4));
        assert_eq!(size_of(b"Uc"), Some(1));
        assert_eq!(size_of(b"A10_s"), Some(20));
        assert_eq!(size_of(b"PCc"), Some(4));
        assert_eq!(size_of(b"\x81X"), None);
        assert_eq!(size_of(b"A9223372036854775807_i"), None);
        assert_eq!(size_of(b"A4611686018427387904_A4_c"), None);
    }
}
