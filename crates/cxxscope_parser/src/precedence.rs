//! Binary operator precedence.

use cxxscope_ptree::TokenKind;

/// Precedence levels from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum OperatorPrecedence {
    Conditional = 0,
    LogicalOr = 1,
    LogicalAnd = 2,
    BitwiseOr = 3,
    BitwiseXor = 4,
    BitwiseAnd = 5,
    Equality = 6,
    Relational = 7,
    Shift = 8,
    Additive = 9,
    Multiplicative = 10,
    PointerToMember = 11,
    Invalid = 255,
}

/// Precedence of `kind` as a binary operator. Inside a template argument
/// list a bare `>` or `>>` closes the list instead.
pub fn get_binary_operator_precedence(kind: TokenKind, in_template_args: bool) -> OperatorPrecedence {
    match kind {
        TokenKind::BarBar => OperatorPrecedence::LogicalOr,
        TokenKind::AmpAmp => OperatorPrecedence::LogicalAnd,
        TokenKind::Bar => OperatorPrecedence::BitwiseOr,
        TokenKind::Caret => OperatorPrecedence::BitwiseXor,
        TokenKind::Amp => OperatorPrecedence::BitwiseAnd,
        TokenKind::EqualsEquals | TokenKind::ExclaimEquals => OperatorPrecedence::Equality,
        TokenKind::Greater if in_template_args => OperatorPrecedence::Invalid,
        TokenKind::Less | TokenKind::Greater | TokenKind::LessEquals | TokenKind::GreaterEquals => {
            OperatorPrecedence::Relational
        }
        TokenKind::GreaterGreater if in_template_args => OperatorPrecedence::Invalid,
        TokenKind::LessLess | TokenKind::GreaterGreater => OperatorPrecedence::Shift,
        TokenKind::Plus | TokenKind::Minus => OperatorPrecedence::Additive,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => OperatorPrecedence::Multiplicative,
        TokenKind::DotStar | TokenKind::ArrowStar => OperatorPrecedence::PointerToMember,
        _ => OperatorPrecedence::Invalid,
    }
}
