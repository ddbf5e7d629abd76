//! Token kinds (atoms) and list kinds (typed cons cells).

use std::fmt;

/// Kind of a leaf token. The discriminant ranges group keywords, literals and
/// punctuators so the classification helpers are single comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum TokenKind {
    Unknown = 0,
    EndOfFile,
    Identifier,

    // Literals
    IntegerLiteral,
    FloatLiteral,
    CharLiteral,
    StringLiteral,

    // Keywords
    Namespace,
    Using,
    Class,
    Struct,
    Union,
    Enum,
    Typedef,
    Template,
    Typename,
    Const,
    Volatile,
    Static,
    Extern,
    Inline,
    Virtual,
    Explicit,
    Friend,
    Mutable,
    Register,
    Auto,
    Public,
    Private,
    Protected,
    Operator,
    Return,
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    Sizeof,
    Typeid,
    New,
    Delete,
    Throw,
    This,
    True,
    False,
    Bool,
    Char,
    WChar,
    Short,
    Int,
    Long,
    Signed,
    Unsigned,
    Float,
    Double,
    Void,

    // Punctuators
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Semicolon,
    Colon,
    ColonColon,
    Comma,
    Dot,
    Arrow,
    DotStar,
    ArrowStar,
    Ellipsis,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Bar,
    Caret,
    Tilde,
    Exclaim,
    Less,
    Greater,
    LessEquals,
    GreaterEquals,
    EqualsEquals,
    ExclaimEquals,
    AmpAmp,
    BarBar,
    LessLess,
    GreaterGreater,
    PlusPlus,
    MinusMinus,
    Equals,
    PlusEquals,
    MinusEquals,
    StarEquals,
    SlashEquals,
    PercentEquals,
    AmpEquals,
    BarEquals,
    CaretEquals,
    LessLessEquals,
    GreaterGreaterEquals,
}

impl TokenKind {
    #[inline]
    pub fn is_keyword(self) -> bool {
        let v = self as u16;
        v >= TokenKind::Namespace as u16 && v <= TokenKind::Void as u16
    }

    #[inline]
    pub fn is_literal(self) -> bool {
        let v = self as u16;
        v >= TokenKind::IntegerLiteral as u16 && v <= TokenKind::StringLiteral as u16
    }

    #[inline]
    pub fn is_punctuation(self) -> bool {
        self as u16 >= TokenKind::OpenBrace as u16
    }

    #[inline]
    pub fn is_assignment_operator(self) -> bool {
        self as u16 >= TokenKind::Equals as u16
    }

    /// Keywords that spell a builtin type (possibly together with others).
    #[inline]
    pub fn is_builtin_type(self) -> bool {
        let v = self as u16;
        v >= TokenKind::Bool as u16 && v <= TokenKind::Void as u16
    }

    #[inline]
    pub fn is_cv_qualifier(self) -> bool {
        matches!(self, TokenKind::Const | TokenKind::Volatile)
    }

    /// Storage classes and function specifiers.
    pub fn is_decl_specifier(self) -> bool {
        matches!(
            self,
            TokenKind::Static
                | TokenKind::Extern
                | TokenKind::Inline
                | TokenKind::Virtual
                | TokenKind::Explicit
                | TokenKind::Friend
                | TokenKind::Mutable
                | TokenKind::Register
                | TokenKind::Auto
                | TokenKind::Typedef
        )
    }

    pub fn is_access_specifier(self) -> bool {
        matches!(self, TokenKind::Public | TokenKind::Private | TokenKind::Protected)
    }

    /// Keywords that C does not reserve.
    pub fn is_cxx_only(self) -> bool {
        matches!(
            self,
            TokenKind::Namespace
                | TokenKind::Using
                | TokenKind::Class
                | TokenKind::Template
                | TokenKind::Typename
                | TokenKind::Virtual
                | TokenKind::Explicit
                | TokenKind::Friend
                | TokenKind::Mutable
                | TokenKind::Public
                | TokenKind::Private
                | TokenKind::Protected
                | TokenKind::Operator
                | TokenKind::Typeid
                | TokenKind::New
                | TokenKind::Delete
                | TokenKind::Throw
                | TokenKind::This
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Bool
        )
    }
}

/// Map identifier text to its keyword kind.
pub fn keyword_kind(text: &str) -> Option<TokenKind> {
    let kind = match text {
        "namespace" => TokenKind::Namespace,
        "using" => TokenKind::Using,
        "class" => TokenKind::Class,
        "struct" => TokenKind::Struct,
        "union" => TokenKind::Union,
        "enum" => TokenKind::Enum,
        "typedef" => TokenKind::Typedef,
        "template" => TokenKind::Template,
        "typename" => TokenKind::Typename,
        "const" => TokenKind::Const,
        "volatile" => TokenKind::Volatile,
        "static" => TokenKind::Static,
        "extern" => TokenKind::Extern,
        "inline" => TokenKind::Inline,
        "virtual" => TokenKind::Virtual,
        "explicit" => TokenKind::Explicit,
        "friend" => TokenKind::Friend,
        "mutable" => TokenKind::Mutable,
        "register" => TokenKind::Register,
        "auto" => TokenKind::Auto,
        "public" => TokenKind::Public,
        "private" => TokenKind::Private,
        "protected" => TokenKind::Protected,
        "operator" => TokenKind::Operator,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "do" => TokenKind::Do,
        "for" => TokenKind::For,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "sizeof" => TokenKind::Sizeof,
        "typeid" => TokenKind::Typeid,
        "new" => TokenKind::New,
        "delete" => TokenKind::Delete,
        "throw" => TokenKind::Throw,
        "this" => TokenKind::This,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "bool" => TokenKind::Bool,
        "char" => TokenKind::Char,
        "wchar_t" => TokenKind::WChar,
        "short" => TokenKind::Short,
        "int" => TokenKind::Int,
        "long" => TokenKind::Long,
        "signed" => TokenKind::Signed,
        "unsigned" => TokenKind::Unsigned,
        "float" => TokenKind::Float,
        "double" => TokenKind::Double,
        "void" => TokenKind::Void,
        _ => return None,
    };
    Some(kind)
}

/// Kind of a list node. `Cons` is a plain cell; every other kind marks the
/// head cell of a construct whose elements follow through `cdr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Cons,

    // Bracketed bodies
    Brace,
    Block,
    ClassBody,

    // Declarations
    Declaration,
    Declarator,
    ParameterDeclaration,
    Typedef,
    TemplateDecl,
    TypeParameter,
    NamespaceSpec,
    UsingDirective,
    UsingDeclaration,
    LinkageSpec,
    ClassSpec,
    EnumSpec,
    AccessSpec,
    Name,
    TypeId,

    // Statements
    ExprStatement,
    ReturnStatement,
    IfStatement,
    WhileStatement,
    DoStatement,
    ForStatement,
    BreakStatement,
    ContinueStatement,

    // Expressions
    CommaExpr,
    AssignExpr,
    CondExpr,
    InfixExpr,
    CastExpr,
    UnaryExpr,
    ThrowExpr,
    SizeofExpr,
    TypeidExpr,
    NewExpr,
    DeleteExpr,
    ArrayExpr,
    FuncallExpr,
    PostfixExpr,
    DotMemberExpr,
    ArrowMemberExpr,
    ParenExpr,
    FstyleCastExpr,
}

impl ListKind {
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            ListKind::ExprStatement
                | ListKind::ReturnStatement
                | ListKind::IfStatement
                | ListKind::WhileStatement
                | ListKind::DoStatement
                | ListKind::ForStatement
                | ListKind::BreakStatement
                | ListKind::ContinueStatement
        )
    }

    pub fn is_expression(self) -> bool {
        matches!(
            self,
            ListKind::CommaExpr
                | ListKind::AssignExpr
                | ListKind::CondExpr
                | ListKind::InfixExpr
                | ListKind::CastExpr
                | ListKind::UnaryExpr
                | ListKind::ThrowExpr
                | ListKind::SizeofExpr
                | ListKind::TypeidExpr
                | ListKind::NewExpr
                | ListKind::DeleteExpr
                | ListKind::ArrayExpr
                | ListKind::FuncallExpr
                | ListKind::PostfixExpr
                | ListKind::DotMemberExpr
                | ListKind::ArrowMemberExpr
                | ListKind::ParenExpr
                | ListKind::FstyleCastExpr
        )
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
