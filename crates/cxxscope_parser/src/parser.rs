//! The C++ parser implementation.
//!
//! A recursive descent parser over [`TokenStream`]. Every token becomes an
//! atom; every construct becomes a list whose shape is fixed per
//! [`ListKind`]. Declarators carry their encoded name and type, so later
//! passes never have to re-derive types from syntax.
//!
//! Syntax errors abort the current declaration or statement, are recorded as
//! `(position, token)` pairs plus a diagnostic, and parsing resumes after the
//! next `;` or before the next `}`.

use bumpalo::Bump;
use cxxscope_core::text::{TextPos, TextSpan};
use cxxscope_diagnostics::{messages, Diagnostic, DiagnosticCollection, DiagnosticMessage};
use cxxscope_ptree::{ops, Encoding, ListKind, Node, NodeFactory, TokenKind};
use cxxscope_scanner::{Scanner, TokenStream};
use rustc_hash::FxHashSet;

use crate::precedence::{get_binary_operator_precedence, OperatorPrecedence};

/// A syntax error: where it happened and the token found there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub pos: TextPos,
    pub token: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Scan C++ keywords; when false the C++-only keywords are identifiers.
    pub cxx: bool,
    pub max_nesting_depth: u32,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            cxx: true,
            max_nesting_depth: 256,
        }
    }
}

pub struct ParseOutput<'a> {
    /// Top-level declarations as a plain list; nil for an empty unit.
    pub tree: Option<&'a Node<'a>>,
    pub errors: Vec<ParseError>,
    pub diagnostics: DiagnosticCollection,
}

/// Parse `source` with default options.
pub fn parse<'a>(arena: &'a Bump, file_name: &'a str, source: &'a str) -> ParseOutput<'a> {
    Parser::new(arena, file_name, source, ParserOptions::default()).parse()
}

/// Marker for an aborted production; the error is already recorded.
#[derive(Debug)]
struct SyntaxError;

type PResult<T> = Result<T, SyntaxError>;

/// Where a declaration appears. Decides whether a leading name followed by
/// `(` is a constructor declarator and whether bit-fields are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    File,
    Namespace,
    Class,
    Block,
    Parameter,
    TypeId,
}

impl Context {
    fn allows_constructor(self) -> bool {
        matches!(self, Context::File | Context::Namespace | Context::Class)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclMode {
    Named,
    Member,
    Parameter,
    Abstract,
}

struct DeclSpecs<'a> {
    specifiers: Option<&'a Node<'a>>,
    type_spec: Option<&'a Node<'a>>,
    encoding: Encoding,
}

struct Declarator<'a> {
    node: &'a Node<'a>,
    name: Option<&'a str>,
    is_function: bool,
}

enum Suffix {
    Function {
        params: Vec<Encoding>,
        ellipsis: bool,
        is_const: bool,
    },
    Array(Option<u64>),
}

/// Accumulates builtin type keywords such as `unsigned long int`.
#[derive(Default)]
struct BuiltinSpec {
    base: Option<TokenKind>,
    signedness: Option<TokenKind>,
    short: bool,
    longs: u8,
    seen: bool,
}

impl BuiltinSpec {
    fn add(&mut self, kind: TokenKind) {
        self.seen = true;
        match kind {
            TokenKind::Signed | TokenKind::Unsigned => self.signedness = Some(kind),
            TokenKind::Short => self.short = true,
            TokenKind::Long => self.longs += 1,
            other => self.base = Some(other),
        }
    }

    fn encoding(&self) -> Option<Encoding> {
        if !self.seen {
            return None;
        }
        let code = match self.base {
            Some(TokenKind::Bool) => b'b',
            Some(TokenKind::Char) => b'c',
            Some(TokenKind::WChar) => b'w',
            Some(TokenKind::Float) => b'f',
            Some(TokenKind::Double) if self.longs > 0 => b'r',
            Some(TokenKind::Double) => b'd',
            Some(TokenKind::Void) => b'v',
            _ if self.short => b's',
            _ if self.longs >= 2 => b'j',
            _ if self.longs == 1 => b'l',
            _ => b'i',
        };
        Some(match self.signedness {
            Some(TokenKind::Unsigned) => Encoding::from_bytes(&[b'U', code]),
            Some(TokenKind::Signed) if code == b'c' => Encoding::from_bytes(&[b'S', code]),
            _ => Encoding::builtin(code),
        })
    }
}

pub struct Parser<'a> {
    factory: NodeFactory<'a>,
    tokens: TokenStream<'a>,
    file_name: &'a str,
    diagnostics: DiagnosticCollection,
    errors: Vec<ParseError>,
    /// Names declared as types so far (classes, enums, typedefs, template
    /// type parameters).
    type_names: FxHashSet<&'a str>,
    template_names: FxHashSet<&'a str>,
    /// Set while parsing the declaration of a `template<...>`.
    template_prefix: bool,
    /// Nesting of template argument lists; a bare `>` closes one.
    template_depth: u32,
    anonymous_count: u32,
    /// Number of enclosing function-body blocks.
    block_depth: u32,
    depth: u32,
    max_depth: u32,
}

impl<'a> Parser<'a> {
    pub fn new(arena: &'a Bump, file_name: &'a str, source: &'a str, options: ParserOptions) -> Self {
        let scanner = Scanner::new(source, file_name).with_cxx(options.cxx);
        Self {
            factory: NodeFactory::new(arena),
            tokens: TokenStream::new(scanner),
            file_name,
            diagnostics: DiagnosticCollection::new(),
            errors: Vec::new(),
            type_names: FxHashSet::default(),
            template_names: FxHashSet::default(),
            template_prefix: false,
            template_depth: 0,
            anonymous_count: 0,
            block_depth: 0,
            depth: 0,
            max_depth: options.max_nesting_depth,
        }
    }

    pub fn parse(mut self) -> ParseOutput<'a> {
        let declarations = self.parse_declaration_list(Context::File);
        let tree = self.factory.seq(&declarations);
        let mut diagnostics = self.tokens.take_diagnostics();
        diagnostics.extend(self.diagnostics);
        ParseOutput {
            tree,
            errors: self.errors,
            diagnostics,
        }
    }

    pub fn is_type_name(&self, name: &str) -> bool {
        self.type_names.contains(name)
    }

    pub fn is_template_name(&self, name: &str) -> bool {
        self.template_names.contains(name)
    }

    // ========================================================================
    // Token management
    // ========================================================================

    #[inline]
    fn kind(&mut self) -> TokenKind {
        self.tokens.peek_kind(0)
    }

    #[inline]
    fn kind_at(&mut self, n: usize) -> TokenKind {
        self.tokens.peek_kind(n)
    }

    #[inline]
    fn at(&mut self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    /// Consume the current token as an atom.
    fn bump(&mut self) -> &'a Node<'a> {
        let token = self.tokens.get();
        self.factory.atom(token.kind, token.text, token.pos)
    }

    fn eat(&mut self, kind: TokenKind) -> Option<&'a Node<'a>> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, text: &str) -> PResult<&'a Node<'a>> {
        if kind == TokenKind::Greater {
            self.tokens.split_shift();
        }
        match self.eat(kind) {
            Some(atom) => Ok(atom),
            None => self.fail(&messages::_0_EXPECTED, &[text]),
        }
    }

    /// Record a syntax error at the current token and abort the production.
    fn fail<T>(&mut self, message: &DiagnosticMessage, args: &[&str]) -> PResult<T> {
        self.record(message, args);
        Err(SyntaxError)
    }

    fn fail_unexpected<T>(&mut self) -> PResult<T> {
        let token = self.tokens.peek();
        let text = if token.kind == TokenKind::EndOfFile {
            "end of file"
        } else {
            token.text
        };
        self.fail(&messages::UNEXPECTED_TOKEN_0, &[text])
    }

    fn record(&mut self, message: &DiagnosticMessage, args: &[&str]) {
        let token = self.tokens.peek();
        self.errors.push(ParseError {
            pos: token.pos,
            token: token.text.to_string(),
        });
        let span = TextSpan::new(token.pos, token.text.len() as TextPos);
        self.diagnostics
            .add(Diagnostic::with_location(self.file_name, span, message, args));
    }

    /// Run `f` one nesting level deeper, failing once the limit is reached.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= self.max_depth {
            let limit = self.max_depth.to_string();
            return self.fail(&messages::NESTING_TOO_DEEP, &[&limit]);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Run a loop that folds its results into a left-nested chain. Each
    /// [`Self::fold`] inside `f` counts as one nesting level until `f` returns.
    fn chained<T>(&mut self, f: impl FnOnce(&mut Self, &mut u32) -> PResult<T>) -> PResult<T> {
        let mut folded = 0;
        let result = f(self, &mut folded);
        self.depth -= folded;
        result
    }

    fn fold(&mut self, folded: &mut u32) -> PResult<()> {
        if self.depth >= self.max_depth {
            let limit = self.max_depth.to_string();
            return self.fail(&messages::NESTING_TOO_DEEP, &[&limit]);
        }
        self.depth += 1;
        *folded += 1;
        Ok(())
    }

    /// Skip to just after the next `;` or to the next unmatched `}`.
    fn synchronize(&mut self) {
        let mut braces = 0u32;
        loop {
            match self.kind() {
                TokenKind::EndOfFile => return,
                TokenKind::Semicolon if braces == 0 => {
                    self.tokens.get();
                    return;
                }
                TokenKind::OpenBrace => braces += 1,
                TokenKind::CloseBrace => {
                    if braces == 0 {
                        return;
                    }
                    braces -= 1;
                    if braces == 0 {
                        self.tokens.get();
                        self.eat(TokenKind::Semicolon);
                        return;
                    }
                }
                _ => {}
            }
            self.tokens.get();
        }
    }

    fn anonymous_name(&mut self) -> Encoding {
        self.anonymous_count += 1;
        Encoding::simple_name(&format!("`{}", self.anonymous_count))
    }

    // ========================================================================
    // Lookahead predicates
    // ========================================================================

    /// Index just past a (possibly qualified, possibly template-id) name
    /// starting at lookahead `start`, with the text of its last identifier.
    fn name_end(&mut self, start: usize) -> Option<(usize, &'a str)> {
        let mut i = start;
        if self.kind_at(i) == TokenKind::ColonColon {
            i += 1;
        }
        loop {
            let token = self.tokens.look_ahead(i);
            if token.kind != TokenKind::Identifier {
                return None;
            }
            i += 1;
            if self.kind_at(i) == TokenKind::Less && self.is_template_name(token.text) {
                i = self.skip_angles(i)?;
            }
            if self.kind_at(i) == TokenKind::ColonColon && self.kind_at(i + 1) == TokenKind::Identifier {
                i += 1;
                continue;
            }
            return Some((i, token.text));
        }
    }

    /// Index just past the `>` matching the `<` at lookahead `start`.
    fn skip_angles(&mut self, start: usize) -> Option<usize> {
        let mut angles = 0i32;
        let mut parens = 0i32;
        let mut i = start;
        loop {
            match self.kind_at(i) {
                TokenKind::Less if parens == 0 => angles += 1,
                TokenKind::Greater if parens == 0 => angles -= 1,
                TokenKind::GreaterGreater if parens == 0 => angles -= 2,
                TokenKind::OpenParen => parens += 1,
                TokenKind::CloseParen => parens -= 1,
                TokenKind::Semicolon
                | TokenKind::OpenBrace
                | TokenKind::CloseBrace
                | TokenKind::EndOfFile => return None,
                _ => {}
            }
            i += 1;
            if angles <= 0 {
                return Some(i);
            }
        }
    }

    /// Whether a statement starting with a name declares something.
    fn looks_like_declaration(&mut self) -> bool {
        let Some((end, last)) = self.name_end(0) else {
            return false;
        };
        match self.kind_at(end) {
            TokenKind::Identifier => true,
            TokenKind::OpenParen => false,
            _ => self.is_type_name(last),
        }
    }

    fn is_type_start_at(&mut self, n: usize) -> bool {
        let kind = self.kind_at(n);
        if kind.is_builtin_type()
            || kind.is_cv_qualifier()
            || matches!(
                kind,
                TokenKind::Class
                    | TokenKind::Struct
                    | TokenKind::Union
                    | TokenKind::Enum
                    | TokenKind::Typename
            )
        {
            return true;
        }
        if kind == TokenKind::Identifier || kind == TokenKind::ColonColon {
            return match self.name_end(n) {
                Some((end, last)) => {
                    self.is_type_name(last) && self.kind_at(end) != TokenKind::OpenParen
                }
                None => false,
            };
        }
        false
    }

    /// A leading name that is itself the declarator of a constructor,
    /// destructor, or conversion function (`A(`, `A::A(`, `A::~A`).
    fn names_declarator(&mut self) -> bool {
        let Some((end, _)) = self.name_end(0) else {
            return false;
        };
        match self.kind_at(end) {
            TokenKind::OpenParen => true,
            TokenKind::ColonColon => {
                matches!(self.kind_at(end + 1), TokenKind::Tilde | TokenKind::Operator)
            }
            _ => false,
        }
    }

    /// `(` followed by a type: a C-style cast or `sizeof(type)`.
    fn looks_like_cast(&mut self) -> bool {
        self.at(TokenKind::OpenParen) && self.is_type_start_at(1)
    }

    /// After a declarator name, whether `(` opens a parameter list rather than
    /// a constructor-style initializer.
    fn looks_like_parameters(&mut self) -> bool {
        let next = self.kind_at(1);
        if next == TokenKind::CloseParen
            || next == TokenKind::Ellipsis
            || next == TokenKind::ColonColon
            || next.is_decl_specifier()
            || self.is_type_start_at(1)
        {
            return true;
        }
        if next == TokenKind::Identifier {
            return match self.kind_at(2) {
                TokenKind::Identifier
                | TokenKind::Star
                | TokenKind::Amp
                | TokenKind::ColonColon
                | TokenKind::Less
                | TokenKind::OpenBracket => true,
                // `f(T)` outside a body declares a function; inside one,
                // `a(b)` initializes an object.
                TokenKind::CloseParen | TokenKind::Comma => self.block_depth == 0,
                _ => false,
            };
        }
        false
    }

    fn starts_expression(&mut self) -> bool {
        !matches!(
            self.kind(),
            TokenKind::Semicolon
                | TokenKind::CloseParen
                | TokenKind::CloseBracket
                | TokenKind::CloseBrace
                | TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::EndOfFile
        )
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn parse_declaration_list(&mut self, context: Context) -> Vec<Option<&'a Node<'a>>> {
        let mut declarations = Vec::new();
        loop {
            match self.kind() {
                TokenKind::EndOfFile => break,
                TokenKind::CloseBrace if context != Context::File => break,
                TokenKind::CloseBrace => {
                    self.record(&messages::DECLARATION_EXPECTED, &[]);
                    self.tokens.get();
                    continue;
                }
                _ => {}
            }
            match self.parse_declaration(context) {
                Ok(declaration) => declarations.push(Some(declaration)),
                Err(SyntaxError) => self.synchronize(),
            }
        }
        declarations
    }

    fn parse_declaration(&mut self, context: Context) -> PResult<&'a Node<'a>> {
        self.nested(|p| match p.kind() {
            TokenKind::Namespace => p.parse_namespace_spec(),
            TokenKind::Using => p.parse_using(),
            TokenKind::Template => p.parse_template_decl(context),
            TokenKind::Extern if p.kind_at(1) == TokenKind::StringLiteral => {
                p.parse_linkage_spec(context)
            }
            TokenKind::Public | TokenKind::Private | TokenKind::Protected
                if context == Context::Class =>
            {
                let access = p.bump();
                let colon = p.expect(TokenKind::Colon, ":")?;
                Ok(p.factory.list(ListKind::AccessSpec, &[Some(access), Some(colon)]))
            }
            TokenKind::Typedef => p.parse_typedef(),
            TokenKind::Semicolon => {
                let semi = p.bump();
                Ok(p.factory.list(ListKind::Declaration, &[None, None, None, Some(semi)]))
            }
            _ => p.parse_simple_declaration(context),
        })
    }

    /// `namespace name? { ... }`
    fn parse_namespace_spec(&mut self) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        let name = self.eat(TokenKind::Identifier);
        let body = self.parse_brace(ListKind::Brace, Context::Namespace)?;
        let encoded = name.map(|n| Encoding::simple_name(n.text()));
        Ok(self.factory.list_encoded(
            ListKind::NamespaceSpec,
            &[Some(keyword), name, Some(body)],
            encoded.as_ref(),
            None,
        ))
    }

    /// `{ declarations }` as a list of `kind`.
    fn parse_brace(&mut self, kind: ListKind, context: Context) -> PResult<&'a Node<'a>> {
        let open = self.expect(TokenKind::OpenBrace, "{")?;
        let declarations = self.parse_declaration_list(context);
        let close = self.expect(TokenKind::CloseBrace, "}")?;
        let body = self.factory.seq(&declarations);
        Ok(self.factory.list(kind, &[Some(open), body, Some(close)]))
    }

    /// `using namespace name;` or `using name;`
    fn parse_using(&mut self) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        if let Some(namespace) = self.eat(TokenKind::Namespace) {
            let (name, encoding) = self.parse_name(false)?;
            let semi = self.expect(TokenKind::Semicolon, ";")?;
            return Ok(self.factory.list_encoded(
                ListKind::UsingDirective,
                &[Some(keyword), Some(namespace), Some(name), Some(semi)],
                Some(&encoding),
                None,
            ));
        }
        self.eat(TokenKind::Typename);
        let (name, encoding) = self.parse_name(false)?;
        let semi = self.expect(TokenKind::Semicolon, ";")?;
        Ok(self.factory.list_encoded(
            ListKind::UsingDeclaration,
            &[Some(keyword), Some(name), Some(semi)],
            Some(&encoding),
            None,
        ))
    }

    /// `extern "C" { ... }` or `extern "C" declaration`
    fn parse_linkage_spec(&mut self, context: Context) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        let language = self.bump();
        let body = if self.at(TokenKind::OpenBrace) {
            let inner = if context == Context::File {
                Context::Namespace
            } else {
                context
            };
            self.parse_brace(ListKind::Brace, inner)?
        } else {
            self.parse_declaration(context)?
        };
        Ok(self
            .factory
            .list(ListKind::LinkageSpec, &[Some(keyword), Some(language), Some(body)]))
    }

    /// `template < params > declaration`
    fn parse_template_decl(&mut self, context: Context) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        let open = self.expect(TokenKind::Less, "<")?;
        let mut params = Vec::new();
        self.tokens.split_shift();
        if !self.at(TokenKind::Greater) {
            loop {
                params.push(Some(self.parse_template_parameter()?));
                match self.eat(TokenKind::Comma) {
                    Some(comma) => params.push(Some(comma)),
                    None => break,
                }
            }
        }
        let close = self.expect(TokenKind::Greater, ">")?;
        let params = self.factory.seq(&params);

        self.template_prefix = true;
        let declaration = self.parse_declaration(context);
        self.template_prefix = false;
        let declaration = declaration?;
        if let Some(name) = function_declarator_name(declaration) {
            self.template_names.insert(name);
        }
        Ok(self.factory.list(
            ListKind::TemplateDecl,
            &[Some(keyword), Some(open), params, Some(close), Some(declaration)],
        ))
    }

    fn parse_template_parameter(&mut self) -> PResult<&'a Node<'a>> {
        let is_type_parameter = matches!(self.kind(), TokenKind::Class | TokenKind::Typename)
            && matches!(
                self.kind_at(1),
                TokenKind::Identifier | TokenKind::Comma | TokenKind::Greater | TokenKind::Equals
            );
        if !is_type_parameter {
            self.template_depth += 1;
            let parameter = self.parse_parameter_declaration();
            self.template_depth -= 1;
            return parameter.map(|(node, _)| node);
        }
        let keyword = self.bump();
        let name = self.eat(TokenKind::Identifier);
        let mut items = vec![Some(keyword), name];
        if let Some(equals) = self.eat(TokenKind::Equals) {
            let (default, _) = self.parse_type_id()?;
            items.push(Some(equals));
            items.push(Some(default));
        }
        let encoded = match name {
            Some(n) => {
                self.type_names.insert(n.text());
                Encoding::simple_name(n.text())
            }
            None => self.anonymous_name(),
        };
        Ok(self
            .factory
            .list_encoded(ListKind::TypeParameter, &items, Some(&encoded), None))
    }

    /// `typedef type declarators ;`
    fn parse_typedef(&mut self) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        let specs = self.parse_decl_specifiers(Context::Namespace)?;
        let mut items = Vec::new();
        loop {
            let declarator = self.parse_declarator(&specs.encoding, DeclMode::Named)?;
            if let Some(name) = declarator.name {
                self.type_names.insert(name);
            }
            items.push(Some(declarator.node));
            match self.eat(TokenKind::Comma) {
                Some(comma) => items.push(Some(comma)),
                None => break,
            }
        }
        let semi = self.expect(TokenKind::Semicolon, ";")?;
        let declarators = self.factory.seq(&items);
        Ok(self.factory.list(
            ListKind::Typedef,
            &[Some(keyword), specs.type_spec, declarators, Some(semi)],
        ))
    }

    /// A variable, function, or type declaration, or a function definition.
    fn parse_simple_declaration(&mut self, context: Context) -> PResult<&'a Node<'a>> {
        let specs = self.parse_decl_specifiers(context)?;
        if let Some(semi) = self.eat(TokenKind::Semicolon) {
            if specs.type_spec.is_none() && specs.specifiers.is_none() {
                return self.fail(&messages::DECLARATION_EXPECTED, &[]);
            }
            return Ok(self.factory.list(
                ListKind::Declaration,
                &[specs.specifiers, specs.type_spec, None, Some(semi)],
            ));
        }

        let mode = if context == Context::Class {
            DeclMode::Member
        } else {
            DeclMode::Named
        };
        let first = self.parse_declarator(&specs.encoding, mode)?;
        if first.is_function && matches!(self.kind(), TokenKind::OpenBrace | TokenKind::Colon) {
            let mut items = vec![specs.specifiers, specs.type_spec, Some(first.node)];
            if self.at(TokenKind::Colon) {
                items.push(Some(self.parse_member_initializers()?));
            }
            items.push(Some(self.parse_block()?));
            return Ok(self.factory.list(ListKind::Declaration, &items));
        }

        let mut declarators = vec![Some(first.node)];
        while let Some(comma) = self.eat(TokenKind::Comma) {
            declarators.push(Some(comma));
            let next = self.parse_declarator(&specs.encoding, mode)?;
            declarators.push(Some(next.node));
        }
        let semi = self.expect(TokenKind::Semicolon, ";")?;
        let declarators = self.factory.seq(&declarators);
        Ok(self.factory.list(
            ListKind::Declaration,
            &[specs.specifiers, specs.type_spec, declarators, Some(semi)],
        ))
    }

    /// `: member(args), Base(args)`
    fn parse_member_initializers(&mut self) -> PResult<&'a Node<'a>> {
        let mut items = vec![Some(self.bump())];
        loop {
            let (name, _) = self.parse_name(true)?;
            let open = self.expect(TokenKind::OpenParen, "(")?;
            let args = self.parse_argument_list()?;
            let close = self.expect(TokenKind::CloseParen, ")")?;
            items.push(self.factory.seq(&[Some(name), Some(open), args, Some(close)]));
            match self.eat(TokenKind::Comma) {
                Some(comma) => items.push(Some(comma)),
                None => break,
            }
        }
        Ok(self.factory.seq(&items).unwrap_or_else(|| self.factory.list(ListKind::Cons, &[])))
    }

    fn parse_decl_specifiers(&mut self, context: Context) -> PResult<DeclSpecs<'a>> {
        let mut specifiers = Vec::new();
        let mut type_items = Vec::new();
        let mut builtin = BuiltinSpec::default();
        let mut user: Option<Encoding> = None;
        let (mut is_const, mut is_volatile) = (false, false);

        loop {
            let kind = self.kind();
            let has_type = user.is_some() || builtin.seen;
            if kind.is_decl_specifier() && kind != TokenKind::Typedef {
                specifiers.push(Some(self.bump()));
            } else if kind.is_cv_qualifier() {
                is_const |= kind == TokenKind::Const;
                is_volatile |= kind == TokenKind::Volatile;
                type_items.push(Some(self.bump()));
            } else if kind.is_builtin_type() && user.is_none() {
                builtin.add(kind);
                type_items.push(Some(self.bump()));
            } else if has_type {
                break;
            } else if matches!(kind, TokenKind::Class | TokenKind::Struct | TokenKind::Union) {
                let (node, encoding) = self.parse_class_spec()?;
                type_items.push(Some(node));
                user = Some(encoding);
            } else if kind == TokenKind::Enum {
                let (node, encoding) = self.parse_enum_spec()?;
                type_items.push(Some(node));
                user = Some(encoding);
            } else if kind == TokenKind::Typename {
                type_items.push(Some(self.bump()));
                let (name, encoding) = self.parse_name(true)?;
                type_items.push(Some(name));
                user = Some(encoding);
            } else if matches!(kind, TokenKind::Identifier | TokenKind::ColonColon) {
                if context.allows_constructor() && self.names_declarator() {
                    break;
                }
                let (name, encoding) = self.parse_name(true)?;
                type_items.push(Some(name));
                user = Some(encoding);
            } else {
                break;
            }
        }

        let mut encoding = match user {
            Some(encoding) => encoding,
            None => builtin.encoding().unwrap_or_else(|| {
                if type_items.is_empty() {
                    Encoding::builtin(b'?')
                } else {
                    Encoding::builtin(b'i')
                }
            }),
        };
        if is_volatile {
            encoding = encoding.volatile_of();
        }
        if is_const {
            encoding = encoding.const_of();
        }
        let type_spec = match type_items.len() {
            0 => None,
            1 => type_items[0],
            _ => self.factory.seq(&type_items),
        };
        Ok(DeclSpecs {
            specifiers: self.factory.seq(&specifiers),
            type_spec,
            encoding,
        })
    }

    /// `class|struct|union name? bases? body?`
    fn parse_class_spec(&mut self) -> PResult<(&'a Node<'a>, Encoding)> {
        let keyword = self.bump();
        let is_template = std::mem::take(&mut self.template_prefix);
        let (name, encoding) = if matches!(self.kind(), TokenKind::Identifier | TokenKind::ColonColon) {
            let (name, encoding) = self.parse_name(true)?;
            if let Some(text) = last_identifier(name) {
                self.type_names.insert(text);
                if is_template {
                    self.template_names.insert(text);
                }
            }
            (Some(name), encoding)
        } else {
            (None, self.anonymous_name())
        };
        let bases = if self.at(TokenKind::Colon) {
            Some(self.parse_base_clause()?)
        } else {
            None
        };
        let body = if self.at(TokenKind::OpenBrace) {
            Some(self.parse_brace(ListKind::ClassBody, Context::Class)?)
        } else {
            None
        };
        let node = self.factory.list_encoded(
            ListKind::ClassSpec,
            &[Some(keyword), name, bases, body],
            Some(&encoding),
            None,
        );
        Ok((node, encoding))
    }

    /// `: public A, virtual B`
    fn parse_base_clause(&mut self) -> PResult<&'a Node<'a>> {
        let mut items = vec![Some(self.bump())];
        loop {
            let mut base = Vec::new();
            while self.kind().is_access_specifier() || self.at(TokenKind::Virtual) {
                base.push(Some(self.bump()));
            }
            let (name, _) = self.parse_name(true)?;
            base.push(Some(name));
            items.push(self.factory.seq(&base));
            match self.eat(TokenKind::Comma) {
                Some(comma) => items.push(Some(comma)),
                None => break,
            }
        }
        Ok(self.factory.seq(&items).unwrap_or_else(|| self.factory.list(ListKind::Cons, &[])))
    }

    /// `enum name? { a, b = expr }?`
    fn parse_enum_spec(&mut self) -> PResult<(&'a Node<'a>, Encoding)> {
        let keyword = self.bump();
        let name = self.eat(TokenKind::Identifier);
        let encoding = match name {
            Some(n) => {
                self.type_names.insert(n.text());
                Encoding::simple_name(n.text())
            }
            None => self.anonymous_name(),
        };
        let body = if let Some(open) = self.eat(TokenKind::OpenBrace) {
            let mut items = Vec::new();
            while !self.at(TokenKind::CloseBrace) {
                let id = self.expect(TokenKind::Identifier, "identifier")?;
                if let Some(equals) = self.eat(TokenKind::Equals) {
                    let value = self.parse_conditional_expression()?;
                    items.push(self.factory.seq(&[Some(id), Some(equals), Some(value)]));
                } else {
                    items.push(Some(id));
                }
                match self.eat(TokenKind::Comma) {
                    Some(comma) => items.push(Some(comma)),
                    None => break,
                }
            }
            let close = self.expect(TokenKind::CloseBrace, "}")?;
            let enumerators = self.factory.seq(&items);
            Some(self.factory.list(ListKind::Brace, &[Some(open), enumerators, Some(close)]))
        } else {
            None
        };
        let node = self.factory.list_encoded(
            ListKind::EnumSpec,
            &[Some(keyword), name, body],
            Some(&encoding),
            None,
        );
        Ok((node, encoding))
    }

    // ========================================================================
    // Declarators
    // ========================================================================

    fn parse_declarator(&mut self, base: &Encoding, mode: DeclMode) -> PResult<Declarator<'a>> {
        let mut items = Vec::new();
        let mut ty = base.clone();

        loop {
            match self.kind() {
                TokenKind::Star => {
                    items.push(Some(self.bump()));
                    ty = ty.pointer_to();
                    while self.kind().is_cv_qualifier() {
                        let cv = self.bump();
                        ty = if cv.is_token(TokenKind::Const) {
                            ty.const_of()
                        } else {
                            ty.volatile_of()
                        };
                        items.push(Some(cv));
                    }
                }
                TokenKind::Amp => {
                    items.push(Some(self.bump()));
                    ty = ty.reference_to();
                }
                _ => break,
            }
        }

        let mut name = None;
        let mut name_text = None;
        if mode != DeclMode::Abstract
            && matches!(
                self.kind(),
                TokenKind::Identifier | TokenKind::ColonColon | TokenKind::Tilde | TokenKind::Operator
            )
        {
            let (node, encoding) = self.parse_name(false)?;
            name_text = last_identifier(node);
            items.push(Some(node));
            name = Some(encoding);
        } else if matches!(mode, DeclMode::Named | DeclMode::Member) {
            return self.fail(&messages::IDENTIFIER_EXPECTED, &[]);
        }

        let mut suffixes = Vec::new();
        let mut initialized = false;
        loop {
            match self.kind() {
                TokenKind::OpenParen => {
                    if matches!(mode, DeclMode::Named | DeclMode::Member)
                        && suffixes.is_empty()
                        && !self.looks_like_parameters()
                    {
                        items.push(Some(self.bump()));
                        items.push(self.parse_argument_list()?);
                        items.push(Some(self.expect(TokenKind::CloseParen, ")")?));
                        initialized = true;
                        break;
                    }
                    let (open, params, close, encodings, ellipsis) = self.parse_parameter_clause()?;
                    items.extend([Some(open), params, Some(close)]);
                    let mut is_const = false;
                    while self.kind().is_cv_qualifier() {
                        let cv = self.bump();
                        is_const |= cv.is_token(TokenKind::Const);
                        items.push(Some(cv));
                    }
                    if self.at(TokenKind::Throw) {
                        items.push(Some(self.bump()));
                        items.push(Some(self.expect(TokenKind::OpenParen, "(")?));
                        let mut types = Vec::new();
                        while !self.at(TokenKind::CloseParen) {
                            types.push(Some(self.parse_type_id()?.0));
                            match self.eat(TokenKind::Comma) {
                                Some(comma) => types.push(Some(comma)),
                                None => break,
                            }
                        }
                        items.push(self.factory.seq(&types));
                        items.push(Some(self.expect(TokenKind::CloseParen, ")")?));
                    }
                    suffixes.push(Suffix::Function {
                        params: encodings,
                        ellipsis,
                        is_const,
                    });
                }
                TokenKind::OpenBracket => {
                    items.push(Some(self.bump()));
                    let size = if self.at(TokenKind::CloseBracket) {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    items.push(size);
                    items.push(Some(self.expect(TokenKind::CloseBracket, "]")?));
                    let length = size
                        .filter(|s| s.is_token(TokenKind::IntegerLiteral))
                        .and_then(|s| s.text().parse::<u64>().ok());
                    suffixes.push(Suffix::Array(length));
                }
                _ => break,
            }
        }

        let is_function = matches!(suffixes.first(), Some(Suffix::Function { .. }));
        for suffix in suffixes.into_iter().rev() {
            ty = match suffix {
                Suffix::Function {
                    params,
                    ellipsis,
                    is_const,
                } => {
                    let function = Encoding::function(&params, ellipsis, &ty);
                    if is_const {
                        function.const_of()
                    } else {
                        function
                    }
                }
                Suffix::Array(length) => ty.array_of(length),
            };
        }

        if !initialized {
            if mode == DeclMode::Member && !is_function && self.at(TokenKind::Colon) {
                items.push(Some(self.bump()));
                items.push(Some(self.parse_conditional_expression()?));
            }
            if mode != DeclMode::Abstract {
                if let Some(equals) = self.eat(TokenKind::Equals) {
                    items.push(Some(equals));
                    let value = if self.at(TokenKind::OpenBrace) {
                        self.parse_initializer_list()?
                    } else {
                        self.parse_assignment_expression()?
                    };
                    items.push(Some(value));
                }
            }
        }

        let node = self
            .factory
            .list_encoded(ListKind::Declarator, &items, name.as_ref(), Some(&ty));
        Ok(Declarator {
            node,
            name: name_text,
            is_function,
        })
    }

    /// `( params )`; returns the atoms, the parameter list, the parameter
    /// types, and whether the list ends in an ellipsis.
    #[allow(clippy::type_complexity)]
    fn parse_parameter_clause(
        &mut self,
    ) -> PResult<(&'a Node<'a>, Option<&'a Node<'a>>, &'a Node<'a>, Vec<Encoding>, bool)> {
        let open = self.expect(TokenKind::OpenParen, "(")?;
        let mut items = Vec::new();
        let mut encodings = Vec::new();
        let mut ellipsis = false;
        if !self.at(TokenKind::CloseParen) {
            loop {
                if let Some(dots) = self.eat(TokenKind::Ellipsis) {
                    items.push(Some(dots));
                    ellipsis = true;
                    break;
                }
                let (parameter, encoding) = self.parse_parameter_declaration()?;
                items.push(Some(parameter));
                encodings.push(encoding);
                match self.eat(TokenKind::Comma) {
                    Some(comma) => items.push(Some(comma)),
                    None => {
                        if let Some(dots) = self.eat(TokenKind::Ellipsis) {
                            items.push(Some(dots));
                            ellipsis = true;
                        }
                        break;
                    }
                }
            }
        }
        let close = self.expect(TokenKind::CloseParen, ")")?;
        if encodings.len() == 1 && encodings[0].as_bytes() == b"v" {
            encodings.clear();
        }
        Ok((open, self.factory.seq(&items), close, encodings, ellipsis))
    }

    fn parse_parameter_declaration(&mut self) -> PResult<(&'a Node<'a>, Encoding)> {
        let specs = self.parse_decl_specifiers(Context::Parameter)?;
        if specs.type_spec.is_none() {
            return self.fail(&messages::TYPE_EXPECTED, &[]);
        }
        let declarator = self.parse_declarator(&specs.encoding, DeclMode::Parameter)?;
        let name = declarator.node.encoded_name();
        let ty = declarator.node.encoded_type().unwrap_or_default();
        let node = self.factory.list_encoded(
            ListKind::ParameterDeclaration,
            &[specs.specifiers, specs.type_spec, Some(declarator.node)],
            name.as_ref(),
            Some(&ty),
        );
        Ok((node, ty))
    }

    /// `type abstract-declarator?`
    fn parse_type_id(&mut self) -> PResult<(&'a Node<'a>, Encoding)> {
        let specs = self.parse_decl_specifiers(Context::TypeId)?;
        if specs.type_spec.is_none() {
            return self.fail(&messages::TYPE_EXPECTED, &[]);
        }
        let (declarator, ty) = if matches!(
            self.kind(),
            TokenKind::Star | TokenKind::Amp | TokenKind::OpenBracket
        ) {
            let declarator = self.parse_declarator(&specs.encoding, DeclMode::Abstract)?;
            let ty = declarator.node.encoded_type().unwrap_or_default();
            (Some(declarator.node), ty)
        } else {
            (None, specs.encoding)
        };
        let node = self.factory.list_encoded(
            ListKind::TypeId,
            &[specs.type_spec, declarator],
            None,
            Some(&ty),
        );
        Ok((node, ty))
    }

    /// `{ a, { b }, c }`
    fn parse_initializer_list(&mut self) -> PResult<&'a Node<'a>> {
        let open = self.bump();
        let mut items = Vec::new();
        while !self.at(TokenKind::CloseBrace) {
            let item = if self.at(TokenKind::OpenBrace) {
                self.nested(|p| p.parse_initializer_list())?
            } else {
                self.parse_assignment_expression()?
            };
            items.push(Some(item));
            match self.eat(TokenKind::Comma) {
                Some(comma) => items.push(Some(comma)),
                None => break,
            }
        }
        let close = self.expect(TokenKind::CloseBrace, "}")?;
        let body = self.factory.seq(&items);
        Ok(self.factory.list(ListKind::Brace, &[Some(open), body, Some(close)]))
    }

    // ========================================================================
    // Names
    // ========================================================================

    /// A simple, qualified, or template-id name. Simple identifiers stay
    /// atoms; anything else becomes a `Name` list. In a type context a `<`
    /// after an identifier always opens template arguments.
    fn parse_name(&mut self, type_context: bool) -> PResult<(&'a Node<'a>, Encoding)> {
        let mut items = Vec::new();
        let mut components = Vec::new();
        if let Some(colons) = self.eat(TokenKind::ColonColon) {
            items.push(Some(colons));
            components.push(Encoding::global_scope());
        }
        loop {
            let component = self.parse_name_component(&mut items, type_context)?;
            components.push(component);
            if self.at(TokenKind::ColonColon)
                && matches!(
                    self.kind_at(1),
                    TokenKind::Identifier | TokenKind::Tilde | TokenKind::Operator | TokenKind::Template
                )
            {
                items.push(Some(self.bump()));
                if let Some(template) = self.eat(TokenKind::Template) {
                    items.push(Some(template));
                }
                continue;
            }
            break;
        }

        if let [Some(single)] = items.as_slice() {
            if single.is_token(TokenKind::Identifier) {
                let encoding = components.pop().unwrap_or_default();
                return Ok((*single, encoding));
            }
        }
        let encoding = Encoding::qualified(&components);
        let node = self
            .factory
            .list_encoded(ListKind::Name, &items, Some(&encoding), None);
        Ok((node, encoding))
    }

    fn parse_name_component(
        &mut self,
        items: &mut Vec<Option<&'a Node<'a>>>,
        type_context: bool,
    ) -> PResult<Encoding> {
        match self.kind() {
            TokenKind::Identifier => {
                let id = self.bump();
                items.push(Some(id));
                if self.at(TokenKind::Less) && (type_context || self.is_template_name(id.text())) {
                    let args = self.parse_template_arguments(items)?;
                    return Ok(Encoding::template_id(id.text(), &args));
                }
                Ok(Encoding::simple_name(id.text()))
            }
            TokenKind::Tilde => {
                items.push(Some(self.bump()));
                let id = self.expect(TokenKind::Identifier, "identifier")?;
                items.push(Some(id));
                Ok(Encoding::simple_name(&format!("~{}", id.text())))
            }
            TokenKind::Operator => {
                items.push(Some(self.bump()));
                let mut spelling = String::from("operator");
                match self.kind() {
                    TokenKind::OpenParen | TokenKind::OpenBracket => {
                        let open = self.bump();
                        let close_kind = if open.is_token(TokenKind::OpenParen) {
                            TokenKind::CloseParen
                        } else {
                            TokenKind::CloseBracket
                        };
                        let close = self.expect(close_kind, if close_kind == TokenKind::CloseParen { ")" } else { "]" })?;
                        spelling.push_str(open.text());
                        spelling.push_str(close.text());
                        items.extend([Some(open), Some(close)]);
                    }
                    TokenKind::New | TokenKind::Delete => {
                        let keyword = self.bump();
                        spelling.push(' ');
                        spelling.push_str(keyword.text());
                        items.push(Some(keyword));
                        if self.at(TokenKind::OpenBracket) && self.kind_at(1) == TokenKind::CloseBracket {
                            items.push(Some(self.bump()));
                            items.push(Some(self.bump()));
                            spelling.push_str("[]");
                        }
                    }
                    kind if kind.is_punctuation() => {
                        let op = self.bump();
                        spelling.push_str(op.text());
                        items.push(Some(op));
                    }
                    _ => {
                        let (type_id, ty) = self.parse_type_id()?;
                        spelling.push(' ');
                        spelling.push_str(&ty.unmangled());
                        items.push(Some(type_id));
                    }
                }
                Ok(Encoding::simple_name(&spelling))
            }
            _ => self.fail(&messages::IDENTIFIER_EXPECTED, &[]),
        }
    }

    /// `< args >`, pushing the atoms and the argument list onto `items`.
    fn parse_template_arguments(&mut self, items: &mut Vec<Option<&'a Node<'a>>>) -> PResult<Vec<Encoding>> {
        items.push(Some(self.bump()));
        self.template_depth += 1;
        let arguments = self.parse_template_argument_list();
        self.template_depth -= 1;
        let (nodes, encodings) = arguments?;
        items.push(self.factory.seq(&nodes));
        items.push(Some(self.expect(TokenKind::Greater, ">")?));
        Ok(encodings)
    }

    #[allow(clippy::type_complexity)]
    fn parse_template_argument_list(&mut self) -> PResult<(Vec<Option<&'a Node<'a>>>, Vec<Encoding>)> {
        let mut nodes = Vec::new();
        let mut encodings = Vec::new();
        self.tokens.split_shift();
        if self.at(TokenKind::Greater) {
            return Ok((nodes, encodings));
        }
        loop {
            if self.is_type_start_at(0) {
                let (type_id, ty) = self.parse_type_id()?;
                nodes.push(Some(type_id));
                encodings.push(ty);
            } else {
                nodes.push(Some(self.parse_assignment_expression()?));
                encodings.push(Encoding::builtin(b'*'));
            }
            match self.eat(TokenKind::Comma) {
                Some(comma) => nodes.push(Some(comma)),
                None => break,
            }
        }
        Ok((nodes, encodings))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_block(&mut self) -> PResult<&'a Node<'a>> {
        let open = self.expect(TokenKind::OpenBrace, "{")?;
        let mut statements = Vec::new();
        self.block_depth += 1;
        while !matches!(self.kind(), TokenKind::CloseBrace | TokenKind::EndOfFile) {
            match self.parse_statement() {
                Ok(statement) => statements.push(Some(statement)),
                Err(SyntaxError) => self.synchronize(),
            }
        }
        self.block_depth -= 1;
        let close = self.expect(TokenKind::CloseBrace, "}")?;
        let body = self.factory.seq(&statements);
        Ok(self.factory.list(ListKind::Block, &[Some(open), body, Some(close)]))
    }

    fn parse_statement(&mut self) -> PResult<&'a Node<'a>> {
        self.nested(|p| {
            let kind = p.kind();
            match kind {
                TokenKind::OpenBrace => p.parse_block(),
                TokenKind::If => p.parse_if_statement(),
                TokenKind::While => p.parse_while_statement(),
                TokenKind::Do => p.parse_do_statement(),
                TokenKind::For => p.parse_for_statement(),
                TokenKind::Return => {
                    let keyword = p.bump();
                    let value = if p.at(TokenKind::Semicolon) {
                        None
                    } else {
                        Some(p.parse_expression()?)
                    };
                    let semi = p.expect(TokenKind::Semicolon, ";")?;
                    Ok(p.factory.list(ListKind::ReturnStatement, &[Some(keyword), value, Some(semi)]))
                }
                TokenKind::Break | TokenKind::Continue => {
                    let keyword = p.bump();
                    let semi = p.expect(TokenKind::Semicolon, ";")?;
                    let list_kind = if kind == TokenKind::Break {
                        ListKind::BreakStatement
                    } else {
                        ListKind::ContinueStatement
                    };
                    Ok(p.factory.list(list_kind, &[Some(keyword), Some(semi)]))
                }
                TokenKind::Semicolon => {
                    let semi = p.bump();
                    Ok(p.factory.list(ListKind::ExprStatement, &[None, Some(semi)]))
                }
                TokenKind::Using => p.parse_using(),
                TokenKind::Typedef => p.parse_typedef(),
                TokenKind::Class | TokenKind::Struct | TokenKind::Union | TokenKind::Enum => {
                    p.parse_simple_declaration(Context::Block)
                }
                _ if kind.is_decl_specifier() || kind.is_cv_qualifier() || kind.is_builtin_type() => {
                    p.parse_simple_declaration(Context::Block)
                }
                TokenKind::Identifier | TokenKind::ColonColon if p.looks_like_declaration() => {
                    p.parse_simple_declaration(Context::Block)
                }
                _ => {
                    let expression = p.parse_expression()?;
                    let semi = p.expect(TokenKind::Semicolon, ";")?;
                    Ok(p.factory.list(ListKind::ExprStatement, &[Some(expression), Some(semi)]))
                }
            }
        })
    }

    /// `if ( cond ) stmt [else stmt]`
    fn parse_if_statement(&mut self) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        let open = self.expect(TokenKind::OpenParen, "(")?;
        let condition = self.parse_expression()?;
        let close = self.expect(TokenKind::CloseParen, ")")?;
        let then = self.parse_statement()?;
        let mut items = vec![Some(keyword), Some(open), Some(condition), Some(close), Some(then)];
        if let Some(else_keyword) = self.eat(TokenKind::Else) {
            items.push(Some(else_keyword));
            items.push(Some(self.parse_statement()?));
        }
        Ok(self.factory.list(ListKind::IfStatement, &items))
    }

    fn parse_while_statement(&mut self) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        let open = self.expect(TokenKind::OpenParen, "(")?;
        let condition = self.parse_expression()?;
        let close = self.expect(TokenKind::CloseParen, ")")?;
        let body = self.parse_statement()?;
        Ok(self.factory.list(
            ListKind::WhileStatement,
            &[Some(keyword), Some(open), Some(condition), Some(close), Some(body)],
        ))
    }

    /// `do stmt while ( expr ) ;`
    fn parse_do_statement(&mut self) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        let body = self.parse_statement()?;
        let while_keyword = self.expect(TokenKind::While, "while")?;
        let open = self.expect(TokenKind::OpenParen, "(")?;
        let condition = self.parse_expression()?;
        let close = self.expect(TokenKind::CloseParen, ")")?;
        let semi = self.expect(TokenKind::Semicolon, ";")?;
        Ok(self.factory.list(
            ListKind::DoStatement,
            &[
                Some(keyword),
                Some(body),
                Some(while_keyword),
                Some(open),
                Some(condition),
                Some(close),
                Some(semi),
            ],
        ))
    }

    /// `for ( init-statement cond? ; incr? ) stmt`
    fn parse_for_statement(&mut self) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        let open = self.expect(TokenKind::OpenParen, "(")?;
        let init = self.parse_statement()?;
        let condition = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let semi = self.expect(TokenKind::Semicolon, ";")?;
        let increment = if self.at(TokenKind::CloseParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let close = self.expect(TokenKind::CloseParen, ")")?;
        let body = self.parse_statement()?;
        Ok(self.factory.list(
            ListKind::ForStatement,
            &[
                Some(keyword),
                Some(open),
                Some(init),
                condition,
                Some(semi),
                increment,
                Some(close),
                Some(body),
            ],
        ))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> PResult<&'a Node<'a>> {
        self.chained(|p, folded| {
            let mut left = p.parse_assignment_expression()?;
            while p.at(TokenKind::Comma) {
                p.fold(folded)?;
                let comma = p.bump();
                let right = p.parse_assignment_expression()?;
                left = p
                    .factory
                    .list(ListKind::CommaExpr, &[Some(left), Some(comma), Some(right)]);
            }
            Ok(left)
        })
    }

    fn parse_assignment_expression(&mut self) -> PResult<&'a Node<'a>> {
        if let Some(keyword) = self.eat(TokenKind::Throw) {
            let operand = if self.starts_expression() {
                Some(self.nested(|p| p.parse_assignment_expression())?)
            } else {
                None
            };
            return Ok(self.factory.list(ListKind::ThrowExpr, &[Some(keyword), operand]));
        }
        let left = self.parse_conditional_expression()?;
        let kind = self.kind();
        let is_closing_shift = self.template_depth > 0 && kind == TokenKind::GreaterGreaterEquals;
        if kind.is_assignment_operator() && !is_closing_shift {
            let op = self.bump();
            let right = self.nested(|p| p.parse_assignment_expression())?;
            return Ok(self
                .factory
                .list(ListKind::AssignExpr, &[Some(left), Some(op), Some(right)]));
        }
        Ok(left)
    }

    fn parse_conditional_expression(&mut self) -> PResult<&'a Node<'a>> {
        let condition = self.parse_binary_expression(OperatorPrecedence::Conditional)?;
        let Some(question) = self.eat(TokenKind::Question) else {
            return Ok(condition);
        };
        let then = self.parse_expression()?;
        let colon = self.expect(TokenKind::Colon, ":")?;
        let otherwise = self.nested(|p| p.parse_assignment_expression())?;
        Ok(self.factory.list(
            ListKind::CondExpr,
            &[Some(condition), Some(question), Some(then), Some(colon), Some(otherwise)],
        ))
    }

    fn parse_binary_expression(&mut self, min_precedence: OperatorPrecedence) -> PResult<&'a Node<'a>> {
        self.chained(|p, folded| {
            let mut left = p.parse_cast_expression()?;
            loop {
                let precedence = get_binary_operator_precedence(p.kind(), p.template_depth > 0);
                if precedence == OperatorPrecedence::Invalid || precedence <= min_precedence {
                    break;
                }
                p.fold(folded)?;
                let op = p.bump();
                let right = p.parse_binary_expression(precedence)?;
                left = p
                    .factory
                    .list(ListKind::InfixExpr, &[Some(left), Some(op), Some(right)]);
            }
            Ok(left)
        })
    }

    /// Casts and unary operators.
    fn parse_cast_expression(&mut self) -> PResult<&'a Node<'a>> {
        self.nested(|p| match p.kind() {
            TokenKind::OpenParen if p.looks_like_cast() => {
                let open = p.bump();
                let (type_id, _) = p.parse_type_id()?;
                let close = p.expect(TokenKind::CloseParen, ")")?;
                let operand = p.parse_cast_expression()?;
                Ok(p.factory.list(
                    ListKind::CastExpr,
                    &[Some(open), Some(type_id), Some(close), Some(operand)],
                ))
            }
            TokenKind::Star
            | TokenKind::Amp
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Exclaim
            | TokenKind::Tilde
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus => {
                let op = p.bump();
                let operand = p.parse_cast_expression()?;
                Ok(p.factory.list(ListKind::UnaryExpr, &[Some(op), Some(operand)]))
            }
            TokenKind::Sizeof => {
                let keyword = p.bump();
                if p.looks_like_cast() {
                    let open = p.bump();
                    let (type_id, _) = p.parse_type_id()?;
                    let close = p.expect(TokenKind::CloseParen, ")")?;
                    return Ok(p.factory.list(
                        ListKind::SizeofExpr,
                        &[Some(keyword), Some(open), Some(type_id), Some(close)],
                    ));
                }
                let operand = p.parse_cast_expression()?;
                Ok(p.factory.list(ListKind::SizeofExpr, &[Some(keyword), Some(operand)]))
            }
            TokenKind::New => p.parse_new_expression(),
            TokenKind::Delete => {
                let keyword = p.bump();
                let mut items = vec![Some(keyword)];
                if p.at(TokenKind::OpenBracket) && p.kind_at(1) == TokenKind::CloseBracket {
                    items.push(Some(p.bump()));
                    items.push(Some(p.bump()));
                }
                items.push(Some(p.parse_cast_expression()?));
                Ok(p.factory.list(ListKind::DeleteExpr, &items))
            }
            _ => p.parse_postfix_expression(),
        })
    }

    /// `new type-id [( args )]`
    fn parse_new_expression(&mut self) -> PResult<&'a Node<'a>> {
        let keyword = self.bump();
        let (type_id, _) = self.parse_type_id()?;
        let mut items = vec![Some(keyword), Some(type_id)];
        if let Some(open) = self.eat(TokenKind::OpenParen) {
            items.push(Some(open));
            items.push(self.parse_argument_list()?);
            items.push(Some(self.expect(TokenKind::CloseParen, ")")?));
        }
        Ok(self.factory.list(ListKind::NewExpr, &items))
    }

    fn parse_postfix_expression(&mut self) -> PResult<&'a Node<'a>> {
        self.chained(|p, folded| {
            let mut expression = p.parse_primary_expression()?;
            while matches!(
                p.kind(),
                TokenKind::OpenBracket
                    | TokenKind::OpenParen
                    | TokenKind::Dot
                    | TokenKind::Arrow
                    | TokenKind::PlusPlus
                    | TokenKind::MinusMinus
            ) {
                p.fold(folded)?;
                expression = match p.kind() {
                    TokenKind::OpenBracket => {
                        let open = p.bump();
                        let index = p.parse_expression()?;
                        let close = p.expect(TokenKind::CloseBracket, "]")?;
                        p.factory.list(
                            ListKind::ArrayExpr,
                            &[Some(expression), Some(open), Some(index), Some(close)],
                        )
                    }
                    TokenKind::OpenParen => {
                        let open = p.bump();
                        let args = p.parse_argument_list()?;
                        let close = p.expect(TokenKind::CloseParen, ")")?;
                        p.factory.list(
                            ListKind::FuncallExpr,
                            &[Some(expression), Some(open), args, Some(close)],
                        )
                    }
                    TokenKind::Dot | TokenKind::Arrow => {
                        let op = p.bump();
                        let list_kind = if op.is_token(TokenKind::Dot) {
                            ListKind::DotMemberExpr
                        } else {
                            ListKind::ArrowMemberExpr
                        };
                        let (member, _) = p.parse_name(false)?;
                        p.factory
                            .list(list_kind, &[Some(expression), Some(op), Some(member)])
                    }
                    TokenKind::PlusPlus | TokenKind::MinusMinus => {
                        let op = p.bump();
                        p.factory.list(ListKind::PostfixExpr, &[Some(expression), Some(op)])
                    }
                    _ => break,
                };
            }
            Ok(expression)
        })
    }

    /// Comma-separated assignment expressions up to `)`, with the commas.
    fn parse_argument_list(&mut self) -> PResult<Option<&'a Node<'a>>> {
        let mut items = Vec::new();
        if !self.at(TokenKind::CloseParen) {
            let saved = std::mem::take(&mut self.template_depth);
            let result = self.parse_argument_items(&mut items);
            self.template_depth = saved;
            result?;
        }
        Ok(self.factory.seq(&items))
    }

    fn parse_argument_items(&mut self, items: &mut Vec<Option<&'a Node<'a>>>) -> PResult<()> {
        loop {
            items.push(Some(self.parse_assignment_expression()?));
            match self.eat(TokenKind::Comma) {
                Some(comma) => items.push(Some(comma)),
                None => return Ok(()),
            }
        }
    }

    fn parse_primary_expression(&mut self) -> PResult<&'a Node<'a>> {
        let kind = self.kind();
        match kind {
            _ if kind.is_literal() => Ok(self.bump()),
            TokenKind::True | TokenKind::False | TokenKind::This => Ok(self.bump()),
            TokenKind::OpenParen => {
                let open = self.bump();
                let saved = std::mem::take(&mut self.template_depth);
                let inner = self.parse_expression();
                self.template_depth = saved;
                let inner = inner?;
                let close = self.expect(TokenKind::CloseParen, ")")?;
                Ok(self
                    .factory
                    .list(ListKind::ParenExpr, &[Some(open), Some(inner), Some(close)]))
            }
            TokenKind::Typeid => {
                let keyword = self.bump();
                let open = self.expect(TokenKind::OpenParen, "(")?;
                let operand = if self.is_type_start_at(0) {
                    self.parse_type_id()?.0
                } else {
                    self.parse_expression()?
                };
                let close = self.expect(TokenKind::CloseParen, ")")?;
                Ok(self.factory.list(
                    ListKind::TypeidExpr,
                    &[Some(keyword), Some(open), Some(operand), Some(close)],
                ))
            }
            _ if kind.is_builtin_type() => {
                let mut builtin = BuiltinSpec::default();
                let mut atoms = Vec::new();
                while self.kind().is_builtin_type() {
                    builtin.add(self.kind());
                    atoms.push(Some(self.bump()));
                }
                let type_spec = match atoms.as_slice() {
                    [Some(single)] => Some(*single),
                    _ => self.factory.seq(&atoms),
                };
                let ty = builtin.encoding().unwrap_or_else(|| Encoding::builtin(b'i'));
                self.parse_fstyle_cast(type_spec, &ty)
            }
            TokenKind::Identifier | TokenKind::ColonColon | TokenKind::Tilde | TokenKind::Operator => {
                let (name, encoding) = self.parse_name(false)?;
                let is_type = encoding
                    .last_name()
                    .get_template_name()
                    .identifier()
                    .is_some_and(|text| self.is_type_name(text));
                if is_type && self.at(TokenKind::OpenParen) {
                    return self.parse_fstyle_cast(Some(name), &encoding);
                }
                Ok(name)
            }
            _ => self.fail(&messages::EXPRESSION_EXPECTED, &[]),
        }
    }

    /// `type ( args )`
    fn parse_fstyle_cast(&mut self, type_spec: Option<&'a Node<'a>>, ty: &Encoding) -> PResult<&'a Node<'a>> {
        let open = self.expect(TokenKind::OpenParen, "(")?;
        let args = self.parse_argument_list()?;
        let close = self.expect(TokenKind::CloseParen, ")")?;
        Ok(self.factory.list_encoded(
            ListKind::FstyleCastExpr,
            &[type_spec, Some(open), args, Some(close)],
            None,
            Some(ty),
        ))
    }
}

// ============================================================================
// Shape helpers
// ============================================================================

/// Last identifier atom among the top-level elements of a name.
fn last_identifier<'a>(name: &'a Node<'a>) -> Option<&'a str> {
    if name.is_token(TokenKind::Identifier) {
        return Some(name.text());
    }
    ops::iter(Some(name))
        .flatten()
        .filter(|n| n.is_token(TokenKind::Identifier))
        .last()
        .map(|n| n.text())
}

/// Name of the function declared or defined by a declaration.
fn function_declarator_name<'a>(declaration: &'a Node<'a>) -> Option<&'a str> {
    if !declaration.is_a(ListKind::Declaration) {
        return None;
    }
    let declarator = ops::third(declaration)?;
    let declarator = if declarator.is_a(ListKind::Declarator) {
        declarator
    } else {
        ops::first(declarator)?
    };
    if !declarator.encoded_type()?.is_function() {
        return None;
    }
    ops::iter(Some(declarator))
        .flatten()
        .find(|n| n.is_token(TokenKind::Identifier) || n.is_a(ListKind::Name))
        .and_then(last_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_spec_encodings() {
        let encode = |kinds: &[TokenKind]| {
            let mut spec = BuiltinSpec::default();
            for &k in kinds {
                spec.add(k);
            }
            spec.encoding().map(|e| e.as_bytes().to_vec())
        };
        assert_eq!(encode(&[TokenKind::Unsigned, TokenKind::Long]), Some(b"Ul".to_vec()));
        assert_eq!(encode(&[TokenKind::Long, TokenKind::Long]), Some(b"j".to_vec()));
        assert_eq!(encode(&[TokenKind::Signed, TokenKind::Char]), Some(b"Sc".to_vec()));
        assert_eq!(encode(&[TokenKind::Long, TokenKind::Double]), Some(b"r".to_vec()));
        assert_eq!(encode(&[]), None);
    }

    #[test]
    fn test_template_names_are_registered() {
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, "t.cc", "template <class T> class vec {};", ParserOptions::default());
        let declarations = parser.parse_declaration_list(Context::File);
        assert_eq!(declarations.len(), 1);
        assert!(parser.is_template_name("vec"));
        assert!(parser.is_type_name("vec"));
        assert!(parser.is_type_name("T"));
    }
}
