//! Expression types.
//!
//! [`TypeEvaluator`] computes the [`Encoding`] of an expression subtree in a
//! scope. It is the type-level counterpart of the constant evaluator: read
//! only, single pass, and silent about what it does not cover. An expression
//! it cannot type yields `None`; that is a gap in coverage, not an error.

use crate::overload::resolve_funcall_with;
use cxxscope_ptree::{ops, Encoding, ListKind, Node, ScopeId, SymbolId, TokenKind};
use cxxscope_symbols::{lookup_key, LookupContext, ScopeKind, SymbolKind, SymbolTable};

/// Typedef chains and recursive class lookups stop after this many steps.
pub(crate) const MAX_ALIAS_DEPTH: usize = 16;

/// Type of `expr` evaluated in `scope`, resolving calls through overload
/// resolution.
pub fn type_of(table: &SymbolTable, scope: ScopeId, expr: &Node<'_>) -> Option<Encoding> {
    TypeEvaluator::new(table, scope).evaluate(expr)
}

#[derive(Clone, Copy)]
pub struct TypeEvaluator<'t> {
    table: &'t SymbolTable,
    scope: ScopeId,
    resolve_calls: bool,
}

impl<'t> TypeEvaluator<'t> {
    pub fn new(table: &'t SymbolTable, scope: ScopeId) -> Self {
        Self {
            table,
            scope,
            resolve_calls: true,
        }
    }

    /// Type calls by the callee's declared return type only.
    pub fn with_call_resolution(mut self, enabled: bool) -> Self {
        self.resolve_calls = enabled;
        self
    }

    pub fn table(&self) -> &'t SymbolTable {
        self.table
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn evaluate(&self, expr: &Node<'_>) -> Option<Encoding> {
        match expr {
            Node::Atom(atom) => match atom.kind {
                TokenKind::IntegerLiteral => Some(integer_literal_type(atom.text)),
                TokenKind::FloatLiteral => Some(float_literal_type(atom.text)),
                TokenKind::CharLiteral => Some(Encoding::builtin(if atom.text.starts_with('L') { b'w' } else { b'c' })),
                TokenKind::StringLiteral => {
                    let element = if atom.text.starts_with('L') { b'w' } else { b'c' };
                    Some(Encoding::builtin(element).const_of().pointer_to())
                }
                TokenKind::True | TokenKind::False => Some(Encoding::builtin(b'b')),
                TokenKind::This => self.this_type(),
                TokenKind::Identifier => self.name_type(&Encoding::simple_name(atom.text)),
                _ => None,
            },
            Node::List(list) => match list.kind {
                ListKind::Name => self.name_type(&expr.encoded_name()?),
                ListKind::ParenExpr => self.evaluate(ops::second(expr)?),
                ListKind::InfixExpr => self.infix_type(expr),
                // [lhs op rhs]
                ListKind::AssignExpr => self.evaluate(ops::first(expr)?),
                // [cond ? then : else]
                ListKind::CondExpr => self.evaluate(ops::third(expr)?),
                // [lhs , rhs]
                ListKind::CommaExpr => self.evaluate(ops::third(expr)?),
                ListKind::UnaryExpr => self.unary_type(expr),
                // [operand op]
                ListKind::PostfixExpr => self.evaluate(ops::first(expr)?),
                ListKind::ThrowExpr | ListKind::DeleteExpr => Some(Encoding::builtin(b'v')),
                ListKind::SizeofExpr => Some(Encoding::from_bytes(b"Ul")),
                ListKind::TypeidExpr => None,
                // [new TypeId ( args )]
                ListKind::NewExpr => {
                    let allocated = ops::second(expr)?.encoded_type()?;
                    match array_element(&allocated) {
                        Some(element) => Some(element.pointer_to()),
                        None => Some(allocated.pointer_to()),
                    }
                }
                // [( TypeId ) operand]
                ListKind::CastExpr => ops::second(expr)?.encoded_type(),
                ListKind::FstyleCastExpr => expr.encoded_type(),
                // [array [ index ]]
                ListKind::ArrayExpr => dereference(&self.evaluate(ops::first(expr)?)?),
                ListKind::FuncallExpr => self.call_type(expr),
                ListKind::DotMemberExpr => self.member_type(expr, false),
                ListKind::ArrowMemberExpr => self.member_type(expr, true),
                _ => None,
            },
        }
    }

    /// Declared type of what `name` denotes.
    fn name_type(&self, name: &Encoding) -> Option<Encoding> {
        let set = self.table.lookup(name, self.scope, LookupContext::DEFAULT).ok()?;
        let id = set.single()?;
        value_type_of(self.table, id)
    }

    /// Pointer to the class whose member function encloses the scope.
    fn this_type(&self) -> Option<Encoding> {
        let mut current = Some(self.scope);
        while let Some(id) = current {
            let scope = self.table.scope(id);
            match &scope.kind {
                ScopeKind::Class { name, .. } => return Some(name.pointer_to()),
                ScopeKind::Namespace { .. } => return None,
                _ => current = scope.outer,
            }
        }
        None
    }

    /// [lhs op rhs]
    fn infix_type(&self, expr: &Node<'_>) -> Option<Encoding> {
        let op = ops::second(expr)?.text();
        if matches!(op, "<" | ">" | "<=" | ">=" | "==" | "!=" | "&&" | "||") {
            return Some(Encoding::builtin(b'b'));
        }
        let lhs = decay(&self.evaluate(ops::first(expr)?)?);
        if matches!(op, "<<" | ">>") {
            return promote(&lhs);
        }
        let rhs = decay(&self.evaluate(ops::third(expr)?)?);
        match (is_pointer(&lhs), is_pointer(&rhs), op) {
            (true, true, "-") => Some(Encoding::builtin(b'l')),
            (true, false, "+" | "-") => Some(lhs),
            (false, true, "+") => Some(rhs),
            (false, false, _) => usual_arithmetic_conversion(&lhs, &rhs),
            _ => None,
        }
    }

    /// [op operand]
    fn unary_type(&self, expr: &Node<'_>) -> Option<Encoding> {
        let op = ops::first(expr)?.text();
        let operand = self.evaluate(ops::second(expr)?)?;
        match op {
            "!" => Some(Encoding::builtin(b'b')),
            "*" => dereference(&operand),
            "&" => Some(strip_reference(&operand).pointer_to()),
            "++" | "--" => Some(operand),
            _ => promote(&operand),
        }
    }

    /// [callee ( args )]
    fn call_type(&self, call: &Node<'_>) -> Option<Encoding> {
        if self.resolve_calls {
            if let Ok(id) = resolve_funcall_with(self, call) {
                return return_type_of(self.table, id);
            }
        }
        let callee = ops::first(call)?;
        if let Some(ty) = self.evaluate(callee) {
            return callable_return_type(&ty);
        }
        // An overload set whose members all return the same type.
        let name = callee_name(callee)?;
        let set = self.table.lookup(&name, self.scope, LookupContext::DEFAULT).ok()?;
        let mut returns = set.iter().map(|id| return_type_of(self.table, id));
        let first = returns.next()??;
        returns.all(|r| r.as_ref() == Some(&first)).then_some(first)
    }

    /// [object . member] / [object -> member]
    fn member_type(&self, expr: &Node<'_>, arrow: bool) -> Option<Encoding> {
        let object = strip_reference(&self.evaluate(ops::first(expr)?)?).strip_cv();
        let class_type = if arrow { dereference(&object)?.strip_cv() } else { object };
        let class = self.class_scope(&class_type)?;
        let member = callee_name(ops::third(expr)?)?;
        let set = self.table.lookup_qualified(class, &lookup_key(&member.last_name()), LookupContext::DEFAULT);
        value_type_of(self.table, set.single()?)
    }

    /// The class scope a class type names, through typedefs.
    pub fn class_scope(&self, ty: &Encoding) -> Option<ScopeId> {
        let mut ty = ty.strip_cv();
        for _ in 0..MAX_ALIAS_DEPTH {
            if !(ty.is_simple_name() || ty.is_qualified() || ty.is_template_id()) {
                return None;
            }
            let set = self.table.lookup(&ty, self.scope, LookupContext::TYPE).ok()?;
            let id = self.table.resolve_typedef(set.first()?);
            let symbol = self.table.symbol(id);
            match symbol.kind {
                SymbolKind::Class { .. } | SymbolKind::ClassTemplate { .. } => return symbol.defines,
                SymbolKind::Typedef { aliased: None } => ty = symbol.type_encoding.strip_cv(),
                _ => return None,
            }
        }
        None
    }
}

// ============================================================================
// Symbol types
// ============================================================================

/// Type of a symbol used as a value.
fn value_type_of(table: &SymbolTable, id: SymbolId) -> Option<Encoding> {
    let symbol = table.symbol(id);
    match symbol.kind {
        SymbolKind::Variable { .. }
        | SymbolKind::Const { .. }
        | SymbolKind::Enumerator { .. }
        | SymbolKind::Function { .. }
        | SymbolKind::FunctionTemplate { .. } => Some(symbol.type_encoding.clone()),
        _ => None,
    }
}

/// Return type of a function, or of a variable holding a function pointer.
pub(crate) fn return_type_of(table: &SymbolTable, id: SymbolId) -> Option<Encoding> {
    callable_return_type(&table.symbol(id).type_encoding)
}

fn callable_return_type(ty: &Encoding) -> Option<Encoding> {
    let ty = strip_reference(ty).strip_cv();
    let function = if ty.is_function() { ty } else { dereference(&ty)? };
    let (_, ret) = function.function_parts()?;
    // `?`: constructors have no return type.
    (ret.as_bytes() != b"?").then_some(ret)
}

/// Encoded name of a callee or member name node.
pub(crate) fn callee_name(node: &Node<'_>) -> Option<Encoding> {
    match node.as_atom() {
        Some(atom) if atom.kind == TokenKind::Identifier => Some(Encoding::simple_name(atom.text)),
        Some(_) => None,
        None if node.is_a(ListKind::Name) => node.encoded_name(),
        None => None,
    }
}

// ============================================================================
// Type arithmetic
// ============================================================================

fn integer_literal_type(text: &str) -> Encoding {
    let suffix: String = text
        .chars()
        .rev()
        .take_while(|c| matches!(c, 'u' | 'U' | 'l' | 'L'))
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let unsigned = suffix.contains('u');
    let longs = suffix.matches('l').count();
    let bytes: &[u8] = match (unsigned, longs) {
        (false, 0) => b"i",
        (true, 0) => b"Ui",
        (false, 1) => b"l",
        (true, 1) => b"Ul",
        (false, _) => b"j",
        (true, _) => b"Uj",
    };
    Encoding::from_bytes(bytes)
}

fn float_literal_type(text: &str) -> Encoding {
    match text.chars().last() {
        Some('f' | 'F') => Encoding::builtin(b'f'),
        Some('l' | 'L') => Encoding::builtin(b'r'),
        _ => Encoding::builtin(b'd'),
    }
}

pub(crate) fn strip_reference(ty: &Encoding) -> Encoding {
    match ty.as_bytes() {
        [b'R', rest @ ..] => Encoding::from_bytes(rest),
        _ => ty.clone(),
    }
}

/// Element type of an array type.
pub(crate) fn array_element(ty: &Encoding) -> Option<Encoding> {
    let bytes = ty.as_bytes();
    if bytes.first() != Some(&b'A') {
        return None;
    }
    let underscore = bytes.iter().position(|&b| b == b'_')?;
    Some(Encoding::from_bytes(&bytes[underscore + 1..]))
}

/// Type of `*e` for a pointer or array `e`.
pub(crate) fn dereference(ty: &Encoding) -> Option<Encoding> {
    let ty = strip_reference(ty).strip_cv();
    match ty.as_bytes() {
        [b'P', rest @ ..] => Some(Encoding::from_bytes(rest)),
        [b'A', ..] => array_element(&ty),
        _ => None,
    }
}

/// Array-to-pointer decay after dropping references and qualifiers.
pub(crate) fn decay(ty: &Encoding) -> Encoding {
    let ty = strip_reference(ty).strip_cv();
    match array_element(&ty) {
        Some(element) => element.pointer_to(),
        None => ty,
    }
}

fn is_pointer(ty: &Encoding) -> bool {
    ty.front() == Some(b'P')
}

/// Conversion rank of an arithmetic type; 0 for types that promote to int.
pub(crate) fn arithmetic_rank(ty: &Encoding) -> Option<u8> {
    let bytes = ty.as_bytes();
    let bytes = bytes.strip_prefix(b"S").unwrap_or(bytes);
    let rank = match bytes {
        b"b" | b"c" | b"Uc" | b"s" | b"Us" | b"w" => 0,
        b"i" => 1,
        b"Ui" => 2,
        b"l" => 3,
        b"Ul" => 4,
        b"j" => 5,
        b"Uj" => 6,
        b"f" => 7,
        b"d" => 8,
        b"r" => 9,
        _ => return None,
    };
    Some(rank)
}

/// Integral promotion; other arithmetic types are unchanged.
pub(crate) fn promote(ty: &Encoding) -> Option<Encoding> {
    let ty = strip_reference(ty).strip_cv();
    match arithmetic_rank(&ty)? {
        0 => Some(Encoding::builtin(b'i')),
        _ => Some(ty),
    }
}

fn usual_arithmetic_conversion(lhs: &Encoding, rhs: &Encoding) -> Option<Encoding> {
    let (lhs, rhs) = (promote(lhs)?, promote(rhs)?);
    if arithmetic_rank(&lhs)? >= arithmetic_rank(&rhs)? {
        Some(lhs)
    } else {
        Some(rhs)
    }
}
