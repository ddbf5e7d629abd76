//! The resolution pass.
//!
//! The walker runs after the binder. It re-enters the scopes the binder
//! recorded on the tree, never creating any, and resolves every name used
//! in an expression, an initializer, a call, or a type specifier inside a
//! function body. Each use becomes a [`Reference`].

use crate::overload::{resolve_funcall_with, OverloadError};
use crate::type_eval::{callee_name, TypeEvaluator};
use cxxscope_core::text::TextSpan;
use cxxscope_diagnostics::{messages, Diagnostic, DiagnosticCollection};
use cxxscope_ptree::{ops, Encoding, ListKind, Node, ScopeId, TokenKind};
use cxxscope_symbols::{candidate_list, LookupContext, LookupError, Resolution, ScopeKind, ShapeError, SymbolTable};

/// One use of a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub span: Option<TextSpan>,
    /// Name as written, e.g. `N::f`.
    pub name: String,
    pub resolution: Resolution,
    /// The name is the callee of a call expression.
    pub is_call: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Pick a single function for calls through overload resolution.
    pub resolve_calls: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self { resolve_calls: true }
    }
}

#[derive(Debug, Default)]
pub struct WalkOutput {
    pub references: Vec<Reference>,
    pub diagnostics: DiagnosticCollection,
}

/// Resolve the names used in a bound tree.
pub fn walk_tree<'a>(
    table: &SymbolTable,
    file_name: &str,
    tree: Option<&'a Node<'a>>,
    options: WalkOptions,
) -> Result<WalkOutput, ShapeError> {
    let mut walker = Walker::new(table, file_name, options);
    walker.walk(tree)?;
    Ok(walker.finish())
}

pub struct Walker<'t> {
    table: &'t SymbolTable,
    file_name: &'t str,
    options: WalkOptions,
    stack: Vec<ScopeId>,
    references: Vec<Reference>,
    diagnostics: DiagnosticCollection,
}

impl<'t> Walker<'t> {
    pub fn new(table: &'t SymbolTable, file_name: &'t str, options: WalkOptions) -> Self {
        Self {
            table,
            file_name,
            options,
            stack: Vec::new(),
            references: Vec::new(),
            diagnostics: DiagnosticCollection::new(),
        }
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticCollection {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn finish(self) -> WalkOutput {
        WalkOutput {
            references: self.references,
            diagnostics: self.diagnostics,
        }
    }

    #[tracing::instrument(skip_all, fields(file = %self.file_name))]
    pub fn walk<'a>(&mut self, tree: Option<&'a Node<'a>>) -> Result<(), ShapeError> {
        self.stack.push(SymbolTable::GLOBAL);
        let result = ops::iter(tree).flatten().try_for_each(|declaration| self.visit(declaration));
        self.stack.clear();
        tracing::debug!(references = self.references.len(), diagnostics = self.diagnostics.len(), "walked");
        result
    }

    fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(SymbolTable::GLOBAL)
    }

    /// Enter the scope the binder recorded on `node`.
    fn in_scope_of<'a>(
        &mut self,
        node: &'a Node<'a>,
        construct: ListKind,
        f: impl FnOnce(&mut Self) -> Result<(), ShapeError>,
    ) -> Result<(), ShapeError> {
        let scope = node.scope().ok_or_else(|| ShapeError {
            construct,
            expected: "a scope recorded by the binder",
            span: ops::span(Some(node)),
        })?;
        self.stack.push(scope);
        let result = f(self);
        self.stack.pop();
        result
    }

    /// Whether the current scope is inside a function body.
    fn in_function_body(&self) -> bool {
        let mut current = Some(self.current());
        while let Some(id) = current {
            let scope = self.table.scope(id);
            match scope.kind {
                ScopeKind::Function { .. } | ScopeKind::Local { .. } => return true,
                ScopeKind::Namespace { .. } | ScopeKind::Class { .. } => return false,
                _ => current = scope.outer,
            }
        }
        false
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    fn visit<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        let kind = match node {
            Node::Atom(atom) => {
                if atom.kind == TokenKind::Identifier {
                    self.resolve_name(&Encoding::simple_name(atom.text), atom.text.to_string(), Some(atom.span()));
                }
                return Ok(());
            }
            Node::List(list) => list.kind,
        };
        match kind {
            ListKind::NamespaceSpec => self.in_scope_of(node, kind, |w| match ops::third(node) {
                Some(body) => w.visit_elements(body),
                None => Ok(()),
            }),
            ListKind::ClassSpec => match ops::nth(node, 3) {
                Some(body) => self.in_scope_of(node, kind, |w| w.visit_elements(body)),
                None => Ok(()),
            },
            ListKind::EnumSpec => self.visit_enum_body(ops::third(node)),
            ListKind::Declaration => self.visit_declaration(node),
            ListKind::Declarator => self.visit_declarator(node),
            // [specs type Declarator]
            ListKind::ParameterDeclaration => match ops::third(node) {
                Some(declarator) => self.visit(declarator),
                None => Ok(()),
            },
            ListKind::TemplateDecl => self.in_scope_of(node, kind, |w| match ops::nth(node, 4) {
                Some(declaration) => w.visit(declaration),
                None => Ok(()),
            }),
            ListKind::Block | ListKind::ForStatement => self.in_scope_of(node, kind, |w| w.visit_elements(node)),
            ListKind::Typedef
            | ListKind::UsingDirective
            | ListKind::UsingDeclaration
            | ListKind::AccessSpec
            | ListKind::TypeId => Ok(()),
            ListKind::Name => {
                if let Some(name) = node.encoded_name() {
                    self.resolve_name(&name, ops::reify(Some(node)), ops::span(Some(node)));
                }
                Ok(())
            }
            ListKind::FuncallExpr => self.visit_call(node),
            // Only the object; member names are not resolved.
            ListKind::DotMemberExpr | ListKind::ArrowMemberExpr => self.visit_opt(ops::first(node)),
            // [( TypeId ) operand]
            ListKind::CastExpr => self.visit_opt(ops::nth(node, 3)),
            // [type ( args )]
            ListKind::FstyleCastExpr => self.visit_opt(ops::third(node)),
            // [sizeof ( TypeId )] or [sizeof operand]
            ListKind::SizeofExpr => match ops::length(Some(node)) {
                2 => self.visit_opt(ops::second(node)),
                _ => Ok(()),
            },
            // [new TypeId ( args )]
            ListKind::NewExpr => self.visit_opt(ops::nth(node, 3)),
            ListKind::TypeidExpr => self.visit_opt(ops::third(node)),
            _ => self.visit_elements(node),
        }
    }

    fn visit_opt<'a>(&mut self, node: Option<&'a Node<'a>>) -> Result<(), ShapeError> {
        match node {
            Some(node) => self.visit(node),
            None => Ok(()),
        }
    }

    fn visit_elements<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        for element in ops::iter(Some(node)).flatten() {
            self.visit(element)?;
        }
        Ok(())
    }

    /// Brace `[{ Cons(items) }]`; each item is `id` or `[id = expr]`.
    fn visit_enum_body<'a>(&mut self, body: Option<&'a Node<'a>>) -> Result<(), ShapeError> {
        let items = body.and_then(ops::second);
        for item in ops::iter(items).flatten().filter(|n| n.is_a(ListKind::Cons)) {
            self.visit_opt(ops::third(item))?;
        }
        Ok(())
    }

    fn visit_declaration<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        let type_spec = ops::second(node);
        let declarators = ops::third(node);
        self.visit_type_spec(type_spec)?;

        if declarators.is_some_and(|d| d.is_a(ListKind::Declarator)) {
            // [specs type Declarator member-inits? Block]
            let declarator = declarators.ok_or_else(|| ShapeError {
                construct: ListKind::Declaration,
                expected: "a declarator",
                span: ops::span(Some(node)),
            })?;
            let body = ops::last(node).filter(|b| b.is_a(ListKind::Block)).ok_or_else(|| ShapeError {
                construct: ListKind::Declaration,
                expected: "a function body",
                span: ops::span(Some(node)),
            })?;
            self.visit_declarator(declarator)?;
            return self.in_scope_of(node, ListKind::Declaration, |w| {
                if let Some(initializers) = ops::nth(node, 3).filter(|n| !n.is_a(ListKind::Block)) {
                    w.visit(initializers)?;
                }
                w.visit_elements(body)
            });
        }

        for declarator in ops::iter(declarators)
            .flatten()
            .filter(|n| n.is_a(ListKind::Declarator))
        {
            self.visit_declarator(declarator)?;
        }
        Ok(())
    }

    /// Class and enum bodies, and type names used inside function bodies.
    fn visit_type_spec<'a>(&mut self, type_spec: Option<&'a Node<'a>>) -> Result<(), ShapeError> {
        let Some(type_spec) = type_spec else {
            return Ok(());
        };
        match type_spec.list_kind() {
            Some(ListKind::ClassSpec | ListKind::EnumSpec) => self.visit(type_spec),
            Some(ListKind::Cons) => {
                for item in ops::iter(Some(type_spec)).flatten() {
                    self.visit_type_spec(Some(item))?;
                }
                Ok(())
            }
            _ => {
                if self.in_function_body() {
                    if let Some(name) = callee_name(type_spec) {
                        self.resolve_type(&name, ops::reify(Some(type_spec)), ops::span(Some(type_spec)));
                    }
                }
                Ok(())
            }
        }
    }

    /// Everything in a declarator but its declarator-id: array bounds,
    /// parameter defaults, bit-field widths, and initializers.
    fn visit_declarator<'a>(&mut self, declarator: &'a Node<'a>) -> Result<(), ShapeError> {
        let mut named = false;
        for element in ops::iter(Some(declarator)).flatten() {
            if !named && (element.is_token(TokenKind::Identifier) || element.is_a(ListKind::Name)) {
                named = true;
                continue;
            }
            match (element.list_kind(), declarator.scope()) {
                // The parameter list of a function declarator.
                (Some(ListKind::Cons), Some(prototype)) => {
                    self.stack.push(prototype);
                    let result = self.visit_elements(element);
                    self.stack.pop();
                    result?;
                }
                _ => self.visit(element)?,
            }
        }
        Ok(())
    }

    /// [callee ( args )]
    fn visit_call<'a>(&mut self, call: &'a Node<'a>) -> Result<(), ShapeError> {
        let callee = ops::first(call).ok_or_else(|| ShapeError {
            construct: ListKind::FuncallExpr,
            expected: "a callee",
            span: ops::span(Some(call)),
        })?;
        match callee_name(callee) {
            Some(name) if self.options.resolve_calls => self.resolve_call(call, callee, &name),
            _ => self.visit(callee)?,
        }
        self.visit_opt(ops::third(call))
    }

    // ========================================================================
    // Resolving
    // ========================================================================

    fn resolve_name(&mut self, name: &Encoding, text: String, span: Option<TextSpan>) {
        self.resolve_in_context(name, text, span, LookupContext::DEFAULT);
    }

    fn resolve_type(&mut self, name: &Encoding, text: String, span: Option<TextSpan>) {
        self.resolve_in_context(name, text, span, LookupContext::TYPE);
    }

    fn resolve_in_context(&mut self, name: &Encoding, text: String, span: Option<TextSpan>, context: LookupContext) {
        let resolution = match self.table.lookup(name, self.current(), context) {
            Ok(set) => {
                let resolution = Resolution::classify(self.table, &set);
                match &resolution {
                    Resolution::Unresolved => self.report(span, &messages::CANNOT_FIND_NAME_0, &[text.as_str()]),
                    Resolution::Ambiguous(candidates) => {
                        let list = candidate_list(self.table, candidates);
                        self.report(span, &messages::REFERENCE_TO_0_IS_AMBIGUOUS, &[text.as_str(), list.as_str()]);
                    }
                    _ => {}
                }
                resolution
            }
            Err(err) => self.lookup_failed(err, span),
        };
        tracing::trace!(name = %text, ?resolution, "reference");
        self.references.push(Reference {
            span,
            name: text,
            resolution,
            is_call: false,
        });
    }

    fn resolve_call(&mut self, call: &Node<'_>, callee: &Node<'_>, name: &Encoding) {
        let text = ops::reify(Some(callee));
        let span = ops::span(Some(callee));
        let eval = TypeEvaluator::new(self.table, self.current());
        let resolution = match resolve_funcall_with(&eval, call) {
            Ok(id) => Resolution::Resolved(id),
            Err(err) => {
                if let Some(diagnostic) = err.to_diagnostic(self.table, self.file_name, span) {
                    self.diagnostics.add(diagnostic);
                }
                match err {
                    OverloadError::Lookup(LookupError::Ambiguous { candidates, .. })
                    | OverloadError::Ambiguous { candidates, .. } => Resolution::Ambiguous(candidates),
                    OverloadError::Dependent { .. } => Resolution::Dependent,
                    _ => self
                        .table
                        .lookup(name, self.current(), LookupContext::DEFAULT)
                        .map_or(Resolution::Unresolved, |set| Resolution::classify(self.table, &set)),
                }
            }
        };
        tracing::trace!(callee = %text, ?resolution, "call");
        self.references.push(Reference {
            span,
            name: text,
            resolution,
            is_call: true,
        });
    }

    fn lookup_failed(&mut self, err: LookupError, span: Option<TextSpan>) -> Resolution {
        let diagnostic = err.to_diagnostic(self.table, self.file_name, span);
        self.diagnostics.add(diagnostic);
        match err {
            LookupError::Ambiguous { candidates, .. } => Resolution::Ambiguous(candidates),
            LookupError::Undefined { .. } | LookupError::NotAScope { .. } => Resolution::Unresolved,
        }
    }

    fn report(&mut self, span: Option<TextSpan>, message: &cxxscope_diagnostics::DiagnosticMessage, args: &[&str]) {
        let mut diagnostic = Diagnostic::new(message, args);
        diagnostic.file = Some(self.file_name.to_string());
        diagnostic.span = span;
        self.diagnostics.add(diagnostic);
    }
}
