//! The binder: a scope-tracking walk over a parse tree.
//!
//! Walks the declarations of a translation unit in document order with an
//! explicit stack of scopes and builds the [`SymbolTable`]:
//! - Namespace scopes, merged across reopenings
//! - Class scopes with their resolved bases
//! - Function, prototype, block, and template parameter scopes
//! - Symbols for every declared name, under the redeclaration rules
//! - Using-directives and using-declarations
//!
//! Every scope it creates is recorded both in the table's node map and on
//! the node itself, so later passes re-enter the same scopes. Running the
//! binder again over the same table re-enters those scopes and reports a
//! redeclaration for every symbol instead of inserting it twice.

use crate::const_eval::ConstEvaluator;
use crate::lookup::{lookup_key, LookupContext};
use crate::scope::ScopeKind;
use crate::symbol::{Symbol, SymbolKind};
use crate::table::{Redeclaration, SymbolTable};
use cxxscope_core::text::TextSpan;
use cxxscope_diagnostics::{messages, Diagnostic, DiagnosticCollection, DiagnosticMessage};
use cxxscope_ptree::{ops, Encoding, ListKind, Node, NodeKey, ScopeId, SymbolId, TokenKind};

/// Name given to unnamed namespaces.
const ANONYMOUS_NAMESPACE: &str = "<anonymous>";

#[derive(Debug, Clone, Copy)]
pub struct BindOptions {
    /// Warn about `.`/`->` member names, which the binder does not resolve.
    pub report_member_access: bool,
    /// Fold `sizeof` and casts in enumerator and constant initializers.
    pub extended_constant_folding: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            report_member_access: true,
            extended_constant_folding: false,
        }
    }
}

/// The tree does not have the shape the grammar produces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
#[error("malformed {construct}: expected {expected}")]
#[diagnostic(code(cxxscope::shape))]
pub struct ShapeError {
    pub construct: ListKind,
    pub expected: &'static str,
    pub span: Option<TextSpan>,
}

impl ShapeError {
    pub(crate) fn new(node: &Node<'_>, construct: ListKind, expected: &'static str) -> Self {
        Self {
            construct,
            expected,
            span: ops::span(Some(node)),
        }
    }
}

/// How a class specifier without a body is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassUse {
    /// `struct X;` declares `X` in the current scope.
    Forward,
    /// `struct X *p;` refers to a visible `X`, declaring it only when none is.
    Elaborated,
}

#[derive(Debug, Clone, Copy, Default)]
struct Storage {
    is_extern: bool,
    is_static: bool,
    is_friend: bool,
}

/// Bind `tree` into `table` and return the diagnostics.
pub fn bind_tree<'a>(
    table: &mut SymbolTable,
    file_name: &str,
    tree: Option<&'a Node<'a>>,
    options: BindOptions,
) -> Result<DiagnosticCollection, ShapeError> {
    let mut binder = Binder::new(table, file_name, options);
    binder.bind(tree)?;
    Ok(binder.take_diagnostics())
}

pub struct Binder<'t> {
    table: &'t mut SymbolTable,
    file_name: &'t str,
    options: BindOptions,
    stack: Vec<ScopeId>,
    /// Template parameter scope of the `template<...>` whose declaration is
    /// being bound.
    pending_template: Option<ScopeId>,
    diagnostics: DiagnosticCollection,
}

impl<'t> Binder<'t> {
    pub fn new(table: &'t mut SymbolTable, file_name: &'t str, options: BindOptions) -> Self {
        Self {
            table,
            file_name,
            options,
            stack: Vec::new(),
            pending_template: None,
            diagnostics: DiagnosticCollection::new(),
        }
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticCollection {
        std::mem::take(&mut self.diagnostics)
    }

    /// Bind the top-level declarations of a translation unit.
    #[tracing::instrument(skip_all, fields(file = %self.file_name))]
    pub fn bind<'a>(&mut self, tree: Option<&'a Node<'a>>) -> Result<(), ShapeError> {
        self.stack.push(SymbolTable::GLOBAL);
        let result = ops::iter(tree).flatten().try_for_each(|declaration| self.visit(declaration));
        self.stack.clear();
        self.pending_template = None;
        tracing::debug!(
            scopes = self.table.scope_count(),
            symbols = self.table.symbol_count(),
            diagnostics = self.diagnostics.len(),
            "bound"
        );
        result
    }

    fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(SymbolTable::GLOBAL)
    }

    fn with_scope(
        &mut self,
        scope: ScopeId,
        f: impl FnOnce(&mut Self) -> Result<(), ShapeError>,
    ) -> Result<(), ShapeError> {
        tracing::debug!(scope = %scope, kind = %self.table.scope(scope).describe(), "enter scope");
        self.stack.push(scope);
        let result = f(self);
        self.stack.pop();
        tracing::debug!(scope = %scope, "leave scope");
        result
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    fn visit<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        let Some(kind) = node.list_kind() else {
            return Ok(());
        };
        match kind {
            ListKind::NamespaceSpec => self.bind_namespace(node),
            ListKind::ClassSpec => self.bind_class_spec(node, ClassUse::Elaborated, None),
            ListKind::EnumSpec => self.bind_enum_spec(node),
            ListKind::Declaration => self.bind_declaration(node),
            ListKind::Typedef => self.bind_typedef(node),
            ListKind::TemplateDecl => self.bind_template(node),
            ListKind::UsingDirective => self.bind_using_directive(node),
            ListKind::UsingDeclaration => self.bind_using_declaration(node),
            ListKind::Block => self.bind_block(node),
            ListKind::ForStatement => self.bind_for_statement(node),
            ListKind::DotMemberExpr | ListKind::ArrowMemberExpr => self.bind_member_access(node),
            _ => self.visit_elements(node),
        }
    }

    fn visit_elements<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        for element in ops::iter(Some(node)).flatten() {
            self.visit(element)?;
        }
        Ok(())
    }

    // ========================================================================
    // Namespaces
    // ========================================================================

    /// `[namespace name|nil Brace]`
    fn bind_namespace<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        let body = ops::third(node)
            .filter(|b| b.is_a(ListKind::Brace))
            .ok_or_else(|| ShapeError::new(node, ListKind::NamespaceSpec, "a brace-enclosed body"))?;
        let anonymous = node.encoded_name().is_none();
        let name = node
            .encoded_name()
            .unwrap_or_else(|| Encoding::simple_name(ANONYMOUS_NAMESPACE));
        let current = self.current();
        let span = ops::span(ops::second(node).or(ops::first(node)));
        let symbol = Symbol::new(name.clone(), SymbolKind::Namespace, name.clone(), current, node.key(), span);

        let scope = match self.table.declare(current, symbol) {
            Ok(id) => match self.table.symbol(id).defines {
                Some(scope) => {
                    self.table.add_fragment(scope, node.key());
                    self.table.set_node_scope(node.key(), scope);
                    scope
                }
                None => {
                    let kind = ScopeKind::Namespace {
                        name: name.clone(),
                        fragments: vec![node.key()],
                        using: Vec::new(),
                    };
                    let scope = self.table.create_scope(kind, Some(current), Some(node.key()));
                    self.table.symbol_mut(id).defines = Some(scope);
                    scope
                }
            },
            Err(err) => {
                self.report_redeclaration(err, &name.unmangled(), span);
                let previous = self.table.symbol(err.previous);
                match (previous.kind == SymbolKind::Namespace).then_some(previous.defines).flatten() {
                    Some(scope) => scope,
                    None => self.scope_for(node.key(), current, || ScopeKind::Namespace {
                        name: name.clone(),
                        fragments: vec![node.key()],
                        using: Vec::new(),
                    }),
                }
            }
        };
        node.set_scope(scope);
        if anonymous {
            self.table.add_using(current, scope);
        }
        self.with_scope(scope, |b| b.visit_elements(body))
    }

    /// The scope a previous pass created for `node`, or a new one.
    fn scope_for(&mut self, node: NodeKey, outer: ScopeId, kind: impl FnOnce() -> ScopeKind) -> ScopeId {
        match self.table.find_scope(node) {
            Some(scope) => scope,
            None => self.table.create_scope(kind(), Some(outer), Some(node)),
        }
    }

    // ========================================================================
    // Classes and enums
    // ========================================================================

    /// `[class|struct|union name|nil bases|nil ClassBody|nil]`
    fn bind_class_spec<'a>(
        &mut self,
        spec: &'a Node<'a>,
        usage: ClassUse,
        template: Option<ScopeId>,
    ) -> Result<(), ShapeError> {
        let body = ops::nth(spec, 3);
        if body.is_some_and(|b| !b.is_a(ListKind::ClassBody)) {
            return Err(ShapeError::new(spec, ListKind::ClassSpec, "a class body"));
        }
        let name = spec
            .encoded_name()
            .ok_or_else(|| ShapeError::new(spec, ListKind::ClassSpec, "an encoded class name"))?;
        let span = ops::span(ops::second(spec).or(ops::first(spec)));

        if body.is_none() && usage == ClassUse::Elaborated && template.is_none() {
            match self.table.lookup(&name, self.current(), LookupContext::ELABORATED) {
                Ok(set) if !set.is_empty() => {
                    let declared_here = set
                        .iter()
                        .find(|&id| self.table.symbol(id).declarations.contains(&spec.key()));
                    if let Some(previous) = declared_here {
                        let err = Redeclaration {
                            previous,
                            redefinition: false,
                        };
                        self.report_redeclaration(err, &name.unmangled(), span);
                    }
                    return Ok(());
                }
                Ok(_) if name.is_qualified() => {
                    self.report(span, &messages::CANNOT_FIND_NAME_0, &[&name.unmangled()]);
                    return Ok(());
                }
                Ok(_) => {}
                Err(err) => {
                    let diagnostic = err.to_diagnostic(self.table, self.file_name, span);
                    self.diagnostics.add(diagnostic);
                    return Ok(());
                }
            }
        }

        let target = if name.is_qualified() {
            self.declaration_target(&name, span)
        } else {
            Some((self.current(), name.clone()))
        };
        let defined = body.is_some();
        let kind = match template {
            Some(_) => SymbolKind::ClassTemplate { defined },
            None => SymbolKind::Class { defined },
        };
        let (symbol, declaring, key) = match target {
            Some((scope, key)) => {
                let symbol = Symbol::new(key.clone(), kind, key.clone(), scope, spec.key(), span);
                match self.table.declare(scope, symbol) {
                    Ok(id) => (Some(id), scope, key),
                    Err(err) => {
                        self.report_redeclaration(err, &key.unmangled(), span);
                        (None, scope, key)
                    }
                }
            }
            None => (None, self.current(), name.last_name()),
        };
        let Some(body) = body else {
            return Ok(());
        };

        let outer = template.unwrap_or(declaring);
        let class = self.scope_for(spec.key(), outer, || ScopeKind::Class {
            name: key,
            spec: spec.key(),
            bases: Vec::new(),
        });
        spec.set_scope(class);
        self.bind_bases(class, ops::third(spec), outer);
        if let Some(id) = symbol {
            self.table.symbol_mut(id).defines = Some(class);
        }
        self.with_scope(class, |b| b.visit_elements(body))
    }

    /// `Cons[: [access... name] , ...]`, resolved from `from`.
    fn bind_bases<'a>(&mut self, class: ScopeId, bases: Option<&'a Node<'a>>, from: ScopeId) {
        for base in ops::iter(bases).flatten().filter(|n| !n.is_atom()) {
            let Some(name_node) = ops::last(base) else {
                continue;
            };
            let Some(name) = name_of(name_node) else {
                continue;
            };
            let span = ops::span(Some(name_node));
            match self.table.lookup_scope(&name, from) {
                Ok(Some(scope)) if self.table.scope(scope).is_class() => {
                    self.table.add_base(class, scope);
                }
                Ok(Some(_)) => {
                    self.report(span, &messages::_0_IS_NOT_A_NAMESPACE_OR_CLASS, &[&name.unmangled()]);
                }
                // Dependent base; nothing to search until instantiation.
                Ok(None) => {}
                Err(err) => {
                    let diagnostic = err.to_diagnostic(self.table, self.file_name, span);
                    self.diagnostics.add(diagnostic);
                }
            }
        }
    }

    /// `[enum name|nil Brace|nil]`
    fn bind_enum_spec<'a>(&mut self, spec: &'a Node<'a>) -> Result<(), ShapeError> {
        let body = ops::third(spec);
        if body.is_some_and(|b| !b.is_a(ListKind::Brace)) {
            return Err(ShapeError::new(spec, ListKind::EnumSpec, "a brace-enclosed enumerator list"));
        }
        let name = spec
            .encoded_name()
            .ok_or_else(|| ShapeError::new(spec, ListKind::EnumSpec, "an encoded enum name"))?;
        let current = self.current();

        if let Some(name_node) = ops::second(spec) {
            let span = ops::span(Some(name_node));
            if body.is_none() {
                let visible = self
                    .table
                    .lookup(&name, current, LookupContext::ELABORATED)
                    .is_ok_and(|set| !set.is_empty());
                if visible {
                    return Ok(());
                }
            }
            let symbol = Symbol::new(name.clone(), SymbolKind::Enum, name.clone(), current, spec.key(), span);
            self.declare(current, symbol);
        }

        let Some(body) = body else {
            return Ok(());
        };
        let mut next = Some(0i64);
        for item in ops::iter(ops::second(body)).flatten() {
            let (id, initializer) = if item.is_token(TokenKind::Identifier) {
                (item, None)
            } else if item.is_a(ListKind::Cons) {
                // [id = expr]
                match ops::first(item) {
                    Some(id) => (id, ops::third(item)),
                    None => continue,
                }
            } else {
                continue;
            };
            let value = match initializer {
                Some(expr) => {
                    let value = self.evaluate(expr);
                    if value.is_none() {
                        self.report(
                            ops::span(Some(expr)),
                            &messages::_0_IS_NOT_A_CONSTANT_EXPRESSION,
                            &[&ops::reify(Some(expr))],
                        );
                    }
                    value
                }
                None => next,
            };
            let span = id.as_atom().map(|a| a.span());
            let symbol = Symbol::new(
                Encoding::simple_name(id.text()),
                SymbolKind::Enumerator { value },
                name.clone(),
                current,
                id.key(),
                span,
            );
            self.declare(current, symbol);
            next = value.and_then(|v| v.checked_add(1));
        }
        Ok(())
    }

    /// Bind the class and enum specifiers inside a type specifier.
    fn bind_type_spec<'a>(
        &mut self,
        type_spec: &'a Node<'a>,
        usage: ClassUse,
        template: Option<ScopeId>,
    ) -> Result<(), ShapeError> {
        match type_spec.list_kind() {
            Some(ListKind::ClassSpec) => self.bind_class_spec(type_spec, usage, template),
            Some(ListKind::EnumSpec) => self.bind_enum_spec(type_spec),
            Some(ListKind::Cons) => {
                for item in ops::iter(Some(type_spec)).flatten() {
                    self.bind_type_spec(item, usage, template)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// `[specifiers type-spec declarators ;]` or a function definition
    /// `[specifiers type-spec Declarator member-inits? Block]`.
    fn bind_declaration<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        let template = self.pending_template.take();
        let specifiers = ops::first(node);
        let type_spec = ops::second(node);
        let declarators = ops::third(node);
        let storage = Storage {
            is_extern: has_specifier(specifiers, TokenKind::Extern),
            is_static: has_specifier(specifiers, TokenKind::Static),
            is_friend: has_specifier(specifiers, TokenKind::Friend),
        };

        if declarators.is_some_and(|d| d.is_a(ListKind::Declarator)) {
            if let Some(type_spec) = type_spec {
                self.bind_type_spec(type_spec, ClassUse::Elaborated, None)?;
            }
            return self.bind_function_definition(node, template);
        }

        if let Some(type_spec) = type_spec {
            if declarators.is_none() && !storage.is_friend {
                self.bind_type_spec(type_spec, ClassUse::Forward, template)?;
            } else {
                self.bind_type_spec(type_spec, ClassUse::Elaborated, None)?;
            }
        }
        for declarator in ops::iter(declarators)
            .flatten()
            .filter(|n| n.is_a(ListKind::Declarator))
        {
            self.bind_declarator(declarator, storage, template)?;
        }
        Ok(())
    }

    fn bind_declarator<'a>(
        &mut self,
        declarator: &'a Node<'a>,
        storage: Storage,
        template: Option<ScopeId>,
    ) -> Result<(), ShapeError> {
        let Some(name) = declarator.encoded_name() else {
            return self.visit_elements(declarator);
        };
        let ty = declarator.encoded_type().unwrap_or_default();
        let span = declarator_name_span(declarator);

        if ty.is_function() {
            // Friend functions belong to the enclosing namespace, not the class.
            if storage.is_friend {
                return Ok(());
            }
            let params = parameter_list(declarator);
            let kind = function_kind(params, template.is_some(), false);
            let (_, declaring) = self.declare_named(&name, kind, ty, declarator.key(), span);
            let prototype = self.prototype_scope(declarator, template.unwrap_or(declaring));
            return self.bind_parameters(params, prototype);
        }

        let initializer = initializer_of(declarator);
        let value = initializer
            .filter(|_| is_const_integral(&ty))
            .and_then(|expr| self.evaluate(expr));
        let kind = match value {
            Some(value) => SymbolKind::Const { value: Some(value) },
            None => {
                let in_class = self.table.scope(self.current()).is_class();
                let declaration_only = storage.is_extern || (in_class && storage.is_static);
                SymbolKind::Variable {
                    defined: initializer.is_some() || !declaration_only,
                }
            }
        };
        self.declare_named(&name, kind, ty, declarator.key(), span);
        self.visit_elements(declarator)
    }

    /// `[specifiers type-spec Declarator member-inits? Block]`
    fn bind_function_definition<'a>(
        &mut self,
        node: &'a Node<'a>,
        template: Option<ScopeId>,
    ) -> Result<(), ShapeError> {
        let declarator = ops::third(node)
            .ok_or_else(|| ShapeError::new(node, ListKind::Declaration, "a declarator"))?;
        let body = ops::last(node)
            .filter(|b| b.is_a(ListKind::Block))
            .ok_or_else(|| ShapeError::new(node, ListKind::Declaration, "a function body"))?;
        let name = declarator
            .encoded_name()
            .ok_or_else(|| ShapeError::new(declarator, ListKind::Declarator, "a declarator-id"))?;
        let ty = declarator.encoded_type().unwrap_or_default();
        let span = declarator_name_span(declarator);
        let params = parameter_list(declarator);
        let kind = function_kind(params, template.is_some(), true);

        let (symbol, declaring) = self.declare_named(&name, kind, ty, declarator.key(), span);
        if let Some(template) = template.filter(|_| name.is_qualified()) {
            self.table.reparent(template, declaring);
        }
        let outer = template.unwrap_or(declaring);
        let prototype = self.prototype_scope(declarator, outer);
        let function = self.scope_for(node.key(), outer, || ScopeKind::Function {
            name: lookup_key(&name.last_name()),
            decl: node.key(),
            parameters: Some(prototype),
            using: Vec::new(),
        });
        node.set_scope(function);
        body.set_scope(function);
        self.table.set_node_scope(body.key(), function);
        if let Some(id) = symbol {
            self.table.symbol_mut(id).defines = Some(function);
        }

        self.bind_parameters(params, prototype)?;
        self.with_scope(function, |b| {
            if let Some(initializers) = ops::nth(node, 3).filter(|n| !n.is_a(ListKind::Block)) {
                b.visit(initializers)?;
            }
            b.visit_elements(body)
        })
    }

    fn prototype_scope(&mut self, declarator: &Node<'_>, outer: ScopeId) -> ScopeId {
        let key = declarator.key();
        let scope = self.scope_for(key, outer, || ScopeKind::Prototype { decl: key });
        declarator.set_scope(scope);
        scope
    }

    fn bind_parameters<'a>(&mut self, params: Option<&'a Node<'a>>, prototype: ScopeId) -> Result<(), ShapeError> {
        self.with_scope(prototype, |b| {
            for param in ops::iter(params)
                .flatten()
                .filter(|n| n.is_a(ListKind::ParameterDeclaration))
            {
                let declarator = ops::third(param);
                if let Some(name) = param.encoded_name() {
                    let ty = param.encoded_type().unwrap_or_default();
                    let span = declarator.and_then(declarator_name_span);
                    let symbol = Symbol::new(
                        name,
                        SymbolKind::Variable { defined: true },
                        ty,
                        prototype,
                        param.key(),
                        span,
                    );
                    b.declare(prototype, symbol);
                }
                if let Some(declarator) = declarator {
                    b.visit_elements(declarator)?;
                }
            }
            Ok(())
        })
    }

    /// `[typedef type-spec declarators ;]`
    fn bind_typedef<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        if let Some(type_spec) = ops::second(node) {
            self.bind_type_spec(type_spec, ClassUse::Elaborated, None)?;
        }
        let current = self.current();
        for declarator in ops::iter(ops::third(node))
            .flatten()
            .filter(|n| n.is_a(ListKind::Declarator))
        {
            let Some(name) = declarator.encoded_name() else {
                continue;
            };
            let ty = declarator.encoded_type().unwrap_or_default();
            let aliased = self.aliased_symbol(&ty);
            let span = declarator_name_span(declarator);
            let symbol = Symbol::new(name, SymbolKind::Typedef { aliased }, ty, current, declarator.key(), span);
            self.declare(current, symbol);
        }
        Ok(())
    }

    /// The class, enum, template, or typedef a typedef's type names directly.
    fn aliased_symbol(&self, ty: &Encoding) -> Option<SymbolId> {
        let base = ty.strip_cv();
        if !(base.is_simple_name() || base.is_qualified() || base.is_template_id()) {
            return None;
        }
        self.table
            .lookup(&base, self.current(), LookupContext::TYPE)
            .ok()?
            .first()
    }

    /// `[template < params|nil > declaration]`
    fn bind_template<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        let declaration = ops::nth(node, 4)
            .ok_or_else(|| ShapeError::new(node, ListKind::TemplateDecl, "a templated declaration"))?;
        let outer = self.pending_template.take().unwrap_or_else(|| self.current());
        let key = node.key();
        let scope = self.scope_for(key, outer, || ScopeKind::TemplateParameters { decl: key });
        node.set_scope(scope);

        for param in ops::iter(ops::third(node)).flatten() {
            match param.list_kind() {
                // [class|typename name? (= TypeId)?]
                Some(ListKind::TypeParameter) => {
                    let Some(id) = ops::second(param).filter(|n| n.is_token(TokenKind::Identifier)) else {
                        continue;
                    };
                    let name = Encoding::simple_name(id.text());
                    let span = id.as_atom().map(|a| a.span());
                    let symbol = Symbol::new(name.clone(), SymbolKind::TypeParameter, name, scope, param.key(), span);
                    self.declare(scope, symbol);
                }
                Some(ListKind::ParameterDeclaration) => {
                    let Some(name) = param.encoded_name() else {
                        continue;
                    };
                    let ty = param.encoded_type().unwrap_or_default();
                    let span = ops::third(param).and_then(declarator_name_span);
                    let symbol = Symbol::new(name, SymbolKind::Variable { defined: true }, ty, scope, param.key(), span);
                    self.declare(scope, symbol);
                }
                _ => {}
            }
        }

        self.pending_template = Some(scope);
        let result = self.visit(declaration);
        self.pending_template = None;
        result
    }

    // ========================================================================
    // Using
    // ========================================================================

    /// `[using namespace name ;]`
    fn bind_using_directive<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        let name = node
            .encoded_name()
            .ok_or_else(|| ShapeError::new(node, ListKind::UsingDirective, "an encoded namespace name"))?;
        let span = ops::span(ops::third(node));
        let current = self.current();
        if self.table.scope(current).is_class() {
            self.report(span, &messages::USING_DIRECTIVE_NOT_ALLOWED_IN_CLASS, &[]);
            return Ok(());
        }
        let text = name.unmangled();
        match self.table.lookup_scope(&name, current) {
            Ok(Some(target)) if self.table.scope(target).is_namespace() => {
                self.table.add_using(current, target);
                tracing::trace!(scope = %current, target = %target, "using-directive");
            }
            Ok(_) => self.report(span, &messages::_0_IS_NOT_A_NAMESPACE, &[&text]),
            Err(crate::lookup::LookupError::NotAScope { .. }) => {
                self.report(span, &messages::_0_IS_NOT_A_NAMESPACE, &[&text])
            }
            Err(err) => {
                let diagnostic = err.to_diagnostic(self.table, self.file_name, span);
                self.diagnostics.add(diagnostic);
            }
        }
        Ok(())
    }

    /// `[using name ;]`
    fn bind_using_declaration<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        let name = node
            .encoded_name()
            .ok_or_else(|| ShapeError::new(node, ListKind::UsingDeclaration, "an encoded name"))?;
        let span = ops::span(ops::second(node));
        let current = self.current();
        let set = match self.table.lookup(&name, current, LookupContext::DEFAULT) {
            Ok(set) => set,
            Err(err) => {
                let diagnostic = err.to_diagnostic(self.table, self.file_name, span);
                self.diagnostics.add(diagnostic);
                return Ok(());
            }
        };
        if set.is_dependent() {
            return Ok(());
        }
        if set.is_empty() {
            self.report(span, &messages::CANNOT_FIND_NAME_0, &[&name.unmangled()]);
            return Ok(());
        }
        let key = lookup_key(&name.last_name());
        for id in set.iter() {
            let conflict = self
                .table
                .scope(current)
                .symbols_named(&key)
                .iter()
                .copied()
                .find(|&existing| existing == id || self.conflicts(existing, id));
            match conflict {
                Some(previous) => {
                    let err = Redeclaration {
                        previous,
                        redefinition: false,
                    };
                    self.report_redeclaration(err, &name.unmangled(), span);
                }
                None => {
                    self.table.alias(current, key.clone(), id);
                }
            }
        }
        Ok(())
    }

    /// Whether `a` and `b` cannot both be visible under one name.
    fn conflicts(&self, a: SymbolId, b: SymbolId) -> bool {
        let (a, b) = (self.table.symbol(a), self.table.symbol(b));
        if a.is_function() && b.is_function() {
            return false;
        }
        a.is_type_name() == b.is_type_name()
    }

    // ========================================================================
    // Statements and expressions
    // ========================================================================

    fn bind_block<'a>(&mut self, block: &'a Node<'a>) -> Result<(), ShapeError> {
        let key = block.key();
        let scope = self.scope_for(key, self.current(), || ScopeKind::Local {
            block: key,
            using: Vec::new(),
        });
        block.set_scope(scope);
        self.with_scope(scope, |b| b.visit_elements(block))
    }

    /// `[for ( init cond|nil ; incr|nil ) body]`; the init-statement's
    /// names are scoped to the loop.
    fn bind_for_statement<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        if ops::nth(node, 7).is_none() {
            return Err(ShapeError::new(node, ListKind::ForStatement, "a loop body"));
        }
        let key = node.key();
        let scope = self.scope_for(key, self.current(), || ScopeKind::Local {
            block: key,
            using: Vec::new(),
        });
        node.set_scope(scope);
        self.with_scope(scope, |b| b.visit_elements(node))
    }

    /// `[object . member]` / `[object -> member]`. Only the object is bound.
    fn bind_member_access<'a>(&mut self, node: &'a Node<'a>) -> Result<(), ShapeError> {
        if self.options.report_member_access {
            let member = ops::third(node);
            self.report(
                ops::span(member),
                &messages::MEMBER_ACCESS_0_NOT_RESOLVED,
                &[&ops::reify(member)],
            );
        }
        match ops::first(node) {
            Some(object) => self.visit(object),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Declaring
    // ========================================================================

    /// Declare `symbol`, reporting a collision.
    fn declare(&mut self, scope: ScopeId, symbol: Symbol) -> Option<SymbolId> {
        let name = symbol.name_text();
        let span = symbol.span;
        match self.table.declare(scope, symbol) {
            Ok(id) => Some(id),
            Err(err) => {
                self.report_redeclaration(err, &name, span);
                None
            }
        }
    }

    /// Declare a function or variable named by a declarator-id. Qualified
    /// names must match a prior declaration in the scope their qualifier
    /// names. Returns the symbol and the scope it belongs to.
    fn declare_named(
        &mut self,
        name: &Encoding,
        kind: SymbolKind,
        ty: Encoding,
        node: NodeKey,
        span: Option<TextSpan>,
    ) -> (Option<SymbolId>, ScopeId) {
        let current = self.current();
        if !name.is_qualified() {
            let symbol = Symbol::new(name.clone(), kind, ty, current, node, span);
            return (self.declare(current, symbol), current);
        }
        let Some((scope, last)) = self.declaration_target(name, span) else {
            return (None, current);
        };
        let key = lookup_key(&last);
        let existing = self.table.lookup_qualified(scope, &key, LookupContext::DECLARATION);
        let text = name.unmangled();
        if existing.is_empty() {
            self.report(span, &messages::NO_DECLARATION_MATCHES_0, &[&text]);
            return (None, scope);
        }
        // A member of a class template is not itself a template.
        let kind = match kind {
            SymbolKind::FunctionTemplate {
                params,
                default_args,
                ellipsis,
                defined,
            } if !existing
                .iter()
                .any(|id| matches!(self.table.symbol(id).kind, SymbolKind::FunctionTemplate { .. })) =>
            {
                SymbolKind::Function {
                    params,
                    default_args,
                    ellipsis,
                    defined,
                }
            }
            kind => kind,
        };
        let before = self.table.symbol_count();
        let id = self.declare(scope, Symbol::new(key, kind, ty, scope, node, span));
        if self.table.symbol_count() > before {
            self.report(span, &messages::NO_DECLARATION_MATCHES_0, &[&text]);
        }
        (id, scope)
    }

    /// The scope named by the qualifier of `name`, and its last component.
    fn declaration_target(&mut self, name: &Encoding, span: Option<TextSpan>) -> Option<(ScopeId, Encoding)> {
        let names = name.names();
        let (last, qualifier) = names.split_last()?;
        match self.table.lookup_scope(&Encoding::qualified(qualifier), self.current()) {
            Ok(Some(scope)) => Some((scope, last.clone())),
            Ok(None) => None,
            Err(err) => {
                let diagnostic = err.to_diagnostic(self.table, self.file_name, span);
                self.diagnostics.add(diagnostic);
                None
            }
        }
    }

    fn evaluate(&self, expr: &Node<'_>) -> Option<i64> {
        ConstEvaluator::new(self.table, self.current())
            .with_extended_folding(self.options.extended_constant_folding)
            .evaluate(expr)
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    fn diagnostic(&self, span: Option<TextSpan>, message: &DiagnosticMessage, args: &[&str]) -> Diagnostic {
        let mut diagnostic = Diagnostic::new(message, args);
        diagnostic.file = Some(self.file_name.to_string());
        diagnostic.span = span;
        diagnostic
    }

    fn report(&mut self, span: Option<TextSpan>, message: &DiagnosticMessage, args: &[&str]) {
        let diagnostic = self.diagnostic(span, message, args);
        self.diagnostics.add(diagnostic);
    }

    fn report_redeclaration(&mut self, err: Redeclaration, name: &str, span: Option<TextSpan>) {
        let message = if err.redefinition {
            &messages::REDEFINITION_OF_0
        } else {
            &messages::REDECLARATION_OF_0
        };
        let note = self.diagnostic(
            self.table.symbol(err.previous).span,
            &messages::PREVIOUS_DECLARATION_OF_0,
            &[name],
        );
        tracing::trace!(name, previous = %err.previous, "redeclaration");
        let diagnostic = self.diagnostic(span, message, &[name]).with_related(note);
        self.diagnostics.add(diagnostic);
    }
}

// ============================================================================
// Shape helpers
// ============================================================================

fn has_specifier(specifiers: Option<&Node<'_>>, kind: TokenKind) -> bool {
    ops::iter(specifiers).flatten().any(|n| n.is_token(kind))
}

/// Encoding of a name node: an identifier atom or a `Name` list.
fn name_of(node: &Node<'_>) -> Option<Encoding> {
    match node.as_atom() {
        Some(atom) if atom.kind == TokenKind::Identifier => Some(Encoding::simple_name(atom.text)),
        Some(_) => None,
        None => node.encoded_name(),
    }
}

fn declarator_name_span(declarator: &Node<'_>) -> Option<TextSpan> {
    let name = ops::iter(Some(declarator)).flatten()
        .find(|n| n.is_token(TokenKind::Identifier) || n.is_a(ListKind::Name));
    ops::span(name.or(Some(declarator)))
}

/// The parameter list following the first `(` of a function declarator.
fn parameter_list<'a>(declarator: &'a Node<'a>) -> Option<&'a Node<'a>> {
    let mut elements = ops::iter(Some(declarator));
    while let Some(element) = elements.next() {
        if element.is_some_and(|n| n.is_token(TokenKind::OpenParen)) {
            return elements.next().flatten();
        }
    }
    None
}

/// The expression after `=` in a declarator.
fn initializer_of<'a>(declarator: &'a Node<'a>) -> Option<&'a Node<'a>> {
    let mut elements = ops::iter(Some(declarator));
    while let Some(element) = elements.next() {
        if element.is_some_and(|n| n.is_token(TokenKind::Equals)) {
            return elements.next().flatten();
        }
    }
    None
}

/// Parameter count, defaulted parameter count, and trailing ellipsis.
fn signature(params: Option<&Node<'_>>) -> (usize, usize, bool) {
    let mut count = 0;
    let mut defaults = 0;
    let mut ellipsis = false;
    for element in ops::iter(params).flatten() {
        if element.is_token(TokenKind::Ellipsis) {
            ellipsis = true;
        } else if element.is_a(ListKind::ParameterDeclaration) {
            // `(void)`
            let is_void = element.encoded_name().is_none()
                && element.encoded_type().is_some_and(|t| t.as_bytes() == b"v");
            if is_void {
                continue;
            }
            count += 1;
            let has_default = ops::iter(ops::third(element)).flatten().any(|n| n.is_token(TokenKind::Equals));
            if has_default {
                defaults += 1;
            }
        }
    }
    (count, defaults, ellipsis)
}

fn function_kind(params: Option<&Node<'_>>, template: bool, defined: bool) -> SymbolKind {
    let (params, default_args, ellipsis) = signature(params);
    if template {
        SymbolKind::FunctionTemplate {
            params,
            default_args,
            ellipsis,
            defined,
        }
    } else {
        SymbolKind::Function {
            params,
            default_args,
            ellipsis,
            defined,
        }
    }
}

fn is_const_integral(ty: &Encoding) -> bool {
    ty.front() == Some(b'C')
        && matches!(
            ty.strip_cv().as_bytes(),
            b"b" | b"c" | b"w" | b"s" | b"i" | b"l" | b"j" | b"Sc" | b"Uc" | b"Us" | b"Ui" | b"Ul" | b"Uj"
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_integral_types() {
        assert!(is_const_integral(&Encoding::builtin(b'i').const_of()));
        assert!(is_const_integral(&Encoding::from_bytes(b"CUl")));
        assert!(!is_const_integral(&Encoding::builtin(b'i')));
        assert!(!is_const_integral(&Encoding::builtin(b'd').const_of()));
        assert!(!is_const_integral(&Encoding::builtin(b'c').pointer_to().const_of()));
    }
}
