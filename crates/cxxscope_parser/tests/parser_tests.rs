//! Parser integration tests.
//!
//! Checks the list shapes and encodings the symbol table relies on.

use bumpalo::Bump;
use cxxscope_diagnostics::messages;
use cxxscope_parser::{parse, Parser, ParserOptions};
use cxxscope_ptree::{ops, ListKind, Node, TokenKind};

/// Helper: top-level declarations of `source`.
fn declarations<'a>(arena: &'a Bump, source: &'a str) -> Vec<&'a Node<'a>> {
    let output = parse(arena, "test.cc", source);
    assert!(output.errors.is_empty(), "errors: {:?}", output.errors);
    ops::iter(output.tree).flatten().collect()
}

/// Helper: the first declarator of a simple declaration.
fn first_declarator<'a>(declaration: &'a Node<'a>) -> &'a Node<'a> {
    let declarators = ops::third(declaration).expect("declarators");
    if declarators.is_a(ListKind::Declarator) {
        declarators
    } else {
        ops::first(declarators).expect("declarator")
    }
}

fn type_of(declaration: &Node<'_>) -> String {
    let declaration: &Node<'_> = declaration;
    let declarators = ops::third(declaration).expect("declarators");
    let declarator = if declarators.is_a(ListKind::Declarator) {
        declarators
    } else {
        ops::first(declarators).expect("declarator")
    };
    declarator.encoded_type().expect("type").unmangled()
}

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn test_parse_variable_types() {
    let arena = Bump::new();
    let decls = declarations(&arena, "const char *s; unsigned long n[4]; int &r = n;");
    assert_eq!(decls.len(), 3);
    assert_eq!(type_of(decls[0]), "const char*");
    assert_eq!(type_of(decls[1]), "unsigned long[4]");
    assert_eq!(type_of(decls[2]), "int&");
    assert!(decls.iter().all(|d| d.is_a(ListKind::Declaration)));
}

#[test]
fn test_parse_function_prototype_and_definition() {
    let arena = Bump::new();
    let decls = declarations(&arena, "int f(int, char); void g(void) {}");
    let prototype = first_declarator(decls[0]);
    assert_eq!(prototype.encoded_type().map(|e| e.as_bytes().to_vec()), Some(b"Fic_i".to_vec()));
    assert_eq!(prototype.encoded_name().and_then(|e| e.identifier().map(str::to_string)), Some("f".to_string()));

    let definition = decls[1];
    assert_eq!(ops::length(Some(definition)), 4);
    assert!(ops::nth(definition, 3).is_some_and(|b| b.is_a(ListKind::Block)));
    assert_eq!(type_of(definition), "void ()");
}

#[test]
fn test_parse_multiple_declarators() {
    let arena = Bump::new();
    let decls = declarations(&arena, "int a = 1, *b, c[2];");
    let declarators: Vec<_> = ops::iter(ops::third(decls[0]))
        .flatten()
        .filter(|n| n.is_a(ListKind::Declarator))
        .collect();
    assert_eq!(declarators.len(), 3);
    assert_eq!(declarators[1].encoded_type().map(|e| e.unmangled()), Some("int*".to_string()));
}

#[test]
fn test_parse_namespace_shape() {
    let arena = Bump::new();
    let decls = declarations(&arena, "namespace A { int i; } namespace { }");
    let named = decls[0];
    assert!(named.is_a(ListKind::NamespaceSpec));
    assert_eq!(ops::second(named).map(|n| n.text()), Some("A"));
    let body = ops::third(named).expect("body");
    assert!(body.is_a(ListKind::Brace));
    assert_eq!(ops::length(ops::second(body)), 1);

    let anonymous = decls[1];
    assert!(ops::second(anonymous).is_none());
    assert!(ops::second(ops::third(anonymous).expect("body")).is_none());
}

#[test]
fn test_parse_class_with_bases() {
    let arena = Bump::new();
    let decls = declarations(&arena, "class A {}; class B : public A, virtual private A { int x; };");
    let class_b = ops::second(decls[1]).expect("class spec");
    assert!(class_b.is_a(ListKind::ClassSpec));
    assert_eq!(class_b.encoded_name().map(|e| e.unmangled()), Some("B".to_string()));
    let bases = ops::third(class_b).expect("bases");
    // `:` base `,` base
    assert_eq!(ops::length(Some(bases)), 4);
    assert!(ops::nth(class_b, 3).is_some_and(|b| b.is_a(ListKind::ClassBody)));
}

#[test]
fn test_parse_anonymous_names_are_unique() {
    let arena = Bump::new();
    let decls = declarations(&arena, "struct { int a; } x; enum { red } c;");
    let first = ops::second(decls[0]).and_then(|n| n.encoded_name()).expect("name");
    let second = ops::second(decls[1]).and_then(|n| n.encoded_name()).expect("name");
    assert_ne!(first, second);
    assert!(first.identifier().is_some_and(|t| t.starts_with('`')));
}

#[test]
fn test_parse_enum_body() {
    let arena = Bump::new();
    let decls = declarations(&arena, "enum E { a, b = 3, c, };");
    let spec = ops::second(decls[0]).expect("enum");
    assert!(spec.is_a(ListKind::EnumSpec));
    let body = ops::third(spec).expect("body");
    let enumerators: Vec<_> = ops::iter(ops::second(body))
        .flatten()
        .filter(|n| !n.is_token(TokenKind::Comma))
        .collect();
    assert_eq!(enumerators.len(), 3);
    assert!(enumerators[1].as_list().is_some());
}

#[test]
fn test_parse_qualified_definition() {
    let arena = Bump::new();
    let decls = declarations(&arena, "namespace N { int f(); } int N::f() { return 0; }");
    let declarator = first_declarator(decls[1]);
    let name = declarator.encoded_name().expect("name");
    assert!(name.is_qualified());
    assert_eq!(name.unmangled(), "N::f");
}

#[test]
fn test_parse_template_declaration() {
    let arena = Bump::new();
    let decls = declarations(&arena, "template <class T, int N> struct array { T items[N]; }; array<int, 4> a;");
    let template = decls[0];
    assert!(template.is_a(ListKind::TemplateDecl));
    let params: Vec<_> = ops::iter(ops::third(template)).flatten().collect();
    assert!(params[0].is_a(ListKind::TypeParameter));
    assert!(params[2].is_a(ListKind::ParameterDeclaration));
    assert_eq!(type_of(decls[1]), "array<int,*>");
}

#[test]
fn test_parse_using_forms() {
    let arena = Bump::new();
    let decls = declarations(&arena, "namespace A { int x; } using namespace A; using A::x;");
    assert!(decls[1].is_a(ListKind::UsingDirective));
    assert!(decls[2].is_a(ListKind::UsingDeclaration));
    assert_eq!(decls[2].encoded_name().map(|e| e.unmangled()), Some("A::x".to_string()));
}

// ============================================================================
// Statements and expressions
// ============================================================================

#[test]
fn test_parse_block_disambiguation() {
    let arena = Bump::new();
    let decls = declarations(&arena, "struct T {}; void f() { T * p; int x; x * 2; T(1); }");
    let body = ops::nth(decls[1], 3).expect("body");
    let statements: Vec<_> = ops::iter(ops::second(body)).flatten().collect();
    assert_eq!(statements.len(), 4);
    assert!(statements[0].is_a(ListKind::Declaration));
    assert!(statements[1].is_a(ListKind::Declaration));
    assert!(statements[2].is_a(ListKind::ExprStatement));
    let cast = ops::first(statements[3]).expect("expression");
    assert!(cast.is_a(ListKind::FstyleCastExpr));
}

#[test]
fn test_parse_expression_precedence() {
    let arena = Bump::new();
    let decls = declarations(&arena, "int v = 1 + 2 * 3 << 1;");
    let declarator = first_declarator(decls[0]);
    let init = ops::nth(declarator, 2).expect("initializer");
    assert!(init.is_a(ListKind::InfixExpr));
    assert!(ops::second(init).is_some_and(|op| op.eq_text("<<")));
    let sum = ops::first(init).expect("lhs");
    assert!(ops::second(sum).is_some_and(|op| op.eq_text("+")));
    assert!(ops::third(sum).is_some_and(|rhs| rhs.is_a(ListKind::InfixExpr)));
}

#[test]
fn test_parse_member_access_and_calls() {
    let arena = Bump::new();
    let decls = declarations(&arena, "struct S { int m; }; int g(S *s) { return s->m + h(1, 2)[0]; }");
    let body = ops::nth(decls[1], 3).expect("body");
    let ret = ops::first(ops::second(body).expect("statements")).expect("return");
    let sum = ops::second(ret).expect("value");
    assert!(ops::first(sum).is_some_and(|l| l.is_a(ListKind::ArrowMemberExpr)));
    let index = ops::third(sum).expect("rhs");
    assert!(index.is_a(ListKind::ArrayExpr));
    assert!(ops::first(index).is_some_and(|c| c.is_a(ListKind::FuncallExpr)));
}

// ============================================================================
// Errors and options
// ============================================================================

#[test]
fn test_syntax_error_recovery() {
    let arena = Bump::new();
    let output = parse(&arena, "test.cc", "int a = ; int b; }");
    assert_eq!(output.errors.len(), 2);
    assert_eq!(output.diagnostics.count_of(&messages::EXPRESSION_EXPECTED), 1);
    assert_eq!(output.diagnostics.count_of(&messages::DECLARATION_EXPECTED), 1);
    // `int b;` survives.
    assert_eq!(ops::length(output.tree), 1);
}

#[test]
fn test_nesting_limit() {
    let arena = Bump::new();
    let source = format!("int x = {}1{};", "(".repeat(50), ")".repeat(50));
    let options = ParserOptions {
        max_nesting_depth: 16,
        ..Default::default()
    };
    let output = Parser::new(&arena, "test.cc", &source, options).parse();
    assert_eq!(output.diagnostics.count_of(&messages::NESTING_TOO_DEEP), 1);
}

#[test]
fn test_operator_chains_count_toward_nesting() {
    let arena = Bump::new();
    let short = format!("int x = {};", vec!["a"; 100].join(" + "));
    let output = parse(&arena, "test.cc", &short);
    assert!(output.errors.is_empty(), "{:?}", output.errors);

    let long = format!("int y = {}; int z;", vec!["a"; 5000].join(" + "));
    let output = parse(&arena, "test.cc", &long);
    assert_eq!(output.diagnostics.count_of(&messages::NESTING_TOO_DEEP), 1);
    // Recovery resumes after the `;`.
    assert_eq!(ops::length(output.tree), 1);

    let calls = format!("int w = f{};", "()".repeat(5000));
    let output = parse(&arena, "test.cc", &calls);
    assert_eq!(output.diagnostics.count_of(&messages::NESTING_TOO_DEEP), 1);
}

#[test]
fn test_c_mode_accepts_cxx_keywords_as_names() {
    let arena = Bump::new();
    let options = ParserOptions {
        cxx: false,
        ..Default::default()
    };
    let output = Parser::new(&arena, "test.c", "int class = 1; int new(int this);", options).parse();
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert_eq!(ops::length(output.tree), 2);
}
