//! Binder and lookup integration tests.
//!
//! Each test parses a small translation unit, binds it, and checks the
//! resulting scopes, symbols, and lookup results.

use bumpalo::Bump;
use cxxscope_diagnostics::{messages, DiagnosticCollection};
use cxxscope_parser::parse;
use cxxscope_ptree::{ops, Encoding, ListKind, Node, NodeFactory, ScopeId, SymbolId, TokenKind};
use cxxscope_symbols::{
    bind_tree, evaluate_const, BindOptions, LookupContext, Resolution, ScopeKind, SymbolKind, SymbolSet,
    SymbolTable,
};

/// Helper: parse and bind `source` with default options.
fn bind(source: &str) -> (SymbolTable, DiagnosticCollection) {
    bind_with(source, BindOptions::default())
}

fn bind_with(source: &str, options: BindOptions) -> (SymbolTable, DiagnosticCollection) {
    let arena = Bump::new();
    let output = parse(&arena, "test.cc", source);
    assert!(output.errors.is_empty(), "parse errors: {:?}", output.errors);
    let mut table = SymbolTable::new();
    let diagnostics = bind_tree(&mut table, "test.cc", output.tree, options).expect("well-formed tree");
    (table, diagnostics)
}

/// Helper: `A::B::c` as an encoded name.
fn qualified(parts: &[&str]) -> Encoding {
    let names: Vec<Encoding> = parts.iter().map(|p| Encoding::simple_name(p)).collect();
    Encoding::qualified(&names)
}

fn lookup(table: &SymbolTable, name: &Encoding) -> SymbolSet {
    table
        .lookup(name, SymbolTable::GLOBAL, LookupContext::DEFAULT)
        .expect("qualifier resolves")
}

fn names(table: &SymbolTable, set: &SymbolSet) -> Vec<String> {
    set.iter().map(|id| table.qualified_name(id)).collect()
}

/// Helper: the scope a namespace or class symbol reachable from global defines.
fn scope_named(table: &SymbolTable, parts: &[&str]) -> ScopeId {
    let set = lookup(table, &qualified(parts));
    let id = set.single().expect("one symbol");
    table.symbol(id).defines.expect("defines a scope")
}

fn single(table: &SymbolTable, parts: &[&str]) -> SymbolId {
    lookup(table, &qualified(parts)).single().expect("exactly one symbol")
}

// ============================================================================
// Namespaces and using-directives
// ============================================================================

#[test]
fn test_reopened_namespace_sees_every_fragment() {
    let (table, diagnostics) = bind("namespace N { int a; } int between; namespace N { int b; }");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let a = lookup(&table, &qualified(&["N", "a"]));
    let b = lookup(&table, &qualified(&["N", "b"]));
    assert_eq!(names(&table, &a), vec!["N::a"]);
    assert_eq!(names(&table, &b), vec!["N::b"]);

    let namespaces = table
        .symbols()
        .filter(|(_, s)| s.kind == SymbolKind::Namespace)
        .count();
    assert_eq!(namespaces, 1);
    let scope = scope_named(&table, &["N"]);
    match &table.scope(scope).kind {
        ScopeKind::Namespace { fragments, .. } => assert_eq!(fragments.len(), 2),
        other => panic!("expected a namespace scope, got {:?}", other),
    }
}

#[test]
fn test_direct_declaration_hides_nominated_members() {
    let (table, _) = bind("namespace A { int g; } namespace AB { using namespace A; int g; }");
    let set = lookup(&table, &qualified(&["AB", "g"]));
    assert_eq!(names(&table, &set), vec!["AB::g"]);
}

#[test]
fn test_same_member_through_two_paths_is_not_ambiguous() {
    let (table, diagnostics) = bind(
        "namespace A { int a; } \
         namespace B { using namespace A; } \
         namespace C { using namespace A; } \
         namespace BC { using namespace B; using namespace C; }",
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let set = lookup(&table, &qualified(&["BC", "a"]));
    assert_eq!(set.len(), 1);
    assert_eq!(names(&table, &set), vec!["A::a"]);
}

#[test]
fn test_distinct_members_through_using_are_ambiguous() {
    let (table, _) = bind(
        "namespace A { struct y {}; int y; } \
         namespace B { struct y {}; } \
         namespace C { using namespace A; using namespace B; }",
    );
    let set = lookup(&table, &qualified(&["C", "y"]));
    assert_eq!(set.len(), 2);
    assert_eq!(names(&table, &set), vec!["A::y", "B::y"]);
    assert!(matches!(Resolution::classify(&table, &set), Resolution::Ambiguous(_)));
    assert!(matches!(table.symbol(set.to_vec()[0]).kind, SymbolKind::Variable { .. }));
}

#[test]
fn test_unqualified_lookup_through_using_directive() {
    let (table, diagnostics) = bind("namespace A { int x; } using namespace A; int y = x;");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let set = lookup(&table, &Encoding::simple_name("x"));
    assert_eq!(names(&table, &set), vec!["A::x"]);
}

#[test]
fn test_anonymous_namespace_members_are_visible() {
    let (table, diagnostics) = bind("namespace { int hidden; } int use = hidden;");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let set = lookup(&table, &Encoding::simple_name("hidden"));
    assert_eq!(set.len(), 1);
}

#[test]
fn test_using_directive_errors() {
    let (_, diagnostics) = bind("using namespace Missing;");
    assert_eq!(diagnostics.count_of(&messages::CANNOT_FIND_NAME_0), 1);

    let (_, diagnostics) = bind("struct K {}; using namespace K;");
    assert_eq!(diagnostics.count_of(&messages::_0_IS_NOT_A_NAMESPACE), 1);

    let (_, diagnostics) = bind("namespace N {} struct S { using namespace N; };");
    assert_eq!(diagnostics.count_of(&messages::USING_DIRECTIVE_NOT_ALLOWED_IN_CLASS), 1);
}

#[test]
fn test_using_declarations() {
    let (table, diagnostics) = bind(
        "namespace A { int x; void f(int); void f(double); } \
         using A::x; using A::f;",
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let x = table.find(SymbolTable::GLOBAL, &Encoding::simple_name("x"), LookupContext::DEFAULT);
    assert_eq!(names(&table, &x), vec!["A::x"]);
    let f = table.find(SymbolTable::GLOBAL, &Encoding::simple_name("f"), LookupContext::DEFAULT);
    assert_eq!(f.len(), 2);
    assert!(matches!(Resolution::classify(&table, &f), Resolution::Overloaded(_)));

    let (_, diagnostics) = bind("int y; namespace B { int y; } using B::y;");
    assert_eq!(diagnostics.count_of(&messages::REDECLARATION_OF_0), 1);

    let (_, diagnostics) = bind("namespace B {} using B::nothing;");
    assert_eq!(diagnostics.count_of(&messages::CANNOT_FIND_NAME_0), 1);
}

// ============================================================================
// Classes
// ============================================================================

#[test]
fn test_class_members_and_bases() {
    let (table, diagnostics) = bind("struct B { int m; }; struct D : public B { int n; };");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let b = scope_named(&table, &["B"]);
    let d = scope_named(&table, &["D"]);
    assert_eq!(table.scope(d).bases(), &[b]);

    let inherited = table.lookup(&Encoding::simple_name("m"), d, LookupContext::DEFAULT).expect("lookup");
    assert_eq!(names(&table, &inherited), vec!["B::m"]);
    let member = lookup(&table, &qualified(&["D", "m"]));
    assert_eq!(names(&table, &member), vec!["B::m"]);
}

#[test]
fn test_base_class_search_can_be_disabled() {
    let (mut table, _) = bind("int m; struct B { int m; }; struct D : B { };");
    let d = scope_named(&table, &["D"]);
    table.set_search_base_classes(false);
    let set = table.lookup(&Encoding::simple_name("m"), d, LookupContext::DEFAULT).expect("lookup");
    assert_eq!(names(&table, &set), vec!["m"]);
}

#[test]
fn test_unknown_base_is_reported() {
    let (table, diagnostics) = bind("struct D : Unknown { };");
    assert_eq!(diagnostics.count_of(&messages::CANNOT_FIND_NAME_0), 1);
    let d = scope_named(&table, &["D"]);
    assert!(table.scope(d).bases().is_empty());
}

#[test]
fn test_forward_declaration_then_definition() {
    let (table, diagnostics) = bind("struct S; struct S *p; struct S { int x; };");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let s = single(&table, &["S"]);
    assert_eq!(table.symbol(s).kind, SymbolKind::Class { defined: true });
    assert_eq!(table.symbol(s).declarations.len(), 2);

    let (_, diagnostics) = bind("struct S {}; struct S {};");
    assert_eq!(diagnostics.count_of(&messages::REDEFINITION_OF_0), 1);
}

#[test]
fn test_class_and_object_may_share_a_name() {
    let (table, diagnostics) = bind("struct stat { int size; }; int stat;");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let value = lookup(&table, &Encoding::simple_name("stat"));
    assert!(matches!(table.symbol(value.single().expect("one")).kind, SymbolKind::Variable { .. }));
    let ty = table
        .lookup(&Encoding::simple_name("stat"), SymbolTable::GLOBAL, LookupContext::ELABORATED)
        .expect("lookup");
    assert!(matches!(table.symbol(ty.single().expect("one")).kind, SymbolKind::Class { .. }));
}

#[test]
fn test_static_member_defined_out_of_line() {
    let (table, diagnostics) = bind("struct S { static int count; void m(); }; int S::count = 0; void S::m() {}");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let count = single(&table, &["S", "count"]);
    assert!(table.symbol(count).is_defined());
    let m = single(&table, &["S", "m"]);
    assert!(table.symbol(m).is_defined());
    assert!(table.symbol(m).defines.is_some());
}

#[test]
fn test_out_of_line_definition_without_declaration() {
    let (_, diagnostics) = bind("struct S { }; void S::nope() {}");
    assert_eq!(diagnostics.count_of(&messages::NO_DECLARATION_MATCHES_0), 1);

    let (_, diagnostics) = bind("int Missing::f() { return 0; }");
    assert_eq!(diagnostics.count_of(&messages::CANNOT_FIND_NAME_0), 1);
}

// ============================================================================
// Functions and blocks
// ============================================================================

#[test]
fn test_prototype_merges_with_definition() {
    let (table, diagnostics) = bind("int f(int a, int b = 2); int f(int a, int b) { return a + b; }");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let f = single(&table, &["f"]);
    match table.symbol(f).kind {
        SymbolKind::Function {
            params,
            default_args,
            defined,
            ..
        } => {
            assert_eq!(params, 2);
            assert_eq!(default_args, 1);
            assert!(defined);
        }
        ref other => panic!("expected a function, got {:?}", other),
    }
}

#[test]
fn test_overloads_coexist_and_redefinition_is_reported() {
    let (table, diagnostics) = bind("void h(int); void h(double); void h(void);");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(lookup(&table, &Encoding::simple_name("h")).len(), 3);

    let (_, diagnostics) = bind("void g() {} void g() {}");
    assert_eq!(diagnostics.count_of(&messages::REDEFINITION_OF_0), 1);
    let redefinition = &diagnostics.diagnostics()[0];
    assert_eq!(redefinition.related_information.len(), 1);
    assert!(redefinition.related_information[0].is(&messages::PREVIOUS_DECLARATION_OF_0));
}

#[test]
fn test_parameters_and_locals_are_scoped() {
    let arena = Bump::new();
    let output = parse(
        &arena,
        "test.cc",
        "int x; int f(int p) { int x; { int x; } for (int i = 0; i < p; i++) { int j; } return x; }",
    );
    let mut table = SymbolTable::new();
    let diagnostics = bind_tree(&mut table, "test.cc", output.tree, BindOptions::default()).expect("bind");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let definition = ops::iter(output.tree).flatten().nth(1).expect("definition");
    let function = definition.scope().expect("function scope");
    let local = table.lookup(&Encoding::simple_name("x"), function, LookupContext::DEFAULT).expect("lookup");
    assert_eq!(local.len(), 1);
    assert_eq!(table.symbol(local.to_vec()[0]).scope, function);

    let param = table.lookup(&Encoding::simple_name("p"), function, LookupContext::DEFAULT).expect("lookup");
    assert!(matches!(table.scope(table.symbol(param.to_vec()[0]).scope).kind, ScopeKind::Prototype { .. }));

    // The loop variable is not visible after the loop.
    let i = table.lookup(&Encoding::simple_name("i"), function, LookupContext::DEFAULT).expect("lookup");
    assert!(i.is_empty());

    let (_, diagnostics) = bind("void g() { int y; int y; }");
    assert_eq!(diagnostics.count_of(&messages::REDEFINITION_OF_0), 1);
}

#[test]
fn test_member_access_is_reported_once() {
    let source = "struct P { int x; }; int f(P p) { return p.x; }";
    let (_, diagnostics) = bind(source);
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics.diagnostics()[0].is(&messages::MEMBER_ACCESS_0_NOT_RESOLVED));
    assert!(!diagnostics.has_errors());

    let quiet = BindOptions {
        report_member_access: false,
        ..BindOptions::default()
    };
    let (_, diagnostics) = bind_with(source, quiet);
    assert!(diagnostics.is_empty());
}

// ============================================================================
// Enums, constants, typedefs
// ============================================================================

#[test]
fn test_enumerator_values() {
    let (table, diagnostics) = bind("enum E { a, b = 5, c, d = b * 2 };");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let value = |name: &str| table.symbol(single(&table, &[name])).kind.constant_value();
    assert_eq!(value("a"), Some(0));
    assert_eq!(value("b"), Some(5));
    assert_eq!(value("c"), Some(6));
    assert_eq!(value("d"), Some(10));
    let e = single(&table, &["E"]);
    assert_eq!(table.symbol(e).kind, SymbolKind::Enum);
}

#[test]
fn test_non_constant_enumerator_is_reported() {
    let (table, diagnostics) = bind("int n; enum E { a = n, b };");
    assert_eq!(diagnostics.count_of(&messages::_0_IS_NOT_A_CONSTANT_EXPRESSION), 1);
    assert!(!diagnostics.has_errors());
    assert_eq!(table.symbol(single(&table, &["a"])).kind.constant_value(), None);
    assert_eq!(table.symbol(single(&table, &["b"])).kind.constant_value(), None);
}

#[test]
fn test_enumerator_in_function_body_expression() {
    let arena = Bump::new();
    let output = parse(&arena, "test.cc", "enum { i = 1 }; int f() { return i + 2; }");
    let mut table = SymbolTable::new();
    bind_tree(&mut table, "test.cc", output.tree, BindOptions::default()).expect("bind");

    let definition = ops::iter(output.tree).flatten().nth(1).expect("definition");
    let scope = definition.scope().expect("function scope");
    let body = ops::last(definition).expect("body");
    let statement = ops::first(ops::second(body).expect("statements")).expect("return");
    assert!(statement.is_a(ListKind::ReturnStatement));
    let expression = ops::second(statement).expect("value");
    assert_eq!(evaluate_const(&table, scope, expression), Some(3));
}

#[test]
fn test_const_variables_fold() {
    let (table, diagnostics) = bind("const int N = 4 * 2; const int M = N + 1; int v = 3; const double d = 1.5;");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let kind = |name: &str| table.symbol(single(&table, &[name])).kind.clone();
    assert_eq!(kind("N"), SymbolKind::Const { value: Some(8) });
    assert_eq!(kind("M"), SymbolKind::Const { value: Some(9) });
    assert_eq!(kind("v"), SymbolKind::Variable { defined: true });
    assert_eq!(kind("d"), SymbolKind::Variable { defined: true });
}

#[test]
fn test_oversized_sizeof_is_not_a_constant() {
    let options = BindOptions {
        extended_constant_folding: true,
        ..BindOptions::default()
    };
    let (table, diagnostics) = bind_with(
        "enum E { small = sizeof(int[4]), huge = sizeof(int[9223372036854775807]) };",
        options,
    );
    let value = |name: &str| table.symbol(single(&table, &[name])).kind.constant_value();
    assert_eq!(value("small"), Some(16));
    assert_eq!(value("huge"), None);
    assert_eq!(diagnostics.count_of(&messages::_0_IS_NOT_A_CONSTANT_EXPRESSION), 1);
}

#[test]
fn test_extern_declaration_then_definition() {
    let (table, diagnostics) = bind("extern int e; int e = 1;");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let e = single(&table, &["e"]);
    assert!(table.symbol(e).is_defined());
    assert_eq!(table.symbol(e).declarations.len(), 2);

    let (_, diagnostics) = bind("int twice = 1; int twice = 2;");
    assert_eq!(diagnostics.count_of(&messages::REDEFINITION_OF_0), 1);
}

#[test]
fn test_typedef_aliases_class() {
    let (table, diagnostics) = bind("struct S { int m; }; typedef S Alias; typedef Alias Again;");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let s = single(&table, &["S"]);
    let again = single(&table, &["Again"]);
    assert_eq!(table.resolve_typedef(again), s);

    let member = lookup(&table, &qualified(&["Again", "m"]));
    assert_eq!(names(&table, &member), vec!["S::m"]);
}

// ============================================================================
// Templates
// ============================================================================

#[test]
fn test_class_template_parameters() {
    let (table, diagnostics) = bind("template <class T, int N> struct array { T items[N]; };");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let array = single(&table, &["array"]);
    assert_eq!(table.symbol(array).kind, SymbolKind::ClassTemplate { defined: true });

    let scope = table.symbol(array).defines.expect("class scope");
    let parameters = table.scope(scope).outer.expect("template scope");
    assert!(matches!(table.scope(parameters).kind, ScopeKind::TemplateParameters { .. }));

    let t = table.lookup(&Encoding::simple_name("T"), scope, LookupContext::TYPE).expect("lookup");
    assert_eq!(table.symbol(t.single().expect("T")).kind, SymbolKind::TypeParameter);

    let dependent = table.lookup(&qualified(&["T", "value_type"]), scope, LookupContext::DEFAULT).expect("lookup");
    assert!(dependent.is_dependent());
    assert!(matches!(Resolution::classify(&table, &dependent), Resolution::Dependent));
}

#[test]
fn test_function_template_and_overload() {
    let (table, diagnostics) = bind("template <class T> T max(T a, T b); int max(int a, int b);");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    let set = lookup(&table, &Encoding::simple_name("max"));
    assert_eq!(set.len(), 2);
    let kinds: Vec<_> = set.iter().map(|id| table.symbol(id).kind.describe()).collect();
    assert_eq!(kinds, vec!["function template", "function"]);
}

// ============================================================================
// Rebinding and dumping
// ============================================================================

#[test]
fn test_rebinding_reports_redeclarations_without_duplicates() {
    let arena = Bump::new();
    let source = "namespace N { struct S { int m; void f(); }; void S::f() {} enum E { a, b }; } \
                  typedef int I; template <class T> struct V { T t; }; \
                  int g(int x) { { int y; } return x; } struct X *p;";
    let output = parse(&arena, "test.cc", source);
    let mut table = SymbolTable::new();
    let first = bind_tree(&mut table, "test.cc", output.tree, BindOptions::default()).expect("bind");
    assert!(first.is_empty(), "{:?}", first);
    let (scopes, symbols) = (table.scope_count(), table.symbol_count());

    let second = bind_tree(&mut table, "test.cc", output.tree, BindOptions::default()).expect("bind");
    assert_eq!(table.scope_count(), scopes);
    assert_eq!(table.symbol_count(), symbols);
    assert!(second.diagnostics().iter().all(|d| d.is(&messages::REDECLARATION_OF_0)));

    // Every symbol, including the one the elaborated specifier introduced,
    // is named by some redeclaration's previous-declaration note.
    let previous: Vec<_> = second
        .diagnostics()
        .iter()
        .flat_map(|d| d.related_information.iter().map(|note| note.span))
        .collect();
    assert!(table.symbols().any(|(_, s)| s.name_text() == "X"));
    for (id, symbol) in table.symbols() {
        assert!(symbol.span.is_some(), "{}", table.qualified_name(id));
        assert!(previous.contains(&symbol.span), "{} not redeclared", table.qualified_name(id));
    }
}

#[test]
fn test_dump_lists_scopes_and_symbols() {
    let (table, _) = bind("namespace N { const int k = 3; struct C { int m; }; }");
    let mut out = String::new();
    table.dump_all(&mut out).expect("write");
    assert!(out.contains("global namespace"));
    assert!(out.contains("namespace N"));
    assert!(out.contains("class C"));
    assert!(out.contains("k: constant"));
    assert!(out.contains("= 3"));
    assert!(out.contains("m: variable"));

    let mut chain = String::new();
    let c = scope_named(&table, &["N", "C"]);
    table.dump(c, &mut chain).expect("write");
    let class_at = chain.find("class C").expect("class first");
    let global_at = chain.find("global namespace").expect("global last");
    assert!(class_at < global_at);
}

// ============================================================================
// Malformed trees
// ============================================================================

/// Helper: a `namespace` node with no body, which the parser never builds.
fn bodiless_namespace<'a>(factory: &NodeFactory<'a>) -> Option<&'a Node<'a>> {
    let keyword = factory.atom(TokenKind::Namespace, "namespace", 0);
    let spec = factory.list(ListKind::NamespaceSpec, &[Some(keyword), None, None]);
    factory.seq(&[Some(spec)])
}

#[test]
fn test_malformed_tree_is_a_shape_error() {
    let arena = Bump::new();
    let factory = NodeFactory::new(&arena);
    let tree = bodiless_namespace(&factory);
    let mut table = SymbolTable::new();
    let err = bind_tree(&mut table, "test.cc", tree, BindOptions::default()).expect_err("malformed");
    assert_eq!(err.construct, ListKind::NamespaceSpec);
    assert!(err.to_string().contains("malformed"));
}
