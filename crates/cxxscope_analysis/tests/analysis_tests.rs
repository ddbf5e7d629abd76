//! Type evaluation, overload resolution, and resolution-pass tests.

use bumpalo::Bump;
use cxxscope_analysis::{resolve_funcall, type_of, walk_tree, OverloadError, Reference, WalkOptions, WalkOutput};
use cxxscope_diagnostics::{messages, DiagnosticCollection};
use cxxscope_parser::parse;
use cxxscope_ptree::{ops, Encoding, ListKind, Node, ScopeId, SymbolId};
use cxxscope_symbols::{bind_tree, BindOptions, LookupContext, Resolution, SymbolTable};

struct Analysis {
    table: SymbolTable,
    bind: DiagnosticCollection,
    walk: WalkOutput,
}

fn analyze(source: &str) -> Analysis {
    analyze_with(source, WalkOptions::default())
}

fn analyze_with(source: &str, options: WalkOptions) -> Analysis {
    let arena = Bump::new();
    let output = parse(&arena, "test.cc", source);
    assert!(output.errors.is_empty(), "parse errors: {:?}", output.errors);
    let mut table = SymbolTable::new();
    let bind = bind_tree(&mut table, "test.cc", output.tree, BindOptions::default()).expect("well-formed tree");
    let walk = walk_tree(&table, "test.cc", output.tree, options).expect("bound tree");
    Analysis { table, bind, walk }
}

fn references<'r>(analysis: &'r Analysis, name: &str) -> Vec<&'r Reference> {
    analysis.walk.references.iter().filter(|r| r.name == name).collect()
}

/// Functions with the given qualified name, in declaration order.
fn functions_named(table: &SymbolTable, name: &str) -> Vec<SymbolId> {
    table
        .symbols()
        .filter(|(id, s)| s.is_function() && table.qualified_name(*id) == name)
        .map(|(id, _)| id)
        .collect()
}

fn find_all<'a>(node: &'a Node<'a>, kind: ListKind, out: &mut Vec<&'a Node<'a>>) {
    if node.is_a(kind) {
        out.push(node);
    }
    for child in ops::iter(Some(node)).flatten() {
        find_all(child, kind, out);
    }
}

fn nodes_of<'a>(tree: Option<&'a Node<'a>>, kind: ListKind) -> Vec<&'a Node<'a>> {
    let mut out = Vec::new();
    for node in ops::iter(tree).flatten() {
        find_all(node, kind, &mut out);
    }
    out
}

/// Scope of the first function body in the tree.
fn body_scope<'a>(tree: Option<&'a Node<'a>>) -> ScopeId {
    nodes_of(tree, ListKind::Block)[0].scope().expect("bound block")
}

// ============================================================================
// Overload resolution
// ============================================================================

#[test]
fn test_overloads_pick_exact_match() {
    let analysis = analyze("void f(int); void f(double); void g() { f(1); f(2.0); }");
    assert!(analysis.bind.is_empty(), "{:?}", analysis.bind);
    assert!(analysis.walk.diagnostics.is_empty(), "{:?}", analysis.walk.diagnostics);

    let overloads = functions_named(&analysis.table, "f");
    assert_eq!(overloads.len(), 2);
    let calls: Vec<&Resolution> = references(&analysis, "f").iter().map(|r| &r.resolution).collect();
    assert_eq!(
        calls,
        vec![&Resolution::Resolved(overloads[0]), &Resolution::Resolved(overloads[1])]
    );
    assert!(references(&analysis, "f").iter().all(|r| r.is_call));
}

#[test]
fn test_promotion_beats_conversion() {
    let analysis = analyze("void h(long); void h(int); void g() { h('a'); }");
    let overloads = functions_named(&analysis.table, "h");
    let calls = references(&analysis, "h");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].resolution, Resolution::Resolved(overloads[1]));
}

#[test]
fn test_default_arguments_and_arity() {
    let analysis = analyze("void k(int a, int b = 0); void g() { k(1); k(1, 2); k(); }");
    let k = functions_named(&analysis.table, "k")[0];
    let calls = references(&analysis, "k");
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].resolution, Resolution::Resolved(k));
    assert_eq!(calls[1].resolution, Resolution::Resolved(k));
    assert_eq!(calls[2].resolution, Resolution::Resolved(k));
    assert_eq!(analysis.walk.diagnostics.count_of(&messages::NO_VIABLE_FUNCTION_FOR_CALL_TO_0), 1);
}

#[test]
fn test_equal_conversions_are_ambiguous() {
    let analysis = analyze("void m(long); void m(double); void g() { m(1); }");
    assert_eq!(analysis.walk.diagnostics.count_of(&messages::CALL_TO_0_IS_AMBIGUOUS), 1);
    let calls = references(&analysis, "m");
    match &calls[0].resolution {
        Resolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
        other => panic!("expected an ambiguous call, got {:?}", other),
    }
}

#[test]
fn test_ellipsis_ranks_last() {
    let analysis = analyze(
        "void log(int, ...); void log(int, int); void g() { log(1, 2.0, 3); log(1, 2); log(1); }",
    );
    let overloads = functions_named(&analysis.table, "log");
    let calls = references(&analysis, "log");
    assert_eq!(calls[0].resolution, Resolution::Resolved(overloads[0]));
    assert_eq!(calls[1].resolution, Resolution::Resolved(overloads[1]));
    assert_eq!(calls[2].resolution, Resolution::Resolved(overloads[0]));
    assert!(analysis.walk.diagnostics.is_empty(), "{:?}", analysis.walk.diagnostics);
}

#[test]
fn test_non_template_preferred_on_tie() {
    let analysis = analyze(
        "template <class T> T max(T a, T b); int max(int a, int b); void g() { max(1, 2); max(1.0, 2.0); }",
    );
    let overloads = functions_named(&analysis.table, "max");
    assert_eq!(overloads.len(), 2);
    let calls = references(&analysis, "max");
    assert_eq!(calls[0].resolution, Resolution::Resolved(overloads[1]));
    assert_eq!(calls[1].resolution, Resolution::Resolved(overloads[0]));
}

#[test]
fn test_calling_a_variable() {
    let analysis = analyze("int n; void g() { n(1); }");
    assert_eq!(analysis.walk.diagnostics.count_of(&messages::_0_IS_NOT_CALLABLE), 1);
}

#[test]
fn test_call_resolution_disabled() {
    let options = WalkOptions { resolve_calls: false };
    let analysis = analyze_with("void f(int); void f(double); void g() { f(1); }", options);
    assert!(analysis.walk.diagnostics.is_empty());
    let calls = references(&analysis, "f");
    assert!(matches!(calls[0].resolution, Resolution::Overloaded(_)));
    assert!(!calls[0].is_call);
}

#[test]
fn test_cyclic_pointer_typedefs_terminate() {
    let analysis = analyze("typedef Y *X; typedef X *Y; void f(X a); void g() { Y y; f(y); }");
    let calls = references(&analysis, "f");
    assert_eq!(calls.len(), 1);
    assert!(calls[0].is_call);
}

#[test]
fn test_member_function_overloads() {
    let arena = Bump::new();
    let source = "struct P { int get(); int get(int); }; void q() { P p; p.get(1); }";
    let output = parse(&arena, "test.cc", source);
    let mut table = SymbolTable::new();
    bind_tree(&mut table, "test.cc", output.tree, BindOptions::default()).expect("well-formed tree");

    let scope = body_scope(output.tree);
    let call = nodes_of(output.tree, ListKind::FuncallExpr)[0];
    let getters = functions_named(&table, "P::get");
    assert_eq!(getters.len(), 2);
    assert_eq!(resolve_funcall(&table, scope, call), Ok(getters[1]));
}

#[test]
fn test_unknown_object_type_is_dependent() {
    let arena = Bump::new();
    let source = "template <class T> void q(T t) { t.run(1); }";
    let output = parse(&arena, "test.cc", source);
    let mut table = SymbolTable::new();
    bind_tree(&mut table, "test.cc", output.tree, BindOptions::default()).expect("well-formed tree");

    let scope = body_scope(output.tree);
    let call = nodes_of(output.tree, ListKind::FuncallExpr)[0];
    let result = resolve_funcall(&table, scope, call);
    assert!(matches!(result, Err(OverloadError::Dependent { .. })), "{:?}", result);
    let diagnostic = result.err().and_then(|e| e.to_diagnostic(&table, "test.cc", None));
    assert!(diagnostic.is_none());
}

// ============================================================================
// Expression types
// ============================================================================

#[test]
fn test_expression_types() {
    let arena = Bump::new();
    let source = "int i; double d; char c; int* ip; \
                  void e() { i + d; c + c; ip + 1; *ip; i < d; sizeof i; }";
    let output = parse(&arena, "test.cc", source);
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    let mut table = SymbolTable::new();
    bind_tree(&mut table, "test.cc", output.tree, BindOptions::default()).expect("well-formed tree");

    let scope = body_scope(output.tree);
    let types: Vec<Option<Encoding>> = nodes_of(output.tree, ListKind::ExprStatement)
        .into_iter()
        .map(|statement| ops::first(statement).and_then(|expr| type_of(&table, scope, expr)))
        .collect();
    let int = Encoding::builtin(b'i');
    assert_eq!(
        types,
        vec![
            Some(Encoding::builtin(b'd')),
            Some(int.clone()),
            Some(int.pointer_to()),
            Some(int),
            Some(Encoding::builtin(b'b')),
            Some(Encoding::from_bytes(b"Ul")),
        ]
    );
}

#[test]
fn test_member_and_call_types() {
    let arena = Bump::new();
    let source = "struct P { int x; double y; }; double twice(double); \
                  void q() { P p; P* pp; p.x; pp->y; twice(1.0); }";
    let output = parse(&arena, "test.cc", source);
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    let mut table = SymbolTable::new();
    bind_tree(&mut table, "test.cc", output.tree, BindOptions::default()).expect("well-formed tree");

    let scope = body_scope(output.tree);
    let types: Vec<Option<Encoding>> = nodes_of(output.tree, ListKind::ExprStatement)
        .into_iter()
        .map(|statement| ops::first(statement).and_then(|expr| type_of(&table, scope, expr)))
        .collect();
    assert_eq!(
        types,
        vec![
            Some(Encoding::builtin(b'i')),
            Some(Encoding::builtin(b'd')),
            Some(Encoding::builtin(b'd')),
        ]
    );
}

// ============================================================================
// Resolution pass
// ============================================================================

#[test]
fn test_unresolved_names_are_reported() {
    let analysis = analyze("void v() { undefined_fn(1); int y = missing + 1; }");
    assert_eq!(analysis.walk.diagnostics.count_of(&messages::CANNOT_FIND_NAME_0), 2);
    for name in ["undefined_fn", "missing"] {
        let found = references(&analysis, name);
        assert_eq!(found.len(), 1, "{}", name);
        assert_eq!(found[0].resolution, Resolution::Unresolved);
        assert!(found[0].span.is_some());
    }
}

#[test]
fn test_qualified_reference() {
    let analysis = analyze("namespace N { int v; } int g() { return N::v; }");
    let found = references(&analysis, "N::v");
    assert_eq!(found.len(), 1);
    let Resolution::Resolved(id) = found[0].resolution else {
        panic!("expected a resolved reference, got {:?}", found[0].resolution);
    };
    assert_eq!(analysis.table.qualified_name(id), "N::v");
}

#[test]
fn test_local_hides_global() {
    let analysis = analyze("int x; void f() { int x; x = 1; }");
    let global = analysis
        .table
        .lookup(&Encoding::simple_name("x"), SymbolTable::GLOBAL, LookupContext::DEFAULT)
        .expect("lookup")
        .single()
        .expect("one global x");
    let found = references(&analysis, "x");
    assert_eq!(found.len(), 1);
    match found[0].resolution {
        Resolution::Resolved(local) => assert_ne!(local, global),
        ref other => panic!("expected a resolved reference, got {:?}", other),
    }
}

#[test]
fn test_ambiguous_reference_through_using() {
    let analysis = analyze(
        "namespace A { int y; } namespace B { int y; } using namespace A; using namespace B; int z = y;",
    );
    assert_eq!(analysis.walk.diagnostics.count_of(&messages::REFERENCE_TO_0_IS_AMBIGUOUS), 1);
    let found = references(&analysis, "y");
    assert!(matches!(found[0].resolution, Resolution::Ambiguous(_)));
}

#[test]
fn test_declarator_names_are_not_references() {
    let analysis = analyze("const int N = 4; int table[N]; int f(int a = N) { return a; }");
    assert!(analysis.walk.diagnostics.is_empty(), "{:?}", analysis.walk.diagnostics);
    let names: Vec<&str> = analysis.walk.references.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["N", "N", "a"]);
}

#[test]
fn test_walking_an_unbound_tree_fails() {
    let arena = Bump::new();
    let output = parse(&arena, "test.cc", "namespace N { int a; }");
    let table = SymbolTable::new();
    let err = walk_tree(&table, "test.cc", output.tree, WalkOptions::default()).unwrap_err();
    assert_eq!(err.construct, ListKind::NamespaceSpec);
}
