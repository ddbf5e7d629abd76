//! Writer and Display tests over parsed trees.

use bumpalo::Bump;
use cxxscope_parser::parse;
use cxxscope_printer::{Display, DisplayOptions, Writer};
use cxxscope_ptree::ops;
use cxxscope_scanner::tokenize;

fn token_texts(source: &str) -> Vec<String> {
    tokenize(source, "test.cc", true)
        .0
        .into_iter()
        .map(|t| t.text.to_string())
        .collect()
}

/// Parse, write, and compare the token sequences.
fn assert_round_trip(source: &str) {
    let arena = Bump::new();
    let output = parse(&arena, "test.cc", source);
    assert!(output.errors.is_empty(), "errors in {:?}: {:?}", source, output.errors);
    let written = Writer::write(output.tree);
    assert_eq!(token_texts(&written), token_texts(source), "written: {}", written);
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_round_trip_namespaces_and_using() {
    assert_round_trip(
        "namespace A { int i; } namespace B { using namespace A; } using A::i; namespace { int hidden; }",
    );
}

#[test]
fn test_round_trip_classes() {
    assert_round_trip(
        "class Base { public: virtual ~Base(); int f(int x) const; };\n\
         struct Derived : public Base { Derived() : Base() {} int y : 3; };",
    );
}

#[test]
fn test_round_trip_functions_and_statements() {
    assert_round_trip(
        "int f(int a, char *b, ...) {\n\
             int total = 0;\n\
             for (int i = 0; i < a; ++i) { total += b[i]; }\n\
             while (total > 10) total = total / 2;\n\
             do { --total; } while (total);\n\
             if (a) return total; else return -1;\n\
         }",
    );
}

#[test]
fn test_round_trip_expressions() {
    assert_round_trip(
        "struct P { int x; };\n\
         int g(P *p, P &r) { return p->x + r.x * (int)2.5 + sizeof(int) + (p ? 1 : 0); }",
    );
}

#[test]
fn test_round_trip_nested_templates() {
    assert_round_trip(
        "template <class T> class vec { T *data; };\n\
         vec<vec<int>> grid;\n\
         typedef vec<char> string;",
    );
}

#[test]
fn test_round_trip_enums_and_linkage() {
    assert_round_trip(r#"enum Color { red, green = 4, blue }; extern "C" { int puts(const char *s); }"#);
}

// ============================================================================
// Display
// ============================================================================

#[test]
fn test_display_plain_declaration() {
    let arena = Bump::new();
    let output = parse(&arena, "test.cc", "int x = 1;");
    let declaration = ops::first(output.tree.expect("tree"));
    let text = Display::new(declaration, DisplayOptions::default()).to_string();
    assert_eq!(text, "[nil int [[x = 1]] ;]");
}

#[test]
fn test_display_annotated_and_encoded() {
    let arena = Bump::new();
    let output = parse(&arena, "test.cc", "char *p;");
    let declaration = ops::first(output.tree.expect("tree"));
    let text = Display::new(
        declaration,
        DisplayOptions {
            encoded: true,
            annotated: true,
        },
    )
    .to_string();
    assert_eq!(text, "Declaration[nil char [Declarator[* p]#name:p#type:char*] ;]");
}
