use bumpalo::Bump;
use cxxscope_ptree::ops::{self, length, nth, reify};
use cxxscope_ptree::*;

fn int() -> Encoding {
    Encoding::builtin(b'i')
}

// ============================================================================
// Encoding
// ============================================================================

#[test]
fn test_simple_name_layout() {
    let e = Encoding::simple_name("foo");
    assert_eq!(e.as_bytes(), &[0x83, b'f', b'o', b'o']);
    assert!(e.is_simple_name());
    assert!(!e.is_qualified());
    assert_eq!(e.identifier(), Some("foo"));
    assert_eq!(e.to_string(), "[3]foo");
}

#[test]
fn test_function_encoding() {
    // char foo(int)
    let f = Encoding::function(&[int()], false, &Encoding::builtin(b'c'));
    assert_eq!(f.as_bytes(), b"Fi_c");
    assert!(f.is_function());
    let (params, ret) = f.function_parts().unwrap();
    assert_eq!(params, vec![int()]);
    assert_eq!(ret, Encoding::builtin(b'c'));

    let nullary = Encoding::function(&[], false, &int());
    assert_eq!(nullary.as_bytes(), b"Fv_i");
    assert_eq!(nullary.function_parts().unwrap().0.len(), 0);

    let variadic = Encoding::function(&[int()], true, &Encoding::builtin(b'v'));
    assert_eq!(variadic.as_bytes(), b"Fie_v");
    assert_eq!(variadic.unmangled(), "void (int, ...)");
}

#[test]
fn test_const_member_function_is_function() {
    let f = Encoding::function(&[], false, &int()).const_of();
    assert!(f.is_function());
    assert_eq!(f.function_parts().unwrap().1, int());
    assert_eq!(f.unmangled(), "int () const");
}

#[test]
fn test_qualified_names() {
    let a = Encoding::simple_name("A");
    let b = Encoding::simple_name("b");
    let q = Encoding::qualified(&[a.clone(), b.clone()]);
    assert!(q.is_qualified());
    assert_eq!(q.names(), vec![a.clone(), b.clone()]);
    assert_eq!(q.get_scope(), a);
    assert_eq!(q.get_symbol(), b);
    assert_eq!(q.unmangled(), "A::b");

    let global = Encoding::qualified(&[Encoding::global_scope(), b.clone()]);
    assert!(global.names()[0].is_global_scope());
    assert_eq!(global.unmangled(), "::b");

    let three = Encoding::qualified(&[a.clone(), Encoding::simple_name("C"), b.clone()]);
    assert_eq!(three.get_symbol(), Encoding::qualified(&[Encoding::simple_name("C"), b.clone()]));
    assert_eq!(three.last_name(), b);
}

#[test]
fn test_template_id() {
    let t = Encoding::template_id("vector", &[int(), Encoding::simple_name("cell")]);
    assert!(t.is_template_id());
    assert_eq!(t.get_template_name(), Encoding::simple_name("vector"));
    assert_eq!(t.get_template_arguments(), vec![int(), Encoding::simple_name("cell")]);
    assert_eq!(t.unmangled(), "vector<int,cell>");

    let q = Encoding::qualified(&[Encoding::simple_name("std"), t.clone()]);
    assert_eq!(q.names()[1], t);
}

#[test]
fn test_type_modifiers_unmangle() {
    let const_char_ptr = Encoding::builtin(b'c').const_of().pointer_to();
    assert_eq!(const_char_ptr.as_bytes(), b"PCc");
    assert_eq!(const_char_ptr.unmangled(), "const char*");
    assert_eq!(const_char_ptr.strip_cv(), const_char_ptr);
    assert_eq!(int().const_of().strip_cv(), int());

    let array = int().array_of(Some(3));
    assert_eq!(array.as_bytes(), b"A3_i");
    assert_eq!(array.unmangled(), "int[3]");
    assert_eq!(Encoding::from_bytes(b"Ul").unmangled(), "unsigned long");
    assert_eq!(int().reference_to().unmangled(), "int&");
}

#[test]
fn test_encodings_are_equal_iff_same_bytes() {
    let x = Encoding::function(&[int()], false, &int());
    let y = Encoding::function(&[int()], false, &int());
    let z = Encoding::function(&[Encoding::builtin(b'd')], false, &int());
    assert_eq!(x, y);
    assert_ne!(x, z);
}

// ============================================================================
// Nodes and list operations
// ============================================================================

#[test]
fn test_list_operations() {
    let bump = Bump::new();
    let f = NodeFactory::new(&bump);
    let a = f.atom(TokenKind::Identifier, "A", 0);
    let colons = f.atom(TokenKind::ColonColon, "::", 1);
    let b = f.atom(TokenKind::Identifier, "b", 3);
    let name_enc = Encoding::qualified(&["A".into(), "b".into()]);
    let name = f.list_encoded(ListKind::Name, &[Some(a), Some(colons), Some(b)], Some(&name_enc), None);

    assert!(name.is_a(ListKind::Name));
    assert_eq!(length(Some(name)), 3);
    assert!(nth(name, 2).unwrap().eq_text("b"));
    assert!(nth(name, 3).is_none());
    assert_eq!(reify(Some(name)), "A::b");
    assert_eq!(ops::span(Some(name)).unwrap(), cxxscope_core::TextSpan::new(0, 4));
    assert_eq!(name.encoded_name(), Some(name_enc));
    assert_eq!(name.encoded_type(), None);
    assert!(ops::last(name).unwrap().eq_text("b"));
}

#[test]
fn test_nil_elements_are_preserved() {
    let bump = Bump::new();
    let f = NodeFactory::new(&bump);
    let kw = f.atom(TokenKind::Namespace, "namespace", 0);
    let spec = f.list(ListKind::NamespaceSpec, &[Some(kw), None, None]);
    assert_eq!(length(Some(spec)), 3);
    assert!(nth(spec, 1).is_none());
    let elements: Vec<_> = ops::iter(Some(spec)).collect();
    assert_eq!(elements.len(), 3);
    assert!(elements[1].is_none());
}

#[test]
fn test_scope_annotation() {
    let bump = Bump::new();
    let f = NodeFactory::new(&bump);
    let block = f.list(ListKind::Block, &[Some(f.atom(TokenKind::OpenBrace, "{", 0))]);
    assert_eq!(block.scope(), None);
    block.set_scope(ScopeId(4));
    assert_eq!(block.scope(), Some(ScopeId(4)));
    assert_ne!(block.key(), f.atom(TokenKind::OpenBrace, "{", 0).key());
}

#[test]
fn test_seq_empty_is_nil() {
    let bump = Bump::new();
    let f = NodeFactory::new(&bump);
    assert!(f.seq(&[]).is_none());
    assert_eq!(length(None), 0);
}
