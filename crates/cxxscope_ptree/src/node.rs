//! Parse-tree nodes.
//!
//! A tree is built from two shapes: atoms (tokens backed by the source
//! buffer) and lists (cons cells). A list's `car` is its first element and its
//! `cdr` is the plain `Cons` list holding the remaining elements, or nil.
//! Nil is represented as `None` throughout.
//!
//! Node shape never changes after construction. The only mutable state is the
//! scope annotation the binder writes on scope-introducing lists.

use crate::encoding::Encoding;
use crate::kind::{ListKind, TokenKind};
use crate::types::ScopeId;
use bumpalo::Bump;
use cxxscope_core::text::{TextPos, TextSpan};
use std::cell::Cell;

// ============================================================================
// Node
// ============================================================================

#[derive(Debug)]
pub enum Node<'a> {
    Atom(Atom<'a>),
    List(List<'a>),
}

/// A leaf token. `text` is a slice of the source buffer.
#[derive(Debug, Clone, Copy)]
pub struct Atom<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub pos: TextPos,
}

impl<'a> Atom<'a> {
    #[inline]
    pub fn end(&self) -> TextPos {
        self.pos + self.text.len() as TextPos
    }

    #[inline]
    pub fn span(&self) -> TextSpan {
        TextSpan::new(self.pos, self.text.len() as TextPos)
    }
}

/// A cons cell, tagged with the construct it heads.
#[derive(Debug)]
pub struct List<'a> {
    pub kind: ListKind,
    pub car: Option<&'a Node<'a>>,
    pub cdr: Option<&'a Node<'a>>,
    encoded_name: Option<&'a [u8]>,
    encoded_type: Option<&'a [u8]>,
    scope: Cell<Option<ScopeId>>,
}

impl<'a> Node<'a> {
    #[inline]
    pub fn is_atom(&self) -> bool {
        matches!(self, Node::Atom(_))
    }

    #[inline]
    pub fn as_atom(&self) -> Option<&Atom<'a>> {
        match self {
            Node::Atom(atom) => Some(atom),
            Node::List(_) => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&List<'a>> {
        match self {
            Node::List(list) => Some(list),
            Node::Atom(_) => None,
        }
    }

    /// Kind of a list node; `None` for atoms.
    #[inline]
    pub fn list_kind(&self) -> Option<ListKind> {
        self.as_list().map(|l| l.kind)
    }

    #[inline]
    pub fn token_kind(&self) -> Option<TokenKind> {
        self.as_atom().map(|a| a.kind)
    }

    #[inline]
    pub fn is_a(&self, kind: ListKind) -> bool {
        self.list_kind() == Some(kind)
    }

    #[inline]
    pub fn is_token(&self, kind: TokenKind) -> bool {
        self.token_kind() == Some(kind)
    }

    /// Text of an atom; empty for lists.
    #[inline]
    pub fn text(&self) -> &'a str {
        match self {
            Node::Atom(atom) => atom.text,
            Node::List(_) => "",
        }
    }

    /// Whether this is an atom spelled `text`.
    #[inline]
    pub fn eq_text(&self, text: &str) -> bool {
        matches!(self, Node::Atom(atom) if atom.text == text)
    }

    #[inline]
    pub fn car(&self) -> Option<&'a Node<'a>> {
        self.as_list().and_then(|l| l.car)
    }

    #[inline]
    pub fn cdr(&self) -> Option<&'a Node<'a>> {
        self.as_list().and_then(|l| l.cdr)
    }

    pub fn encoded_name(&self) -> Option<Encoding> {
        self.as_list()
            .and_then(|l| l.encoded_name)
            .map(Encoding::from_bytes)
    }

    pub fn encoded_type(&self) -> Option<Encoding> {
        self.as_list()
            .and_then(|l| l.encoded_type)
            .map(Encoding::from_bytes)
    }

    /// Scope recorded by the most recent binding pass.
    pub fn scope(&self) -> Option<ScopeId> {
        self.as_list().and_then(|l| l.scope.get())
    }

    pub fn set_scope(&self, scope: ScopeId) {
        if let Node::List(list) = self {
            list.scope.set(Some(scope));
        }
    }

    /// Identity of this node, usable as a map key.
    #[inline]
    pub fn key(&self) -> NodeKey {
        NodeKey(self as *const Node<'a> as usize)
    }
}

/// Address-based identity of a node within one arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(usize);

// ============================================================================
// Construction
// ============================================================================

/// Allocates nodes in a translation unit's arena.
#[derive(Clone, Copy)]
pub struct NodeFactory<'a> {
    bump: &'a Bump,
}

impl<'a> NodeFactory<'a> {
    pub fn new(bump: &'a Bump) -> Self {
        Self { bump }
    }

    pub fn bump(&self) -> &'a Bump {
        self.bump
    }

    pub fn atom(&self, kind: TokenKind, text: &'a str, pos: TextPos) -> &'a Node<'a> {
        self.bump.alloc(Node::Atom(Atom { kind, text, pos }))
    }

    pub fn cons(
        &self,
        kind: ListKind,
        car: Option<&'a Node<'a>>,
        cdr: Option<&'a Node<'a>>,
    ) -> &'a Node<'a> {
        self.bump.alloc(Node::List(List {
            kind,
            car,
            cdr,
            encoded_name: None,
            encoded_type: None,
            scope: Cell::new(None),
        }))
    }

    /// Plain list of `items`; nil when empty.
    pub fn seq(&self, items: &[Option<&'a Node<'a>>]) -> Option<&'a Node<'a>> {
        items
            .iter()
            .rev()
            .fold(None, |rest, &item| Some(self.cons(ListKind::Cons, item, rest)))
    }

    /// List headed by a cell of `kind`. A kinded list always has at least one
    /// element, so an empty `items` yields a single nil element.
    pub fn list(&self, kind: ListKind, items: &[Option<&'a Node<'a>>]) -> &'a Node<'a> {
        self.list_encoded(kind, items, None, None)
    }

    pub fn list_encoded(
        &self,
        kind: ListKind,
        items: &[Option<&'a Node<'a>>],
        name: Option<&Encoding>,
        ty: Option<&Encoding>,
    ) -> &'a Node<'a> {
        let (head, rest) = match items.split_first() {
            Some((&head, rest)) => (head, rest),
            None => (None, &[][..]),
        };
        self.bump.alloc(Node::List(List {
            kind,
            car: head,
            cdr: self.seq(rest),
            encoded_name: name.map(|e| self.alloc_bytes(e)),
            encoded_type: ty.map(|e| self.alloc_bytes(e)),
            scope: Cell::new(None),
        }))
    }

    fn alloc_bytes(&self, encoding: &Encoding) -> &'a [u8] {
        self.bump.alloc_slice_copy(encoding.as_bytes())
    }
}
