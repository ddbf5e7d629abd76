//! Structural operations on lists.
//!
//! All of these treat an atom as a list of no elements, so callers can probe
//! shapes without checking `is_atom` first.

use crate::node::{Atom, Node};
use cxxscope_core::text::TextSpan;

/// The cell `n` steps down the `cdr` chain (`tail(node, 0)` is `node`).
pub fn tail<'a>(node: &'a Node<'a>, n: usize) -> Option<&'a Node<'a>> {
    let mut cur = Some(node);
    for _ in 0..n {
        cur = cur.and_then(Node::cdr);
    }
    cur.filter(|c| !c.is_atom())
}

/// Element `n` (0-based). Nil elements and out-of-range indices are `None`.
pub fn nth<'a>(node: &'a Node<'a>, n: usize) -> Option<&'a Node<'a>> {
    tail(node, n).and_then(Node::car)
}

pub fn first<'a>(node: &'a Node<'a>) -> Option<&'a Node<'a>> {
    nth(node, 0)
}

pub fn second<'a>(node: &'a Node<'a>) -> Option<&'a Node<'a>> {
    nth(node, 1)
}

pub fn third<'a>(node: &'a Node<'a>) -> Option<&'a Node<'a>> {
    nth(node, 2)
}

/// Last element of a list.
pub fn last<'a>(node: &'a Node<'a>) -> Option<&'a Node<'a>> {
    iter(Some(node)).last().flatten()
}

/// Number of cells in a list; 0 for atoms and nil.
pub fn length(node: Option<&Node<'_>>) -> usize {
    let mut n = 0;
    let mut cur = node.filter(|c| !c.is_atom());
    while let Some(cell) = cur {
        n += 1;
        cur = cell.cdr();
    }
    n
}

/// Iterate the elements of a list (each possibly nil).
pub fn iter<'a>(node: Option<&'a Node<'a>>) -> ListIter<'a> {
    ListIter {
        cur: node.filter(|c| !c.is_atom()),
    }
}

pub struct ListIter<'a> {
    cur: Option<&'a Node<'a>>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = Option<&'a Node<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.cur?;
        self.cur = cell.cdr();
        Some(cell.car())
    }
}

/// Visit every atom in source order.
pub fn for_each_atom<'a>(node: Option<&'a Node<'a>>, f: &mut impl FnMut(&'a Atom<'a>)) {
    let mut cur = node;
    while let Some(n) = cur {
        match n {
            Node::Atom(atom) => {
                f(atom);
                return;
            }
            Node::List(list) => {
                for_each_atom(list.car, f);
                cur = list.cdr;
            }
        }
    }
}

/// Atoms of a subtree in source order.
pub fn atoms<'a>(node: Option<&'a Node<'a>>) -> Vec<&'a Atom<'a>> {
    let mut out = Vec::new();
    for_each_atom(node, &mut |a| out.push(a));
    out
}

/// Source range from the first to the last atom. Nil and empty lists have none.
pub fn span(node: Option<&Node<'_>>) -> Option<TextSpan> {
    let mut first: Option<TextSpan> = None;
    let mut last: Option<TextSpan> = None;
    for_each_atom(node, &mut |a| {
        if first.is_none() {
            first = Some(a.span());
        }
        last = Some(a.span());
    });
    Some(first?.union(&last?))
}

/// Atom texts concatenated without separators, e.g. `A::B` for a qualified name.
pub fn reify(node: Option<&Node<'_>>) -> String {
    let mut out = String::new();
    for_each_atom(node, &mut |a| out.push_str(a.text));
    out
}
