//! cxxscope_printer: parse tree to text.
//!
//! [`Writer`] re-emits source text from the atoms of a tree. [`Display`]
//! renders the bracketed list structure for debugging, optionally with node
//! kinds and encoded names and types.

use cxxscope_ptree::{Node, TokenKind};
use std::fmt;

// ============================================================================
// Writer
// ============================================================================

/// Re-emits source text by joining every atom's text with one space.
///
/// The only exception is a `>>` that the parser split into two `>` atoms to
/// close nested template argument lists: those are written adjacent, so
/// scanning the output yields the same tokens as scanning the input.
#[derive(Default)]
pub struct Writer {
    output: String,
    previous: Option<(TokenKind, u32)>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of one subtree.
    pub fn write(node: Option<&Node<'_>>) -> String {
        let mut writer = Writer::new();
        writer.write_node(node);
        writer.finish()
    }

    pub fn write_node(&mut self, node: Option<&Node<'_>>) {
        let mut cur = node;
        while let Some(n) = cur {
            match n {
                Node::Atom(atom) => {
                    self.write_atom(atom.kind, atom.text, atom.pos);
                    return;
                }
                Node::List(list) => {
                    self.write_node(list.car);
                    cur = list.cdr;
                }
            }
        }
    }

    fn write_atom(&mut self, kind: TokenKind, text: &str, pos: u32) {
        let joined = matches!(
            self.previous,
            Some((TokenKind::Greater, prev)) if kind == TokenKind::Greater && pos == prev + 1
        );
        if !self.output.is_empty() && !joined {
            self.output.push(' ');
        }
        self.output.push_str(text);
        self.previous = Some((kind, pos));
    }

    pub fn finish(self) -> String {
        self.output
    }
}

// ============================================================================
// Display
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions {
    /// Append `#name:` and `#type:` with the unmangled encodings.
    pub encoded: bool,
    /// Prefix kinded lists with their kind.
    pub annotated: bool,
}

/// Bracketed debug rendering: `[a [b c] nil]`.
pub struct Display<'n, 'a> {
    node: Option<&'n Node<'a>>,
    options: DisplayOptions,
}

impl<'n, 'a> Display<'n, 'a> {
    pub fn new(node: Option<&'n Node<'a>>, options: DisplayOptions) -> Self {
        Self { node, options }
    }
}

impl fmt::Display for Display<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_node(f, self.node, &self.options)
    }
}

fn display_node(f: &mut fmt::Formatter<'_>, node: Option<&Node<'_>>, options: &DisplayOptions) -> fmt::Result {
    let Some(node) = node else {
        return write!(f, "nil");
    };
    let Node::List(list) = node else {
        return write!(f, "{}", node.text());
    };
    if options.annotated && list.kind != cxxscope_ptree::ListKind::Cons {
        write!(f, "{}", list.kind)?;
    }
    write!(f, "[")?;
    display_node(f, list.car, options)?;
    let mut rest = list.cdr;
    while let Some(cell) = rest {
        write!(f, " ")?;
        display_node(f, cell.car(), options)?;
        rest = cell.cdr();
    }
    write!(f, "]")?;
    if options.encoded {
        if let Some(name) = node.encoded_name() {
            write!(f, "#name:{}", name.unmangled())?;
        }
        if let Some(ty) = node.encoded_type() {
            write!(f, "#type:{}", ty.unmangled())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;
    use cxxscope_ptree::{ListKind, NodeFactory};

    #[test]
    fn test_nil_and_atoms() {
        let bump = Bump::new();
        let factory = NodeFactory::new(&bump);
        let a = factory.atom(TokenKind::Identifier, "a", 0);
        let list = factory.list(ListKind::ExprStatement, &[Some(a), None]);
        let plain = Display::new(Some(list), DisplayOptions::default()).to_string();
        assert_eq!(plain, "[a nil]");
        let annotated = Display::new(
            Some(list),
            DisplayOptions {
                annotated: true,
                ..Default::default()
            },
        )
        .to_string();
        assert_eq!(annotated, "ExprStatement[a nil]");
        assert_eq!(Writer::write(Some(list)), "a");
    }
}
