//! Overload resolution for call expressions.
//!
//! Resolution runs in three steps:
//! 1. Candidates: every function the callee names.
//! 2. Viability: the argument count fits the parameters (defaults fill
//!    missing arguments, an ellipsis absorbs extra ones) and every argument
//!    converts to its parameter.
//! 3. Ranking: each argument conversion is ranked and the candidate that is
//!    at least as good on every argument and better on one wins.

use crate::type_eval::{
    arithmetic_rank, callee_name, decay, dereference, strip_reference, TypeEvaluator, MAX_ALIAS_DEPTH,
};
use cxxscope_core::text::TextSpan;
use cxxscope_diagnostics::{messages, Diagnostic};
use cxxscope_ptree::{ops, Encoding, ListKind, Node, ScopeId, SymbolId, TokenKind};
use cxxscope_symbols::{candidate_list, lookup_key, LookupContext, LookupError, SymbolKind, SymbolSet, SymbolTable};
use rustc_hash::FxHashSet;

/// How well an argument converts to a parameter, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Exact,
    Promotion,
    Conversion,
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum OverloadError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lookup(#[from] LookupError),

    #[error("'{name}' is not declared")]
    #[diagnostic(code(cxxscope::overload::undefined))]
    Undefined { name: String },

    #[error("'{name}' is not a function")]
    #[diagnostic(code(cxxscope::overload::not_callable))]
    NotCallable { name: String },

    #[error("no viable function for call to '{name}'")]
    #[diagnostic(code(cxxscope::overload::no_viable))]
    NoViable { name: String },

    #[error("call to '{name}' is ambiguous")]
    #[diagnostic(code(cxxscope::overload::ambiguous))]
    Ambiguous { name: String, candidates: Vec<SymbolId> },

    /// The callee depends on a template parameter or on an object whose
    /// type is unknown.
    #[error("call to '{name}' cannot be resolved statically")]
    #[diagnostic(code(cxxscope::overload::dependent))]
    Dependent { name: String },
}

impl OverloadError {
    /// The catalogue diagnostic for this error, if it is worth reporting.
    pub fn to_diagnostic(&self, table: &SymbolTable, file: &str, span: Option<TextSpan>) -> Option<Diagnostic> {
        let mut diagnostic = match self {
            OverloadError::Lookup(err) => return Some(err.to_diagnostic(table, file, span)),
            OverloadError::Dependent { .. } => return None,
            OverloadError::Undefined { name } => Diagnostic::new(&messages::CANNOT_FIND_NAME_0, &[name]),
            OverloadError::NotCallable { name } => Diagnostic::new(&messages::_0_IS_NOT_CALLABLE, &[name]),
            OverloadError::NoViable { name } => Diagnostic::new(&messages::NO_VIABLE_FUNCTION_FOR_CALL_TO_0, &[name]),
            OverloadError::Ambiguous { name, candidates } => Diagnostic::new(
                &messages::CALL_TO_0_IS_AMBIGUOUS,
                &[name, &candidate_list(table, candidates)],
            ),
        };
        diagnostic.file = Some(file.to_string());
        diagnostic.span = span;
        Some(diagnostic)
    }
}

/// Pick the function a call expression `[callee ( args )]` invokes.
pub fn resolve_funcall(table: &SymbolTable, scope: ScopeId, call: &Node<'_>) -> Result<SymbolId, OverloadError> {
    resolve_funcall_with(&TypeEvaluator::new(table, scope), call)
}

pub(crate) fn resolve_funcall_with(eval: &TypeEvaluator<'_>, call: &Node<'_>) -> Result<SymbolId, OverloadError> {
    let table = eval.table();
    let callee = ops::first(call).ok_or_else(|| OverloadError::NotCallable {
        name: ops::reify(Some(call)),
    })?;
    let name = ops::reify(Some(callee));
    let set = candidates(eval, callee, &name)?;

    let (functions, others): (Vec<SymbolId>, Vec<SymbolId>) =
        set.iter().partition(|&id| table.symbol(id).is_function());
    if !others.is_empty() {
        if !functions.is_empty() || others.len() > 1 {
            return Err(OverloadError::Lookup(LookupError::Ambiguous {
                name,
                candidates: set.to_vec(),
            }));
        }
        return callable_object(eval, others[0], name);
    }

    let args: Vec<Option<Encoding>> = ops::iter(ops::third(call))
        .flatten()
        .filter(|n| !n.is_token(TokenKind::Comma))
        .map(|arg| eval.evaluate(arg))
        .collect();
    let viable: Vec<Candidate> = functions
        .iter()
        .filter_map(|&id| Candidate::rank(eval, id, &args))
        .collect();
    tracing::trace!(callee = %name, candidates = functions.len(), viable = viable.len(), "overload resolution");

    match viable.as_slice() {
        [] => Err(OverloadError::NoViable { name }),
        [only] => Ok(only.id),
        _ => select_best(&viable).map_err(|candidates| OverloadError::Ambiguous { name, candidates }),
    }
}

/// The symbols a callee denotes.
fn candidates(eval: &TypeEvaluator<'_>, callee: &Node<'_>, name: &str) -> Result<SymbolSet, OverloadError> {
    let table = eval.table();
    let set = match callee.list_kind() {
        Some(ListKind::DotMemberExpr | ListKind::ArrowMemberExpr) => {
            let arrow = callee.is_a(ListKind::ArrowMemberExpr);
            let dependent = || OverloadError::Dependent { name: name.to_string() };
            let object = ops::first(callee).and_then(|o| eval.evaluate(o)).ok_or_else(dependent)?;
            let object = strip_reference(&object).strip_cv();
            let class_type = if arrow { dereference(&object).map(|t| t.strip_cv()) } else { Some(object) };
            let class = class_type.and_then(|t| eval.class_scope(&t)).ok_or_else(dependent)?;
            let member = ops::third(callee).and_then(callee_name).ok_or_else(dependent)?;
            table.lookup_qualified(class, &lookup_key(&member.last_name()), LookupContext::DEFAULT)
        }
        Some(ListKind::ParenExpr) => match ops::second(callee) {
            Some(inner) if callee_name(inner).is_some() => return candidates(eval, inner, name),
            _ => return Err(OverloadError::Dependent { name: name.to_string() }),
        },
        _ => match callee_name(callee) {
            Some(encoded) => table.lookup(&encoded, eval.scope(), LookupContext::DEFAULT)?,
            None => return Err(OverloadError::Dependent { name: name.to_string() }),
        },
    };
    if set.is_dependent() {
        return Err(OverloadError::Dependent { name: name.to_string() });
    }
    if set.is_empty() {
        return Err(OverloadError::Undefined { name: name.to_string() });
    }
    Ok(set)
}

/// A call through a single non-function symbol.
fn callable_object(eval: &TypeEvaluator<'_>, id: SymbolId, name: String) -> Result<SymbolId, OverloadError> {
    let symbol = eval.table().symbol(id);
    let ty = decay(&symbol.type_encoding);
    let is_function_pointer = ty.is_function() || dereference(&ty).is_some_and(|t| t.is_function());
    match symbol.kind {
        SymbolKind::Variable { .. } if is_function_pointer => Ok(id),
        // An object of class type may have a call operator.
        SymbolKind::Variable { .. } if eval.class_scope(&ty).is_some() => Err(OverloadError::Dependent { name }),
        _ => Err(OverloadError::NotCallable { name }),
    }
}

// ============================================================================
// Ranking
// ============================================================================

#[derive(Debug)]
struct Candidate {
    id: SymbolId,
    ranks: Vec<Rank>,
    template: bool,
}

impl Candidate {
    /// Conversion ranks of `args` against function `id`, or `None` when it
    /// is not viable.
    fn rank(eval: &TypeEvaluator<'_>, id: SymbolId, args: &[Option<Encoding>]) -> Option<Candidate> {
        let table = eval.table();
        let symbol = table.symbol(id);
        let (count, defaults, ellipsis) = symbol.kind.signature()?;
        let (mut params, _) = symbol.type_encoding.function_parts()?;
        if params.last().is_some_and(|p| p.as_bytes() == b"e") {
            params.pop();
        }
        let count = count.max(params.len());
        let fits = if args.len() <= count {
            args.len() + defaults >= count
        } else {
            ellipsis
        };
        if !fits {
            return None;
        }
        // Parameter types are written in the function's own scope.
        let param_scope = table.find_scope(symbol.node).unwrap_or(symbol.scope);
        let params_eval = TypeEvaluator::new(table, param_scope);
        let mut ranks = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let rank = match params.get(i) {
                Some(param) => conversion_rank(eval, arg.as_ref(), &params_eval, param)?,
                None => Rank::Ellipsis,
            };
            ranks.push(rank);
        }
        Some(Candidate {
            id,
            ranks,
            template: matches!(symbol.kind, SymbolKind::FunctionTemplate { .. }),
        })
    }

    /// At least as good on every argument and better on one, or a
    /// non-template tied with a template.
    fn is_better_than(&self, other: &Candidate) -> bool {
        let mut strictly = false;
        for (mine, theirs) in self.ranks.iter().zip(&other.ranks) {
            if mine > theirs {
                return false;
            }
            strictly |= mine < theirs;
        }
        strictly || (!self.template && other.template)
    }
}

/// The candidate better than all others, or the ones no other beats.
fn select_best(viable: &[Candidate]) -> Result<SymbolId, Vec<SymbolId>> {
    let best = viable.iter().enumerate().find(|(i, c)| {
        viable
            .iter()
            .enumerate()
            .all(|(j, other)| *i == j || c.is_better_than(other))
    });
    if let Some((_, c)) = best {
        return Ok(c.id);
    }
    Err(viable
        .iter()
        .enumerate()
        .filter(|(i, c)| {
            !viable
                .iter()
                .enumerate()
                .any(|(j, other)| *i != j && other.is_better_than(c))
        })
        .map(|(_, c)| c.id)
        .collect())
}

/// Rank of converting an argument to a parameter, or `None` when it does
/// not convert. Unknown argument types rank as conversions.
fn conversion_rank(
    args_eval: &TypeEvaluator<'_>,
    arg: Option<&Encoding>,
    params_eval: &TypeEvaluator<'_>,
    param: &Encoding,
) -> Option<Rank> {
    let Some(arg) = arg else {
        return Some(Rank::Conversion);
    };
    let param = canonical(params_eval, &strip_reference(param), MAX_ALIAS_DEPTH).strip_cv();
    if is_type_parameter(params_eval, &param) {
        return Some(Rank::Exact);
    }
    let arg = canonical(args_eval, &decay(arg), MAX_ALIAS_DEPTH);
    if arg == param {
        return Some(Rank::Exact);
    }

    match (dereference(&arg), dereference(&param)) {
        (Some(from), Some(to)) => {
            let (from, to) = (from.strip_cv(), to.strip_cv());
            if from == to {
                // Qualification adjustment.
                return Some(Rank::Exact);
            }
            if to.as_bytes() == b"v" || derives_from(args_eval, &from, params_eval, &to) {
                return Some(Rank::Conversion);
            }
            return unknown_class(args_eval, &from, params_eval, &to);
        }
        (Some(_), None) => return (param.as_bytes() == b"b").then_some(Rank::Conversion),
        (None, Some(_)) => return None,
        (None, None) => {}
    }

    match (arithmetic_rank(&arg), arithmetic_rank(&param)) {
        (Some(0), Some(1)) if param.as_bytes() == b"i" => Some(Rank::Promotion),
        (Some(7), Some(8)) => Some(Rank::Promotion),
        (Some(_), Some(_)) => Some(Rank::Conversion),
        _ if derives_from(args_eval, &arg, params_eval, &param) => Some(Rank::Conversion),
        _ => unknown_class(args_eval, &arg, params_eval, &param),
    }
}

/// Names that do not resolve to a known class are given the benefit of the
/// doubt.
fn unknown_class(
    args_eval: &TypeEvaluator<'_>,
    from: &Encoding,
    params_eval: &TypeEvaluator<'_>,
    to: &Encoding,
) -> Option<Rank> {
    let unresolved = |eval: &TypeEvaluator<'_>, ty: &Encoding| is_name(ty) && eval.class_scope(ty).is_none();
    (unresolved(args_eval, from) || unresolved(params_eval, to)).then_some(Rank::Conversion)
}

fn is_name(ty: &Encoding) -> bool {
    ty.is_simple_name() || ty.is_qualified() || ty.is_template_id()
}

/// Whether the class `derived` has `base` among its direct or indirect bases.
fn derives_from(
    derived_eval: &TypeEvaluator<'_>,
    derived: &Encoding,
    base_eval: &TypeEvaluator<'_>,
    base: &Encoding,
) -> bool {
    let (Some(derived), Some(base)) = (derived_eval.class_scope(derived), base_eval.class_scope(base)) else {
        return false;
    };
    let table = derived_eval.table();
    let mut visited = FxHashSet::default();
    let mut pending = vec![derived];
    while let Some(scope) = pending.pop() {
        if !visited.insert(scope) {
            continue;
        }
        for &next in table.scope(scope).bases() {
            if next == base {
                return true;
            }
            pending.push(next);
        }
    }
    false
}

/// Whether `ty`, under any pointer or reference layers, names a template
/// type parameter.
fn is_type_parameter(eval: &TypeEvaluator<'_>, ty: &Encoding) -> bool {
    let bytes = ty.as_bytes();
    let skip = bytes.iter().take_while(|&&b| matches!(b, b'C' | b'V' | b'P' | b'R')).count();
    let base = Encoding::from_bytes(&bytes[skip..]);
    if !base.is_simple_name() {
        return false;
    }
    eval.table()
        .lookup(&base, eval.scope(), LookupContext::TYPE)
        .ok()
        .and_then(|set| set.single())
        .is_some_and(|id| eval.table().symbol(id).kind == SymbolKind::TypeParameter)
}

/// Replace a typedef name at the base of `ty` with the type it aliases.
fn canonical(eval: &TypeEvaluator<'_>, ty: &Encoding, depth: usize) -> Encoding {
    if depth == 0 {
        return ty.clone();
    }
    let bytes = ty.as_bytes();
    let skip = bytes.iter().take_while(|&&b| matches!(b, b'C' | b'V' | b'P' | b'R')).count();
    let (prefix, base) = bytes.split_at(skip);
    let base = Encoding::from_bytes(base);
    if !is_name(&base) {
        return ty.clone();
    }
    let table = eval.table();
    let Some(id) = table
        .lookup(&base, eval.scope(), LookupContext::TYPE)
        .ok()
        .and_then(|set| set.first())
    else {
        return ty.clone();
    };
    let target = table.symbol(table.resolve_typedef(id));
    let resolved = match target.kind {
        SymbolKind::Typedef { aliased: None } if target.type_encoding != base => {
            canonical(eval, &target.type_encoding, depth - 1)
        }
        SymbolKind::Class { .. } | SymbolKind::ClassTemplate { .. } | SymbolKind::Enum => {
            target.type_encoding.clone()
        }
        _ => return ty.clone(),
    };
    let mut out = Encoding::from_bytes(prefix);
    out.append(&resolved);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u32, ranks: &[Rank], template: bool) -> Candidate {
        Candidate {
            id: SymbolId(id),
            ranks: ranks.to_vec(),
            template,
        }
    }

    #[test]
    fn test_rank_order() {
        assert!(Rank::Exact < Rank::Promotion);
        assert!(Rank::Promotion < Rank::Conversion);
        assert!(Rank::Conversion < Rank::Ellipsis);
    }

    #[test]
    fn test_select_best() {
        let exact = candidate(0, &[Rank::Exact, Rank::Conversion], false);
        let worse = candidate(1, &[Rank::Promotion, Rank::Conversion], false);
        assert_eq!(select_best(&[exact, worse]), Ok(SymbolId(0)));

        let a = candidate(0, &[Rank::Exact, Rank::Conversion], false);
        let b = candidate(1, &[Rank::Conversion, Rank::Exact], false);
        assert_eq!(select_best(&[a, b]), Err(vec![SymbolId(0), SymbolId(1)]));
    }

    #[test]
    fn test_non_template_wins_tie() {
        let template = candidate(0, &[Rank::Exact], true);
        let plain = candidate(1, &[Rank::Exact], false);
        assert_eq!(select_best(&[template, plain]), Ok(SymbolId(1)));
    }
}
