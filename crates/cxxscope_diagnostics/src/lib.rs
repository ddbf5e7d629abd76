//! cxxscope_diagnostics: diagnostic records and the message catalogue.
//!
//! Every user-facing problem found by the scanner, parser, binder, or the
//! analysis passes becomes a [`Diagnostic`]. Passes collect them into a
//! [`DiagnosticCollection`] and keep going; nothing here aborts a run.

use cxxscope_core::text::TextSpan;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Note,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Error => write!(f, "error"),
            DiagnosticCategory::Warning => write!(f, "warning"),
            DiagnosticCategory::Note => write!(f, "note"),
        }
    }
}

/// A message template from the catalogue in [`messages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    /// Template text; `{0}`, `{1}`, ... are replaced by arguments.
    pub message: &'static str,
}

/// A realized diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: Option<String>,
    pub span: Option<TextSpan>,
    pub message_text: String,
    pub code: u32,
    pub category: DiagnosticCategory,
    /// Secondary locations, e.g. the previous declaration of a redeclared name.
    pub related_information: Vec<Diagnostic>,
}

impl Diagnostic {
    /// A diagnostic without a location.
    pub fn new(message: &DiagnosticMessage, args: &[&str]) -> Self {
        Self {
            file: None,
            span: None,
            message_text: format_message(message.message, args),
            code: message.code,
            category: message.category,
            related_information: Vec::new(),
        }
    }

    pub fn with_location(
        file: &str,
        span: TextSpan,
        message: &DiagnosticMessage,
        args: &[&str],
    ) -> Self {
        Self {
            file: Some(file.to_string()),
            span: Some(span),
            ..Self::new(message, args)
        }
    }

    pub fn with_related(mut self, related: Diagnostic) -> Self {
        self.related_information.push(related);
        self
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }

    /// Whether this diagnostic was built from `message`.
    pub fn is(&self, message: &DiagnosticMessage) -> bool {
        self.code == message.code
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}", file)?;
            if let Some(span) = self.span {
                write!(f, "({})", span.start)?;
            }
            write!(f, ": ")?;
        }
        write!(f, "{} CX{}: {}", self.category, self.code, self.message_text)
    }
}

/// Replace `{0}`, `{1}`, ... in `template` with `args`.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{}}}", i), arg);
    }
    result
}

/// Diagnostics accumulated by one or more passes.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Number of diagnostics built from `message`.
    pub fn count_of(&self, message: &DiagnosticMessage) -> usize {
        self.diagnostics.iter().filter(|d| d.is(message)).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn extend(&mut self, other: DiagnosticCollection) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// Sort by file, then by position. Diagnostics without a location sort first.
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| a.span.map(|s| s.start).cmp(&b.span.map(|s| s.start)))
        });
    }
}

impl IntoIterator for DiagnosticCollection {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

// ============================================================================
// Message catalogue
// ============================================================================

pub mod messages {
    use super::*;

    macro_rules! diag {
        ($code:expr, Error, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Error, message: $msg }
        };
        ($code:expr, Warning, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Warning, message: $msg }
        };
        ($code:expr, Note, $msg:expr) => {
            DiagnosticMessage { code: $code, category: DiagnosticCategory::Note, message: $msg }
        };
    }

    // ========================================================================
    // Lexical errors (1000-1099)
    // ========================================================================
    pub const UNTERMINATED_STRING_LITERAL: DiagnosticMessage = diag!(1001, Error, "Unterminated string literal.");
    pub const UNTERMINATED_CHARACTER_LITERAL: DiagnosticMessage = diag!(1002, Error, "Unterminated character literal.");
    pub const UNTERMINATED_COMMENT: DiagnosticMessage = diag!(1003, Error, "Unterminated comment.");
    pub const INVALID_CHARACTER: DiagnosticMessage = diag!(1004, Error, "Invalid character '{0}'.");

    // ========================================================================
    // Syntax errors (1100-1199)
    // ========================================================================
    pub const _0_EXPECTED: DiagnosticMessage = diag!(1101, Error, "'{0}' expected.");
    pub const UNEXPECTED_TOKEN_0: DiagnosticMessage = diag!(1102, Error, "Unexpected token '{0}'.");
    pub const DECLARATION_EXPECTED: DiagnosticMessage = diag!(1103, Error, "Declaration expected.");
    pub const EXPRESSION_EXPECTED: DiagnosticMessage = diag!(1104, Error, "Expression expected.");
    pub const TYPE_EXPECTED: DiagnosticMessage = diag!(1105, Error, "Type expected.");
    pub const IDENTIFIER_EXPECTED: DiagnosticMessage = diag!(1106, Error, "Identifier expected.");
    pub const NESTING_TOO_DEEP: DiagnosticMessage = diag!(1107, Error, "Nesting exceeds the maximum depth of {0}.");

    // ========================================================================
    // Declarations and lookup (2000-2099)
    // ========================================================================
    pub const REDECLARATION_OF_0: DiagnosticMessage = diag!(2001, Error, "'{0}' is already declared in this scope.");
    pub const REDEFINITION_OF_0: DiagnosticMessage = diag!(2002, Error, "Redefinition of '{0}'.");
    pub const PREVIOUS_DECLARATION_OF_0: DiagnosticMessage = diag!(2003, Note, "Previous declaration of '{0}' is here.");
    pub const REFERENCE_TO_0_IS_AMBIGUOUS: DiagnosticMessage = diag!(2004, Error, "Reference to '{0}' is ambiguous; candidates: {1}.");
    pub const CANNOT_FIND_NAME_0: DiagnosticMessage = diag!(2005, Error, "Cannot find name '{0}'.");
    pub const _0_IS_NOT_A_NAMESPACE_OR_CLASS: DiagnosticMessage = diag!(2006, Error, "'{0}' is not a namespace or class.");
    pub const _0_IS_NOT_A_NAMESPACE: DiagnosticMessage = diag!(2007, Error, "'{0}' is not a namespace.");
    pub const NO_DECLARATION_MATCHES_0: DiagnosticMessage = diag!(2008, Error, "No prior declaration matches the qualified definition of '{0}'.");
    pub const MEMBER_ACCESS_0_NOT_RESOLVED: DiagnosticMessage = diag!(2009, Warning, "Member access '{0}' is not resolved.");
    pub const USING_DIRECTIVE_NOT_ALLOWED_IN_CLASS: DiagnosticMessage = diag!(2010, Error, "A using-directive is not allowed in a class scope.");

    // ========================================================================
    // Evaluation and overloads (3000-3099)
    // ========================================================================
    pub const _0_IS_NOT_A_CONSTANT_EXPRESSION: DiagnosticMessage = diag!(3001, Warning, "'{0}' is not an integral constant expression.");
    pub const NO_VIABLE_FUNCTION_FOR_CALL_TO_0: DiagnosticMessage = diag!(3002, Error, "No viable function for call to '{0}'.");
    pub const CALL_TO_0_IS_AMBIGUOUS: DiagnosticMessage = diag!(3003, Error, "Call to '{0}' is ambiguous; candidates: {1}.");
    pub const _0_IS_NOT_CALLABLE: DiagnosticMessage = diag!(3004, Error, "'{0}' is not a function.");
}
