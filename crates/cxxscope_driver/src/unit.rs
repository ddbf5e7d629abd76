//! One translation unit: parse, bind, and resolve.

use crate::DriverError;
use cxxscope_analysis::{walk_tree, Reference, WalkOptions};
use cxxscope_core::text::TextSpan;
use cxxscope_core::UnitArena;
use cxxscope_diagnostics::DiagnosticCollection;
use cxxscope_options::AnalysisOptions;
use cxxscope_parser::{ParseError, Parser, ParserOptions};
use cxxscope_ptree::Node;
use cxxscope_symbols::{bind_tree, BindOptions, Resolution, SymbolTable};
use std::path::Path;

/// What a consumer sees while the unit's arena is still alive.
pub struct UnitView<'u, 'a> {
    pub file_name: &'u str,
    pub tree: Option<&'a Node<'a>>,
    pub table: &'u SymbolTable,
    pub references: &'u [Reference],
    pub diagnostics: &'u DiagnosticCollection,
}

/// A namespace-scope or class-member declaration, detached from the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationSummary {
    pub qualified_name: String,
    pub kind: &'static str,
    /// Declared type of a variable, constant, or function in source-like
    /// form; empty for types and namespaces.
    pub type_name: String,
    pub span: Option<TextSpan>,
    pub defined: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedName {
    pub name: String,
    pub span: Option<TextSpan>,
}

/// Everything that outlives a unit's arena.
#[derive(Debug, Clone, Default)]
pub struct UnitReport {
    pub file_name: String,
    pub diagnostics: DiagnosticCollection,
    pub parse_errors: Vec<ParseError>,
    pub declarations: Vec<DeclarationSummary>,
    pub unresolved: Vec<UnresolvedName>,
    pub reference_count: usize,
}

impl UnitReport {
    pub fn declaration(&self, qualified_name: &str) -> Option<&DeclarationSummary> {
        self.declarations.iter().find(|d| d.qualified_name == qualified_name)
    }
}

/// Source text of one translation unit.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub file_name: String,
    pub source: String,
}

impl TranslationUnit {
    pub fn new(file_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            source: source.into(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let file_name = path.display().to_string();
        let source = std::fs::read_to_string(path).map_err(|source| DriverError::Io {
            path: file_name.clone(),
            source,
        })?;
        Ok(Self { file_name, source })
    }

    /// Analyze this unit, discarding the borrowed view.
    pub fn run(&self, options: &AnalysisOptions) -> Result<UnitReport, DriverError> {
        Self::analyze(&self.file_name, &self.source, options, |_| {})
    }

    /// Run the pipeline over `source`. `consumer` is called once with the
    /// tree and table before the arena is dropped.
    #[tracing::instrument(skip_all, fields(file = file_name))]
    pub fn analyze(
        file_name: &str,
        source: &str,
        options: &AnalysisOptions,
        consumer: impl FnOnce(&UnitView<'_, '_>),
    ) -> Result<UnitReport, DriverError> {
        let arena = UnitArena::for_source(source);
        let parser_options = ParserOptions {
            cxx: options.is_cxx(),
            max_nesting_depth: options.max_nesting_depth,
        };
        let output = Parser::new(arena.bump(), file_name, source, parser_options).parse();
        let mut diagnostics = output.diagnostics;
        tracing::debug!(errors = output.errors.len(), "parsed");

        let mut table = SymbolTable::new();
        table.set_search_base_classes(options.search_base_classes);
        let mut references = Vec::new();
        if options.binds_symbols() {
            let bind_options = BindOptions {
                report_member_access: options.report_member_access,
                extended_constant_folding: options.extended_constant_folding,
            };
            let shape = |source| DriverError::Shape {
                file: file_name.to_string(),
                source,
            };
            diagnostics.extend(bind_tree(&mut table, file_name, output.tree, bind_options).map_err(shape)?);
            let walk_options = WalkOptions {
                resolve_calls: options.resolve_calls,
            };
            let walk = walk_tree(&table, file_name, output.tree, walk_options).map_err(shape)?;
            diagnostics.extend(walk.diagnostics);
            references = walk.references;
            tracing::debug!(
                scopes = table.scope_count(),
                symbols = table.symbol_count(),
                references = references.len(),
                "resolved"
            );
        }
        diagnostics.sort();

        consumer(&UnitView {
            file_name,
            tree: output.tree,
            table: &table,
            references: &references,
            diagnostics: &diagnostics,
        });

        let unresolved = references
            .iter()
            .filter(|r| r.resolution == Resolution::Unresolved)
            .map(|r| UnresolvedName {
                name: r.name.clone(),
                span: r.span,
            })
            .collect();
        Ok(UnitReport {
            file_name: file_name.to_string(),
            diagnostics,
            parse_errors: output.errors,
            declarations: summarize(&table),
            unresolved,
            reference_count: references.len(),
        })
    }
}

/// Declarations visible outside their function bodies.
fn summarize(table: &SymbolTable) -> Vec<DeclarationSummary> {
    table
        .symbols()
        .filter(|(_, symbol)| {
            let scope = table.scope(symbol.scope);
            scope.is_namespace() || scope.is_class()
        })
        .map(|(id, symbol)| DeclarationSummary {
            qualified_name: table.qualified_name(id),
            kind: symbol.kind.describe(),
            type_name: if symbol.kind.is_value() || symbol.is_function() {
                symbol.type_encoding.unmangled()
            } else {
                String::new()
            },
            span: symbol.span,
            defined: symbol.is_defined(),
        })
        .collect()
}
