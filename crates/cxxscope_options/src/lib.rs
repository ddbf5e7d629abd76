//! cxxscope_options: analysis options.
//!
//! Options are read from a JSON object whose keys are the camelCase field
//! names of [`AnalysisOptions`]. Every key is optional.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The source language a unit is analyzed as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Cxx,
    /// C++-only keywords scan as identifiers.
    C,
    /// Parse only; no symbols are bound.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AnalysisOptions {
    pub language: Language,
    /// Unqualified lookup from a class scope searches its bases before the
    /// enclosing scope.
    pub search_base_classes: bool,
    /// Also fold `sizeof(builtin)` and function-style casts of constants.
    pub extended_constant_folding: bool,
    /// Run overload resolution on call expressions.
    pub resolve_calls: bool,
    pub report_member_access: bool,
    /// Parser recursion limit.
    pub max_nesting_depth: u32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            language: Language::Cxx,
            search_base_classes: true,
            extended_constant_folding: false,
            resolve_calls: true,
            report_member_access: true,
            max_nesting_depth: 256,
        }
    }
}

impl AnalysisOptions {
    pub fn binds_symbols(&self) -> bool {
        self.language != Language::None
    }

    pub fn is_cxx(&self) -> bool {
        self.language == Language::Cxx
    }
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum OptionsError {
    #[error("invalid options: {0}")]
    #[diagnostic(code(cxxscope::options::json))]
    Json(#[from] serde_json::Error),

    #[error("cannot read options file '{path}'")]
    #[diagnostic(code(cxxscope::options::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("option '{field}' {reason}")]
    #[diagnostic(code(cxxscope::options::invalid))]
    Invalid { field: &'static str, reason: &'static str },
}

/// Parse options from a JSON string.
pub fn parse_options(content: &str) -> Result<AnalysisOptions, OptionsError> {
    let options: AnalysisOptions = serde_json::from_str(content)?;
    if options.max_nesting_depth == 0 {
        return Err(OptionsError::Invalid {
            field: "maxNestingDepth",
            reason: "must be at least 1",
        });
    }
    Ok(options)
}

/// Parse options from a JSON file.
pub fn parse_options_file(path: impl AsRef<Path>) -> Result<AnalysisOptions, OptionsError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_options(&content)
}
