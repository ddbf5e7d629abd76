//! Cross-unit declaration index.
//!
//! Built once after every unit has been analyzed, then only read. Names a
//! unit could not resolve on its own are matched against the declarations
//! of the other units.

use crate::unit::UnitReport;
use cxxscope_core::text::TextSpan;
use lasso::{Spur, ThreadedRodeo};
use rustc_hash::FxHashMap;

/// Where a declaration lives: unit index and position in its summary list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub unit: usize,
    pub declaration: usize,
}

pub struct GlobalIndex {
    names: ThreadedRodeo,
    entries: FxHashMap<Spur, Vec<IndexEntry>>,
}

impl GlobalIndex {
    pub fn build(units: &[UnitReport]) -> Self {
        let names = ThreadedRodeo::new();
        let mut entries: FxHashMap<Spur, Vec<IndexEntry>> = FxHashMap::default();
        for (unit, report) in units.iter().enumerate() {
            for (declaration, summary) in report.declarations.iter().enumerate() {
                let key = names.get_or_intern(&summary.qualified_name);
                entries.entry(key).or_default().push(IndexEntry { unit, declaration });
            }
        }
        tracing::debug!(names = names.len(), units = units.len(), "built global index");
        Self { names, entries }
    }

    /// Every declaration of `qualified_name` across all units.
    pub fn lookup(&self, qualified_name: &str) -> &[IndexEntry] {
        self.names
            .get(qualified_name)
            .and_then(|key| self.entries.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn name_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match each unit's unresolved names against the other units.
    pub fn resolve_external(&self, units: &[UnitReport]) -> Vec<ExternalResolution> {
        let mut resolutions = Vec::new();
        for (unit, report) in units.iter().enumerate() {
            for name in &report.unresolved {
                let targets: Vec<ExternalTarget> = self
                    .lookup(&name.name)
                    .iter()
                    .filter(|entry| entry.unit != unit)
                    .filter_map(|entry| {
                        let target = units.get(entry.unit)?;
                        let summary = target.declarations.get(entry.declaration)?;
                        Some(ExternalTarget {
                            file_name: target.file_name.clone(),
                            kind: summary.kind,
                            span: summary.span,
                            defined: summary.defined,
                        })
                    })
                    .collect();
                if targets.is_empty() {
                    continue;
                }
                tracing::trace!(file = %report.file_name, name = %name.name, targets = targets.len(), "external");
                resolutions.push(ExternalResolution {
                    file_name: report.file_name.clone(),
                    name: name.name.clone(),
                    span: name.span,
                    targets,
                });
            }
        }
        resolutions
    }
}

impl std::fmt::Debug for GlobalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalIndex").field("names", &self.entries.len()).finish()
    }
}

/// An unresolved name in one unit that another unit declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalResolution {
    pub file_name: String,
    pub name: String,
    pub span: Option<TextSpan>,
    pub targets: Vec<ExternalTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTarget {
    pub file_name: String,
    pub kind: &'static str,
    pub span: Option<TextSpan>,
    pub defined: bool,
}

impl ExternalResolution {
    /// The unit holding the definition, if exactly one does.
    pub fn definition(&self) -> Option<&ExternalTarget> {
        let mut defined = self.targets.iter().filter(|t| t.defined);
        match (defined.next(), defined.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }
}
