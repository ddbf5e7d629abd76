//! Many translation units analyzed in parallel.

use crate::index::{ExternalResolution, GlobalIndex};
use crate::unit::{TranslationUnit, UnitReport};
use crate::DriverError;
use cxxscope_diagnostics::DiagnosticCollection;
use cxxscope_options::AnalysisOptions;
use rayon::prelude::*;

pub struct Session {
    pub options: AnalysisOptions,
}

#[derive(Debug)]
pub struct SessionReport {
    /// Reports of the units that completed, in input order.
    pub units: Vec<UnitReport>,
    pub failures: Vec<DriverError>,
    pub index: GlobalIndex,
    pub external: Vec<ExternalResolution>,
    /// Diagnostics of every unit, sorted by file and position.
    pub diagnostics: DiagnosticCollection,
}

impl SessionReport {
    pub fn unit(&self, file_name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.file_name == file_name)
    }
}

impl Session {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }

    /// Each unit gets its own arena and symbol table; nothing is shared
    /// until the index is built from the finished reports.
    #[tracing::instrument(skip_all, fields(units = files.len()))]
    pub fn analyze_all(&self, files: &[TranslationUnit]) -> SessionReport {
        let results: Vec<Result<UnitReport, DriverError>> =
            files.par_iter().map(|unit| unit.run(&self.options)).collect();

        let mut units = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(report) => units.push(report),
                Err(err) => {
                    tracing::warn!(error = %err, "unit failed");
                    failures.push(err);
                }
            }
        }

        let index = GlobalIndex::build(&units);
        let external = index.resolve_external(&units);
        let mut diagnostics = DiagnosticCollection::new();
        for unit in &units {
            diagnostics.extend(unit.diagnostics.clone());
        }
        diagnostics.sort();

        SessionReport {
            units,
            failures,
            index,
            external,
            diagnostics,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(AnalysisOptions::default())
    }
}
