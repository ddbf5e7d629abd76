//! cxxscope_driver: pipeline orchestration.
//!
//! A [`TranslationUnit`] is parsed, bound, and resolved inside its own
//! arena. A [`Session`] runs many units in parallel and links what they
//! leave unresolved through a [`GlobalIndex`].

mod index;
mod session;
mod unit;

pub use index::{ExternalResolution, ExternalTarget, GlobalIndex, IndexEntry};
pub use session::{Session, SessionReport};
pub use unit::{DeclarationSummary, TranslationUnit, UnitReport, UnitView, UnresolvedName};

use cxxscope_symbols::ShapeError;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DriverError {
    #[error("cannot read '{path}'")]
    #[diagnostic(code(cxxscope::driver::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: {source}")]
    #[diagnostic(code(cxxscope::driver::shape))]
    Shape {
        file: String,
        #[source]
        source: ShapeError,
    },
}
