//! Output module: persisted artifacts and console summary

pub mod artifacts;
pub mod formatter;

pub use artifacts::{ArtifactSummary, ArtifactWriter};
pub use formatter::ConsoleFormatter;
