//! Structured work-history extraction through an external LLM

pub mod extractor;
pub mod parser;
pub mod prompts;
pub mod provider;
pub mod schema;

pub use extractor::ExperienceExtractor;
pub use provider::StructuredExtractionProvider;
pub use schema::{ExperienceRecord, ExperienceReport, Role};
