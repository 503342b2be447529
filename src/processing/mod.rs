//! Screening module: keyword matching, per-document pipeline and batch orchestration

pub mod batch;
pub mod keyword_matcher;
pub mod pipeline;

pub use batch::{BatchOrchestrator, BatchRun, Progress};
pub use keyword_matcher::{KeywordMatcher, MatchResult};
pub use pipeline::{DocumentPipeline, ExtractionOutcome};
