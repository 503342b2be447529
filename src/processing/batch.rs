//! Batch orchestration: bounded worker pool, submission-ordered results, progress/ETA

use crate::input::source::InputDocument;
use crate::processing::pipeline::{DocumentPipeline, DocumentState, ExtractionOutcome};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
}

/// Emitted once per finished document, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub index: usize,
    pub filename: String,
    pub state: DocumentState,
    pub processed_count: usize,
    pub total_count: usize,
    pub percent: u8,
    pub eta_seconds: f64,
}

impl Progress {
    fn after(index: usize, filename: String, state: DocumentState, total_count: usize, elapsed: Duration) -> Self {
        let processed_count = index + 1;
        let remaining = total_count - processed_count;
        Self {
            index,
            filename,
            state,
            processed_count,
            total_count,
            percent: (100.0 * processed_count as f64 / total_count as f64).round() as u8,
            eta_seconds: elapsed.as_secs_f64() / processed_count as f64 * remaining as f64,
        }
    }
}

/// State of one screening run. Never persisted.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub documents: Vec<InputDocument>,
    pub keywords: Vec<String>,
    pub extract_details: bool,
    pub started_at: DateTime<Utc>,
    pub state: BatchState,
    /// Outcomes in submission order; excluded documents leave no entry.
    pub outcomes: Vec<ExtractionOutcome>,
    pub excluded: Vec<String>,
    pub processed_count: usize,
    pub elapsed: Duration,
}

impl BatchRun {
    pub fn new(documents: Vec<InputDocument>, keywords: Vec<String>, extract_details: bool) -> Self {
        Self {
            documents,
            keywords,
            extract_details,
            started_at: Utc::now(),
            state: BatchState::Idle,
            outcomes: Vec::new(),
            excluded: Vec::new(),
            processed_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn matched(&self) -> impl Iterator<Item = &ExtractionOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_matched())
    }

    pub fn needing_review(&self) -> impl Iterator<Item = &ExtractionOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.needs_manual_review)
    }
}

pub struct BatchOrchestrator {
    pipeline: Arc<DocumentPipeline>,
    concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(pipeline: DocumentPipeline, concurrency: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            concurrency: concurrency.max(1),
        }
    }

    /// Run every document through the pipeline. Workers may finish in any
    /// order; results and progress are always reported in submission order.
    pub async fn run<F>(&self, documents: Vec<InputDocument>, mut on_progress: F) -> BatchRun
    where
        F: FnMut(&Progress),
    {
        let mut run = BatchRun::new(
            documents,
            self.pipeline.keywords().to_vec(),
            self.pipeline.structured_extraction_enabled(),
        );
        let total = run.documents.len();
        info!(
            "Screening {} document(s) with {} worker(s) against {} keyword(s)",
            total,
            self.concurrency,
            run.keywords.len()
        );
        run.state = BatchState::Running;

        let clock = Instant::now();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let handles: Vec<JoinHandle<Option<ExtractionOutcome>>> = run
            .documents
            .iter()
            .cloned()
            .map(|doc| {
                let pipeline = Arc::clone(&self.pipeline);
                let permits = Arc::clone(&permits);
                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok()?;
                    pipeline.process(&doc).await
                })
            })
            .collect();

        for (index, handle) in handles.into_iter().enumerate() {
            let filename = run.documents[index].file_name();
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("{}: worker aborted: {}", filename, e);
                    None
                }
            };

            let state = match outcome {
                Some(outcome) => {
                    run.outcomes.push(outcome);
                    DocumentState::Done
                }
                None => {
                    run.excluded.push(filename.clone());
                    DocumentState::Failed
                }
            };

            run.processed_count = index + 1;
            on_progress(&Progress::after(index, filename, state, total, clock.elapsed()));
        }

        run.elapsed = clock.elapsed();
        run.state = BatchState::Completed;
        info!(
            "Batch completed in {:.1}s: {} summarized, {} excluded",
            run.elapsed.as_secs_f64(),
            run.outcomes.len(),
            run.excluded.len()
        );
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_math() {
        let progress = Progress::after(1, "b.pdf".to_string(), DocumentState::Done, 4, Duration::from_secs(10));
        assert_eq!(progress.processed_count, 2);
        assert_eq!(progress.percent, 50);
        assert_eq!(progress.eta_seconds, 10.0);

        let last = Progress::after(2, "c.pdf".to_string(), DocumentState::Done, 3, Duration::from_secs(9));
        assert_eq!(last.percent, 100);
        assert_eq!(last.eta_seconds, 0.0);

        let first = Progress::after(0, "a.pdf".to_string(), DocumentState::Failed, 3, Duration::from_secs(2));
        assert_eq!(first.percent, 33);
        assert_eq!(first.eta_seconds, 4.0);
    }

    #[test]
    fn test_new_run_is_idle() {
        let run = BatchRun::new(Vec::new(), vec!["Python".to_string()], false);
        assert_eq!(run.state, BatchState::Idle);
        assert_eq!(run.processed_count, 0);
        assert!(run.outcomes.is_empty());
    }
}
