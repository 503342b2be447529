//! Per-document unit of work: extract text, match keywords, optionally extract experience

use crate::error::ExtractionError;
use crate::input::file_detector::DocumentKind;
use crate::input::source::InputDocument;
use crate::input::text_extractor::{ExtractedText, TextExtractor};
use crate::llm::extractor::ExperienceExtractor;
use crate::llm::schema::ExperienceReport;
use crate::processing::keyword_matcher::{KeywordMatcher, MatchResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle of one document inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentState {
    Pending,
    Extracting,
    Matching,
    StructuredExtracting,
    Done,
    Failed,
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentState::Pending => "pending",
            DocumentState::Extracting => "extracting",
            DocumentState::Matching => "matching",
            DocumentState::StructuredExtracting => "structured-extracting",
            DocumentState::Done => "done",
            DocumentState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Everything known about one screened document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub filename: String,
    pub source_path: PathBuf,
    pub kind: DocumentKind,
    pub size_bytes: u64,
    #[serde(flatten)]
    pub matches: MatchResult,
    /// Set when the text could only be obtained through OCR.
    pub needs_manual_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<ExperienceReport>,
}

impl ExtractionOutcome {
    pub fn is_matched(&self) -> bool {
        self.matches.is_match()
    }

    pub fn base_name(&self) -> String {
        self.source_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| self.filename.clone())
    }
}

pub struct DocumentPipeline {
    text_extractor: TextExtractor,
    matcher: KeywordMatcher,
    experience: Option<ExperienceExtractor>,
}

impl DocumentPipeline {
    pub fn new(text_extractor: TextExtractor, matcher: KeywordMatcher) -> Self {
        Self {
            text_extractor,
            matcher,
            experience: None,
        }
    }

    /// Enables structured extraction for matched documents.
    pub fn with_experience_extractor(mut self, extractor: ExperienceExtractor) -> Self {
        self.experience = Some(extractor);
        self
    }

    pub fn structured_extraction_enabled(&self) -> bool {
        self.experience.is_some()
    }

    pub fn keywords(&self) -> &[String] {
        self.matcher.keywords()
    }

    /// `None` means the document was excluded; every other failure only
    /// degrades the returned outcome.
    pub async fn process(&self, doc: &InputDocument) -> Option<ExtractionOutcome> {
        let name = doc.file_name();
        debug!("{}: {} -> {}", name, DocumentState::Pending, DocumentState::Extracting);

        let extracted = match self.text_extractor.extract(doc).await {
            Ok(extracted) => extracted,
            Err(e) => match degrade_extraction_error(doc, e) {
                Some(extracted) => extracted,
                None => {
                    debug!("{}: {}", name, DocumentState::Failed);
                    return None;
                }
            },
        };

        debug!("{}: {} -> {}", name, DocumentState::Extracting, DocumentState::Matching);
        let matches = self.matcher.match_text(&extracted.text);

        let experience = match &self.experience {
            Some(extractor) if matches.is_match() => {
                debug!(
                    "{}: {} -> {}",
                    name,
                    DocumentState::Matching,
                    DocumentState::StructuredExtracting
                );
                match extractor.extract(&extracted.text, &matches).await {
                    Ok(report) => Some(report),
                    Err(e) => {
                        warn!("{}: structured extraction failed: {}", name, e);
                        None
                    }
                }
            }
            _ => None,
        };

        debug!("{}: {} (score {})", name, DocumentState::Done, matches.score);
        Some(ExtractionOutcome {
            filename: name,
            source_path: doc.path.clone(),
            kind: doc.kind,
            size_bytes: doc.size_bytes,
            matches,
            needs_manual_review: extracted.used_ocr,
            experience,
        })
    }
}

/// A corrupt Word file still counts as a screened document with no text.
/// Everything else excludes the document.
fn degrade_extraction_error(doc: &InputDocument, err: ExtractionError) -> Option<ExtractedText> {
    if doc.kind.is_word() && err.is_corrupt() {
        warn!("{}; treating as empty text", err);
        Some(ExtractedText::native(String::new()))
    } else {
        warn!("Excluding document: {}", err);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, OcrError};
    use crate::input::ocr::{OcrEngine, PageRenderer};
    use crate::llm::provider::StructuredExtractionProvider;
    use async_trait::async_trait;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    struct NoRenderer;

    #[async_trait]
    impl PageRenderer for NoRenderer {
        async fn render_pages(&self, _pdf: &Path, _workdir: &Path) -> Result<Vec<PathBuf>, OcrError> {
            Err(OcrError::Render("not available in tests".to_string()))
        }
    }

    struct NoOcr;

    #[async_trait]
    impl OcrEngine for NoOcr {
        async fn text_of(&self, _image: &Path) -> Result<String, OcrError> {
            Ok(String::new())
        }
    }

    struct CountingProvider {
        reply: Result<String, LlmError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StructuredExtractionProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn write_docx(path: &Path, text: &str) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        zip.start_file("word/document.xml", SimpleFileOptions::default()).unwrap();
        write!(zip, "<w:document><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>", text).unwrap();
        zip.finish().unwrap();
    }

    fn pipeline(reply: Option<Result<String, LlmError>>) -> (DocumentPipeline, Option<Arc<CountingProvider>>) {
        let text_extractor = TextExtractor::new(Arc::new(NoRenderer), Arc::new(NoOcr));
        let matcher = KeywordMatcher::new(vec!["Python".to_string(), "SQL".to_string()]);
        let pipeline = DocumentPipeline::new(text_extractor, matcher);
        match reply {
            Some(reply) => {
                let provider = Arc::new(CountingProvider {
                    reply,
                    calls: AtomicUsize::new(0),
                });
                let extractor = ExperienceExtractor::new(provider.clone(), Duration::from_secs(30));
                (pipeline.with_experience_extractor(extractor), Some(provider))
            }
            None => (pipeline, None),
        }
    }

    fn docx(dir: &Path, name: &str, text: &str) -> InputDocument {
        let path = dir.join(name);
        write_docx(&path, text);
        InputDocument::from_path(path).unwrap()
    }

    #[tokio::test]
    async fn test_matched_document_with_experience() {
        let dir = tempfile::tempdir().unwrap();
        let doc = docx(dir.path(), "jane.docx", "Experienced Python developer");
        let (pipeline, provider) = pipeline(Some(Ok(r#"{"total_experience_years": 5, "roles": []}"#.to_string())));

        let outcome = pipeline.process(&doc).await.unwrap();
        assert_eq!(outcome.filename, "jane.docx");
        assert_eq!(outcome.matches.matched_keywords, vec!["Python"]);
        assert_eq!(outcome.matches.score, 50);
        assert!(!outcome.needs_manual_review);
        assert_eq!(outcome.experience.unwrap().record.total_experience_years, 5.0);
        assert_eq!(provider.unwrap().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unmatched_document_never_calls_llm() {
        let dir = tempfile::tempdir().unwrap();
        let doc = docx(dir.path(), "bob.docx", "Carpenter with ten years of joinery");
        let (pipeline, provider) = pipeline(Some(Ok("{}".to_string())));

        let outcome = pipeline.process(&doc).await.unwrap();
        assert!(!outcome.is_matched());
        assert_eq!(outcome.matches.score, 0);
        assert!(outcome.experience.is_none());
        assert_eq!(provider.unwrap().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_llm_failure_keeps_match_result() {
        let dir = tempfile::tempdir().unwrap();
        let doc = docx(dir.path(), "ann.docx", "SQL and Python");
        let (pipeline, _) = pipeline(Some(Err(LlmError::Transport("connection reset".to_string()))));

        let outcome = pipeline.process(&doc).await.unwrap();
        assert_eq!(outcome.matches.score, 100);
        assert!(outcome.experience.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_word_document_degrades_to_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.doc");
        std::fs::write(&path, b"\xd0\xcf\x11\xe0 old binary word").unwrap();
        let (pipeline, _) = pipeline(None);

        let outcome = pipeline.process(&InputDocument::from_path(path).unwrap()).await.unwrap();
        assert_eq!(outcome.matches, MatchResult::default());
        assert!(!outcome.needs_manual_review);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"garbage").unwrap();
        let (pipeline, _) = pipeline(None);

        assert!(pipeline.process(&InputDocument::from_path(path).unwrap()).await.is_none());
    }

    #[tokio::test]
    async fn test_pipeline_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let doc = docx(dir.path(), "same.docx", "Python, SQL");
        let (pipeline, _) = pipeline(Some(Ok(
            r#"{"total_experience_years": 2.5, "experience_by_domain": {"IT": 2.5}, "roles": [{"title": "Dev"}]}"#.to_string(),
        )));

        let first = pipeline.process(&doc).await.unwrap();
        let second = pipeline.process(&doc).await.unwrap();
        assert_eq!(first, second);
    }
}
