//! Text extraction from CV documents with OCR fallback for scanned PDFs

use crate::config::OcrConfig;
use crate::error::{ExtractionError, OcrError};
use crate::input::file_detector::DocumentKind;
use crate::input::ocr::{OcrEngine, PageRenderer, PdftoppmRenderer, TesseractEngine};
use crate::input::source::InputDocument;
use log::{debug, info, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use zip::ZipArchive;

/// Plain text of one document and whether it came from OCR.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub used_ocr: bool,
}

impl ExtractedText {
    pub fn native(text: String) -> Self {
        Self { text, used_ocr: false }
    }
}

const DEFAULT_PARSE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct TextExtractor {
    renderer: Arc<dyn PageRenderer>,
    ocr: Arc<dyn OcrEngine>,
    parse_timeout: Duration,
}

impl TextExtractor {
    pub fn new(renderer: Arc<dyn PageRenderer>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            renderer,
            ocr,
            parse_timeout: DEFAULT_PARSE_TIMEOUT,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            Arc::new(PdftoppmRenderer::from_config(config)),
            Arc::new(TesseractEngine::from_config(config)),
        )
        .with_parse_timeout(Duration::from_secs(config.timeout_secs))
    }

    /// Upper bound on native parsing of one document.
    pub fn with_parse_timeout(mut self, timeout: Duration) -> Self {
        self.parse_timeout = timeout;
        self
    }

    pub async fn extract(&self, doc: &InputDocument) -> Result<ExtractedText, ExtractionError> {
        match doc.kind {
            DocumentKind::Pdf => {
                debug!("Extracting text from PDF: {}", doc.path.display());
                let native = native_pdf_text(&doc.path, self.parse_timeout).await?;
                Ok(self.with_ocr_fallback(&doc.path, native).await)
            }
            DocumentKind::Docx | DocumentKind::Doc => {
                debug!("Extracting paragraphs from Word document: {}", doc.path.display());
                word_text(&doc.path, self.parse_timeout).await.map(ExtractedText::native)
            }
        }
    }

    /// OCR runs only when native extraction produced nothing but whitespace.
    pub async fn with_ocr_fallback(&self, pdf: &Path, native: String) -> ExtractedText {
        if !native.trim().is_empty() {
            return ExtractedText::native(native);
        }

        info!("No embedded text in {}, falling back to OCR", pdf.display());
        let text = match self.ocr_pdf(pdf).await {
            Ok(text) => text,
            Err(e) => {
                warn!("OCR failed for {}: {}", pdf.display(), e);
                String::new()
            }
        };

        ExtractedText { text, used_ocr: true }
    }

    async fn ocr_pdf(&self, pdf: &Path) -> Result<String, OcrError> {
        let workdir = TempDir::new()?;
        let pages = self.renderer.render_pages(pdf, workdir.path()).await?;

        let mut texts = Vec::with_capacity(pages.len());
        for page in &pages {
            match self.ocr.text_of(page).await {
                Ok(text) => texts.push(text),
                Err(e) => {
                    warn!("OCR failed on {}: {}", page.display(), e);
                    texts.push(String::new());
                }
            }
        }

        Ok(texts.join("\n"))
    }
}

async fn native_pdf_text(path: &Path, timeout: Duration) -> Result<String, ExtractionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ExtractionError::corrupt(path, e))?;

    // pdf-extract is CPU bound and may panic on malformed input.
    let parse = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes));
    bounded_parse(path, timeout, parse)
        .await?
        .map_err(|e| ExtractionError::corrupt(path, e))
}

async fn word_text(path: &Path, timeout: Duration) -> Result<String, ExtractionError> {
    let owned: PathBuf = path.to_path_buf();
    let parse = tokio::task::spawn_blocking(move || read_docx(&owned));
    bounded_parse(path, timeout, parse).await?
}

/// A parse that crashes or outlives `timeout` marks the document corrupt.
/// The blocking thread is left to finish on its own.
async fn bounded_parse<T>(
    path: &Path,
    timeout: Duration,
    parse: tokio::task::JoinHandle<T>,
) -> Result<T, ExtractionError> {
    match tokio::time::timeout(timeout, parse).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ExtractionError::corrupt(path, format!("parser crashed: {}", e))),
        Err(_) => Err(ExtractionError::corrupt(
            path,
            format!("parsing took longer than {}s", timeout.as_secs()),
        )),
    }
}

fn read_docx(path: &Path) -> Result<String, ExtractionError> {
    let file = File::open(path).map_err(|e| ExtractionError::corrupt(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractionError::corrupt(path, e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractionError::corrupt(path, e))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::corrupt(path, e))?;

    let paragraphs = docx_paragraphs(&xml).map_err(|e| ExtractionError::corrupt(path, e))?;
    Ok(paragraphs.join("\n"))
}

/// Paragraph texts of a WordprocessingML body, in the order the paragraphs
/// open. Paragraphs nested in text boxes get their own entry and never cut
/// into the enclosing one. `mc:Fallback` duplicates its `mc:Choice` and is skipped.
pub fn docx_paragraphs(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut in_text = false;
    let mut fallback_depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        if fallback_depth > 0 {
            match event {
                Event::Start(e) if e.name().as_ref() == b"mc:Fallback" => fallback_depth += 1,
                Event::End(e) if e.name().as_ref() == b"mc:Fallback" => fallback_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    open.push(paragraphs.len());
                    paragraphs.push(String::new());
                }
                b"w:t" => in_text = true,
                b"mc:Fallback" => fallback_depth = 1,
                _ => {}
            },
            Event::Empty(e) => {
                let target = open.last().copied();
                match (e.name().as_ref(), target) {
                    (b"w:p", _) => paragraphs.push(String::new()),
                    (b"w:tab", Some(index)) => paragraphs[index].push('\t'),
                    (b"w:br" | b"w:cr", Some(index)) => paragraphs[index].push('\n'),
                    _ => {}
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    open.pop();
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(&index) = open.last() {
                    paragraphs[index].push_str(&t.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}
