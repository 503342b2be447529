//! OCR capabilities: PDF page rasterization and image text recognition
//!
//! Both are consumed as external programs (`pdftoppm` from Poppler and the
//! `tesseract` CLI). Every invocation is time-boxed so that one slow scan
//! cannot stall the whole batch.

use crate::config::OcrConfig;
use crate::error::OcrError;
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Rasterizes a PDF into one image file per page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Returned images are in page order and live inside `workdir`.
    async fn render_pages(&self, pdf: &Path, workdir: &Path) -> Result<Vec<PathBuf>, OcrError>;
}

/// Recognizes the text on one page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn text_of(&self, image: &Path) -> Result<String, OcrError>;
}

pub struct PdftoppmRenderer {
    binary: PathBuf,
    dpi: u32,
    timeout: Duration,
}

impl PdftoppmRenderer {
    pub fn new(binary: impl Into<PathBuf>, dpi: u32, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            dpi,
            timeout,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            &config.pdftoppm_path,
            config.dpi,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render_pages(&self, pdf: &Path, workdir: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let prefix = workdir.join("page");
        let mut command = Command::new(&self.binary);
        command
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(&prefix);

        let output = run_with_timeout(command, "pdftoppm", self.timeout).await?;
        if !output.status.success() {
            return Err(OcrError::Render(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }

        let mut pages = Vec::new();
        for entry in std::fs::read_dir(workdir)? {
            let path = entry?.path();
            if let Some(number) = page_number(&path) {
                pages.push((number, path));
            }
        }
        pages.sort_by_key(|(number, _)| *number);
        debug!("Rendered {} page(s) from {}", pages.len(), pdf.display());

        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }
}

pub struct TesseractEngine {
    binary: PathBuf,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(&config.tesseract_path, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn text_of(&self, image: &Path) -> Result<String, OcrError> {
        let mut command = Command::new(&self.binary);
        command.arg(image).arg("stdout");

        let output = run_with_timeout(command, "tesseract", self.timeout).await?;
        if !output.status.success() {
            return Err(OcrError::Recognize(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

async fn run_with_timeout(mut command: Command, tool: &str, timeout: Duration) -> Result<Output, OcrError> {
    command.kill_on_drop(true);
    match tokio::time::timeout(timeout, command.output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(OcrError::Timeout {
            tool: tool.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// `page-3.png` / `page-03.png` -> 3
fn page_number(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix("page-")?
        .parse()
        .ok()
}
