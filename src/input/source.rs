//! Input sources: a folder of CVs or an uploaded zip archive

use crate::error::{ExtractionError, Result, ScreenerError};
use crate::input::file_detector::DocumentKind;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

/// One source file submitted for screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDocument {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub size_bytes: u64,
}

impl InputDocument {
    pub fn from_path(path: impl Into<PathBuf>) -> std::result::Result<Self, ExtractionError> {
        let path = path.into();
        let kind = DocumentKind::from_path(&path).ok_or_else(|| ExtractionError::UnsupportedType {
            extension: path
                .extension()
                .map(|ext| ext.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: path.clone(),
        })?;
        let size_bytes = fs::metadata(&path)
            .map_err(|e| ExtractionError::corrupt(&path, e))?
            .len();

        Ok(Self { path, kind, size_bytes })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Folder(PathBuf),
    Archive(PathBuf),
}

impl InputSource {
    /// Classify a user supplied path. Anything that is neither a directory nor
    /// a `.zip` file is rejected before any document is touched.
    pub fn detect(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(InputSource::Folder(path.to_path_buf()));
        }
        if !path.exists() {
            return Err(ScreenerError::InvalidInput(format!(
                "Source does not exist: {}",
                path.display()
            )));
        }
        let is_zip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if is_zip {
            Ok(InputSource::Archive(path.to_path_buf()))
        } else {
            Err(ScreenerError::InvalidInput(format!(
                "Source must be a folder or a .zip archive: {}",
                path.display()
            )))
        }
    }

    pub fn origin(&self) -> &Path {
        match self {
            InputSource::Folder(path) | InputSource::Archive(path) => path,
        }
    }

    /// Where artifacts go when no output directory is configured.
    pub fn default_output_dir(&self) -> PathBuf {
        match self {
            InputSource::Folder(path) => path.clone(),
            InputSource::Archive(path) => path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Expand the source into a flat, name-sorted list of screenable documents.
    pub fn enumerate(&self) -> Result<EnumeratedInput> {
        match self {
            InputSource::Folder(dir) => {
                let documents = list_documents(dir)?;
                ensure_documents(documents, dir, None)
            }
            InputSource::Archive(archive_path) => {
                let scratch = TempDir::new()?;
                unpack_archive(archive_path, scratch.path())?;
                let documents = list_documents(scratch.path())?;
                ensure_documents(documents, archive_path, Some(scratch))
            }
        }
    }
}

/// Documents of one run. Holds the scratch directory of an expanded archive
/// alive until the run's artifacts are written.
#[derive(Debug)]
pub struct EnumeratedInput {
    pub documents: Vec<InputDocument>,
    _scratch: Option<TempDir>,
}

fn ensure_documents(
    documents: Vec<InputDocument>,
    origin: &Path,
    scratch: Option<TempDir>,
) -> Result<EnumeratedInput> {
    if documents.is_empty() {
        return Err(ScreenerError::NoDocuments(origin.display().to_string()));
    }
    info!("Found {} CV file(s) in {}", documents.len(), origin.display());
    Ok(EnumeratedInput {
        documents,
        _scratch: scratch,
    })
}

fn list_documents(dir: &Path) -> Result<Vec<InputDocument>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        ScreenerError::InvalidInput(format!("Cannot read folder '{}': {}", dir.display(), e))
    })?;

    let mut documents = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match InputDocument::from_path(&path) {
            Ok(doc) => documents.push(doc),
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }

    sort_documents(&mut documents);
    Ok(documents)
}

/// Case-insensitive name order; names differing only in case fall back to
/// byte order so the submission order never depends on `read_dir`.
fn sort_documents(documents: &mut [InputDocument]) {
    documents.sort_by(|a, b| {
        let (a, b) = (a.file_name(), b.file_name());
        a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(&b))
    });
}

fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| {
        ScreenerError::Archive(format!("Corrupt archive '{}': {}", archive_path.display(), e))
    })?;
    if archive.len() == 0 {
        return Err(ScreenerError::Archive(format!(
            "Archive is empty: {}",
            archive_path.display()
        )));
    }

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ScreenerError::Archive(format!("Unreadable archive entry #{}: {}", index, e)))?;
        if entry.is_dir() {
            continue;
        }
        // Entries escaping the archive root have no enclosed name.
        let Some(relative) = entry.enclosed_name() else {
            debug!("Skipping unsafe archive entry: {}", entry.name());
            continue;
        };
        let Some(file_name) = relative.file_name().map(|name| name.to_os_string()) else {
            continue;
        };
        if DocumentKind::from_path(Path::new(&file_name)).is_none() {
            continue;
        }

        let target = dest.join(&file_name);
        if target.exists() {
            debug!("Skipping duplicate archive entry: {}", entry.name());
            continue;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn test_case_only_differences_sort_deterministically() {
        let doc = |name: &str| InputDocument {
            path: PathBuf::from(name),
            kind: DocumentKind::Pdf,
            size_bytes: 0,
        };
        let mut forward = vec![doc("b.pdf"), doc("a.pdf"), doc("A.pdf")];
        let mut reverse = vec![doc("A.pdf"), doc("a.pdf"), doc("b.pdf")];
        sort_documents(&mut forward);
        sort_documents(&mut reverse);

        let names = |docs: &[InputDocument]| docs.iter().map(|d| d.file_name()).collect::<Vec<_>>();
        assert_eq!(names(&forward), vec!["A.pdf", "a.pdf", "b.pdf"]);
        assert_eq!(names(&forward), names(&reverse));
    }

    #[test]
    fn test_folder_enumeration_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "A.docx", "notes.txt", "c.doc"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let input = InputSource::detect(dir.path()).unwrap().enumerate().unwrap();
        let names: Vec<String> = input.documents.iter().map(|d| d.file_name()).collect();
        assert_eq!(names, vec!["A.docx", "b.pdf", "c.doc"]);
        assert_eq!(input.documents[1].kind, DocumentKind::Pdf);
        assert_eq!(input.documents[1].size_bytes, 1);
    }

    #[test]
    fn test_empty_folder_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), b"nothing").unwrap();

        let result = InputSource::detect(dir.path()).unwrap().enumerate();
        assert!(matches!(result, Err(ScreenerError::NoDocuments(_))));
    }

    #[test]
    fn test_missing_source_is_invalid() {
        let result = InputSource::detect(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(ScreenerError::InvalidInput(_))));
    }

    #[test]
    fn test_archive_is_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("upload.zip");
        let mut zip = ZipWriter::new(File::create(&archive_path).unwrap());
        let options = SimpleFileOptions::default();
        zip.start_file("batch/one.pdf", options).unwrap();
        zip.write_all(b"%PDF").unwrap();
        zip.start_file("two.docx", options).unwrap();
        zip.write_all(b"PK").unwrap();
        zip.start_file("ignore.png", options).unwrap();
        zip.write_all(b"png").unwrap();
        zip.finish().unwrap();

        let source = InputSource::detect(&archive_path).unwrap();
        assert_eq!(source.default_output_dir(), dir.path());
        let input = source.enumerate().unwrap();
        let names: Vec<String> = input.documents.iter().map(|d| d.file_name()).collect();
        assert_eq!(names, vec!["one.pdf", "two.docx"]);
        assert!(input.documents[0].path.exists());
    }

    #[test]
    fn test_corrupt_archive_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("broken.zip");
        fs::write(&archive_path, b"not a zip at all").unwrap();

        let result = InputSource::detect(&archive_path).unwrap().enumerate();
        assert!(matches!(result, Err(ScreenerError::Archive(_))));
    }

    #[test]
    fn test_unsupported_document_type() {
        let err = InputDocument::from_path("cv.txt").unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedType { ref extension, .. } if extension == "txt"));
    }
}
