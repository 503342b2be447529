//! Artifact persistence: per-CV experience files, the batch report and zip bundles

use crate::config::OutputConfig;
use crate::error::PersistenceError;
use crate::processing::batch::BatchRun;
use crate::processing::pipeline::ExtractionOutcome;
use log::{info, warn};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const SUMMARY_HEADERS: [&str; 7] = [
    "Filename",
    "Match Score",
    "Matched Keywords",
    "Needs Manual Review",
    "Total Experience Years",
    "Experience By Domain",
    "Roles",
];

const ROLE_HEADERS: [&str; 7] = [
    "Title",
    "Company",
    "Start",
    "End",
    "Domain",
    "Matched Keywords",
    "Match Score",
];

/// Paths produced for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactSummary {
    pub document_files: Vec<PathBuf>,
    pub document_failures: usize,
    pub summary: PathBuf,
    pub bundle: Option<PathBuf>,
    pub review_bundle: Option<PathBuf>,
}

pub struct ArtifactWriter {
    output_dir: PathBuf,
    summary_file: String,
    bundle_file: String,
    review_bundle_file: String,
    bundles: bool,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            summary_file: "CV_Report.xlsx".to_string(),
            bundle_file: "matched_cvs.zip".to_string(),
            review_bundle_file: "manual_review_cvs.zip".to_string(),
            bundles: true,
        }
    }

    pub fn from_config(output_dir: impl Into<PathBuf>, config: &OutputConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            summary_file: config.summary_file.clone(),
            bundle_file: config.bundle_file.clone(),
            review_bundle_file: config.review_bundle_file.clone(),
            bundles: true,
        }
    }

    pub fn with_bundles(mut self, enabled: bool) -> Self {
        self.bundles = enabled;
        self
    }

    /// Emit everything for a completed run. A failed per-CV file is logged and
    /// counted; failing to write the report or a bundle fails the call.
    pub fn write_all(&self, run: &BatchRun) -> Result<ArtifactSummary, PersistenceError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| PersistenceError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let mut summary = ArtifactSummary::default();
        for outcome in &run.outcomes {
            match self.write_document(outcome) {
                Ok(paths) => summary.document_files.extend(paths),
                Err(e) => {
                    warn!("{}: {}", outcome.filename, e);
                    summary.document_failures += 1;
                }
            }
        }

        summary.summary = self.write_summary(&run.outcomes)?;
        if self.bundles {
            summary.bundle = self.write_bundle(&run.outcomes)?;
            summary.review_bundle = self.write_review_bundle(&run.outcomes)?;
        }

        info!("Artifacts written to {}", self.output_dir.display());
        Ok(summary)
    }

    /// `<base>_experience.json` with the full outcome, plus
    /// `<base>_experience.xlsx` when roles were extracted. Nothing is written
    /// for documents without structured extraction.
    pub fn write_document(&self, outcome: &ExtractionOutcome) -> Result<Vec<PathBuf>, PersistenceError> {
        let Some(report) = &outcome.experience else {
            return Ok(Vec::new());
        };

        let base = outcome.base_name();
        let json_path = self.output_dir.join(format!("{}_experience.json", base));
        let json = serde_json::to_string_pretty(outcome).map_err(|source| PersistenceError::Json {
            path: json_path.clone(),
            source,
        })?;
        fs::write(&json_path, json).map_err(|source| PersistenceError::Io {
            path: json_path.clone(),
            source,
        })?;
        let mut written = vec![json_path];

        if !report.record.roles.is_empty() {
            let xlsx_path = self.output_dir.join(format!("{}_experience.xlsx", base));
            roles_workbook(outcome)
                .and_then(|mut workbook| workbook.save(&xlsx_path))
                .map_err(|e| spreadsheet_error(&xlsx_path, e))?;
            written.push(xlsx_path);
        }

        Ok(written)
    }

    /// One row per outcome, in submission order.
    pub fn write_summary(&self, outcomes: &[ExtractionOutcome]) -> Result<PathBuf, PersistenceError> {
        let path = self.output_dir.join(&self.summary_file);
        summary_workbook(outcomes)
            .and_then(|mut workbook| workbook.save(&path))
            .map_err(|e| spreadsheet_error(&path, e))?;
        Ok(path)
    }

    /// Originals of every document with at least one matched keyword.
    pub fn write_bundle(&self, outcomes: &[ExtractionOutcome]) -> Result<Option<PathBuf>, PersistenceError> {
        let members: Vec<&ExtractionOutcome> = outcomes.iter().filter(|o| o.is_matched()).collect();
        self.write_archive(&self.bundle_file, &members)
    }

    /// Originals whose text came from OCR, kept apart for a human to check.
    pub fn write_review_bundle(&self, outcomes: &[ExtractionOutcome]) -> Result<Option<PathBuf>, PersistenceError> {
        let members: Vec<&ExtractionOutcome> = outcomes.iter().filter(|o| o.needs_manual_review).collect();
        self.write_archive(&self.review_bundle_file, &members)
    }

    fn write_archive(
        &self,
        file_name: &str,
        members: &[&ExtractionOutcome],
    ) -> Result<Option<PathBuf>, PersistenceError> {
        if members.is_empty() {
            return Ok(None);
        }

        let path = self.output_dir.join(file_name);
        let io_error = |source| PersistenceError::Io {
            path: path.clone(),
            source,
        };
        let zip_error = |e: zip::result::ZipError| PersistenceError::Zip {
            path: path.clone(),
            reason: e.to_string(),
        };

        let mut zip = ZipWriter::new(File::create(&path).map_err(io_error)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut names = HashSet::new();

        for outcome in members {
            if !names.insert(outcome.filename.clone()) {
                warn!("Duplicate file name in bundle, skipping: {}", outcome.filename);
                continue;
            }
            zip.start_file(outcome.filename.as_str(), options).map_err(zip_error)?;
            let mut source = File::open(&outcome.source_path).map_err(io_error)?;
            std::io::copy(&mut source, &mut zip).map_err(io_error)?;
        }
        zip.finish().map_err(zip_error)?;

        Ok(Some(path))
    }
}

fn spreadsheet_error(path: &Path, err: XlsxError) -> PersistenceError {
    PersistenceError::Spreadsheet {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn summary_workbook(outcomes: &[ExtractionOutcome]) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Summary")?;

    for (col, title) in SUMMARY_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }

    for (index, outcome) in outcomes.iter().enumerate() {
        let row = index as u32 + 1;
        sheet.write_string(row, 0, &outcome.filename)?;
        sheet.write_number(row, 1, f64::from(outcome.matches.score))?;
        sheet.write_string(row, 2, &outcome.matches.keywords_joined())?;
        sheet.write_boolean(row, 3, outcome.needs_manual_review)?;

        if let Some(report) = &outcome.experience {
            sheet.write_number(row, 4, report.record.total_experience_years)?;
            sheet.write_string(row, 5, &report.record.domains_json())?;
            sheet.write_string(row, 6, &report.record.roles_summary())?;
        }
    }

    Ok(workbook)
}

fn roles_workbook(outcome: &ExtractionOutcome) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Roles")?;

    for (col, title) in ROLE_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }

    let keywords = outcome.matches.keywords_joined();
    let roles = outcome
        .experience
        .as_ref()
        .map(|report| report.record.roles.as_slice())
        .unwrap_or_default();

    for (index, role) in roles.iter().enumerate() {
        let row = index as u32 + 1;
        let fields = [&role.title, &role.company, &role.start, &role.end, &role.domain];
        for (col, value) in fields.iter().enumerate() {
            if let Some(value) = value {
                sheet.write_string(row, col as u16, value)?;
            }
        }
        sheet.write_string(row, 5, &keywords)?;
        sheet.write_number(row, 6, f64::from(outcome.matches.score))?;
    }

    Ok(workbook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::file_detector::DocumentKind;
    use crate::llm::schema::{ExperienceRecord, ExperienceReport, Role};
    use crate::processing::keyword_matcher::MatchResult;
    use std::collections::BTreeMap;
    use zip::ZipArchive;

    fn outcome(dir: &Path, name: &str, keywords: &[&str], review: bool, roles: Option<Vec<Role>>) -> ExtractionOutcome {
        let source_path = dir.join(name);
        fs::write(&source_path, format!("original bytes of {}", name)).unwrap();
        let matches = MatchResult {
            matched_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            score: (keywords.len() * 50) as u8,
        };
        ExtractionOutcome {
            filename: name.to_string(),
            source_path,
            kind: DocumentKind::Pdf,
            size_bytes: 10,
            experience: roles.map(|roles| ExperienceReport {
                record: ExperienceRecord {
                    total_experience_years: 4.0,
                    experience_by_domain: BTreeMap::from([("IT".to_string(), 4.0)]),
                    roles,
                },
                matched_keywords: matches.matched_keywords.clone(),
                match_score: matches.score,
            }),
            matches,
            needs_manual_review: review,
        }
    }

    fn archive_names(path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_bundle_contains_exactly_matched_documents() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let outcomes = vec![
            outcome(src.path(), "a.pdf", &["Python"], false, None),
            outcome(src.path(), "b.pdf", &[], false, None),
            outcome(src.path(), "c.pdf", &["Python", "SQL"], true, None),
            outcome(src.path(), "d.pdf", &[], true, None),
        ];
        let writer = ArtifactWriter::new(out.path());

        let bundle = writer.write_bundle(&outcomes).unwrap().unwrap();
        assert_eq!(archive_names(&bundle), vec!["a.pdf", "c.pdf"]);

        let review = writer.write_review_bundle(&outcomes).unwrap().unwrap();
        assert_eq!(archive_names(&review), vec!["c.pdf", "d.pdf"]);
    }

    #[test]
    fn test_no_matches_means_no_bundle() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let outcomes = vec![outcome(src.path(), "a.pdf", &[], false, None)];

        let writer = ArtifactWriter::new(out.path());
        assert_eq!(writer.write_bundle(&outcomes).unwrap(), None);
        assert!(!out.path().join("matched_cvs.zip").exists());
    }

    #[test]
    fn test_document_artifacts() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let role = Role {
            title: Some("Engineer".to_string()),
            company: Some("Acme".to_string()),
            ..Role::default()
        };
        let with_roles = outcome(src.path(), "jane.pdf", &["Python"], false, Some(vec![role]));
        let without_roles = outcome(src.path(), "joe.pdf", &["Python"], false, Some(vec![]));
        let without_experience = outcome(src.path(), "ann.pdf", &["Python"], false, None);
        let writer = ArtifactWriter::new(out.path());

        let written = writer.write_document(&with_roles).unwrap();
        assert_eq!(
            written,
            vec![out.path().join("jane_experience.json"), out.path().join("jane_experience.xlsx")]
        );
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(json["filename"], "jane.pdf");
        assert_eq!(json["score"], 50);
        assert_eq!(json["matched_keywords"], serde_json::json!(["Python"]));
        assert_eq!(json["experience"]["match_score"], 50);
        assert_eq!(json["experience"]["roles"][0]["company"], "Acme");

        assert_eq!(writer.write_document(&without_roles).unwrap(), vec![out.path().join("joe_experience.json")]);
        assert!(writer.write_document(&without_experience).unwrap().is_empty());
    }

    #[test]
    fn test_summary_written() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let outcomes = vec![
            outcome(src.path(), "a.pdf", &["Python"], false, Some(vec![])),
            outcome(src.path(), "b.pdf", &[], true, None),
        ];
        let writer = ArtifactWriter::new(out.path());

        let path = writer.write_summary(&outcomes).unwrap();
        assert_eq!(path, out.path().join("CV_Report.xlsx"));
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }
}
