//! Configuration management for the CV screener

use crate::error::{Result, ScreenerError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub screening: ScreeningConfig,
    pub llm: LlmConfig,
    pub ocr: OcrConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    pub keywords: Vec<String>,
    pub extract_details: bool,
    pub worker_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub timeout_secs: f64,
    pub request_delay_ms: u64,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub api_key_env: String,
    pub ollama_url: String,
    pub ollama_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    pub dpi: u32,
    pub pdftoppm_path: PathBuf,
    pub tesseract_path: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: Option<PathBuf>,
    pub summary_file: String,
    pub bundle_file: String,
    pub review_bundle_file: String,
    pub color_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            screening: ScreeningConfig {
                keywords: vec![
                    "Python".to_string(),
                    "SQL".to_string(),
                    "T24".to_string(),
                    "Agile".to_string(),
                ],
                extract_details: false,
                worker_concurrency: 1,
            },
            llm: LlmConfig {
                provider: ProviderKind::Gemini,
                timeout_secs: 30.0,
                request_delay_ms: 0,
                gemini_model: "gemini-2.0-flash".to_string(),
                gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llama3".to_string(),
            },
            ocr: OcrConfig {
                dpi: 300,
                pdftoppm_path: PathBuf::from("pdftoppm"),
                tesseract_path: PathBuf::from("tesseract"),
                timeout_secs: 120,
            },
            output: OutputConfig {
                directory: None,
                summary_file: "CV_Report.xlsx".to_string(),
                bundle_file: "matched_cvs.zip".to_string(),
                review_bundle_file: "manual_review_cvs.zip".to_string(),
                color_output: true,
            },
        }
    }
}

impl LlmConfig {
    /// Per-request timeout. Rejects zero, negative, non-finite and values
    /// too large for a `Duration`.
    pub fn timeout(&self) -> Result<Duration> {
        if !(self.timeout_secs > 0.0) {
            return Err(ScreenerError::Configuration(
                "llm.timeout_secs must be positive".to_string(),
            ));
        }
        Duration::try_from_secs_f64(self.timeout_secs).map_err(|_| {
            ScreenerError::Configuration(format!(
                "llm.timeout_secs is out of range: {}",
                self.timeout_secs
            ))
        })
    }
}

impl Config {
    /// Load the user config, writing the defaults on first use.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            ScreenerError::Configuration(format!("Failed to parse config '{}': {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScreenerError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("cv-screener")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.screening.worker_concurrency == 0 {
            return Err(ScreenerError::Configuration(
                "screening.worker_concurrency must be at least 1".to_string(),
            ));
        }
        self.llm.timeout()?;
        if self.ocr.timeout_secs == 0 {
            return Err(ScreenerError::Configuration(
                "ocr.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Keywords in configured order, trimmed and deduplicated case-insensitively.
    pub fn keywords(&self) -> Vec<String> {
        normalize_keywords(self.screening.keywords.iter().map(String::as_str))
    }
}

/// Trim, drop empties and dedupe ignoring case. The first casing seen wins.
pub fn normalize_keywords<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Split a comma-separated keyword list as typed on the command line.
pub fn parse_keyword_list(input: &str) -> Vec<String> {
    normalize_keywords(input.split(','))
}
