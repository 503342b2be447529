//! CLI interface for the CV screener

use crate::config::ProviderKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cv-screener")]
#[command(about = "Batch CV screening by keywords with optional LLM experience extraction")]
#[command(long_about = "Screen a folder or zip archive of CVs (PDF, DOCX, DOC) against a keyword list, \
    score every document, and optionally extract structured work history through an LLM")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Screen every CV in a folder or zip archive
    Screen {
        /// Folder or .zip archive containing CVs
        source: PathBuf,

        /// Comma-separated keywords (overrides the configured list)
        #[arg(short, long)]
        keywords: Option<String>,

        /// Extract structured work history for matched CVs
        #[arg(long)]
        extract_details: bool,

        /// Extraction provider: gemini, ollama
        #[arg(long)]
        provider: Option<String>,

        /// Number of documents processed concurrently
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Per-request LLM timeout in seconds
        #[arg(long)]
        llm_timeout: Option<f64>,

        /// Directory for the report, bundles and per-CV files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip writing the zip bundles
        #[arg(long)]
        no_bundle: bool,
    },

    /// Extract text from a single CV and report whether OCR was needed
    Extract {
        /// Path to a PDF, DOCX or DOC file
        file: PathBuf,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file location
    Path,
}

/// Parse and validate a provider name
pub fn parse_provider(provider: &str) -> Result<ProviderKind, String> {
    match provider.to_lowercase().as_str() {
        "gemini" => Ok(ProviderKind::Gemini),
        "ollama" | "local" => Ok(ProviderKind::Ollama),
        _ => Err(format!("Invalid provider: {}. Supported: gemini, ollama", provider)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider("Gemini"), Ok(ProviderKind::Gemini));
        assert_eq!(parse_provider("ollama"), Ok(ProviderKind::Ollama));
        assert!(parse_provider("gpt").is_err());
    }

    #[test]
    fn test_screen_arguments() {
        let cli = Cli::try_parse_from([
            "cv-screener",
            "screen",
            "cvs.zip",
            "-k",
            "Python, SQL",
            "--extract-details",
            "-j",
            "4",
            "--no-bundle",
        ])
        .unwrap();

        match cli.command {
            Commands::Screen {
                source,
                keywords,
                extract_details,
                concurrency,
                no_bundle,
                ..
            } => {
                assert_eq!(source, PathBuf::from("cvs.zip"));
                assert_eq!(keywords.as_deref(), Some("Python, SQL"));
                assert!(extract_details);
                assert_eq!(concurrency, Some(4));
                assert!(no_bundle);
            }
            _ => panic!("expected screen command"),
        }
    }
}
