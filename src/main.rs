//! CV screener: batch keyword screening of CVs with optional experience extraction

use anyhow::Context;
use clap::Parser;
use cv_screener::cli::{self, Cli, Commands, ConfigAction};
use cv_screener::config::{parse_keyword_list, Config};
use cv_screener::input::{InputDocument, InputSource, TextExtractor};
use cv_screener::llm::{provider, ExperienceExtractor};
use cv_screener::output::{ArtifactWriter, ConsoleFormatter};
use cv_screener::processing::{BatchOrchestrator, DocumentPipeline, KeywordMatcher};
use cv_screener::ScreenerError;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::Path;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command, config).await {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, mut config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Screen {
            source,
            keywords,
            extract_details,
            provider,
            concurrency,
            llm_timeout,
            output,
            no_bundle,
        } => {
            if let Some(keywords) = keywords {
                config.screening.keywords = parse_keyword_list(&keywords);
            }
            if extract_details {
                config.screening.extract_details = true;
            }
            if let Some(provider) = provider {
                config.llm.provider = cli::parse_provider(&provider).map_err(ScreenerError::InvalidInput)?;
            }
            if let Some(concurrency) = concurrency {
                config.screening.worker_concurrency = concurrency;
            }
            if let Some(timeout) = llm_timeout {
                config.llm.timeout_secs = timeout;
            }
            if output.is_some() {
                config.output.directory = output;
            }
            config.validate()?;

            screen(&source, &config, !no_bundle).await
        }

        Commands::Extract { file } => {
            let doc = InputDocument::from_path(&file)?;
            let extractor = TextExtractor::from_config(&config.ocr);
            let extracted = extractor
                .extract(&doc)
                .await
                .with_context(|| format!("Could not extract text from {}", file.display()))?;

            println!("{}", extracted.text);
            eprintln!(
                "\n{} characters, OCR used: {}",
                extracted.text.chars().count(),
                if extracted.used_ocr { "yes (review manually)" } else { "no" }
            );
            Ok(())
        }

        Commands::Config { action } => {
            match action {
                Some(ConfigAction::Show) | None => {
                    println!("⚙️  Current Configuration\n");
                    println!("{}", toml::to_string_pretty(&config)?);
                }

                Some(ConfigAction::Reset) => {
                    println!("🔄 Resetting configuration to defaults...");
                    Config::default().save()?;
                    println!("✅ Configuration reset successfully!");
                }

                Some(ConfigAction::Path) => {
                    println!("{}", Config::config_path().display());
                }
            }
            Ok(())
        }
    }
}

async fn screen(source: &Path, config: &Config, bundles: bool) -> anyhow::Result<()> {
    let keywords = config.keywords();
    if keywords.is_empty() {
        warn!("No keywords configured; every document will score 0");
    }

    let source = InputSource::detect(source)?;
    let input = source.enumerate()?;

    let matcher = KeywordMatcher::new(keywords);
    let mut pipeline = DocumentPipeline::new(TextExtractor::from_config(&config.ocr), matcher);
    if config.screening.extract_details {
        let provider = provider::from_config(&config.llm)?;
        let extractor = ExperienceExtractor::from_config(provider, &config.llm)?;
        info!("Structured extraction enabled via {}", extractor.provider_name());
        pipeline = pipeline.with_experience_extractor(extractor);
    }

    let bar = ProgressBar::new(input.documents.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let orchestrator = BatchOrchestrator::new(pipeline, config.screening.worker_concurrency);
    let run = orchestrator
        .run(input.documents.clone(), |progress| {
            bar.set_position(progress.processed_count as u64);
            bar.set_message(format!(
                "{} ({}) ETA {:.0}s",
                progress.filename, progress.state, progress.eta_seconds
            ));
        })
        .await;
    bar.finish_and_clear();

    let output_dir = config
        .output
        .directory
        .clone()
        .unwrap_or_else(|| source.default_output_dir());
    let writer = ArtifactWriter::from_config(output_dir, &config.output).with_bundles(bundles);
    let artifacts = writer.write_all(&run)?;

    let formatter = ConsoleFormatter::new(config.output.color_output);
    print!("{}", formatter.format_run(&run, Some(&artifacts)));

    // The expanded archive must outlive bundling.
    drop(input);
    Ok(())
}
