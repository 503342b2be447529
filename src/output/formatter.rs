//! Console rendering of a finished screening run

use crate::output::artifacts::ArtifactSummary;
use crate::processing::batch::BatchRun;
use colored::{Color, Colorize};

pub struct ConsoleFormatter {
    use_colors: bool,
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_header(&self, title: &str, level: u8) -> String {
        let prefix = match level {
            1 => "█",
            2 => "▓",
            _ => "▒",
        };

        let color = match level {
            1 => Color::Blue,
            2 => Color::Green,
            _ => Color::Yellow,
        };

        if self.use_colors {
            format!("\n{} {}\n", prefix.color(color).bold(), title.color(color).bold())
        } else {
            format!("\n{} {}\n", prefix, title)
        }
    }

    fn format_score_badge(&self, score: u8) -> String {
        let (badge, color) = match score {
            75..=100 => ("STRONG", Color::Green),
            50..=74 => ("PARTIAL", Color::Yellow),
            1..=49 => ("WEAK", Color::BrightYellow),
            _ => ("NONE", Color::BrightRed),
        };

        if self.use_colors {
            format!("[{}]", badge.color(color).bold())
        } else {
            format!("[{}]", badge)
        }
    }

    pub fn format_run(&self, run: &BatchRun, artifacts: Option<&ArtifactSummary>) -> String {
        let mut output = String::new();

        output.push_str(&self.format_header("CV SCREENING SUMMARY", 1));
        output.push_str(&format!(
            "Started: {} | Elapsed: {:.1}s\n",
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.elapsed.as_secs_f64()
        ));
        output.push_str(&format!("Keywords: {}\n", run.keywords.join(", ")));

        output.push_str(&self.format_header("Totals", 2));
        output.push_str(&format!("Processed:      {}/{}\n", run.processed_count, run.documents.len()));
        output.push_str(&format!("Summarized:     {}\n", run.outcomes.len()));
        output.push_str(&format!(
            "Matched:        {}\n",
            self.colorize(&run.matched().count().to_string(), Color::Green)
        ));
        output.push_str(&format!(
            "Manual review:  {}\n",
            self.colorize(&run.needing_review().count().to_string(), Color::Yellow)
        ));
        if !run.excluded.is_empty() {
            output.push_str(&format!(
                "Excluded:       {} ({})\n",
                self.colorize(&run.excluded.len().to_string(), Color::Red),
                run.excluded.join(", ")
            ));
        }

        if !run.outcomes.is_empty() {
            output.push_str(&self.format_header("Documents", 2));
            for outcome in &run.outcomes {
                let keywords = if outcome.is_matched() {
                    outcome.matches.keywords_joined()
                } else {
                    "-".to_string()
                };
                let review = if outcome.needs_manual_review {
                    self.colorize(" (OCR, review)", Color::Yellow)
                } else {
                    String::new()
                };
                output.push_str(&format!(
                    "{:>3}% {} {}{}\n      {}\n",
                    outcome.matches.score,
                    self.format_score_badge(outcome.matches.score),
                    self.colorize(&outcome.filename, Color::Cyan),
                    review,
                    keywords
                ));
                if let Some(report) = &outcome.experience {
                    output.push_str(&format!(
                        "      {:.1} years of experience, {} role(s)\n",
                        report.record.total_experience_years,
                        report.record.roles.len()
                    ));
                }
            }
        }

        if let Some(artifacts) = artifacts {
            output.push_str(&self.format_header("Artifacts", 3));
            output.push_str(&format!("Report: {}\n", artifacts.summary.display()));
            if let Some(bundle) = &artifacts.bundle {
                output.push_str(&format!("Matched CVs: {}\n", bundle.display()));
            }
            if let Some(review) = &artifacts.review_bundle {
                output.push_str(&format!("Manual review: {}\n", review.display()));
            }
            if !artifacts.document_files.is_empty() {
                output.push_str(&format!("Per-CV files: {}\n", artifacts.document_files.len()));
            }
            if artifacts.document_failures > 0 {
                output.push_str(&format!(
                    "{}\n",
                    self.colorize(
                        &format!("{} per-CV file(s) could not be written", artifacts.document_failures),
                        Color::Red
                    )
                ));
            }
        }

        output
    }
}
