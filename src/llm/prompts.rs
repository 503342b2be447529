//! Extraction prompt for structured work-history facts

use log::debug;

/// Prompt template with the CV text interpolated at `{cv_text}`.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub experience_extraction: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            experience_extraction: EXPERIENCE_EXTRACTION_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    pub fn render_experience(&self, cv_text: &str) -> String {
        let prompt = self.experience_extraction.replace("{cv_text}", cv_text);
        debug!(
            "Rendered extraction prompt: {} chars ({} chars of CV text)",
            prompt.len(),
            cv_text.len()
        );
        prompt
    }
}

const EXPERIENCE_EXTRACTION_TEMPLATE: &str = r#"From the following CV text, extract the candidate's work experience:

- Total years of experience
- Experience by domain (e.g., IT, Finance)
- List of roles with title, company, duration, and inferred domain

Respond with JSON only, no explanations and no markdown, in exactly this format:
{
  "total_experience_years": 6.5,
  "experience_by_domain": {"IT": 3, "Finance": 2.5},
  "roles": [
    {
      "title": "Software Engineer",
      "company": "XYZ Corp",
      "start": "Jan 2020",
      "end": "June 2023",
      "domain": "IT"
    }
  ]
}

If no role information can be found, return "roles": [].

CV Text:
{cv_text}"#;
