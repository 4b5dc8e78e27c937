//! Stage-2 reasoner: synthesize a structured answer from loaded summaries

use crate::agent::AccessRecord;
use crate::artifacts::Summary;
use crate::error::{Error, Result};
use crate::llm::{prompts, LanguageModel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// The analyzer's structured output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// One concise sentence
    pub answer: String,
    /// Bullets citing numbers from the retrieved data
    #[serde(default)]
    pub rationale: Vec<String>,
    /// Numbers referenced by the rationale; may be empty
    #[serde(default)]
    pub key_metrics: Vec<String>,
}

pub struct Analyzer {
    llm: Arc<dyn LanguageModel>,
    /// Character budget for the concatenated summaries in the prompt
    budget_chars: usize,
}

impl Analyzer {
    pub fn new(llm: Arc<dyn LanguageModel>, budget_chars: usize) -> Self {
        Self { llm, budget_chars }
    }

    pub async fn analyze(
        &self,
        question: &str,
        access_log: &[AccessRecord],
        summaries: &[Arc<Summary>],
    ) -> Result<AnalysisResult> {
        let access_log_json = serde_json::to_string_pretty(access_log)?;
        let data_section = self.render_data_section(summaries);

        let prompt = prompts::analyzer(question, &access_log_json, &data_section);
        let value = self.llm.generate_json(&prompt).await?;

        let result: AnalysisResult = serde_json::from_value(value)
            .map_err(|e| Error::LlmParse(format!("analysis shape: {}", e)))?;

        if result.answer.trim().is_empty() {
            return Err(Error::LlmParse("analysis answer is empty".to_string()));
        }
        if result.rationale.is_empty() {
            return Err(Error::LlmParse("analysis rationale is empty".to_string()));
        }

        Ok(result)
    }

    /// Concatenate summaries with section markers, capped at the budget.
    ///
    /// Summaries are already truncated previews; the hard cap only fires
    /// when many products stack up in one request.
    fn render_data_section(&self, summaries: &[Arc<Summary>]) -> String {
        let mut section = String::new();

        for summary in summaries {
            let block = format!(
                "\n### Data Product: {}\n{}\n{}\n",
                summary.product_id,
                summary.text,
                "-".repeat(80)
            );

            if section.len() + block.len() > self.budget_chars {
                let remaining = self.budget_chars.saturating_sub(section.len());
                let cut = block
                    .char_indices()
                    .take_while(|(i, _)| *i < remaining)
                    .last()
                    .map(|(i, c)| i + c.len_utf8())
                    .unwrap_or(0);
                section.push_str(&block[..cut]);
                section.push_str("\n... [truncated]\n");
                warn!(
                    budget = self.budget_chars,
                    "summary concatenation exceeded the analyzer budget, truncating"
                );
                break;
            }

            section.push_str(&block);
        }

        section
    }
}
