//! Stage-1 reasoner: choose which data products to consult

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::llm::{prompts, LanguageModel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Plans never exceed three products
const MAX_PLAN_ENTRIES: usize = 3;

/// One planned product with the model's reason for choosing it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub product_id: String,
    pub reason: String,
}

/// Ordered product selection, 1-3 entries, every id resolvable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
}

/// Wire shape the planner prompt asks the model for
#[derive(Debug, Deserialize)]
struct RawPlanEntry {
    product: String,
    #[serde(default)]
    why: String,
}

pub struct Planner {
    llm: Arc<dyn LanguageModel>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Produce a validated plan for a question.
    ///
    /// Entries naming unknown products are dropped; more than three entries
    /// are truncated in submission order. Zero surviving entries is a hard
    /// failure. The caller must be told, there is no default plan.
    pub async fn plan(&self, question: &str, catalog: &Catalog, sample_preview: &str) -> Result<Plan> {
        let prompt = prompts::planner(question, catalog.describe_for_planner(), sample_preview);
        let value = self.llm.generate_json(&prompt).await?;

        let raw: Vec<RawPlanEntry> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)
                .map_err(|e| Error::LlmParse(format!("plan array: {}", e)))?,
            // A bare object is a one-entry plan
            serde_json::Value::Object(_) => vec![serde_json::from_value(value)
                .map_err(|e| Error::LlmParse(format!("plan entry: {}", e)))?],
            other => {
                return Err(Error::LlmParse(format!("plan is not an array: {}", other)));
            }
        };

        let submitted = raw.len();
        let mut entries = Vec::new();
        for entry in raw {
            if !catalog.contains(&entry.product) {
                warn!(product_id = %entry.product, "planner chose an unknown product, dropping");
                continue;
            }
            if entries.iter().any(|e: &PlanEntry| e.product_id == entry.product) {
                continue;
            }
            entries.push(PlanEntry {
                product_id: entry.product,
                reason: entry.why,
            });
            if entries.len() == MAX_PLAN_ENTRIES {
                break;
            }
        }

        if entries.is_empty() {
            return Err(Error::PlanningFailed(format!(
                "no valid products among {} submitted entries",
                submitted
            )));
        }

        debug!(products = ?entries.iter().map(|e| &e.product_id).collect::<Vec<_>>(), "plan ready");
        Ok(Plan { entries })
    }
}
