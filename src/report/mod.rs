//! Analytics-visit planning and PDF report generation
//!
//! Both surfaces are invoked outside the chat stream: the client calls
//! analytics-visit after the answer's TTS finishes, and report generation
//! when the user asks for a document. They share the catalog, artifact
//! store, and cluster labels with the chat pipeline.

pub mod charts;

use crate::agent::AnalysisResult;
use crate::artifacts::{ArtifactStore, ArtifactTable};
use crate::catalog::Catalog;
use crate::cluster::EmbeddingIndex;
use crate::error::{Error, Result};
use crate::llm::{prompts, LanguageModel};
use crate::metrics::METRICS;
use charts::ChartData;
use chrono::Utc;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Product shown when the model cannot pick one for a cluster
const DEFAULT_VISIT_PRODUCT: &str = "frequency_over_time";

/// Charts included per report
const MAX_REPORT_CHARTS: usize = 3;

/// Response of the analytics-visit endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsVisit {
    pub url: String,
    pub discussion: String,
}

/// Shared state behind the analytics-visit and report endpoints
pub struct ReportService {
    catalog: Arc<Catalog>,
    store: Arc<ArtifactStore>,
    llm: Arc<dyn LanguageModel>,
    index: Arc<EmbeddingIndex>,
}

#[derive(Debug, Deserialize)]
struct RawPick {
    product: String,
}

impl ReportService {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<ArtifactStore>,
        llm: Arc<dyn LanguageModel>,
        index: Arc<EmbeddingIndex>,
    ) -> Self {
        Self {
            catalog,
            store,
            llm,
            index,
        }
    }

    /// Resolve the dashboard page and discussion text for a cluster pair.
    pub async fn analytics_visit(&self, parent_id: i64, child_id: i64) -> Result<AnalyticsVisit> {
        let (parent_label, child_label) = self.cluster_labels(parent_id, child_id);

        let product_id = self.pick_product(&parent_label, &child_label).await;
        let product = self.catalog.get(&product_id)?;
        let url = product
            .route_hint
            .clone()
            .unwrap_or_else(|| "/dashboard/analytics/frequency".to_string());

        let summary_text = match self.store.load_summary(&product_id).await {
            Ok(summary) => summary.text.clone(),
            Err(e) => {
                warn!(error = %e, product_id = %product_id, "no summary for visit discussion");
                String::new()
            }
        };

        let prompt =
            prompts::discuss_visit(&parent_label, &child_label, &product.description, &summary_text);
        let discussion = match self.llm.generate_text(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "visit discussion generation failed, using stock text");
                format!(
                    "This {} view shows trends that can complement the \"{}\" cluster you were viewing.",
                    product.description, parent_label
                )
            }
        };

        Ok(AnalyticsVisit { url, discussion })
    }

    /// Render a PDF report for a cluster pair from its discussion text.
    pub async fn generate_report(
        &self,
        parent_id: i64,
        child_id: i64,
        discussion: &str,
    ) -> Result<Vec<u8>> {
        let (parent_label, child_label) = self.cluster_labels(parent_id, child_id);

        let fields = self.report_fields(&parent_label, &child_label, discussion).await;
        let tables = self.chart_tables().await;

        let result = render_pdf(&parent_label, &child_label, &fields, &tables);
        let status = if result.is_ok() { "success" } else { "error" };
        METRICS.reports_generated.with_label_values(&[status]).inc();
        result
    }

    fn cluster_labels(&self, parent_id: i64, child_id: i64) -> (String, String) {
        let parent = self
            .index
            .parent_label(parent_id)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Cluster {}", parent_id));
        let child = self
            .index
            .child_label(parent_id, child_id)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Sub-cluster {}", child_id));
        (parent, child)
    }

    /// Ask the model for the single most relevant dashboard product.
    async fn pick_product(&self, parent_label: &str, child_label: &str) -> String {
        let dashboard_description = self.dashboard_description();
        let preview = match self.store.load_summary(DEFAULT_VISIT_PRODUCT).await {
            Ok(summary) => summary.text.chars().take(1000).collect(),
            Err(_) => "Frequency data not available".to_string(),
        };

        let prompt = prompts::pick_product_for_cluster(
            parent_label,
            child_label,
            &dashboard_description,
            &preview,
        );

        match self.llm.generate_json(&prompt).await {
            Ok(value) => {
                let picks: Vec<RawPick> = match value {
                    serde_json::Value::Array(_) => serde_json::from_value(value).unwrap_or_default(),
                    serde_json::Value::Object(_) => serde_json::from_value(value)
                        .map(|p: RawPick| vec![p])
                        .unwrap_or_default(),
                    _ => Vec::new(),
                };
                match picks.into_iter().find(|p| {
                    self.catalog
                        .get(&p.product)
                        .map(|product| product.route_hint.is_some())
                        .unwrap_or(false)
                }) {
                    Some(pick) => {
                        debug!(product_id = %pick.product, "picked product for cluster visit");
                        pick.product
                    }
                    None => DEFAULT_VISIT_PRODUCT.to_string(),
                }
            }
            Err(e) => {
                warn!(error = %e, "visit product pick failed, defaulting to trend view");
                DEFAULT_VISIT_PRODUCT.to_string()
            }
        }
    }

    fn dashboard_description(&self) -> String {
        let mut out = String::new();
        for product in self.catalog.dashboard_products() {
            out.push_str(&format!("**{}**\n- Description: {}\n\n", product.id, product.description));
        }
        out
    }

    /// Convert the discussion into structured report fields; on a model
    /// failure the discussion itself becomes the report body.
    async fn report_fields(
        &self,
        parent_label: &str,
        child_label: &str,
        discussion: &str,
    ) -> AnalysisResult {
        let prompt = prompts::report_fields(parent_label, child_label, discussion);
        match self.llm.generate_json(&prompt).await {
            Ok(value) => match serde_json::from_value::<AnalysisResult>(value) {
                Ok(fields) if !fields.answer.trim().is_empty() => fields,
                _ => fallback_fields(discussion),
            },
            Err(e) => {
                warn!(error = %e, "report field generation failed, using discussion text");
                fallback_fields(discussion)
            }
        }
    }

    /// Load up to three dashboard artifacts for the supporting charts.
    async fn chart_tables(&self) -> Vec<Arc<ArtifactTable>> {
        let mut tables = Vec::new();
        let ids: Vec<String> = self
            .catalog
            .dashboard_products()
            .map(|p| p.id.clone())
            .collect();
        for product_id in ids {
            if tables.len() == MAX_REPORT_CHARTS {
                break;
            }
            match self.store.load_artifact(&product_id).await {
                Ok(table) => tables.push(table),
                Err(e) => {
                    warn!(error = %e, product_id = %product_id, "skipping chart for unavailable artifact");
                }
            }
        }
        tables
    }
}

fn fallback_fields(discussion: &str) -> AnalysisResult {
    let answer: String = discussion.chars().take(500).collect();
    let rationale: Vec<String> = discussion
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(4)
        .map(str::to_string)
        .collect();
    AnalysisResult {
        answer: if answer.is_empty() {
            "Analysis complete.".to_string()
        } else {
            answer
        },
        rationale,
        key_metrics: Vec::new(),
    }
}

/// Render the report PDF: header, answer, rationale bullets, metrics
/// table, then one chart per page.
fn render_pdf(
    parent_label: &str,
    child_label: &str,
    fields: &AnalysisResult,
    tables: &[Arc<ArtifactTable>],
) -> Result<Vec<u8>> {
    const PAGE_W: f64 = 210.0;
    const PAGE_H: f64 = 297.0;
    const MARGIN: f64 = 20.0;

    let (doc, page, layer) = PdfDocument::new("Analytics Report", Mm((PAGE_W) as f32), Mm((PAGE_H) as f32), "body");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| Error::Render(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| Error::Render(e.to_string()))?;

    let mut layer_ref = doc.get_page(page).get_layer(layer);
    let mut cursor = PAGE_H - MARGIN;

    // Header
    layer_ref.use_text("CRM Analytics Report", 18.0, Mm((MARGIN) as f32), Mm((cursor) as f32), &bold);
    cursor -= 8.0;
    layer_ref.use_text(
        format!("Cluster: {} / {}", parent_label, child_label),
        11.0,
        Mm((MARGIN) as f32),
        Mm((cursor) as f32),
        &font,
    );
    cursor -= 6.0;
    layer_ref.use_text(
        format!("Generated: {}", Utc::now().format("%Y-%m-%d %H:%M UTC")),
        9.0,
        Mm((MARGIN) as f32),
        Mm((cursor) as f32),
        &font,
    );
    cursor -= 12.0;

    // Answer
    layer_ref.use_text("Summary", 13.0, Mm((MARGIN) as f32), Mm((cursor) as f32), &bold);
    cursor -= 7.0;
    for line in wrap_text(&fields.answer, 92) {
        layer_ref.use_text(line, 10.0, Mm((MARGIN) as f32), Mm((cursor) as f32), &font);
        cursor -= 5.5;
    }
    cursor -= 6.0;

    // Rationale bullets
    if !fields.rationale.is_empty() {
        layer_ref.use_text("Rationale", 13.0, Mm((MARGIN) as f32), Mm((cursor) as f32), &bold);
        cursor -= 7.0;
        for bullet in &fields.rationale {
            for (i, line) in wrap_text(bullet, 88).into_iter().enumerate() {
                let prefix = if i == 0 { "\u{2022} " } else { "  " };
                layer_ref.use_text(format!("{}{}", prefix, line), 10.0, Mm((MARGIN + 2.0) as f32), Mm((cursor) as f32), &font);
                cursor -= 5.5;
            }
        }
        cursor -= 6.0;
    }

    // Key-metrics table
    if !fields.key_metrics.is_empty() {
        layer_ref.use_text("Key Metrics", 13.0, Mm((MARGIN) as f32), Mm((cursor) as f32), &bold);
        cursor -= 7.0;
        for metric in &fields.key_metrics {
            if cursor < MARGIN + 10.0 {
                let (next_page, next_layer) = doc.add_page(Mm((PAGE_W) as f32), Mm((PAGE_H) as f32), "body");
                layer_ref = doc.get_page(next_page).get_layer(next_layer);
                cursor = PAGE_H - MARGIN;
            }
            layer_ref.use_text(metric, 10.0, Mm((MARGIN + 2.0) as f32), Mm((cursor) as f32), &font);
            cursor -= 5.5;
        }
    }

    // Supporting charts, one per page
    for table in tables {
        let Some(chart) = ChartData::from_table(table) else {
            continue;
        };
        let (chart_page, chart_layer) = doc.add_page(Mm((PAGE_W) as f32), Mm((PAGE_H) as f32), "chart");
        let chart_ref = doc.get_page(chart_page).get_layer(chart_layer);
        chart_ref.use_text(
            format!("Supporting data: {}", chart.title),
            13.0,
            Mm((MARGIN) as f32),
            Mm((PAGE_H - MARGIN) as f32),
            &bold,
        );
        chart.draw(&chart_ref, MARGIN, 80.0, PAGE_W - 2.0 * MARGIN, 130.0);
    }

    doc.save_to_bytes().map_err(|e| Error::Render(e.to_string()))
}

/// Greedy word wrap at a character width.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
