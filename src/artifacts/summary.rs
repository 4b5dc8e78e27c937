//! Text summaries of artifacts prepared for LLM consumption
//!
//! A summary is a truncated preview, never the full table. The preview row
//! limit is the dominant token-cost bound for the analysis stage.

use crate::artifacts::table::ArtifactTable;
use crate::catalog::Product;
use chrono::Utc;

/// Products whose recent rows matter more than their oldest ones
const PREVIEW_FROM_END: &[&str] = &["frequency_over_time", "seasonality_heatmap"];

/// A text rendering of an artifact for the analyzer prompt
#[derive(Debug, Clone)]
pub struct Summary {
    pub product_id: String,
    pub generated_at: String,
    pub rows_total: usize,
    pub preview_rows: usize,
    pub text: String,
}

impl Summary {
    /// Wrap a precomputed summary file's content.
    pub fn precomputed(product_id: &str, text: String) -> Self {
        Self {
            product_id: product_id.to_string(),
            generated_at: String::new(),
            rows_total: 0,
            preview_rows: 0,
            text,
        }
    }

    /// Render a summary from a loaded artifact.
    ///
    /// Layout matches the offline summary generator: a metadata header,
    /// shape and column lines, then a bounded row preview with an explicit
    /// "(of N total)" marker when truncated.
    pub fn generate(product: &Product, table: &ArtifactTable, preview_rows: usize) -> Self {
        let generated_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let (rows_total, col_count) = table.shape();

        let mut text = String::new();
        text.push_str(&format!("# Data Summary: {}\n", product.id));
        text.push_str(&format!("# Generated: {}\n", generated_at));
        text.push_str(&format!("# Description: {}\n", product.description));
        text.push_str(&format!("# Source File: {}\n", product.source_file));
        text.push_str(&format!(
            "# Filter: {}\n",
            product
                .filter
                .as_ref()
                .map(|f| format!("{} == '{}'", f.column, f.equals))
                .unwrap_or_else(|| "None".to_string())
        ));
        text.push_str(&format!("# Use Cases: {}\n", product.use_cases.join(", ")));
        text.push_str(&format!("# Metrics: {}\n", product.key_metrics.join(", ")));
        text.push_str(&"=".repeat(80));
        text.push_str("\n\n");

        text.push_str(&format!("Shape: {} rows \u{d7} {} columns\n", rows_total, col_count));
        text.push_str(&format!("Columns: {}\n", table.columns.join(", ")));
        text.push_str(&format!("Dtypes: {}\n\n", table.dtypes().join(", ")));

        if rows_total > preview_rows {
            let from_end = PREVIEW_FROM_END.contains(&product.id.as_str());
            if from_end {
                text.push_str(&format!(
                    "Last {} rows (of {} total, showing most recent):\n",
                    preview_rows, rows_total
                ));
                text.push_str(&table.render_rows(rows_total - preview_rows..rows_total));
            } else {
                text.push_str(&format!("First {} rows (of {} total):\n", preview_rows, rows_total));
                text.push_str(&table.render_rows(0..preview_rows));
            }
        } else {
            text.push_str(&table.render_rows(0..rows_total));
        }

        Self {
            product_id: product.id.clone(),
            generated_at,
            rows_total,
            preview_rows: preview_rows.min(rows_total),
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn table_with_rows(product_id: &str, n: usize) -> ArtifactTable {
        ArtifactTable {
            product_id: product_id.to_string(),
            columns: vec!["month".to_string(), "count".to_string()],
            rows: (0..n).map(|i| vec![format!("2024-{:02}", i + 1), i.to_string()]).collect(),
        }
    }

    #[test]
    fn test_summary_includes_header_and_shape() {
        let catalog = Catalog::builtin();
        let product = catalog.get("backlog_distribution").unwrap();
        let table = table_with_rows("backlog_distribution", 5);
        let summary = Summary::generate(product, &table, 50);

        assert!(summary.text.starts_with("# Data Summary: backlog_distribution"));
        assert!(summary.text.contains("Shape: 5 rows \u{d7} 2 columns"));
        assert!(summary.text.contains("Columns: month, count"));
        // Small table: no truncation marker
        assert!(!summary.text.contains("of 5 total"));
    }

    #[test]
    fn test_truncation_marker_when_over_budget() {
        let catalog = Catalog::builtin();
        let product = catalog.get("backlog_distribution").unwrap();
        let table = table_with_rows("backlog_distribution", 80);
        let summary = Summary::generate(product, &table, 50);

        assert!(summary.text.contains("First 50 rows (of 80 total):"));
        assert_eq!(summary.preview_rows, 50);
        assert_eq!(summary.rows_total, 80);
    }

    #[test]
    fn test_time_series_previews_from_end() {
        let catalog = Catalog::builtin();
        let product = catalog.get("frequency_over_time").unwrap();
        let table = table_with_rows("frequency_over_time", 60);
        let summary = Summary::generate(product, &table, 10);

        assert!(summary.text.contains("Last 10 rows (of 60 total, showing most recent):"));
        // Most recent row present, oldest absent
        assert!(summary.text.contains("59"));
        assert!(!summary.text.contains("2024-01"));
    }
}
