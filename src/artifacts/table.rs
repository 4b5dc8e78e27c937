//! Tabular artifact parsing
//!
//! Artifacts are machine-generated CSVs. Parsing happens once per product
//! per process; the resulting table is immutable.

use crate::catalog::RowFilter;
use crate::error::{Error, Result};

/// Concrete rows backing a product
#[derive(Debug, Clone)]
pub struct ArtifactTable {
    pub product_id: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ArtifactTable {
    /// Parse CSV text, applying the product's row filter if present.
    pub fn parse(product_id: &str, csv_text: &str, filter: Option<&RowFilter>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_text.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| Error::ArtifactUnavailable {
                product_id: product_id.to_string(),
                reason: format!("invalid CSV header: {}", e),
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if columns.is_empty() {
            return Err(Error::ArtifactUnavailable {
                product_id: product_id.to_string(),
                reason: "empty CSV header".to_string(),
            });
        }

        let filter_idx = match filter {
            Some(f) => Some(columns.iter().position(|c| c == &f.column).ok_or_else(|| {
                Error::ArtifactUnavailable {
                    product_id: product_id.to_string(),
                    reason: format!("filter column '{}' not present", f.column),
                }
            })?),
            None => None,
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::ArtifactUnavailable {
                product_id: product_id.to_string(),
                reason: format!("invalid CSV row: {}", e),
            })?;

            let row: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();

            if let (Some(idx), Some(f)) = (filter_idx, filter) {
                if row.get(idx).map(String::as_str) != Some(f.equals.as_str()) {
                    continue;
                }
            }

            rows.push(row);
        }

        Ok(Self {
            product_id: product_id.to_string(),
            columns,
            rows,
        })
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// Crude per-column type inference used in summary headers.
    pub fn dtypes(&self) -> Vec<&'static str> {
        (0..self.columns.len())
            .map(|col| {
                let mut saw_value = false;
                let mut all_int = true;
                let mut all_float = true;
                for row in &self.rows {
                    let Some(value) = row.get(col) else { continue };
                    if value.is_empty() {
                        continue;
                    }
                    saw_value = true;
                    if value.parse::<i64>().is_err() {
                        all_int = false;
                    }
                    if value.parse::<f64>().is_err() {
                        all_float = false;
                    }
                }
                if !saw_value {
                    "text"
                } else if all_int {
                    "int"
                } else if all_float {
                    "float"
                } else {
                    "text"
                }
            })
            .collect()
    }

    /// Values of one column parsed as floats, skipping non-numeric cells.
    pub fn numeric_column(&self, col: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(col))
            .filter_map(|v| v.parse::<f64>().ok())
            .collect()
    }

    /// Render a slice of rows as an aligned text block, header included.
    pub fn render_rows(&self, range: std::ops::Range<usize>) -> String {
        let rows = &self.rows[range.start.min(self.rows.len())..range.end.min(self.rows.len())];

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in rows {
            for (i, value) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(value.len());
                }
            }
        }

        let mut out = String::new();
        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:>width$}", c, width = widths[i]))
            .collect();
        out.push_str(&header.join("  "));
        out.push('\n');

        for row in rows {
            let line: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, v)| format!("{:>width$}", v, width = widths.get(i).copied().unwrap_or(0)))
                .collect();
            out.push_str(&line.join("  "));
            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOP10_CSV: &str = "\
ranking_type,category,volume,pct_of_total
Volume (Last 30 Days),Recreation and leisure,663,18.5
Volume (Last 30 Days),\"Roads, traffic and sidewalks\",562,15.7
Backlog Age,Trees,120,3.4
";

    #[test]
    fn test_parse_without_filter() {
        let table = ArtifactTable::parse("top10", TOP10_CSV, None).unwrap();
        assert_eq!(table.columns.len(), 4);
        assert_eq!(table.rows.len(), 3);
    }

    #[test]
    fn test_parse_applies_row_filter() {
        let filter = RowFilter {
            column: "ranking_type".to_string(),
            equals: "Volume (Last 30 Days)".to_string(),
        };
        let table = ArtifactTable::parse("top10_volume_30d", TOP10_CSV, Some(&filter)).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows.iter().all(|r| r[0] == "Volume (Last 30 Days)"));
    }

    #[test]
    fn test_missing_filter_column_is_unavailable() {
        let filter = RowFilter {
            column: "no_such_column".to_string(),
            equals: "x".to_string(),
        };
        let err = ArtifactTable::parse("top10", TOP10_CSV, Some(&filter)).unwrap_err();
        assert_eq!(err.kind(), "ArtifactUnavailable");
        assert!(err.to_string().contains("top10"));
    }

    #[test]
    fn test_dtypes_inference() {
        let table = ArtifactTable::parse("top10", TOP10_CSV, None).unwrap();
        assert_eq!(table.dtypes(), vec!["text", "text", "int", "float"]);
    }

    #[test]
    fn test_render_rows_aligns_columns() {
        let table = ArtifactTable::parse("top10", TOP10_CSV, None).unwrap();
        let rendered = table.render_rows(0..2);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("ranking_type"));
        assert!(lines[1].contains("663"));
    }

    #[test]
    fn test_numeric_column() {
        let table = ArtifactTable::parse("top10", TOP10_CSV, None).unwrap();
        let volumes = table.numeric_column(2);
        assert_eq!(volumes, vec![663.0, 562.0, 120.0]);
    }
}
