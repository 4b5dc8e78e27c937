//! Data-product catalog
//!
//! Describes every pre-computed analytic artifact the agent may consult:
//! what it contains, when to use it, which CSV backs it, and which
//! dashboard page (if any) visualizes it. Registered once at startup and
//! immutable afterwards.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Row selector applied when several products share one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowFilter {
    /// Column the filter matches against
    pub column: String,
    /// Exact value a row must carry to be included
    pub equals: String,
}

/// A registered data product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Stable identifier, case-sensitive
    pub id: String,
    /// One-line description shown to the planner
    pub description: String,
    /// Short phrases describing when this product helps
    pub use_cases: Vec<String>,
    /// Metrics the product carries
    pub key_metrics: Vec<String>,
    /// CSV file under the artifact directory
    pub source_file: String,
    /// Optional row selector
    pub filter: Option<RowFilter>,
    /// Dashboard route the UI should open for this product
    pub route_hint: Option<String>,
}

/// In-memory product registry with a pre-rendered planner description
pub struct Catalog {
    products: Vec<Product>,
    planner_description: String,
}

impl Catalog {
    /// Build a catalog from a product list.
    ///
    /// Duplicate ids are a startup configuration error.
    pub fn new(products: Vec<Product>) -> Result<Self> {
        for (i, product) in products.iter().enumerate() {
            if products[..i].iter().any(|p| p.id == product.id) {
                return Err(Error::Config(format!(
                    "duplicate product id in catalog: {}",
                    product.id
                )));
            }
        }

        let planner_description = render_planner_description(&products);

        Ok(Self {
            products,
            planner_description,
        })
    }

    /// The built-in product set backing the CRM dashboard.
    pub fn builtin() -> Self {
        // The id set is fixed; duplicates here would be a programming error.
        Self::new(builtin_products()).expect("builtin catalog has duplicate ids")
    }

    /// Look up a product by id. Case-sensitive.
    pub fn get(&self, id: &str) -> Result<&Product> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::UnknownProduct(id.to_string()))
    }

    /// True when the id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.products.iter().any(|p| p.id == id)
    }

    /// Products in registration order
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Products that have a dashboard page
    pub fn dashboard_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.route_hint.is_some())
    }

    /// Deterministic catalog rendering for the planner prompt.
    ///
    /// Built once at construction; byte-identical across calls.
    pub fn describe_for_planner(&self) -> &str {
        &self.planner_description
    }
}

fn render_planner_description(products: &[Product]) -> String {
    let mut out = String::from("## Available Data Products\n\n");
    for product in products {
        out.push_str(&format!("**{}**\n", product.id));
        out.push_str(&format!("- Description: {}\n", product.description));
        out.push_str(&format!("- Use Cases: {}\n", product.use_cases.join(", ")));
        out.push_str(&format!("- Key Metrics: {}\n\n", product.key_metrics.join(", ")));
    }
    out
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn ranking_filter(value: &str) -> Option<RowFilter> {
    Some(RowFilter {
        column: "ranking_type".to_string(),
        equals: value.to_string(),
    })
}

fn builtin_products() -> Vec<Product> {
    vec![
        Product {
            id: "top10_volume_30d".to_string(),
            description: "Top 10 service categories by volume in the last 30 days".to_string(),
            use_cases: strings(&["identify highest demand", "prioritize resources", "current trends"]),
            key_metrics: strings(&["volume", "percentage of total"]),
            source_file: "top10.csv".to_string(),
            filter: ranking_filter("Volume (Last 30 Days)"),
            route_hint: Some("/dashboard/analytics/frequency".to_string()),
        },
        Product {
            id: "top10_worst_p90_time".to_string(),
            description: "Top 10 categories with worst P90 time-to-close performance".to_string(),
            use_cases: strings(&["identify bottlenecks", "SLA violations", "performance issues"]),
            key_metrics: strings(&["p90_days", "median_days", "request_count"]),
            source_file: "top10.csv".to_string(),
            filter: ranking_filter("Worst P90 Time-to-Close"),
            route_hint: None,
        },
        Product {
            id: "top10_backlog_age".to_string(),
            description: "Top 10 categories with oldest backlog (by P90 age)".to_string(),
            use_cases: strings(&["identify aging backlogs", "urgent old items", "overdue requests"]),
            key_metrics: strings(&["p90_age_days", "avg_age_days", "open_count"]),
            source_file: "top10.csv".to_string(),
            filter: ranking_filter("Backlog Age"),
            route_hint: None,
        },
        Product {
            id: "top10_trending_up".to_string(),
            description: "Top 10 categories trending upward in volume".to_string(),
            use_cases: strings(&["emerging issues", "growing demand", "proactive planning"]),
            key_metrics: strings(&["absolute_change", "growth_rate", "recent_volume"]),
            source_file: "top10.csv".to_string(),
            filter: ranking_filter("Trending Up"),
            route_hint: None,
        },
        Product {
            id: "top10_geographic_hotspots".to_string(),
            description: "Top 10 geographic areas by service request volume".to_string(),
            use_cases: strings(&["area-specific issues", "resource deployment", "geographic priorities"]),
            key_metrics: strings(&["volume", "pct_of_total", "top_category"]),
            source_file: "top10.csv".to_string(),
            filter: ranking_filter("Geographic Hotspots"),
            route_hint: None,
        },
        Product {
            id: "frequency_over_time".to_string(),
            description: "Monthly time series of service request volume by category from 2019-present"
                .to_string(),
            use_cases: strings(&["identify trends", "seasonal patterns", "growth analysis", "forecasting"]),
            key_metrics: strings(&["monthly counts per category"]),
            source_file: "frequency_over_time.csv".to_string(),
            filter: None,
            route_hint: Some("/dashboard/analytics/frequency".to_string()),
        },
        Product {
            id: "backlog_ranked_list".to_string(),
            description: "Unresolved service requests ranked by count and average age".to_string(),
            use_cases: strings(&["identify aging issues", "urgent unresolved items", "backlog management"]),
            key_metrics: strings(&["unresolved_count", "avg_age_days"]),
            source_file: "backlog_ranked_list.csv".to_string(),
            filter: None,
            route_hint: Some("/dashboard/analytics/backlog".to_string()),
        },
        Product {
            id: "backlog_distribution".to_string(),
            description: "Distribution of open backlogs across service categories".to_string(),
            use_cases: strings(&["backlog overview", "resource allocation", "workload distribution"]),
            key_metrics: strings(&["open_count", "percentage"]),
            source_file: "backlog_distribution.csv".to_string(),
            filter: None,
            route_hint: Some("/dashboard/analytics/backlog".to_string()),
        },
        Product {
            id: "time_to_close".to_string(),
            description: "Time-to-close statistics by category with distribution bins".to_string(),
            use_cases: strings(&["performance analysis", "SLA tracking", "efficiency metrics"]),
            key_metrics: strings(&["median", "p75", "p90", "mean", "min", "max"]),
            source_file: "time_to_close.csv".to_string(),
            filter: None,
            route_hint: Some("/dashboard/analytics/population".to_string()),
        },
        Product {
            id: "geographic_hot_spots".to_string(),
            description: "Geographic clustering of service requests by ward/area".to_string(),
            use_cases: strings(&["spatial analysis", "resource deployment", "area-specific issues"]),
            key_metrics: strings(&["request_count", "geographic coordinates"]),
            source_file: "geographic_hot_spots.csv".to_string(),
            filter: None,
            route_hint: Some("/dashboard/analytics/geographic".to_string()),
        },
        Product {
            id: "seasonality_heatmap".to_string(),
            description: "Day-of-week and month patterns for service requests".to_string(),
            use_cases: strings(&["seasonal patterns", "staffing planning", "cyclical trends"]),
            key_metrics: strings(&["request counts by time periods"]),
            source_file: "seasonality_heatmap.csv".to_string(),
            filter: None,
            route_hint: None,
        },
        Product {
            id: "fcr_by_category".to_string(),
            description: "First Call Resolution rates by service category".to_string(),
            use_cases: strings(&["quality metrics", "efficiency analysis", "customer satisfaction"]),
            key_metrics: strings(&["FCR rate", "resolution metrics"]),
            source_file: "fcr_by_category.csv".to_string(),
            filter: None,
            route_hint: None,
        },
        Product {
            id: "priority_quadrant".to_string(),
            description: "Priority matrix combining volume and time-to-close (P90)".to_string(),
            use_cases: strings(&["prioritization", "strategic planning", "resource optimization"]),
            key_metrics: strings(&["volume", "p90_days", "quadrant assignment"]),
            source_file: "priority_quadrant_data_p90.csv".to_string(),
            filter: None,
            route_hint: Some("/dashboard/analytics/priority-quadrant".to_string()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_resolves_known_products() {
        let catalog = Catalog::builtin();
        assert!(catalog.get("top10_volume_30d").is_ok());
        assert!(catalog.get("frequency_over_time").is_ok());
        assert!(catalog.get("priority_quadrant").is_ok());
    }

    #[test]
    fn test_unknown_product_is_an_error() {
        let catalog = Catalog::builtin();
        let err = catalog.get("nonexistent").unwrap_err();
        assert_eq!(err.kind(), "UnknownProduct");
    }

    #[test]
    fn test_ids_are_case_sensitive() {
        let catalog = Catalog::builtin();
        assert!(catalog.get("TOP10_VOLUME_30D").is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let product = Product {
            id: "dup".to_string(),
            description: String::new(),
            use_cases: vec![],
            key_metrics: vec![],
            source_file: "dup.csv".to_string(),
            filter: None,
            route_hint: None,
        };
        let result = Catalog::new(vec![product.clone(), product]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_planner_description_is_deterministic() {
        let a = Catalog::builtin();
        let b = Catalog::builtin();
        assert_eq!(a.describe_for_planner(), b.describe_for_planner());
        // Same catalog, same pointer-stable rendering
        assert_eq!(a.describe_for_planner(), a.describe_for_planner());
    }

    #[test]
    fn test_planner_description_lists_every_product() {
        let catalog = Catalog::builtin();
        let description = catalog.describe_for_planner();
        for product in catalog.products() {
            assert!(description.contains(&product.id));
        }
    }

    #[test]
    fn test_route_hints_are_known_dashboard_pages() {
        let catalog = Catalog::builtin();
        let known = [
            "/dashboard/analytics/frequency",
            "/dashboard/analytics/backlog",
            "/dashboard/analytics/priority-quadrant",
            "/dashboard/analytics/geographic",
            "/dashboard/analytics/population",
        ];
        for product in catalog.dashboard_products() {
            let hint = product.route_hint.as_deref().unwrap();
            assert!(known.contains(&hint), "unexpected route hint {}", hint);
        }
    }
}
