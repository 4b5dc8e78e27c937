//! Analytics-visit and report-generation flows against mock backends

use async_trait::async_trait;
use insight_agent::artifacts::ArtifactStore;
use insight_agent::catalog::Catalog;
use insight_agent::cluster::{Centroid, EmbeddingIndex};
use insight_agent::error::Result;
use insight_agent::llm::LanguageModel;
use insight_agent::report::ReportService;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const BACKLOG_CSV: &str = "\
category,open_count,percentage
Recreation and leisure,40,32.0
Roads,25,20.0
Trees,12,9.6
";

const FREQUENCY_CSV: &str = "\
month,category,count
2024-01,Recreation,100
2024-02,Recreation,120
";

struct MockLlm {
    pick_reply: String,
    fields_reply: String,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self {
            pick_reply: r#"[{"product": "backlog_distribution", "why": "open items"}]"#.to_string(),
            fields_reply: r#"{
                "answer": "Recreation carries the largest open backlog.",
                "rationale": ["Recreation 40 open (32%)", "Roads 25 open (20%)"],
                "key_metrics": ["40 open requests in Recreation and leisure", "32% in Recreation and leisure"]
            }"#
            .to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        if prompt.contains("SINGLE most relevant data product") {
            Ok(self.pick_reply.clone())
        } else if prompt.contains("PDF report") {
            Ok(self.fields_reply.clone())
        } else {
            Ok("This backlog view relates to the Parks cluster you were viewing.".to_string())
        }
    }
}

fn test_index() -> Arc<EmbeddingIndex> {
    Arc::new(
        EmbeddingIndex::new(
            vec![Centroid {
                cluster_id: 1,
                parent_cluster_id: None,
                label: "Parks".to_string(),
                vector: vec![1.0, 0.0],
            }],
            vec![Centroid {
                cluster_id: 10,
                parent_cluster_id: Some(1),
                label: "Playgrounds".to_string(),
                vector: vec![0.9, 0.1],
            }],
        )
        .unwrap(),
    )
}

fn build_service(llm: MockLlm, files: &[(&str, &str)]) -> (tempfile::TempDir, ReportService) {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    let catalog = Arc::new(Catalog::builtin());
    let store = Arc::new(ArtifactStore::new(
        catalog.clone(),
        dir.path(),
        50,
        Duration::from_secs(5),
    ));
    let service = ReportService::new(catalog, store, Arc::new(llm), test_index());
    (dir, service)
}

#[tokio::test]
async fn analytics_visit_returns_picked_route_and_discussion() {
    let (_dir, service) = build_service(
        MockLlm::default(),
        &[
            ("backlog_distribution.csv", BACKLOG_CSV),
            ("frequency_over_time.csv", FREQUENCY_CSV),
        ],
    );

    let visit = service.analytics_visit(1, 10).await.unwrap();
    assert_eq!(visit.url, "/dashboard/analytics/backlog");
    assert!(visit.discussion.contains("Parks"));
}

#[tokio::test]
async fn analytics_visit_defaults_when_pick_is_invalid() {
    let (_dir, service) = build_service(
        MockLlm {
            pick_reply: r#"[{"product": "not_a_product", "why": "?"}]"#.to_string(),
            ..MockLlm::default()
        },
        &[("frequency_over_time.csv", FREQUENCY_CSV)],
    );

    let visit = service.analytics_visit(1, 10).await.unwrap();
    assert_eq!(visit.url, "/dashboard/analytics/frequency");
}

#[tokio::test]
async fn analytics_visit_uses_cluster_ids_when_labels_missing() {
    let (_dir, service) = build_service(
        MockLlm::default(),
        &[
            ("backlog_distribution.csv", BACKLOG_CSV),
            ("frequency_over_time.csv", FREQUENCY_CSV),
        ],
    );

    // Unknown ids still resolve; labels degrade to numeric placeholders
    let visit = service.analytics_visit(99, 77).await.unwrap();
    assert!(!visit.url.is_empty());
    assert!(!visit.discussion.is_empty());
}

#[tokio::test]
async fn report_is_a_pdf_with_content() {
    let (_dir, service) = build_service(
        MockLlm::default(),
        &[
            ("backlog_distribution.csv", BACKLOG_CSV),
            ("frequency_over_time.csv", FREQUENCY_CSV),
        ],
    );

    let pdf = service
        .generate_report(1, 10, "Recreation carries the largest open backlog.")
        .await
        .unwrap();

    assert!(pdf.starts_with(b"%PDF"));
    assert!(pdf.len() > 1000);
}

#[tokio::test]
async fn report_survives_missing_artifacts() {
    // No CSVs on disk at all: charts are skipped, the report still renders
    let (_dir, service) = build_service(MockLlm::default(), &[]);

    let pdf = service.generate_report(1, 10, "Some discussion.").await.unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}
