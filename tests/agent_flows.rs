//! End-to-end session flows against mock model backends
//!
//! Exercises the streamed event protocol: ordering, mode selection,
//! navigation, and terminal error semantics.

use async_trait::async_trait;
use insight_agent::agent::{Agent, EventKind, Mode, StreamEvent};
use insight_agent::artifacts::ArtifactStore;
use insight_agent::catalog::Catalog;
use insight_agent::cluster::{Centroid, ClusterPredictor, Embedder, EmbeddingIndex};
use insight_agent::error::Result;
use insight_agent::llm::LanguageModel;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const TOP10_CSV: &str = "\
ranking_type,category,volume,pct_of_total
Volume (Last 30 Days),Recreation and leisure,663,18.5
Volume (Last 30 Days),\"Roads, traffic and sidewalks\",562,15.7
Backlog Age,Trees,120,3.4
";

const FREQUENCY_CSV: &str = "\
month,category,count
2024-01,Recreation,100
2024-02,Recreation,120
2024-03,Recreation,140
";

const PLAN_REPLY: &str =
    r#"[{"product": "top10_volume_30d", "why": "Identify highest current demand"}]"#;

const ANALYSIS_REPLY: &str = r#"{
    "answer": "Recreation leads with 663 requests (18.5%).",
    "rationale": ["Recreation 663 (18.5%)", "Roads 562 (15.7%)"],
    "key_metrics": ["663", "18.5%"]
}"#;

/// Scripted model: dispatches on prompt markers the real prompts carry.
struct MockLlm {
    plan_reply: String,
    analysis_reply: String,
    chat_reply: String,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self {
            plan_reply: PLAN_REPLY.to_string(),
            analysis_reply: ANALYSIS_REPLY.to_string(),
            chat_reply: "Happy to help with municipal service requests.".to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        if prompt.contains("planning how to answer") {
            Ok(self.plan_reply.clone())
        } else if prompt.contains("providing insights") {
            Ok(self.analysis_reply.clone())
        } else if prompt.contains("search phrase") {
            Ok("parks recreation requests".to_string())
        } else {
            Ok(self.chat_reply.clone())
        }
    }
}

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    fn dims(&self) -> usize {
        2
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

/// Build an agent over a temp artifact directory.
fn build_agent(llm: MockLlm, files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<Agent>) {
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
    let llm: Arc<dyn LanguageModel> = Arc::new(llm);
    let predictor =
        Arc::new(ClusterPredictor::new(llm.clone(), Arc::new(FixedEmbedder), test_index()).unwrap());

    let agent = Arc::new(Agent::new(catalog, store, llm, predictor, 24_000, 16));
    (dir, agent)
}

async fn collect(agent: &Arc<Agent>, question: &str, mode: Mode) -> Vec<StreamEvent> {
    let mut rx = agent.run(question.to_string(), mode);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn kinds(events: &[StreamEvent]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

#[tokio::test]
async fn deep_analysis_emits_the_contract_order() {
    let (_dir, agent) = build_agent(
        MockLlm::default(),
        &[("top10.csv", TOP10_CSV), ("frequency_over_time.csv", FREQUENCY_CSV)],
    );

    let events = collect(&agent, "What are the top service categories?", Mode::DeepAnalysis).await;

    assert_eq!(
        kinds(&events),
        vec![
            EventKind::User,
            EventKind::Thought,
            EventKind::Plan,
            EventKind::Thought,
            EventKind::Navigation,
            EventKind::Thought,
            EventKind::Answer,
            EventKind::Complete,
        ]
    );

    assert_eq!(events[0].content, "What are the top service categories?");
    assert_eq!(events[1].content, "Planning");
    assert_eq!(events[3].content, "Loading top10_volume_30d");
    assert_eq!(
        events[4].data.as_ref().unwrap()["url"],
        "/dashboard/analytics/frequency"
    );
    assert_eq!(events[5].content, "Analyzing");
    assert_eq!(
        events[6].data.as_ref().unwrap()["answer"],
        "Recreation leads with 663 requests (18.5%)."
    );
}

#[tokio::test]
async fn deep_analysis_with_domain_tokens_appends_cluster_prediction() {
    let (_dir, agent) = build_agent(
        MockLlm::default(),
        &[("top10.csv", TOP10_CSV), ("frequency_over_time.csv", FREQUENCY_CSV)],
    );

    let events = collect(&agent, "Which park requests dominate?", Mode::DeepAnalysis).await;
    let sequence = kinds(&events);

    let answer_pos = sequence.iter().position(|k| *k == EventKind::Answer).unwrap();
    let cp_pos = sequence
        .iter()
        .position(|k| *k == EventKind::ClusterPrediction)
        .expect("cluster prediction emitted");
    assert!(cp_pos > answer_pos);
    assert_eq!(*sequence.last().unwrap(), EventKind::Complete);

    let data = events[cp_pos].data.as_ref().unwrap();
    assert_eq!(data["parent_cluster_id"], 1);
    assert_eq!(data["child_cluster_id"], 10);
}

#[tokio::test]
async fn navigation_emitted_at_most_once() {
    let (_dir, agent) = build_agent(
        MockLlm {
            plan_reply: r#"[
                {"product": "top10_volume_30d", "why": "a"},
                {"product": "frequency_over_time", "why": "b"}
            ]"#
            .to_string(),
            ..MockLlm::default()
        },
        &[("top10.csv", TOP10_CSV), ("frequency_over_time.csv", FREQUENCY_CSV)],
    );

    let events = collect(&agent, "What are the top service categories?", Mode::DeepAnalysis).await;
    let navigation_count = events.iter().filter(|e| e.kind == EventKind::Navigation).count();
    assert_eq!(navigation_count, 1);

    // Navigation precedes the answer
    let nav_pos = events.iter().position(|e| e.kind == EventKind::Navigation).unwrap();
    let answer_pos = events.iter().position(|e| e.kind == EventKind::Answer).unwrap();
    assert!(nav_pos < answer_pos);
}

#[tokio::test]
async fn chat_mode_is_user_chat_complete() {
    let (_dir, agent) = build_agent(MockLlm::default(), &[]);

    let events = collect(&agent, "Hello", Mode::Chat).await;

    assert_eq!(
        kinds(&events),
        vec![EventKind::User, EventKind::Chat, EventKind::Complete]
    );
    assert_eq!(events[1].content, "Happy to help with municipal service requests.");
}

#[tokio::test]
async fn chat_with_domain_token_prepends_cluster_prediction() {
    let (_dir, agent) = build_agent(MockLlm::default(), &[]);

    let events = collect(&agent, "Tell me about the park cluster", Mode::Chat).await;
    let sequence = kinds(&events);

    let cp_pos = sequence
        .iter()
        .position(|k| *k == EventKind::ClusterPrediction)
        .expect("cluster prediction emitted");
    let chat_pos = sequence.iter().position(|k| *k == EventKind::Chat).unwrap();
    assert!(cp_pos < chat_pos);
}

#[tokio::test]
async fn chat_with_research_token_emits_glow() {
    let (_dir, agent) = build_agent(MockLlm::default(), &[]);

    let events = collect(&agent, "Please research this for me", Mode::Chat).await;
    assert!(events.iter().any(|e| e.kind == EventKind::GlowOn));
    // Glow is a hint only: the reply still arrives and the stream completes
    assert_eq!(*kinds(&events).last().unwrap(), EventKind::Complete);
}

#[tokio::test]
async fn auto_mode_with_analysis_keyword_asks_for_confirmation() {
    let (_dir, agent) = build_agent(MockLlm::default(), &[]);

    let events = collect(&agent, "Give me an analysis", Mode::Auto).await;

    assert_eq!(kinds(&events), vec![EventKind::User, EventKind::Confirmation]);
    assert_eq!(events[1].content, "Deep analysis?");
}

#[tokio::test]
async fn auto_mode_without_keyword_falls_back_to_chat() {
    let (_dir, agent) = build_agent(MockLlm::default(), &[]);

    let events = collect(&agent, "Hello there", Mode::Auto).await;
    assert_eq!(
        kinds(&events),
        vec![EventKind::User, EventKind::Chat, EventKind::Complete]
    );
}

#[tokio::test]
async fn confirmed_resubmission_proceeds_as_deep_analysis() {
    let (_dir, agent) = build_agent(
        MockLlm::default(),
        &[("top10.csv", TOP10_CSV), ("frequency_over_time.csv", FREQUENCY_CSV)],
    );

    // First pass: auto mode stops at confirmation
    let first = collect(&agent, "Give me an analysis", Mode::Auto).await;
    assert_eq!(*kinds(&first).last().unwrap(), EventKind::Confirmation);

    // The client re-posts the same message with an explicit mode
    let second = collect(&agent, "Give me an analysis", Mode::DeepAnalysis).await;
    assert!(second.iter().any(|e| e.kind == EventKind::Answer));
    assert_eq!(*kinds(&second).last().unwrap(), EventKind::Complete);
}

#[tokio::test]
async fn missing_artifact_is_a_terminal_error() {
    // No top10.csv on disk
    let (_dir, agent) = build_agent(
        MockLlm::default(),
        &[("frequency_over_time.csv", FREQUENCY_CSV)],
    );

    let events = collect(&agent, "What are the top service categories?", Mode::DeepAnalysis).await;

    assert_eq!(
        kinds(&events),
        vec![
            EventKind::User,
            EventKind::Thought,
            EventKind::Plan,
            EventKind::Thought,
            EventKind::Error,
        ]
    );

    let error = events.last().unwrap();
    let data = error.data.as_ref().unwrap();
    assert_eq!(data["kind"], "ArtifactUnavailable");
    assert!(data["message"].as_str().unwrap().contains("top10_volume_30d"));
    // Terminal: no answer, no complete
    assert!(!events.iter().any(|e| e.kind == EventKind::Answer));
    assert!(!events.iter().any(|e| e.kind == EventKind::Complete));
}

#[tokio::test]
async fn empty_plan_fails_without_answer() {
    let (_dir, agent) = build_agent(
        MockLlm {
            plan_reply: "[]".to_string(),
            ..MockLlm::default()
        },
        &[("frequency_over_time.csv", FREQUENCY_CSV)],
    );

    let events = collect(&agent, "anything", Mode::DeepAnalysis).await;

    let error = events.last().unwrap();
    assert_eq!(error.kind, EventKind::Error);
    assert_eq!(error.data.as_ref().unwrap()["kind"], "PlanningFailed");
    assert!(!events.iter().any(|e| e.kind == EventKind::Answer));
}

#[tokio::test]
async fn planner_picking_unknown_products_only_fails() {
    let (_dir, agent) = build_agent(
        MockLlm {
            plan_reply: r#"[{"product": "made_up", "why": "?"}]"#.to_string(),
            ..MockLlm::default()
        },
        &[("frequency_over_time.csv", FREQUENCY_CSV)],
    );

    let events = collect(&agent, "anything", Mode::DeepAnalysis).await;
    assert_eq!(
        events.last().unwrap().data.as_ref().unwrap()["kind"],
        "PlanningFailed"
    );
}

#[tokio::test]
async fn dropped_receiver_stops_the_session_quietly() {
    let (_dir, agent) = build_agent(
        MockLlm::default(),
        &[("top10.csv", TOP10_CSV), ("frequency_over_time.csv", FREQUENCY_CSV)],
    );

    let rx = agent.run("What are the top service categories?".to_string(), Mode::DeepAnalysis);
    drop(rx);

    // The session observes the closed channel at its next emit and stops;
    // nothing to assert beyond the absence of a panic.
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn events_serialize_to_single_line_json() {
    let (_dir, agent) = build_agent(MockLlm::default(), &[]);

    let events = collect(&agent, "Hello", Mode::Chat).await;
    for event in events {
        let line = serde_json::to_string(&event).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert!(value.get("type").is_some());
        assert!(value.get("content").is_some());
    }
}
