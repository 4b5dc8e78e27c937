//! Session orchestration and the streamed event protocol
//!
//! One session = one request. The orchestrator runs as a cooperative task
//! writing typed events into a bounded channel; the transport drains the
//! channel into SSE frames. A dropped receiver (client disconnect) makes
//! the next send fail, which stops the session at its next step, with no
//! event after that and no `complete`.

use crate::agent::analyzer::{AnalysisResult, Analyzer};
use crate::agent::planner::{Plan, Planner};
use crate::agent::AccessRecord;
use crate::artifacts::{ArtifactStore, Summary};
use crate::catalog::Catalog;
use crate::cluster::{ClusterPredictor, ClusterPrediction};
use crate::error::Error;
use crate::llm::{prompts, LanguageModel};
use crate::metrics::METRICS;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Chat tokens that trigger a cluster prediction before the reply
const DOMAIN_TOKENS: &[&str] = &[
    "cluster", "category", "request", "complaint", "booking", "backlog", "road", "park",
    "garbage", "recycling", "sidewalk",
];

/// Chat tokens that suggest the deep-research UI mode
const GLOW_TOKENS: &[&str] = &["research", "investigate", "deep dive"];

/// Characters of the sample-context preview handed to the planner
const SAMPLE_PREVIEW_CHARS: usize = 1_500;

/// How a question should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Auto,
    Chat,
    DeepAnalysis,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Auto
    }
}

/// Event types streamed to the client, in the order the UI consumes them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    User,
    Thought,
    Plan,
    Navigation,
    Answer,
    Chat,
    Confirmation,
    ClusterPrediction,
    GlowOn,
    Complete,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Thought => "thought",
            Self::Plan => "plan",
            Self::Navigation => "navigation",
            Self::Answer => "answer",
            Self::Chat => "chat",
            Self::Confirmation => "confirmation",
            Self::ClusterPrediction => "cluster_prediction",
            Self::GlowOn => "glow_on",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// One frame of the session stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl StreamEvent {
    fn new(kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            data: None,
        }
    }

    fn with_data(kind: EventKind, content: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind,
            content: content.into(),
            data: Some(data),
        }
    }

    pub fn user(question: &str) -> Self {
        Self::new(EventKind::User, question)
    }

    pub fn thought(content: impl Into<String>) -> Self {
        Self::new(EventKind::Thought, content)
    }

    pub fn plan(plan: &Plan) -> Self {
        Self::with_data(
            EventKind::Plan,
            "Selected data products",
            json!({ "plan": plan.entries }),
        )
    }

    pub fn navigation(url: &str) -> Self {
        Self::with_data(
            EventKind::Navigation,
            format!("Navigating to {}", url),
            json!({ "url": url }),
        )
    }

    pub fn answer(analysis: &AnalysisResult) -> Self {
        Self::with_data(
            EventKind::Answer,
            analysis.answer.clone(),
            json!({
                "answer": analysis.answer,
                "rationale": analysis.rationale,
                "key_metrics": analysis.key_metrics,
            }),
        )
    }

    pub fn chat(reply: &str) -> Self {
        Self::new(EventKind::Chat, reply)
    }

    pub fn confirmation() -> Self {
        Self::new(EventKind::Confirmation, "Deep analysis?")
    }

    pub fn cluster_prediction(prediction: &ClusterPrediction) -> Self {
        Self::with_data(
            EventKind::ClusterPrediction,
            "Cluster prediction ready",
            json!({
                "parent_cluster_id": prediction.parent_cluster_id,
                "child_cluster_id": prediction.child_cluster_id,
                "confidence": prediction.confidence,
            }),
        )
    }

    pub fn glow_on() -> Self {
        Self::new(EventKind::GlowOn, "Deep research mode suggested")
    }

    pub fn complete() -> Self {
        Self::new(EventKind::Complete, "Done")
    }

    pub fn error(err: &Error) -> Self {
        Self::with_data(
            EventKind::Error,
            err.to_string(),
            json!({ "kind": err.kind(), "message": err.to_string() }),
        )
    }
}

/// The receiver side of a session's event channel
pub type EventReceiver = mpsc::Receiver<StreamEvent>;

/// Session ended before its natural terminal event
struct Cancelled;

/// Bounded event channel with disconnect detection.
///
/// A slow client fills the buffer and blocks the orchestrator on `send`,
/// which throttles upstream LLM work. A dropped receiver turns the next
/// send into cancellation.
struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    async fn emit(&self, event: StreamEvent) -> Result<(), Cancelled> {
        METRICS
            .events_emitted
            .with_label_values(&[event.kind.as_str()])
            .inc();
        self.tx.send(event).await.map_err(|_| Cancelled)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Terminal state of a session, for metrics
enum Outcome {
    Completed,
    Failed,
    AwaitingConfirmation,
}

/// Process-wide reasoning engine shared across sessions.
///
/// All fields are read-mostly; per-request state lives in the task spawned
/// by [`Agent::run`].
pub struct Agent {
    catalog: Arc<Catalog>,
    store: Arc<ArtifactStore>,
    llm: Arc<dyn LanguageModel>,
    predictor: Arc<ClusterPredictor>,
    planner: Planner,
    analyzer: Analyzer,
    event_buffer: usize,
}

impl Agent {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<ArtifactStore>,
        llm: Arc<dyn LanguageModel>,
        predictor: Arc<ClusterPredictor>,
        analyzer_budget_chars: usize,
        event_buffer: usize,
    ) -> Self {
        let planner = Planner::new(llm.clone());
        let analyzer = Analyzer::new(llm.clone(), analyzer_budget_chars);
        Self {
            catalog,
            store,
            llm,
            predictor,
            planner,
            analyzer,
            event_buffer,
        }
    }

    /// Start a session. Events arrive on the returned channel; the channel
    /// closing is the end of the stream.
    pub fn run(self: &Arc<Self>, question: String, mode: Mode) -> EventReceiver {
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let agent = self.clone();
        let session_id = Uuid::new_v4();

        tokio::spawn(async move {
            let start = Instant::now();
            let sink = EventSink { tx };
            info!(%session_id, ?mode, "session started");

            let resolved = match mode {
                Mode::Auto if contains_word(&question, "analysis") => {
                    let outcome = agent.run_confirmation(&sink, &question).await;
                    agent.finish(session_id, mode_label(mode), outcome, start);
                    return;
                }
                Mode::Auto | Mode::Chat => Mode::Chat,
                Mode::DeepAnalysis => Mode::DeepAnalysis,
            };

            let outcome = match resolved {
                Mode::DeepAnalysis => agent.run_deep(&sink, &question).await,
                _ => agent.run_chat(&sink, &question).await,
            };
            agent.finish(session_id, mode_label(resolved), outcome, start);
        });

        rx
    }

    /// Predict the cluster pair for a message (non-streaming endpoint).
    pub async fn predict_cluster(&self, message: &str) -> crate::error::Result<ClusterPrediction> {
        self.predictor.predict(message).await
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn llm(&self) -> &Arc<dyn LanguageModel> {
        &self.llm
    }

    pub fn predictor(&self) -> &Arc<ClusterPredictor> {
        &self.predictor
    }

    fn finish(&self, session_id: Uuid, mode: &'static str, outcome: Result<Outcome, Cancelled>, start: Instant) {
        let status = match outcome {
            Ok(Outcome::Completed) => "success",
            Ok(Outcome::Failed) => "error",
            Ok(Outcome::AwaitingConfirmation) => "confirmation",
            Err(Cancelled) => "cancelled",
        };
        METRICS.chat_sessions.with_label_values(&[mode, status]).inc();
        METRICS.session_duration.observe(start.elapsed().as_secs_f64());
        info!(
            %session_id,
            mode,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "session finished"
        );
    }

    /// Auto mode saw the analysis keyword: ask the client to confirm and
    /// stop. The client re-posts the question with an explicit mode; no
    /// state is kept server-side.
    async fn run_confirmation(&self, sink: &EventSink, question: &str) -> Result<Outcome, Cancelled> {
        sink.emit(StreamEvent::user(question)).await?;
        sink.emit(StreamEvent::confirmation()).await?;
        Ok(Outcome::AwaitingConfirmation)
    }

    /// Full planning → loading → analysis pipeline.
    ///
    /// The event order is part of the wire contract; `navigation` fires at
    /// most once and always before `answer` so the chart view is on screen
    /// when the answer lands.
    async fn run_deep(&self, sink: &EventSink, question: &str) -> Result<Outcome, Cancelled> {
        sink.emit(StreamEvent::user(question)).await?;
        sink.emit(StreamEvent::thought("Planning")).await?;

        let sample = self.sample_preview().await;
        let plan = match self.planner.plan(question, &self.catalog, &sample).await {
            Ok(plan) => plan,
            Err(e) => {
                sink.emit(StreamEvent::error(&e)).await?;
                return Ok(Outcome::Failed);
            }
        };
        sink.emit(StreamEvent::plan(&plan)).await?;

        let mut summaries: Vec<Arc<Summary>> = Vec::new();
        let mut access_log: Vec<AccessRecord> = Vec::new();
        let mut navigated = false;

        for entry in &plan.entries {
            sink.emit(StreamEvent::thought(format!("Loading {}", entry.product_id)))
                .await?;

            let summary = match self.store.load_summary(&entry.product_id).await {
                Ok(summary) => summary,
                Err(e) => {
                    sink.emit(StreamEvent::error(&e)).await?;
                    return Ok(Outcome::Failed);
                }
            };

            if !navigated {
                // Plan entries were validated against the catalog
                if let Ok(product) = self.catalog.get(&entry.product_id) {
                    if let Some(url) = &product.route_hint {
                        sink.emit(StreamEvent::navigation(url)).await?;
                        navigated = true;
                    }
                }
            }

            access_log.push(AccessRecord {
                product_id: entry.product_id.clone(),
                reason: entry.reason.clone(),
                rows: summary.rows_total,
                used_summary: summary.generated_at.is_empty(),
            });
            summaries.push(summary);
        }

        if sink.is_closed() {
            return Err(Cancelled);
        }
        sink.emit(StreamEvent::thought("Analyzing")).await?;

        let analysis = match self.analyzer.analyze(question, &access_log, &summaries).await {
            Ok(analysis) => analysis,
            Err(e) => {
                sink.emit(StreamEvent::error(&e)).await?;
                return Ok(Outcome::Failed);
            }
        };
        sink.emit(StreamEvent::answer(&analysis)).await?;

        // When the question is cluster-relevant, highlight matching
        // clusters once the chart is on screen.
        if matches_any_token(question, DOMAIN_TOKENS) {
            match self.predictor.predict(question).await {
                Ok(prediction) => {
                    sink.emit(StreamEvent::cluster_prediction(&prediction)).await?;
                }
                Err(e @ Error::Dimension { .. }) => {
                    sink.emit(StreamEvent::error(&e)).await?;
                    return Ok(Outcome::Failed);
                }
                Err(e) => {
                    warn!(error = %e, "cluster prediction failed after answer, skipping");
                }
            }
        }

        sink.emit(StreamEvent::complete()).await?;
        Ok(Outcome::Completed)
    }

    /// Direct persona reply, optionally preceded by a cluster prediction
    /// and the glow hint so the UI can prepare before subtitles appear.
    async fn run_chat(&self, sink: &EventSink, question: &str) -> Result<Outcome, Cancelled> {
        sink.emit(StreamEvent::user(question)).await?;

        if matches_any_token(question, DOMAIN_TOKENS) {
            match self.predictor.predict(question).await {
                Ok(prediction) => {
                    sink.emit(StreamEvent::cluster_prediction(&prediction)).await?;
                }
                Err(e) => {
                    warn!(error = %e, "cluster prediction failed in chat, skipping");
                }
            }
        }

        if matches_any_token(question, GLOW_TOKENS) {
            sink.emit(StreamEvent::glow_on()).await?;
        }

        let reply = match self.llm.generate_text(&prompts::simple_chat(question)).await {
            Ok(reply) => reply,
            Err(e) => {
                sink.emit(StreamEvent::error(&e)).await?;
                return Ok(Outcome::Failed);
            }
        };
        sink.emit(StreamEvent::chat(&reply)).await?;

        sink.emit(StreamEvent::complete()).await?;
        Ok(Outcome::Completed)
    }

    /// Short preview of the canonical time-series artifact, used to ground
    /// the planner.
    pub async fn sample_preview(&self) -> String {
        match self.store.load_summary("frequency_over_time").await {
            Ok(summary) => {
                let text = &summary.text;
                let cut = text
                    .char_indices()
                    .take_while(|(i, _)| *i < SAMPLE_PREVIEW_CHARS)
                    .last()
                    .map(|(i, c)| i + c.len_utf8())
                    .unwrap_or(text.len().min(SAMPLE_PREVIEW_CHARS));
                text[..cut].to_string()
            }
            Err(e) => {
                warn!(error = %e, "frequency preview unavailable for planning");
                "Frequency data not available".to_string()
            }
        }
    }
}

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Auto => "auto",
        Mode::Chat => "chat",
        Mode::DeepAnalysis => "deep_analysis",
    }
}

/// Case-insensitive word-boundary containment check.
fn contains_word(text: &str, word: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

fn matches_any_token(text: &str, tokens: &[&str]) -> bool {
    let lower = text.to_lowercase();
    tokens.iter().any(|token| {
        if token.contains(' ') {
            lower.contains(token)
        } else {
            contains_word(&lower, token)
        }
    })
}
