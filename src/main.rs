//! Server entrypoint
//!
//! Exit codes: 0 normal shutdown, 1 configuration error, 2 unrecoverable
//! startup failure (centroid index unreachable or the listener cannot
//! bind).

use insight_agent::agent::Agent;
use insight_agent::api::{build_router, AppState};
use insight_agent::artifacts::ArtifactStore;
use insight_agent::catalog::Catalog;
use insight_agent::cluster::{ClusterPredictor, EmbeddingIndex, HttpEmbedder};
use insight_agent::config::Config;
use insight_agent::error::Error;
use insight_agent::llm::GeminiClient;
use insight_agent::report::ReportService;
use insight_agent::voice::{GradiumClient, VoiceModel};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG: i32 = 1;
const EXIT_STARTUP: i32 = 2;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    std::process::exit(run().await);
}

async fn run() -> i32 {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return EXIT_CONFIG;
        }
    };

    // Centroid index: loaded once, bounded by the startup timeout.
    let database_url = config.database_url.clone();
    let index = tokio::time::timeout(
        config.index_load_timeout(),
        tokio::task::spawn_blocking(move || EmbeddingIndex::load(&database_url)),
    )
    .await;
    let index = match index {
        Ok(Ok(Ok(index))) => Arc::new(index),
        Ok(Ok(Err(e))) => {
            error!(error = %e, "failed to load centroid index");
            return EXIT_STARTUP;
        }
        Ok(Err(join_err)) => {
            error!(error = %join_err, "centroid index load task failed");
            return EXIT_STARTUP;
        }
        Err(_) => {
            error!(timeout = ?config.index_load_timeout(), "centroid index load timed out");
            return EXIT_STARTUP;
        }
    };

    let llm = match GeminiClient::new(
        &config.llm_api_key,
        &config.llm_model,
        &config.llm_url,
        config.llm_timeout(),
    ) {
        Ok(client) => Arc::new(client) as Arc<dyn insight_agent::llm::LanguageModel>,
        Err(e) => {
            error!(error = %e, "failed to build LLM client");
            return EXIT_CONFIG;
        }
    };

    let embedder = match HttpEmbedder::new(
        &config.embedding_url,
        &config.embedding_model,
        config.embedding_dim,
        Duration::from_secs(30),
    ) {
        Ok(embedder) => Arc::new(embedder) as Arc<dyn insight_agent::cluster::Embedder>,
        Err(e) => {
            error!(error = %e, "failed to build embedding client");
            return EXIT_CONFIG;
        }
    };

    // Dimension agreement between embedder and index is checked here.
    let predictor = match ClusterPredictor::new(llm.clone(), embedder, index.clone()) {
        Ok(predictor) => Arc::new(predictor),
        Err(e) => {
            error!(error = %e, "cluster predictor configuration mismatch");
            return EXIT_CONFIG;
        }
    };

    let voice: Option<Arc<dyn VoiceModel>> = match &config.voice_api_key {
        Some(key) => match GradiumClient::new(key, &config.voice_url, config.tts_timeout()) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                error!(error = %e, "failed to build voice client");
                return EXIT_CONFIG;
            }
        },
        None => {
            warn!("VOICE_API_KEY not set, voice endpoints disabled");
            None
        }
    };

    let catalog = Arc::new(Catalog::builtin());
    let store = Arc::new(ArtifactStore::new(
        catalog.clone(),
        &config.artifact_dir,
        config.preview_rows,
        config.artifact_timeout(),
    ));

    let agent = Arc::new(Agent::new(
        catalog.clone(),
        store.clone(),
        llm.clone(),
        predictor,
        config.analyzer_budget_chars,
        config.event_buffer,
    ));

    let reports = Arc::new(ReportService::new(catalog, store, llm, index));

    let state = AppState {
        agent,
        reports,
        voice,
        default_voice_id: config.default_voice_id.clone(),
    };

    let router = build_router(state, &config.frontend_origin);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr, error = %e, "failed to bind listener");
            return EXIT_STARTUP;
        }
    };

    info!(
        addr,
        voice = config.voice_enabled(),
        model = %config.llm_model,
        "insight-agent listening"
    );

    match axum::serve(listener, router).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %Error::Io(e), "server terminated abnormally");
            EXIT_STARTUP
        }
    }
}
