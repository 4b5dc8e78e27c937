//! Cluster prediction pipeline
//!
//! question → keyword extraction (LLM) → embedding → nearest-centroid
//! lookup. Keyword extraction narrows the embedding to request-relevant
//! terms instead of embedding the whole question, which keeps the query
//! close to the cluster-label vocabulary the centroids were built from.

use crate::cluster::embedder::Embedder;
use crate::cluster::index::{ClusterPrediction, EmbeddingIndex};
use crate::error::{Error, Result};
use crate::llm::LanguageModel;
use crate::metrics::METRICS;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ClusterPredictor {
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    index: Arc<EmbeddingIndex>,
}

impl ClusterPredictor {
    /// Wire the pipeline. Embedder and index dimensions must agree.
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<EmbeddingIndex>,
    ) -> Result<Self> {
        if embedder.dims() != index.dim() {
            return Err(Error::Config(format!(
                "embedder produces {}-d vectors but the centroid index is {}-d",
                embedder.dims(),
                index.dim()
            )));
        }
        Ok(Self { llm, embedder, index })
    }

    /// Predict the (parent, child) cluster pair for a question.
    pub async fn predict(&self, question: &str) -> Result<ClusterPrediction> {
        let query = match self.llm.generate_search_keywords(question).await {
            Ok(keywords) if !keywords.trim().is_empty() => {
                debug!(keywords = %keywords, "extracted search keywords");
                keywords
            }
            Ok(_) => question.to_string(),
            Err(e) => {
                // Keyword extraction is an optimization; fall back to the raw question.
                warn!(error = %e, "keyword extraction failed, embedding raw question");
                question.to_string()
            }
        };

        let embedding = self.embedder.embed(&query).await?;
        let prediction = self.index.predict(&embedding);

        match &prediction {
            Ok(p) => {
                METRICS.cluster_predictions.with_label_values(&["success"]).inc();
                debug!(
                    parent = p.parent_cluster_id,
                    child = p.child_cluster_id,
                    confidence = p.confidence,
                    "cluster predicted"
                );
            }
            Err(_) => {
                METRICS.cluster_predictions.with_label_values(&["error"]).inc();
            }
        }

        prediction
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::index::Centroid;
    use async_trait::async_trait;

    struct KeywordLlm {
        fail_keywords: bool,
    }

    #[async_trait]
    impl LanguageModel for KeywordLlm {
        async fn generate_text(&self, prompt: &str) -> Result<String> {
            if self.fail_keywords {
                Err(Error::LlmTransient("offline".to_string()))
            } else if prompt.contains("search phrase") {
                Ok("parks playground booking".to_string())
            } else {
                Ok(String::new())
            }
        }
    }

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            // Keyword phrase lands on the x axis, anything else on y
            if text.contains("parks") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }

        fn dims(&self) -> usize {
            2
        }
    }

    fn test_index() -> Arc<EmbeddingIndex> {
        Arc::new(
            EmbeddingIndex::new(
                vec![
                    Centroid {
                        cluster_id: 1,
                        parent_cluster_id: None,
                        label: "Parks".to_string(),
                        vector: vec![1.0, 0.0],
                    },
                    Centroid {
                        cluster_id: 2,
                        parent_cluster_id: None,
                        label: "Roads".to_string(),
                        vector: vec![0.0, 1.0],
                    },
                ],
                vec![
                    Centroid {
                        cluster_id: 10,
                        parent_cluster_id: Some(1),
                        label: "Playgrounds".to_string(),
                        vector: vec![1.0, 0.0],
                    },
                    Centroid {
                        cluster_id: 20,
                        parent_cluster_id: Some(2),
                        label: "Potholes".to_string(),
                        vector: vec![0.0, 1.0],
                    },
                ],
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_predict_uses_extracted_keywords() {
        let predictor = ClusterPredictor::new(
            Arc::new(KeywordLlm { fail_keywords: false }),
            Arc::new(AxisEmbedder),
            test_index(),
        )
        .unwrap();

        let prediction = predictor.predict("where can my kids play?").await.unwrap();
        assert_eq!(prediction.parent_cluster_id, 1);
        assert_eq!(prediction.child_cluster_id, 10);
    }

    #[tokio::test]
    async fn test_predict_falls_back_to_raw_question() {
        let predictor = ClusterPredictor::new(
            Arc::new(KeywordLlm { fail_keywords: true }),
            Arc::new(AxisEmbedder),
            test_index(),
        )
        .unwrap();

        // Raw question embeds to the y axis
        let prediction = predictor.predict("anything").await.unwrap();
        assert_eq!(prediction.parent_cluster_id, 2);
        assert_eq!(prediction.child_cluster_id, 20);
    }

    #[tokio::test]
    async fn test_dim_mismatch_rejected_at_construction() {
        struct WideEmbedder;

        #[async_trait]
        impl Embedder for WideEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(vec![0.0; 384])
            }
            fn dims(&self) -> usize {
                384
            }
        }

        let result = ClusterPredictor::new(
            Arc::new(KeywordLlm { fail_keywords: false }),
            Arc::new(WideEmbedder),
            test_index(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
