//! Embedding-based cluster prediction
//!
//! A two-level centroid index over historical service requests, an
//! embedding client matching the model the index was built with, and the
//! predictor that fuses LLM keyword extraction with the ANN lookup.

pub mod embedder;
pub mod index;
pub mod predictor;

pub use embedder::{Embedder, HttpEmbedder};
pub use index::{decode_centroid, encode_centroid, Centroid, ClusterPrediction, EmbeddingIndex};
pub use predictor::ClusterPredictor;
