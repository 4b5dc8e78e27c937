//! Nearest-centroid lookup over the hierarchical cluster tables
//!
//! Centroids are precomputed offline and persisted in SQLite: level-1 rows
//! are top-level clusters, level-2 rows carry a parent link. The index is
//! loaded once at startup and memoized for the process lifetime.

use crate::error::{Error, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Prediction returned by the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterPrediction {
    pub parent_cluster_id: i64,
    pub child_cluster_id: i64,
    pub confidence: f64,
}

/// One stored centroid
#[derive(Debug, Clone)]
pub struct Centroid {
    pub cluster_id: i64,
    pub parent_cluster_id: Option<i64>,
    pub label: String,
    pub vector: Vec<f32>,
}

impl Centroid {
    /// Cosine similarity between this centroid and a query vector.
    ///
    /// Returns 0 for a length mismatch or a zero-magnitude side, so a
    /// degenerate centroid can never win the nearest-neighbor scan.
    fn score(&self, query: &[f32]) -> f32 {
        if self.vector.len() != query.len() || query.is_empty() {
            return 0.0;
        }

        let (dot, own_sq, query_sq) = self
            .vector
            .iter()
            .zip(query)
            .fold((0.0f32, 0.0f32, 0.0f32), |(dot, own, q), (a, b)| {
                (dot + a * b, own + a * a, q + b * b)
            });

        let magnitude = own_sq.sqrt() * query_sq.sqrt();
        if magnitude <= f32::EPSILON {
            return 0.0;
        }
        dot / magnitude
    }
}

/// In-memory two-level centroid index
pub struct EmbeddingIndex {
    dim: usize,
    level1: Vec<Centroid>,
    level2: Vec<Centroid>,
}

impl EmbeddingIndex {
    /// Build an index from centroid lists.
    ///
    /// Level-2 centroids whose parent is missing from level-1 are dropped
    /// with a warning. Mixed dimensions are a configuration error.
    pub fn new(mut level1: Vec<Centroid>, level2: Vec<Centroid>) -> Result<Self> {
        if level1.is_empty() {
            return Err(Error::Config("no level-1 centroids loaded".to_string()));
        }

        // Sorted order makes the smaller-id tie-break a first-wins scan.
        level1.sort_by_key(|c| c.cluster_id);

        let dim = level1[0].vector.len();
        for centroid in &level1 {
            if centroid.vector.len() != dim {
                return Err(Error::Config(format!(
                    "level-1 centroid {} has dim {}, expected {}",
                    centroid.cluster_id,
                    centroid.vector.len(),
                    dim
                )));
            }
        }

        let mut kept: Vec<Centroid> = Vec::with_capacity(level2.len());
        for centroid in level2 {
            let Some(parent) = centroid.parent_cluster_id else {
                warn!(cluster_id = centroid.cluster_id, "dropping level-2 centroid with no parent");
                continue;
            };
            if !level1.iter().any(|p| p.cluster_id == parent) {
                warn!(
                    cluster_id = centroid.cluster_id,
                    parent, "dropping orphan level-2 centroid"
                );
                continue;
            }
            if centroid.vector.len() != dim {
                return Err(Error::Config(format!(
                    "level-2 centroid {} has dim {}, expected {}",
                    centroid.cluster_id,
                    centroid.vector.len(),
                    dim
                )));
            }
            kept.push(centroid);
        }
        kept.sort_by_key(|c| c.cluster_id);

        Ok(Self {
            dim,
            level1,
            level2: kept,
        })
    }

    /// Load the index from the clusters table in a SQLite database.
    pub fn load(database_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(database_path.as_ref())?;

        let mut stmt = conn.prepare(
            "SELECT level, cluster_id, parent_cluster_id, label, centroid
             FROM clusters
             WHERE centroid IS NOT NULL
             ORDER BY level, cluster_id",
        )?;

        let mut level1 = Vec::new();
        let mut level2 = Vec::new();

        let rows = stmt.query_map([], |row| {
            let level: i64 = row.get(0)?;
            let cluster_id: i64 = row.get(1)?;
            let parent_cluster_id: Option<i64> = row.get(2)?;
            let label: Option<String> = row.get(3)?;
            let blob: Vec<u8> = row.get(4)?;
            Ok((level, cluster_id, parent_cluster_id, label, blob))
        })?;

        for row in rows {
            let (level, cluster_id, parent_cluster_id, label, blob) = row?;
            let centroid = Centroid {
                cluster_id,
                parent_cluster_id,
                label: label.unwrap_or_default(),
                vector: decode_centroid(&blob),
            };
            match level {
                1 => level1.push(centroid),
                2 => level2.push(centroid),
                other => warn!(level = other, cluster_id, "ignoring centroid at unknown level"),
            }
        }

        let index = Self::new(level1, level2)?;
        info!(
            dim = index.dim,
            level1 = index.level1.len(),
            level2 = index.level2.len(),
            "loaded centroid index"
        );
        Ok(index)
    }

    /// Fixed centroid dimensionality
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Predict parent and child cluster for a query embedding.
    ///
    /// Parent is the nearest level-1 centroid that has at least one child;
    /// child is the nearest level-2 centroid under that parent. Ties break
    /// toward the smaller cluster id.
    pub fn predict(&self, embedding: &[f32]) -> Result<ClusterPrediction> {
        if embedding.len() != self.dim {
            return Err(Error::Dimension {
                got: embedding.len(),
                expected: self.dim,
            });
        }

        let parent = self
            .level1
            .iter()
            .filter(|p| self.level2.iter().any(|c| c.parent_cluster_id == Some(p.cluster_id)))
            .fold(None::<(&Centroid, f32)>, |best, candidate| {
                let sim = candidate.score(embedding);
                match best {
                    // Strict > keeps the earlier (smaller) id on ties
                    Some((_, best_sim)) if sim <= best_sim => best,
                    _ => Some((candidate, sim)),
                }
            })
            .ok_or_else(|| Error::Config("centroid index has no populated parents".to_string()))?;

        let child = self
            .level2
            .iter()
            .filter(|c| c.parent_cluster_id == Some(parent.0.cluster_id))
            .fold(None::<(&Centroid, f32)>, |best, candidate| {
                let sim = candidate.score(embedding);
                match best {
                    Some((_, best_sim)) if sim <= best_sim => best,
                    _ => Some((candidate, sim)),
                }
            })
            .expect("populated parent has at least one child");

        Ok(ClusterPrediction {
            parent_cluster_id: parent.0.cluster_id,
            child_cluster_id: child.0.cluster_id,
            confidence: confidence_from_similarity(child.1),
        })
    }

    /// Label of a level-1 cluster
    pub fn parent_label(&self, cluster_id: i64) -> Option<&str> {
        self.level1
            .iter()
            .find(|c| c.cluster_id == cluster_id)
            .map(|c| c.label.as_str())
    }

    /// Label of a level-2 cluster
    pub fn child_label(&self, parent_id: i64, cluster_id: i64) -> Option<&str> {
        self.level2
            .iter()
            .find(|c| c.parent_cluster_id == Some(parent_id) && c.cluster_id == cluster_id)
            .map(|c| c.label.as_str())
    }
}

/// Map a raw similarity onto the (0, 1] confidence range.
fn confidence_from_similarity(sim: f32) -> f64 {
    (f64::from(sim).max(f64::EPSILON)).min(1.0)
}

/// Decode a centroid column BLOB (4-byte little-endian floats) into a
/// vector. A trailing partial word is ignored.
pub fn decode_centroid(blob: &[u8]) -> Vec<f32> {
    let mut vector = Vec::with_capacity(blob.len() / 4);
    for word in blob.chunks_exact(4) {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(word);
        vector.push(f32::from_le_bytes(bytes));
    }
    vector
}

/// Encode a vector in the BLOB layout the cluster tables store.
pub fn encode_centroid(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}
