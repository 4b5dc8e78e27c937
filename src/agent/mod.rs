//! Request-orchestration engine
//!
//! The two-stage reasoning pipeline (planning → analysis), the typed event
//! stream that drives the dashboard, and the session lifecycle binding
//! them to the shared catalog, artifact store, and cluster predictor.

pub mod analyzer;
pub mod planner;
pub mod session;

pub use analyzer::{AnalysisResult, Analyzer};
pub use planner::{Plan, PlanEntry, Planner};
pub use session::{Agent, EventKind, Mode, StreamEvent};

use serde::{Deserialize, Serialize};

/// One fetched product in the order it was loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
    pub product_id: String,
    /// The planner's reason for selecting this product
    pub reason: String,
    /// Row count of the loaded data (0 when only a precomputed summary was read)
    pub rows: usize,
    /// True when a precomputed summary was used instead of full data
    pub used_summary: bool,
}
