//! HTTP endpoint surface
//!
//! Converts request bodies into orchestrator inputs and typed session
//! events into SSE frames. Streaming endpoints answer 200 once the stream
//! opens; everything after that is expressed as events.

pub mod handlers;
pub mod routes;
pub mod voice;

pub use handlers::{ApiError, AppState};
pub use routes::build_router;
