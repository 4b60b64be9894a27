//! HTTP API for QnA Assist.
//!
//! All error responses share one shape:
//! `{ "error": { "code": "...", "message": "..." } }` with codes
//! `bad_request` (400), `schema_mismatch` (500), `generation_failed` (500)
//! and `internal` (500).

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{router, run_server, AppState, PredictRequest, PredictResponse, BANNER};
