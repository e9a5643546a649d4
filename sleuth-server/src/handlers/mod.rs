//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod aggregate;
pub mod health;
pub mod query;
pub mod scan;
pub mod stats;

pub use crate::state::AppState;
pub use aggregate::{
    aggregate_handler, AggregateRequest, FindingInput, FindingResponse, VerdictResponse,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use query::{query_handler, QueryRequest, QueryResponse};
pub use scan::{
    scan_handler, DuplicateResponse, RegistrationResponse, ScanResponse, SignalResponse,
};
pub use stats::{stats_handler, StatsResponse};
