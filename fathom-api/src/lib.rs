//! FATHOM API - AUV Fleet Control Plane
//!
//! Axum HTTP server handling the vehicle heartbeat protocol (`/v1`), the
//! operator Web API (`/api/v1`), and operational scaffolding. All state
//! lives in PostgreSQL; the server keeps no in-process caches of mutable
//! device state.

mod macros;

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod middleware;
pub mod pagination;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, DbConfig};
pub use db::DbClient;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
