//! Shared application state for Axum routers.

use crate::config::ApiConfig;
use crate::db::DbClient;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(db: DbClient, config: ApiConfig) -> Self {
        Self { db, config }
    }
}

crate::impl_from_ref!(DbClient, db);
crate::impl_from_ref!(ApiConfig, config);
