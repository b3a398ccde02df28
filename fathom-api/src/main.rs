//! FATHOM API Server Entry Point
//!
//! Bootstraps logging and configuration, prepares the database, and starts
//! the Axum HTTP server with the expiration sweep running alongside it.

use fathom_api::jobs::{spawn_expire_sweep, ExpireSweepConfig};
use fathom_api::{create_router, telemetry, ApiConfig, ApiResult, AppState, DbClient, DbConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    telemetry::init_tracing();

    let api_config = ApiConfig::from_env();
    let db_config = DbConfig::from_env();

    let db = DbClient::from_config(&db_config)?;
    db.init_schema().await?;

    let sweep = spawn_expire_sweep(
        db.clone(),
        ExpireSweepConfig {
            period: api_config.expire_sweep_period,
            command_ttl: api_config.command_ttl,
        },
    );

    let bind_addr = api_config.bind_addr.clone();
    let app = create_router(AppState::new(db, api_config));

    tracing::info!(%bind_addr, "starting FATHOM API server");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| fathom_api::ApiError::internal(format!("failed to bind {bind_addr}: {e}")))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| fathom_api::ApiError::internal(format!("server error: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    sweep.shutdown().await;
    Ok(())
}
