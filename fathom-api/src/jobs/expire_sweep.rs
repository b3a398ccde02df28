//! Command Expiration Sweep
//!
//! A QUEUED command the vehicle never polled for goes stale; past the
//! configured TTL the sweep moves it to EXPIRED so the operator sees the
//! truth instead of a command that will never run. The sweep runs on a
//! fixed cadence as a long-running task started at boot and cancelled at
//! shutdown; the guarded `status = 'QUEUED'` predicate makes it safe to run
//! concurrently with ingest.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use fathom_core::event_type;

use crate::db::{self, DbClient};
use crate::error::ApiResult;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the expiration sweep task.
#[derive(Debug, Clone)]
pub struct ExpireSweepConfig {
    /// How often to sweep (default: 60 seconds)
    pub period: Duration,
    /// Age past which a QUEUED command expires (default: 1 hour)
    pub command_ttl: Duration,
}

// ============================================================================
// TASK
// ============================================================================

/// Handle for stopping the sweep at shutdown.
pub struct ExpireSweepHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ExpireSweepHandle {
    /// Signal the task and wait for it to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Start the sweep task.
pub fn spawn_expire_sweep(db: DbClient, config: ExpireSweepConfig) -> ExpireSweepHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        let mut ticker = interval(config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            period_secs = config.period.as_secs(),
            ttl_secs = config.command_ttl.as_secs(),
            "expire sweep started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = sweep_once(&db, &config).await {
                        // Transient database trouble; the next tick retries.
                        tracing::warn!(error = %err, "expire sweep pass failed");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("expire sweep stopped");
                        return;
                    }
                }
            }
        }
    });

    ExpireSweepHandle {
        shutdown: shutdown_tx,
        join,
    }
}

/// One sweep pass: expire every QUEUED command older than the TTL and log
/// an event per expiry.
async fn sweep_once(db: &DbClient, config: &ExpireSweepConfig) -> ApiResult<()> {
    let mut conn = db.conn().await?;
    let tx = conn.transaction().await?;
    let now = Utc::now();
    let ttl = chrono::Duration::from_std(config.command_ttl)
        .unwrap_or_else(|_| chrono::Duration::seconds(3600));
    let cutoff = now - ttl;

    let expired = db::command_expire_batch(&*tx, cutoff, now).await?;
    for command in &expired {
        db::event_log_insert(
            &*tx,
            Some(&command.mid),
            event_type::CMD_EXPIRED,
            &serde_json::json!({
                "cmd_seq": command.seq,
                "cmd": command.cmd,
                "created_at": command.created_at.to_rfc3339(),
                "ttl_secs": config.command_ttl.as_secs(),
            }),
            now,
        )
        .await?;
        tracing::info!(
            mid = %command.mid,
            cmd_seq = command.seq,
            "command_expired"
        );
    }
    tx.commit().await?;

    if !expired.is_empty() {
        tracing::info!(count = expired.len(), "expire sweep pass complete");
    }
    Ok(())
}
