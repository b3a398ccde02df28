//! Constants for the FATHOM API
//!
//! Centralizing defaults makes them easy to find, modify, and test.

// ============================================================================
// COMMAND LIFECYCLE
// ============================================================================

/// Default TTL before a QUEUED command is swept to EXPIRED (1 hour)
pub const DEFAULT_COMMAND_TTL_SECS: u64 = 3600;

/// Default cadence of the expiration sweep (60 seconds)
pub const DEFAULT_EXPIRE_SWEEP_SECS: u64 = 60;

/// Default freshness window for the descent gate (10 minutes)
pub const DEFAULT_DESCENT_FRESHNESS_SECS: u64 = 600;

// ============================================================================
// DATABASE
// ============================================================================

/// Default connection pool size
pub const DEFAULT_DB_POOL_SIZE: usize = 20;

/// Development default connection string
pub const DEFAULT_DATABASE_URL: &str = "postgres://postgres@localhost:5432/fathom";

// ============================================================================
// HTTP
// ============================================================================

/// Default bind address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Hard wall-clock cap on vehicle-facing request handling (15 seconds);
/// past it the handler answers 503 and the vehicle retries next cycle
pub const VEHICLE_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Correlation id header echoed on every response
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ============================================================================
// PAGINATION
// ============================================================================

/// Default page size for list operations
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for list operations
pub const MAX_PAGE_SIZE: i64 = 100;

// ============================================================================
// DEVICES
// ============================================================================

/// A device is considered online if seen within this many seconds
pub const ONLINE_THRESHOLD_SECS: i64 = 60;
