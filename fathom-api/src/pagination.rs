//! Opaque cursor pagination
//!
//! List endpoints page on the last seen `(id, created_at)` pair, encoded as
//! url-safe base64 so clients treat cursors as opaque tokens. Device lists
//! page on `(last_seen_at, mid)` since devices have no surrogate id.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::ApiError;

// ============================================================================
// CURSORS
// ============================================================================

/// Keyset cursor for id-keyed tables, ordered `(created_at, id)` descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let token = format!("{}:{}", self.created_at.timestamp_micros(), self.id);
        URL_SAFE_NO_PAD.encode(token.as_bytes())
    }

    pub fn decode(token: &str) -> Result<Self, ApiError> {
        let (micros, id) = decode_pair(token)?;
        Ok(Self {
            id: id.parse().map_err(|_| invalid_cursor())?,
            created_at: DateTime::from_timestamp_micros(micros).ok_or_else(invalid_cursor)?,
        })
    }
}

/// Keyset cursor for the device list, ordered `(last_seen_at, mid)`
/// descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCursor {
    pub mid: String,
    pub last_seen_at: DateTime<Utc>,
}

impl DeviceCursor {
    pub fn encode(&self) -> String {
        let token = format!("{}:{}", self.last_seen_at.timestamp_micros(), self.mid);
        URL_SAFE_NO_PAD.encode(token.as_bytes())
    }

    pub fn decode(token: &str) -> Result<Self, ApiError> {
        let (micros, mid) = decode_pair(token)?;
        if mid.is_empty() {
            return Err(invalid_cursor());
        }
        Ok(Self {
            mid: mid.to_string(),
            last_seen_at: DateTime::from_timestamp_micros(micros).ok_or_else(invalid_cursor)?,
        })
    }
}

fn decode_pair(token: &str) -> Result<(i64, String), ApiError> {
    let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid_cursor())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid_cursor())?;
    let (micros, rest) = text.split_once(':').ok_or_else(invalid_cursor)?;
    let micros: i64 = micros.parse().map_err(|_| invalid_cursor())?;
    Ok((micros, rest.to_string()))
}

fn invalid_cursor() -> ApiError {
    ApiError::invalid_payload("invalid cursor")
}

// ============================================================================
// PAGES
// ============================================================================

/// One page of results plus the cursor for the next page, if any.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Assemble a page from a `limit + 1` over-fetch: the extra row, when
    /// present, proves another page exists.
    pub fn from_overfetch(mut items: Vec<T>, limit: i64, cursor_of: impl Fn(&T) -> String) -> Self {
        let has_more = items.len() as i64 > limit;
        if has_more {
            items.truncate(limit as usize);
        }
        let next_cursor = if has_more {
            items.last().map(&cursor_of)
        } else {
            None
        };
        Self { items, next_cursor }
    }
}

/// Clamp a requested page size into `[1, MAX_PAGE_SIZE]`.
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE)
}

// ============================================================================
// TESTS
// ============================================================================
