//! Request extractors
//!
//! Vehicle endpoints persist the request body verbatim as the audit
//! payload while parsing only the typed slice the core inspects, so the
//! extractor hands back both. Deserialization failures map to the
//! `INVALID_PAYLOAD` error kind instead of axum's default rejection.

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// JSON body parsed into `T`, with the raw document kept for storage.
pub struct StrictJson<T> {
    pub parsed: T,
    pub raw: Value,
}

impl<S, T> FromRequest<S> for StrictJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|err| ApiError::invalid_payload(err.body_text()))?;
        let parsed = serde_json::from_value(raw.clone())
            .map_err(|err| ApiError::invalid_payload(err.to_string()))?;
        Ok(Self { parsed, raw })
    }
}
