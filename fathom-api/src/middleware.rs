//! Request-boundary middleware
//!
//! Every request gets a correlation id: taken from the client's
//! `X-Request-ID` header when present, freshly minted otherwise. The id is
//! stored in request extensions, echoed on the response, and attached to
//! the error log line for any 5xx.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::constants::REQUEST_ID_HEADER;

/// Correlation id attached to request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(req).await;

    if response.status().is_server_error() {
        tracing::error!(
            request_id = %id,
            status = %response.status(),
            "request failed"
        );
    }

    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}
