use super::error::{ServerError, ServerResult};
use crate::canonicalization::{canonicalize_body, canonicalize_header, canonicalize_signed_headers};
use crate::email::canonicalize_message;
use crate::hash::{body_hash, HashAlgorithm};
use axum::extract::rejection::JsonRejection;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Header block and body to canonicalize. Absent or null texts count as empty.
#[derive(Debug, Default, Deserialize)]
pub struct CanonicalizeRequest {
    #[serde(default)]
    pub header: Option<String>,

    #[serde(default)]
    pub body: Option<String>,

    /// Only canonicalize these fields, in this order (the `h=` tag)
    #[serde(default)]
    pub signed_headers: Option<Vec<String>>,

    /// Also return the body hash computed with this algorithm
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CanonicalizeMessageRequest {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CanonicalizeResponse {
    pub header: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_hash: Option<String>,
}

fn parse_hash(hash: Option<&str>) -> ServerResult<Option<HashAlgorithm>> {
    hash.map(str::parse::<HashAlgorithm>)
        .transpose()
        .map_err(ServerError::from)
}

pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "dkim-canon",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn canonicalize(
    payload: Result<Json<CanonicalizeRequest>, JsonRejection>,
) -> ServerResult<Json<CanonicalizeResponse>> {
    let Json(request) = payload?;
    let algorithm = parse_hash(request.hash.as_deref())?;
    let raw_header = request.header.unwrap_or_default();
    let raw_body = request.body.unwrap_or_default();
    tracing::debug!(
        header_len = raw_header.len(),
        body_len = raw_body.len(),
        "canonicalizing"
    );

    let header = match &request.signed_headers {
        Some(signed_headers) => canonicalize_signed_headers(&raw_header, signed_headers.as_slice()),
        None => canonicalize_header(&raw_header),
    };
    let body = canonicalize_body(&raw_body);
    let body_hash = algorithm.map(|algorithm| body_hash(&body, algorithm));

    Ok(Json(CanonicalizeResponse { header, body, body_hash }))
}

pub async fn canonicalize_full_message(
    payload: Result<Json<CanonicalizeMessageRequest>, JsonRejection>,
) -> ServerResult<Json<CanonicalizeResponse>> {
    let Json(request) = payload?;
    let algorithm = parse_hash(request.hash.as_deref())?;
    let raw = request.message.unwrap_or_default();
    tracing::debug!(message_len = raw.len(), "canonicalizing message");

    let message = canonicalize_message(&raw);
    let body_hash = algorithm.map(|algorithm| body_hash(&message.body, algorithm));

    Ok(Json(CanonicalizeResponse {
        header: message.header,
        body: message.body,
        body_hash,
    }))
}

pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
