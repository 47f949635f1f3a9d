// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use loop_kernel::{IntegrityViolation, Rejected, ValidationError};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Integrity(#[from] IntegrityViolation),
    #[error("malformed request: {0}")]
    MalformedBody(String),
    #[error("request body too large: {0}")]
    PayloadTooLarge(String),
    #[error("Too many active stream connections ({0} max)")]
    CapacityExceeded(usize),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("duplicate {entity} id: {id}")]
    Conflict { entity: String, id: String },
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found")]
    NotFound,
    #[error("API key protection is enabled but no API key is configured")]
    NotConfigured,
    #[error("Rate limit exceeded, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("peer request failed: {0}")]
    Network(String),
    #[error("Internal server error")]
    Internal(String),
}

impl LoopError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LoopError::Validation(_) | LoopError::MalformedBody(_) => "validation",
            LoopError::Integrity(_) => "integrity_violation",
            LoopError::PayloadTooLarge(_) => "payload_too_large",
            LoopError::CapacityExceeded(_) => "capacity_exceeded",
            LoopError::StorageUnavailable(_) => "storage_unavailable",
            LoopError::Conflict { .. } => "conflict",
            LoopError::Unauthorized => "unauthorized",
            LoopError::NotFound => "not_found",
            LoopError::NotConfigured => "not_configured",
            LoopError::RateLimited { .. } => "rate_limited",
            LoopError::Network(_) => "network",
            LoopError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LoopError::Validation(_) | LoopError::MalformedBody(_) | LoopError::Integrity(_) => {
                StatusCode::BAD_REQUEST
            }
            LoopError::CapacityExceeded(_) | LoopError::RateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            LoopError::StorageUnavailable(_) | LoopError::NotConfigured => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            LoopError::Conflict { .. } => StatusCode::CONFLICT,
            LoopError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            LoopError::Unauthorized => StatusCode::UNAUTHORIZED,
            LoopError::NotFound => StatusCode::NOT_FOUND,
            LoopError::Network(_) => StatusCode::BAD_GATEWAY,
            LoopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Storage outages may succeed on retry; nothing else does with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LoopError::StorageUnavailable(_) | LoopError::CapacityExceeded(_) | LoopError::RateLimited { .. }
        )
    }
}

impl IntoResponse for LoopError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "Request failed: {:?}", self);
        }

        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let LoopError::Integrity(v) = &self {
            body["reason"] = json!(v.code());
        }
        if self.is_retryable() {
            body["retryable"] = json!(true);
        }

        let mut response = (status, Json(body)).into_response();
        if let LoopError::RateLimited { retry_after } = &self {
            let secs = retry_after.as_secs().max(1).to_string();
            if let Ok(value) = HeaderValue::from_str(&secs) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<StoreError> for LoopError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => LoopError::StorageUnavailable(msg),
            StoreError::Conflict { entity, id } => LoopError::Conflict {
                entity: entity.to_string(),
                id,
            },
            other => LoopError::Internal(other.to_string()),
        }
    }
}

impl From<Rejected<StoreError>> for LoopError {
    fn from(e: Rejected<StoreError>) -> Self {
        match e {
            Rejected::Schema(v) => LoopError::Validation(v),
            Rejected::Integrity(v) => LoopError::Integrity(v),
            Rejected::Projection(s) => s.into(),
        }
    }
}

impl From<JsonRejection> for LoopError {
    fn from(e: JsonRejection) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return LoopError::PayloadTooLarge(e.body_text());
        }
        LoopError::MalformedBody(e.body_text())
    }
}

impl From<QueryRejection> for LoopError {
    fn from(e: QueryRejection) -> Self {
        LoopError::MalformedBody(e.body_text())
    }
}

impl From<reqwest::Error> for LoopError {
    fn from(e: reqwest::Error) -> Self {
        LoopError::Network(e.to_string())
    }
}
