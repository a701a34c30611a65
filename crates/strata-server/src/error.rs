//! Server errors and their registry-protocol error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use strata_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("manifest unknown: {0}")]
    ManifestUnknown(String),

    #[error("blob unknown: {0}")]
    BlobUnknown(String),

    #[error("missing digest query parameter")]
    MissingDigest,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Body of an error response: `{"errors":[{"code","message"}]}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl ServerError {
    /// HTTP status and registry error code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::ManifestUnknown(_) => (StatusCode::NOT_FOUND, "MANIFEST_UNKNOWN"),
            Self::BlobUnknown(_) => (StatusCode::NOT_FOUND, "BLOB_UNKNOWN"),
            Self::MissingDigest => (StatusCode::BAD_REQUEST, "DIGEST_INVALID"),
            Self::Registry(e) => match e {
                RegistryError::InvalidName { .. } => (StatusCode::BAD_REQUEST, "NAME_INVALID"),
                RegistryError::InvalidDigest(_) | RegistryError::DigestMismatch { .. } => {
                    (StatusCode::BAD_REQUEST, "DIGEST_INVALID")
                }
                RegistryError::Unauthorized { .. } => (StatusCode::FORBIDDEN, "DENIED"),
                RegistryError::NotFound(_) => (StatusCode::NOT_FOUND, "NAME_UNKNOWN"),
                RegistryError::UploadUnknown(_) => (StatusCode::NOT_FOUND, "BLOB_UPLOAD_UNKNOWN"),
                RegistryError::Ledger(l) if l.is_transient() => {
                    (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "UNKNOWN"),
            },
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UNKNOWN")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match status {
            StatusCode::FORBIDDEN => tracing::warn!(error = %self, "write denied"),
            StatusCode::SERVICE_UNAVAILABLE => tracing::warn!(error = %self, "ledger unavailable"),
            s if s.is_server_error() => tracing::error!(error = %self, "request failed"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "an internal error occurred".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorBody {
            errors: vec![ErrorDetail { code, message }],
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use strata_types::Address;

    use super::*;

    fn code(e: impl Into<ServerError>) -> (StatusCode, &'static str) {
        e.into().status_and_code()
    }

    #[test]
    fn registry_errors_map_to_protocol_codes() {
        assert_eq!(
            code(RegistryError::Unauthorized {
                org: "acme".into(),
                identity: Address::new("b").unwrap(),
            }),
            (StatusCode::FORBIDDEN, "DENIED")
        );
        assert_eq!(
            code(RegistryError::NotFound("organization \"nobody\"".into())),
            (StatusCode::NOT_FOUND, "NAME_UNKNOWN")
        );
        assert_eq!(
            code(RegistryError::UploadUnknown("x".into())),
            (StatusCode::NOT_FOUND, "BLOB_UPLOAD_UNKNOWN")
        );
        assert_eq!(
            code(RegistryError::InvalidDigest("x".into())),
            (StatusCode::BAD_REQUEST, "DIGEST_INVALID")
        );
        assert_eq!(
            code(ServerError::ManifestUnknown("latest".into())),
            (StatusCode::NOT_FOUND, "MANIFEST_UNKNOWN")
        );
    }

    #[tokio::test]
    async fn error_body_shape() {
        let response = ServerError::BlobUnknown("sha256:00".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"][0]["code"], "BLOB_UNKNOWN");
        assert!(json["errors"][0]["message"].as_str().unwrap().contains("sha256:00"));
    }
}
