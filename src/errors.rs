//! Error types for the bucket index.
//!
//! Startup paths (configuration, the initial cache build) surface these
//! errors to `main`, which aborts.  At request time every variant maps to a
//! generic HTTP 500: the cause is logged, never sent to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Errors raised while configuring, refreshing or serving the index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// One or more required environment variables are unset or empty.
    #[error("missing environment variable(s): {}", .names.join(", "))]
    MissingEnv { names: Vec<String> },

    /// An optional environment variable holds an unusable value.
    #[error("invalid value for {name}: {message}")]
    InvalidConfig { name: String, message: String },

    /// The storage provider listing failed on some page.
    #[error("listing bucket failed: {0:#}")]
    Listing(#[source] anyhow::Error),

    /// A refresh did not complete before its deadline.
    #[error("refresh timed out after {seconds}s")]
    RefreshTimeout { seconds: u64 },

    /// HTML or JSON rendering failed.
    #[error("rendering listing failed: {0}")]
    Render(String),

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for IndexError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            "Internal Server Error",
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_listing_error_keeps_context() {
        let err = IndexError::Listing(anyhow::anyhow!("connection reset").context("page 3"));
        assert_eq!(err.to_string(), "listing bucket failed: page 3: connection reset");
    }

    #[test]
    fn test_every_variant_is_a_500() {
        let errors = vec![
            IndexError::Listing(anyhow::anyhow!("boom")),
            IndexError::RefreshTimeout { seconds: 5 },
            IndexError::Render("bad".to_string()),
            IndexError::Internal(anyhow::anyhow!("oops")),
        ];
        for err in errors {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
