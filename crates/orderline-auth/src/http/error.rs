//! Error response handling for the auth handlers.
//!
//! Errors become a small JSON body `{"error", "error_description"?}` with the
//! status of their [`ErrorCategory`]. Only the issuer's own error text is
//! echoed; everything else gets a generic message and the detail goes to the
//! debug log.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{ErrorCategory, OidcError};

impl IntoResponse for OidcError {
    fn into_response(self) -> Response {
        let category = self.category();
        let status = StatusCode::from_u16(category.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = self.error_code();

        match category {
            ErrorCategory::Internal => {
                tracing::error!(status = status.as_u16(), error_code = code, "Authentication request failed");
            }
            ErrorCategory::BadRequest | ErrorCategory::Unauthorized => {
                tracing::warn!(status = status.as_u16(), error_code = code, "Authentication request rejected");
            }
        }
        tracing::debug!(error = %self, "Authentication error detail");

        let mut body = json!({ "error": code });
        if let Some(message) = self.public_message() {
            body["error_description"] = json!(message);
        }

        (status, Json(body)).into_response()
    }
}
